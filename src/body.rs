use bitflags::bitflags;

use crate::contact::ContactEnd;
use crate::fixture::FixtureId;
use crate::joint::JointEnd;
use crate::math::{Sweep, Transform, Vec2};
use crate::pool::PoolKey;

/// The body type.
/// - static: zero mass, zero velocity, may be manually moved
/// - kinematic: zero mass, non-zero velocity set by user, moved by solver
/// - dynamic: positive mass, non-zero velocity determined by forces, moved by
///   solver
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum BodyType {
    Static,
    Kinematic,
    Dynamic,
}

/// A handle to a body stored in the world. Stale handles (to destroyed
/// bodies) must not be used; the world does not police them.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(pub(crate) u32);

impl PoolKey for BodyId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        BodyId(index as u32)
    }
}

/// A body definition holds all the data needed to construct a rigid body.
/// You can safely re-use body definitions.
#[derive(Clone, Debug)]
pub struct BodyDef {
    /// The body type: static, kinematic, or dynamic.
    /// Note: if a dynamic body would have zero mass, the mass is set to one.
    pub body_type: BodyType,
    /// The world position of the body. Avoid creating bodies at the origin
    /// since this can lead to many overlapping shapes.
    pub position: Vec2,
    /// The world angle of the body in radians.
    pub angle: f32,
    /// The linear velocity of the body's origin in world co-ordinates.
    pub linear_velocity: Vec2,
    /// The angular velocity of the body.
    pub angular_velocity: f32,
    /// Linear damping is used to reduce the linear velocity. The damping
    /// parameter can be larger than 1.0 but the damping effect becomes
    /// sensitive to the time step when the damping parameter is large.
    /// Units are 1/time
    pub linear_damping: f32,
    /// Angular damping is used to reduce the angular velocity. The damping
    /// parameter can be larger than 1.0 but the damping effect becomes
    /// sensitive to the time step when the damping parameter is large.
    /// Units are 1/time
    pub angular_damping: f32,
    /// Set this flag to false if this body should never fall asleep. Note
    /// that this increases CPU usage.
    pub allow_sleep: bool,
    /// Is this body initially awake or sleeping?
    pub awake: bool,
    /// Should this body be prevented from rotating? Useful for characters.
    pub fixed_rotation: bool,
    /// Is this a fast moving body that should be prevented from tunneling
    /// through other moving bodies? Note that all bodies are prevented from
    /// tunneling through kinematic and static bodies. This setting is only
    /// considered on dynamic bodies.
    /// Use this flag sparingly since it increases processing time.
    pub bullet: bool,
    /// Does this body start out enabled?
    pub enabled: bool,
    /// Use this to store application specific body data; the engine never
    /// interprets it.
    pub user_data: u64,
    /// Scale the gravity applied to this body.
    pub gravity_scale: f32,
}

impl Default for BodyDef {
    fn default() -> Self {
        Self {
            body_type: BodyType::Static,
            position: Vec2::ZERO,
            angle: 0.0,
            linear_velocity: Vec2::ZERO,
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            enabled: true,
            user_data: 0,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDef {
    pub fn new() -> BodyDef {
        Self::default()
    }

    pub(crate) fn validate(&self) -> bool {
        self.position.is_valid()
            && self.linear_velocity.is_valid()
            && self.angle.is_finite()
            && self.angular_velocity.is_finite()
            && self.linear_damping.is_finite()
            && self.linear_damping >= 0.0
            && self.angular_damping.is_finite()
            && self.angular_damping >= 0.0
    }
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub(crate) struct BodyFlags: u16 {
        const ISLAND = 0x0001;
        const AWAKE = 0x0002;
        const AUTO_SLEEP = 0x0004;
        const BULLET = 0x0008;
        const FIXED_ROTATION = 0x0010;
        const ENABLED = 0x0020;
        const TOI = 0x0040;
    }
}

/// A rigid body. These are created via `World::create_body`.
#[derive(Debug)]
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) flags: BodyFlags,

    /// Island-local index assigned during solving.
    pub(crate) island_index: usize,

    pub(crate) xf: Transform,
    pub(crate) sweep: Sweep,

    pub(crate) linear_velocity: Vec2,
    pub(crate) angular_velocity: f32,

    pub(crate) force: Vec2,
    pub(crate) torque: f32,

    /// Owned fixtures in creation order.
    pub(crate) fixtures: Vec<FixtureId>,

    /// Heads of the intrusive constraint edge lists.
    pub(crate) joint_list: Option<JointEnd>,
    pub(crate) contact_list: Option<ContactEnd>,

    pub(crate) mass: f32,
    pub(crate) inv_mass: f32,

    /// Rotational inertia about the center of mass.
    pub(crate) inertia: f32,
    pub(crate) inv_inertia: f32,

    pub(crate) linear_damping: f32,
    pub(crate) angular_damping: f32,
    pub(crate) gravity_scale: f32,

    pub(crate) sleep_time: f32,

    pub user_data: u64,
}

impl Body {
    pub(crate) fn new(def: &BodyDef) -> Self {
        let mut flags = BodyFlags::empty();
        if def.bullet {
            flags |= BodyFlags::BULLET;
        }
        if def.fixed_rotation {
            flags |= BodyFlags::FIXED_ROTATION;
        }
        if def.allow_sleep {
            flags |= BodyFlags::AUTO_SLEEP;
        }
        if def.awake && def.body_type != BodyType::Static {
            flags |= BodyFlags::AWAKE;
        }
        if def.enabled {
            flags |= BodyFlags::ENABLED;
        }

        let xf = Transform::new(def.position, def.angle);
        let sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: xf.p,
            c: xf.p,
            a0: def.angle,
            a: def.angle,
            alpha0: 0.0,
        };

        // Static bodies never move; drop any velocity from the definition.
        let (linear_velocity, angular_velocity) = if def.body_type == BodyType::Static {
            (Vec2::ZERO, 0.0)
        } else {
            (def.linear_velocity, def.angular_velocity)
        };

        let (mass, inv_mass) = if def.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Body {
            body_type: def.body_type,
            flags,
            island_index: 0,
            xf,
            sweep,
            linear_velocity,
            angular_velocity,
            force: Vec2::ZERO,
            torque: 0.0,
            fixtures: Vec::new(),
            joint_list: None,
            contact_list: None,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: def.linear_damping,
            angular_damping: def.angular_damping,
            gravity_scale: def.gravity_scale,
            sleep_time: 0.0,
            user_data: def.user_data,
        }
    }

    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// The body origin transform.
    pub fn transform(&self) -> Transform {
        self.xf
    }

    /// The world position of the body origin.
    pub fn position(&self) -> Vec2 {
        self.xf.p
    }

    /// The current world rotation angle in radians.
    pub fn angle(&self) -> f32 {
        self.sweep.a
    }

    /// The world position of the center of mass.
    pub fn world_center(&self) -> Vec2 {
        self.sweep.c
    }

    /// The local position of the center of mass.
    pub fn local_center(&self) -> Vec2 {
        self.sweep.local_center
    }

    pub fn linear_velocity(&self) -> Vec2 {
        self.linear_velocity
    }

    pub fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    pub fn set_linear_velocity(&mut self, v: Vec2) {
        if self.body_type == BodyType::Static {
            return;
        }
        if v.dot(v) > 0.0 {
            self.set_awake(true);
        }
        self.linear_velocity = v;
    }

    pub fn set_angular_velocity(&mut self, w: f32) {
        if self.body_type == BodyType::Static {
            return;
        }
        if w * w > 0.0 {
            self.set_awake(true);
        }
        self.angular_velocity = w;
    }

    pub fn mass(&self) -> f32 {
        self.mass
    }

    /// Rotational inertia about the center of mass.
    pub fn inertia(&self) -> f32 {
        self.inertia + self.mass * self.sweep.local_center.dot(self.sweep.local_center)
    }

    pub fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    pub fn set_linear_damping(&mut self, damping: f32) {
        self.linear_damping = damping;
    }

    pub fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    pub fn set_angular_damping(&mut self, damping: f32) {
        self.angular_damping = damping;
    }

    pub fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
    }

    /// Apply a force at a world point. If the force is not applied at the
    /// center of mass, it will generate a torque and affect the angular
    /// velocity. The force is accumulated until cleared with
    /// `World::clear_forces`.
    pub fn apply_force(&mut self, force: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        // Don't accumulate a force if the body is sleeping.
        if self.is_awake() {
            self.force += force;
            self.torque += (point - self.sweep.c).cross(force);
        }
    }

    /// Apply a force to the center of mass.
    pub fn apply_force_to_center(&mut self, force: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.force += force;
        }
    }

    /// Apply a torque. This affects the angular velocity without affecting
    /// the linear velocity of the center of mass.
    pub fn apply_torque(&mut self, torque: f32, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.torque += torque;
        }
    }

    /// Apply an impulse at a point. This immediately modifies the velocity.
    /// It also modifies the angular velocity if the point of application
    /// is not at the center of mass.
    pub fn apply_linear_impulse(&mut self, impulse: Vec2, point: Vec2, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.linear_velocity += self.inv_mass * impulse;
            self.angular_velocity += self.inv_inertia * (point - self.sweep.c).cross(impulse);
        }
    }

    pub fn apply_angular_impulse(&mut self, impulse: f32, wake: bool) {
        if self.body_type != BodyType::Dynamic {
            return;
        }
        if wake && !self.is_awake() {
            self.set_awake(true);
        }
        if self.is_awake() {
            self.angular_velocity += self.inv_inertia * impulse;
        }
    }

    /// Get the world coordinates of a point given the local coordinates.
    pub fn world_point(&self, local_point: Vec2) -> Vec2 {
        self.xf.mul_vec2(local_point)
    }

    /// Get the world coordinates of a vector given the local coordinates.
    pub fn world_vector(&self, local_vector: Vec2) -> Vec2 {
        self.xf.q * local_vector
    }

    /// Get a local point relative to the body's origin given a world point.
    pub fn local_point(&self, world_point: Vec2) -> Vec2 {
        self.xf.mul_t_vec2(world_point)
    }

    /// Get a local vector given a world vector.
    pub fn local_vector(&self, world_vector: Vec2) -> Vec2 {
        self.xf.q.mul_t_vec2(world_vector)
    }

    /// The world linear velocity of a world point attached to this body.
    pub fn linear_velocity_from_world_point(&self, world_point: Vec2) -> Vec2 {
        self.linear_velocity
            + Vec2::scalar_cross(self.angular_velocity, world_point - self.sweep.c)
    }

    /// Set the sleep state of the body. A sleeping body has very low CPU
    /// cost. Waking resets the sleep timer; putting a body to sleep also
    /// zeroes its velocities and accumulated forces.
    pub fn set_awake(&mut self, awake: bool) {
        if self.body_type == BodyType::Static {
            return;
        }
        if awake {
            self.flags |= BodyFlags::AWAKE;
            self.sleep_time = 0.0;
        } else {
            self.flags.remove(BodyFlags::AWAKE);
            self.sleep_time = 0.0;
            self.linear_velocity = Vec2::ZERO;
            self.angular_velocity = 0.0;
            self.force = Vec2::ZERO;
            self.torque = 0.0;
        }
    }

    pub fn is_awake(&self) -> bool {
        self.flags.contains(BodyFlags::AWAKE)
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(BodyFlags::ENABLED)
    }

    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    /// Should this body be treated like a bullet for continuous collision
    /// detection?
    pub fn set_bullet(&mut self, flag: bool) {
        if flag {
            self.flags |= BodyFlags::BULLET;
        } else {
            self.flags.remove(BodyFlags::BULLET);
        }
    }

    pub fn is_sleeping_allowed(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        if flag {
            self.flags |= BodyFlags::AUTO_SLEEP;
        } else {
            self.flags.remove(BodyFlags::AUTO_SLEEP);
            self.set_awake(true);
        }
    }

    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    /// The fixtures attached to this body, in creation order.
    pub fn fixture_ids(&self) -> &[FixtureId] {
        &self.fixtures
    }

    /// Update `xf` to agree with the end of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        self.xf.q = crate::math::Rot::new(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q * self.sweep.local_center;
    }

    /// Advance to the new safe time. This doesn't sync the broad-phase.
    pub(crate) fn advance(&mut self, alpha: f32) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.xf.q = crate::math::Rot::new(self.sweep.a);
        self.xf.p = self.sweep.c - self.xf.q * self.sweep.local_center;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_body_def_velocity_is_dropped() {
        let mut def = BodyDef::new();
        def.linear_velocity = Vec2::new(3.0, 0.0);
        def.angular_velocity = 1.0;
        let body = Body::new(&def);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.angular_velocity(), 0.0);
        assert!(!body.is_awake());
    }

    #[test]
    fn sleeping_clears_velocity_and_forces() {
        let mut def = BodyDef::new();
        def.body_type = BodyType::Dynamic;
        let mut body = Body::new(&def);
        body.set_linear_velocity(Vec2::new(1.0, 0.0));
        body.apply_force_to_center(Vec2::new(10.0, 0.0), true);
        body.set_awake(false);
        assert_eq!(body.linear_velocity(), Vec2::ZERO);
        assert_eq!(body.force, Vec2::ZERO);
    }

    #[test]
    fn forces_on_sleeping_bodies_are_ignored_without_wake() {
        let mut def = BodyDef::new();
        def.body_type = BodyType::Dynamic;
        def.awake = false;
        let mut body = Body::new(&def);
        body.apply_force_to_center(Vec2::new(10.0, 0.0), false);
        assert_eq!(body.force, Vec2::ZERO);
        body.apply_force_to_center(Vec2::new(10.0, 0.0), true);
        assert_eq!(body.force, Vec2::new(10.0, 0.0));
    }
}
