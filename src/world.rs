use tracing::warn;

use crate::body::{Body, BodyDef, BodyFlags, BodyId, BodyType};
use crate::collision::{Aabb, RayCastInput};
use crate::common::MAX_SUB_STEPS;
use crate::contact::{Contact, ContactFlags, ContactId};
use crate::contact_manager::ContactManager;
use crate::distance::DistanceProxy;
use crate::error::WorldError;
use crate::fixture::{Filter, Fixture, FixtureDef, FixtureId};
use crate::island::Island;
use crate::joint::{
    gear::GearLeg, DistanceJoint, FrictionJoint, GearJoint, Joint, JointDef, JointEnd, JointId,
    JointKind, MotorJoint, MouseJoint, PrismaticJoint, PulleyJoint, RevoluteJoint, RopeJoint,
    WeldJoint, WheelJoint,
};
use crate::math::{Transform, Vec2};
use crate::pool::Pool;
use crate::shape::{MassData, Shape};
use crate::time_of_impact::{time_of_impact, ToiInput, ToiState};
use crate::time_step::TimeStep;
use crate::world_callbacks::{ContactFilter, ContactListener, DestructionListener};

/// The world manages all physics entities and the simulation: it owns the
/// bodies and joints, drives the contact manager, and advances time with
/// [`World::step`].
pub struct World {
    pub(crate) bodies: Pool<BodyId, Body>,
    pub(crate) fixtures: Pool<FixtureId, Fixture>,
    pub(crate) joints: Pool<JointId, Joint>,
    pub(crate) contact_manager: ContactManager,

    island: Island,

    gravity: Vec2,
    allow_sleep: bool,

    destruction_listener: Option<Box<dyn DestructionListener>>,

    /// This is used to compute the time step ratio to support a variable
    /// time step.
    inv_dt0: f32,

    new_contacts: bool,
    locked: bool,

    // These are for debugging the solver.
    warm_starting: bool,
    continuous_physics: bool,
    sub_stepping: bool,

    step_complete: bool,
}

impl World {
    pub fn new(gravity: Vec2) -> Self {
        Self {
            bodies: Pool::new(),
            fixtures: Pool::new(),
            joints: Pool::new(),
            contact_manager: ContactManager::new(),
            island: Island::new(),
            gravity,
            allow_sleep: true,
            destruction_listener: None,
            inv_dt0: 0.0,
            new_contacts: false,
            locked: false,
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            step_complete: true,
        }
    }

    /// Is the world mid-step? Mutation entry points fail while locked.
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn gravity(&self) -> Vec2 {
        self.gravity
    }

    pub fn set_gravity(&mut self, gravity: Vec2) {
        self.gravity = gravity;
    }

    /// Enable/disable sleep for the whole world.
    pub fn set_allow_sleeping(&mut self, flag: bool) {
        if flag == self.allow_sleep {
            return;
        }
        self.allow_sleep = flag;
        if !flag {
            for id in self.bodies.keys() {
                self.bodies[id].set_awake(true);
            }
        }
    }

    pub fn set_warm_starting(&mut self, flag: bool) {
        self.warm_starting = flag;
    }

    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.continuous_physics = flag;
    }

    /// Single-stepped continuous physics: the step returns after the first
    /// TOI event so the caller can inspect each sub-step.
    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.sub_stepping = flag;
    }

    /// Register a contact event listener.
    pub fn set_contact_listener(&mut self, listener: Box<dyn ContactListener>) {
        self.contact_manager.contact_listener = Some(listener);
    }

    /// Register a custom contact admission filter.
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.contact_manager.contact_filter = filter;
    }

    /// Register a listener for implicit destruction (cascade deletes).
    pub fn set_destruction_listener(&mut self, listener: Box<dyn DestructionListener>) {
        self.destruction_listener = Some(listener);
    }

    // Accessors

    pub fn body(&self, id: BodyId) -> &Body {
        &self.bodies[id]
    }

    pub fn body_mut(&mut self, id: BodyId) -> &mut Body {
        &mut self.bodies[id]
    }

    pub fn fixture(&self, id: FixtureId) -> &Fixture {
        &self.fixtures[id]
    }

    pub fn fixture_mut(&mut self, id: FixtureId) -> &mut Fixture {
        &mut self.fixtures[id]
    }

    pub fn joint(&self, id: JointId) -> &Joint {
        &self.joints[id]
    }

    pub fn joint_mut(&mut self, id: JointId) -> &mut Joint {
        &mut self.joints[id]
    }

    pub fn contact(&self, id: ContactId) -> &Contact {
        &self.contact_manager.contacts[id]
    }

    /// Live body ids in deterministic (slot) order.
    pub fn body_ids(&self) -> Vec<BodyId> {
        self.bodies.keys()
    }

    pub fn joint_ids(&self) -> Vec<JointId> {
        self.joints.keys()
    }

    pub fn contact_ids(&self) -> Vec<ContactId> {
        self.contact_manager.contacts.keys()
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// The world anchor point on body A of a joint.
    pub fn joint_anchor_a(&self, id: JointId) -> Vec2 {
        self.joints[id].anchor_a(&self.bodies)
    }

    /// The world anchor point on body B of a joint.
    pub fn joint_anchor_b(&self, id: JointId) -> Vec2 {
        self.joints[id].anchor_b(&self.bodies)
    }

    // Body lifecycle

    /// Create a rigid body from a definition.
    pub fn create_body(&mut self, def: &BodyDef) -> Result<BodyId, WorldError> {
        if self.locked {
            warn!("create_body rejected: world is locked");
            return Err(WorldError::Locked("create_body"));
        }
        if !def.validate() {
            return Err(WorldError::InvalidArgument(
                "body definition has non-finite or negative values",
            ));
        }

        Ok(self.bodies.insert(Body::new(def)))
    }

    /// Destroy a body. This cascades into the attached fixtures, contacts,
    /// and joints; each implicitly destroyed joint and fixture is reported
    /// through the destruction listener first.
    pub fn destroy_body(&mut self, id: BodyId) -> Result<(), WorldError> {
        if self.locked {
            warn!("destroy_body rejected: world is locked");
            return Err(WorldError::Locked("destroy_body"));
        }
        if !self.bodies.contains(id) {
            return Err(WorldError::StaleHandle("destroy_body"));
        }

        // Delete the attached joints, taking any dependent gear joints
        // with them.
        while let Some(end) = self.bodies[id].joint_list {
            self.destroy_joint_with_dependents(end.joint, true);
        }

        // Delete the attached contacts.
        self.contact_manager
            .destroy_body_contacts(&mut self.bodies, id);

        // Delete the attached fixtures. This destroys broad-phase proxies.
        let fixture_ids = std::mem::take(&mut self.bodies[id].fixtures);
        for fid in fixture_ids {
            if let Some(listener) = &mut self.destruction_listener {
                listener.fixture_destroyed(fid);
            }
            self.fixtures[fid].destroy_proxies(&mut self.contact_manager.broad_phase);
            self.fixtures.remove(fid);
        }

        self.bodies.remove(id);
        Ok(())
    }

    // Fixture lifecycle

    /// Create a fixture and attach it to a body. If the density is
    /// non-zero, this automatically updates the mass of the body.
    pub fn create_fixture(
        &mut self,
        body: BodyId,
        def: &FixtureDef,
    ) -> Result<FixtureId, WorldError> {
        if self.locked {
            warn!("create_fixture rejected: world is locked");
            return Err(WorldError::Locked("create_fixture"));
        }
        if !self.bodies.contains(body) {
            return Err(WorldError::StaleHandle("create_fixture"));
        }
        if !(def.density.is_finite() && def.density >= 0.0) {
            return Err(WorldError::InvalidArgument("fixture density must be >= 0"));
        }
        if !(def.friction.is_finite() && def.friction >= 0.0) {
            return Err(WorldError::InvalidArgument("fixture friction must be >= 0"));
        }
        match &def.shape {
            Shape::Polygon(poly) if poly.count < 3 => {
                return Err(WorldError::InvalidArgument("polygon has fewer than 3 vertices"));
            }
            Shape::Chain(chain) if chain.vertices.len() < 2 => {
                return Err(WorldError::InvalidArgument("chain has fewer than 2 vertices"));
            }
            _ => {}
        }

        let id = self.fixtures.insert(Fixture::new(def, body));

        if self.bodies[body].is_enabled() {
            let xf = self.bodies[body].transform();
            self.fixtures[id].create_proxies(&mut self.contact_manager.broad_phase, &xf, id);
        }

        self.bodies[body].fixtures.push(id);

        // Adjust mass properties if needed.
        if def.density > 0.0 {
            self.reset_mass_data(body);
        }

        // Let the world know we have a new fixture. This will cause new
        // contacts to be created at the beginning of the next time step.
        self.new_contacts = true;

        Ok(id)
    }

    /// Destroy a fixture. This removes it from the broad-phase and
    /// destroys all contacts associated with it, then recomputes the body
    /// mass.
    pub fn destroy_fixture(&mut self, id: FixtureId) -> Result<(), WorldError> {
        if self.locked {
            warn!("destroy_fixture rejected: world is locked");
            return Err(WorldError::Locked("destroy_fixture"));
        }
        let body = match self.fixtures.get(id) {
            Some(fixture) => fixture.body,
            None => return Err(WorldError::StaleHandle("destroy_fixture")),
        };

        // Destroy any contacts associated with the fixture.
        let mut edge = self.bodies[body].contact_list;
        while let Some(end) = edge {
            let contact_id = end.contact;
            let (next, fixture_a, fixture_b) = {
                let c = &self.contact_manager.contacts[contact_id];
                (c.edges[end.end].next, c.fixture_a, c.fixture_b)
            };
            edge = next;
            if fixture_a == id || fixture_b == id {
                // This destroys the contact and removes it from this
                // body's contact list.
                self.contact_manager.destroy(contact_id, &mut self.bodies);
            }
        }

        self.fixtures[id].destroy_proxies(&mut self.contact_manager.broad_phase);
        self.bodies[body].fixtures.retain(|&fid| fid != id);
        self.fixtures.remove(id);

        // Reset the mass data.
        self.reset_mass_data(body);
        Ok(())
    }

    /// Set the filter data of a fixture. This will not update contacts
    /// until the next time step when either parent body is active or
    /// awake; flagged contacts are re-admitted or destroyed then.
    pub fn set_filter_data(&mut self, id: FixtureId, filter: Filter) {
        self.fixtures[id].filter = filter;
        self.refilter(id);
    }

    /// Call this if you want to establish collision that was previously
    /// disabled by a contact filter.
    pub fn refilter(&mut self, id: FixtureId) {
        let body = self.fixtures[id].body;

        // Flag associated contacts for filtering.
        self.contact_manager
            .flag_contacts_for_filtering(&self.bodies, body, id);

        // Touch each proxy so that new pairs may be created.
        self.fixtures[id].refilter_proxies(&mut self.contact_manager.broad_phase);
    }

    // Body state changes that touch the broad-phase or contact graph

    /// Set the position and angle of a body. Manipulating a body's
    /// transform may cause non-physical behavior; contacts are updated on
    /// the next step.
    pub fn set_transform(
        &mut self,
        id: BodyId,
        position: Vec2,
        angle: f32,
    ) -> Result<(), WorldError> {
        if self.locked {
            warn!("set_transform rejected: world is locked");
            return Err(WorldError::Locked("set_transform"));
        }

        let body = &mut self.bodies[id];
        body.xf = Transform::new(position, angle);
        body.sweep.c = body.xf.mul_vec2(body.sweep.local_center);
        body.sweep.a = angle;
        body.sweep.c0 = body.sweep.c;
        body.sweep.a0 = angle;

        let xf = body.xf;
        let fixture_ids = body.fixtures.clone();
        for fid in fixture_ids {
            self.fixtures[fid].synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
        }

        // Check for new contacts the next step.
        self.new_contacts = true;
        Ok(())
    }

    /// Change the body type. This alters mass, contacts, and velocity
    /// state.
    pub fn set_body_type(&mut self, id: BodyId, body_type: BodyType) -> Result<(), WorldError> {
        if self.locked {
            warn!("set_body_type rejected: world is locked");
            return Err(WorldError::Locked("set_body_type"));
        }

        if self.bodies[id].body_type == body_type {
            return Ok(());
        }

        self.bodies[id].body_type = body_type;
        self.reset_mass_data(id);

        if body_type == BodyType::Static {
            let body = &mut self.bodies[id];
            body.linear_velocity = Vec2::ZERO;
            body.angular_velocity = 0.0;
            body.sweep.c0 = body.sweep.c;
            body.sweep.a0 = body.sweep.a;
            body.flags.remove(BodyFlags::AWAKE);
            self.synchronize_fixtures(id);
        }

        self.bodies[id].set_awake(true);
        self.bodies[id].force = Vec2::ZERO;
        self.bodies[id].torque = 0.0;

        // Delete the attached contacts.
        self.contact_manager
            .destroy_body_contacts(&mut self.bodies, id);

        // Touch the proxies so that new contacts will be created (when
        // appropriate).
        let fixture_ids = self.bodies[id].fixtures.clone();
        for fid in fixture_ids {
            self.fixtures[fid].refilter_proxies(&mut self.contact_manager.broad_phase);
        }

        Ok(())
    }

    /// Enable or disable a body. A disabled body is removed from the
    /// broad-phase and its contacts are destroyed; re-enabling costs as
    /// much as creating the fixtures anew.
    pub fn set_body_enabled(&mut self, id: BodyId, flag: bool) -> Result<(), WorldError> {
        if self.locked {
            warn!("set_body_enabled rejected: world is locked");
            return Err(WorldError::Locked("set_body_enabled"));
        }

        if flag == self.bodies[id].is_enabled() {
            return Ok(());
        }

        if flag {
            self.bodies[id].flags |= BodyFlags::ENABLED;

            // Create all proxies.
            let xf = self.bodies[id].transform();
            let fixture_ids = self.bodies[id].fixtures.clone();
            for fid in fixture_ids {
                self.fixtures[fid].create_proxies(&mut self.contact_manager.broad_phase, &xf, fid);
            }

            // Contacts are created at the beginning of the next step.
            self.new_contacts = true;
        } else {
            self.bodies[id].flags.remove(BodyFlags::ENABLED);

            // Destroy all proxies.
            let fixture_ids = self.bodies[id].fixtures.clone();
            for fid in fixture_ids {
                self.fixtures[fid].destroy_proxies(&mut self.contact_manager.broad_phase);
            }

            // Destroy the attached contacts.
            self.contact_manager
                .destroy_body_contacts(&mut self.bodies, id);
        }
        Ok(())
    }

    /// Recompute the body's mass, center, and rotational inertia from its
    /// fixtures. Call this after changing fixture densities.
    pub fn reset_mass_data(&mut self, id: BodyId) {
        let body_type = self.bodies[id].body_type;

        // Static and kinematic bodies have zero mass.
        if body_type != BodyType::Dynamic {
            let body = &mut self.bodies[id];
            body.mass = 0.0;
            body.inv_mass = 0.0;
            body.inertia = 0.0;
            body.inv_inertia = 0.0;
            body.sweep.local_center = Vec2::ZERO;
            body.sweep.c0 = body.xf.p;
            body.sweep.c = body.xf.p;
            body.sweep.a0 = body.sweep.a;
            return;
        }

        // Accumulate mass over all fixtures.
        let mut mass = 0.0;
        let mut inertia = 0.0;
        let mut center = Vec2::ZERO;
        for &fid in &self.bodies[id].fixtures {
            let fixture = &self.fixtures[fid];
            if fixture.density == 0.0 {
                continue;
            }
            let mass_data: MassData = fixture.mass_data();
            mass += mass_data.mass;
            center += mass_data.mass * mass_data.center;
            inertia += mass_data.inertia;
        }

        let body = &mut self.bodies[id];

        // Compute center of mass.
        if mass > 0.0 {
            body.inv_mass = 1.0 / mass;
            center *= body.inv_mass;
        } else {
            // Force all dynamic bodies to have positive mass.
            mass = 1.0;
            body.inv_mass = 1.0;
        }
        body.mass = mass;

        if inertia > 0.0 && !body.flags.contains(BodyFlags::FIXED_ROTATION) {
            // Center the inertia about the center of mass.
            inertia -= mass * center.dot(center);
            debug_assert!(inertia > 0.0);
            body.inertia = inertia;
            body.inv_inertia = 1.0 / inertia;
        } else {
            body.inertia = 0.0;
            body.inv_inertia = 0.0;
        }

        // Move center of mass.
        let old_center = body.sweep.c;
        body.sweep.local_center = center;
        body.sweep.c = body.xf.mul_vec2(center);
        body.sweep.c0 = body.sweep.c;

        // Update center of mass velocity.
        body.linear_velocity +=
            Vec2::scalar_cross(body.angular_velocity, body.sweep.c - old_center);
    }

    // Joint lifecycle

    /// Create a joint from a definition. With `collide_connected == false`
    /// any existing contact between the two bodies is scheduled for
    /// removal.
    pub fn create_joint(&mut self, def: &JointDef) -> Result<JointId, WorldError> {
        if self.locked {
            warn!("create_joint rejected: world is locked");
            return Err(WorldError::Locked("create_joint"));
        }

        let joint = self.build_joint(def)?;
        let body_a = joint.body_a;
        let body_b = joint.body_b;
        let collide_connected = joint.collide_connected;
        let id = self.joints.insert(joint);
        Self::link_joint(&mut self.joints, &mut self.bodies, id);

        self.bodies[body_a].set_awake(true);
        self.bodies[body_b].set_awake(true);

        // If the joint prevents collisions, then flag any contacts for
        // filtering.
        if !collide_connected {
            self.flag_pair_contacts_for_filtering(body_a, body_b);
        }

        Ok(id)
    }

    /// Destroy a joint. Gear joints referencing this joint are destroyed
    /// first and reported through the destruction listener, so no gear is
    /// ever left with a dangling referent.
    pub fn destroy_joint(&mut self, id: JointId) -> Result<(), WorldError> {
        if self.locked {
            warn!("destroy_joint rejected: world is locked");
            return Err(WorldError::Locked("destroy_joint"));
        }
        if !self.joints.contains(id) {
            return Err(WorldError::StaleHandle("destroy_joint"));
        }

        self.destroy_joint_with_dependents(id, false);
        Ok(())
    }

    /// Destroy dependent gear joints before the joint itself. Gears are
    /// always implicit casualties, so they are reported through the
    /// destruction listener; the root joint is reported only when it is
    /// itself being destroyed implicitly (body destruction cascade).
    fn destroy_joint_with_dependents(&mut self, id: JointId, notify_root: bool) {
        let dependent_gears: Vec<JointId> = self
            .joints
            .iter()
            .filter_map(|(gid, joint)| match joint.referenced_joints() {
                Some((j1, j2)) if j1 == id || j2 == id => Some(gid),
                _ => None,
            })
            .collect();
        for gear in dependent_gears {
            warn!("destroying gear joint whose referent joint is going away");
            if let Some(listener) = &mut self.destruction_listener {
                listener.joint_destroyed(gear);
            }
            self.destroy_joint_internal(gear);
        }

        if notify_root {
            if let Some(listener) = &mut self.destruction_listener {
                listener.joint_destroyed(id);
            }
        }
        self.destroy_joint_internal(id);
    }

    fn destroy_joint_internal(&mut self, id: JointId) {
        let body_a = self.joints[id].body_a;
        let body_b = self.joints[id].body_b;
        let collide_connected = self.joints[id].collide_connected;

        // Wake up connected bodies.
        self.bodies[body_a].set_awake(true);
        self.bodies[body_b].set_awake(true);

        Self::unlink_joint(&mut self.joints, &mut self.bodies, id);
        self.joints.remove(id);

        // If the joint prevented collisions, then flag any contacts for
        // filtering so they can be re-admitted.
        if !collide_connected {
            self.flag_pair_contacts_for_filtering(body_a, body_b);
        }
    }

    fn flag_pair_contacts_for_filtering(&mut self, body_a: BodyId, body_b: BodyId) {
        let mut edge = self.bodies[body_b].contact_list;
        while let Some(end) = edge {
            let contact = &mut self.contact_manager.contacts[end.contact];
            if contact.edges[end.end].other == body_a {
                // Flag the contact for filtering at the next time step
                // (where either body is awake).
                contact.flag_for_filtering();
            }
            edge = contact.edges[end.end].next;
        }
    }

    fn link_joint(joints: &mut Pool<JointId, Joint>, bodies: &mut Pool<BodyId, Body>, id: JointId) {
        let body_a = joints[id].body_a;
        let body_b = joints[id].body_b;

        for (end, body) in [(0usize, body_a), (1usize, body_b)] {
            let head = bodies[body].joint_list;
            joints[id].edges[end].prev = None;
            joints[id].edges[end].next = head;
            if let Some(head) = head {
                joints[head.joint].edges[head.end].prev = Some(JointEnd { joint: id, end });
            }
            bodies[body].joint_list = Some(JointEnd { joint: id, end });
        }
    }

    fn unlink_joint(
        joints: &mut Pool<JointId, Joint>,
        bodies: &mut Pool<BodyId, Body>,
        id: JointId,
    ) {
        let body_a = joints[id].body_a;
        let body_b = joints[id].body_b;

        for (end, body) in [(0usize, body_a), (1usize, body_b)] {
            let edge = joints[id].edges[end];
            if let Some(prev) = edge.prev {
                joints[prev.joint].edges[prev.end].next = edge.next;
            } else {
                bodies[body].joint_list = edge.next;
            }
            if let Some(next) = edge.next {
                joints[next.joint].edges[next.end].prev = edge.prev;
            }
        }
    }

    fn build_joint(&self, def: &JointDef) -> Result<Joint, WorldError> {
        let (body_a, body_b, collide_connected, user_data) = match def {
            JointDef::Distance(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Revolute(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Prismatic(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Pulley(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Mouse(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Wheel(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Weld(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Friction(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Rope(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Motor(d) => (d.body_a, d.body_b, d.collide_connected, d.user_data),
            JointDef::Gear(d) => return self.build_gear_joint(d),
        };

        if body_a == body_b {
            return Err(WorldError::InvalidArgument(
                "joint must connect two different bodies",
            ));
        }
        if !self.bodies.contains(body_a) || !self.bodies.contains(body_b) {
            return Err(WorldError::StaleHandle("create_joint"));
        }

        let kind = match def {
            JointDef::Distance(d) => {
                if d.length <= crate::common::LINEAR_SLOP {
                    return Err(WorldError::InvalidArgument(
                        "distance joint length must exceed the linear slop",
                    ));
                }
                JointKind::Distance(DistanceJoint::new(d))
            }
            JointDef::Revolute(d) => JointKind::Revolute(RevoluteJoint::new(d)),
            JointDef::Prismatic(d) => JointKind::Prismatic(PrismaticJoint::new(d)),
            JointDef::Pulley(d) => {
                if d.ratio <= f32::EPSILON {
                    return Err(WorldError::InvalidArgument(
                        "pulley ratio must be positive",
                    ));
                }
                JointKind::Pulley(PulleyJoint::new(d))
            }
            JointDef::Mouse(d) => JointKind::Mouse(MouseJoint::new(d, &self.bodies)),
            JointDef::Wheel(d) => JointKind::Wheel(WheelJoint::new(d)),
            JointDef::Weld(d) => JointKind::Weld(WeldJoint::new(d)),
            JointDef::Friction(d) => JointKind::Friction(FrictionJoint::new(d)),
            JointDef::Rope(d) => {
                if d.max_length <= crate::common::LINEAR_SLOP {
                    return Err(WorldError::InvalidArgument(
                        "rope max length must exceed the linear slop",
                    ));
                }
                JointKind::Rope(RopeJoint::new(d))
            }
            JointDef::Motor(d) => JointKind::Motor(MotorJoint::new(d)),
            JointDef::Gear(_) => unreachable!(),
        };

        Ok(Joint::new(kind, body_a, body_b, collide_connected, user_data))
    }

    /// Resolve a gear definition: read the legs out of the two referent
    /// joints. Each referent must be a revolute or prismatic joint with a
    /// ground body as its body A.
    fn build_gear_joint(&self, def: &crate::joint::GearJointDef) -> Result<Joint, WorldError> {
        let joint1 = self
            .joints
            .get(def.joint1)
            .ok_or(WorldError::StaleHandle("gear joint1"))?;
        let joint2 = self
            .joints
            .get(def.joint2)
            .ok_or(WorldError::StaleHandle("gear joint2"))?;

        let resolve = |joint: &Joint| -> Result<(BodyId, BodyId, Vec2, GearLeg, f32), WorldError> {
            let body_ground = joint.body_a;
            let body_moving = joint.body_b;
            let xf_ground = self.bodies[body_ground].transform();
            let xf_moving = self.bodies[body_moving].transform();
            match &joint.kind {
                JointKind::Revolute(r) => {
                    let coordinate = self.bodies[body_moving].sweep.a
                        - self.bodies[body_ground].sweep.a
                        - r.reference_angle;
                    Ok((
                        body_ground,
                        body_moving,
                        r.local_anchor_b,
                        GearLeg::Revolute {
                            reference_angle: r.reference_angle,
                        },
                        coordinate,
                    ))
                }
                JointKind::Prismatic(p) => {
                    let p_ground = p.local_anchor_a;
                    let p_moving = xf_ground.mul_t_vec2(xf_moving.mul_vec2(p.local_anchor_b));
                    let coordinate = (p_moving - p_ground).dot(p.local_axis_a);
                    Ok((
                        body_ground,
                        body_moving,
                        p.local_anchor_b,
                        GearLeg::Prismatic {
                            local_anchor_ground: p.local_anchor_a,
                            local_anchor_body: p.local_anchor_b,
                            local_axis: p.local_axis_a,
                        },
                        coordinate,
                    ))
                }
                _ => Err(WorldError::InvalidArgument(
                    "gear joints require revolute or prismatic referents",
                )),
            }
        };

        let (body_c, body_a, local_anchor_a, leg_a, coordinate_a) = resolve(joint1)?;
        let (body_d, body_b, local_anchor_b, leg_b, coordinate_b) = resolve(joint2)?;

        if body_a == body_b {
            return Err(WorldError::InvalidArgument(
                "gear joint must couple two different moving bodies",
            ));
        }

        let gear = GearJoint::new(
            def,
            body_c,
            body_d,
            local_anchor_a,
            local_anchor_b,
            leg_a,
            leg_b,
            coordinate_a,
            coordinate_b,
        );

        Ok(Joint::new(
            JointKind::Gear(gear),
            body_a,
            body_b,
            def.collide_connected,
            def.user_data,
        ))
    }

    // Stepping

    /// Take a time step. This performs collision detection, integration,
    /// and constraint solution.
    ///
    /// `dt` is the amount of time to simulate; this should not vary.
    /// `velocity_iterations` and `position_iterations` trade accuracy for
    /// speed; 8 and 3 are the suggested counts.
    pub fn step(&mut self, dt: f32, velocity_iterations: usize, position_iterations: usize) {
        // If new fixtures were added, we need to find the new contacts.
        if self.new_contacts {
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
            self.new_contacts = false;
        }

        self.locked = true;

        let step = TimeStep {
            dt,
            inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
            dt_ratio: self.inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting: self.warm_starting,
        };

        // Update contacts. This is where some contacts are destroyed.
        self.contact_manager
            .collide(&mut self.bodies, &self.fixtures, &self.joints);

        // Integrate velocities, solve velocity constraints, and integrate
        // positions.
        if self.step_complete && step.dt > 0.0 {
            self.solve(&step);
        }

        // Handle TOI events.
        if self.continuous_physics && step.dt > 0.0 {
            self.solve_toi(&step);
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        // Forces are NOT cleared automatically; call clear_forces after
        // all sub-steps of your game frame are done.

        self.locked = false;
    }

    /// Manually clear the force and torque buffers on every body. The
    /// standard loop is: apply forces, step, render, clear forces; with
    /// multiple sub-steps per frame the same forces persist across them
    /// until this call.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vec2::ZERO;
            body.torque = 0.0;
        }
    }

    /// Find islands, integrate and solve constraints, solve position
    /// constraints.
    fn solve(&mut self, step: &TimeStep) {
        // Clear all the island flags.
        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island_flag = false;
        }

        // Build and simulate all awake islands.
        let mut stack: Vec<BodyId> = Vec::with_capacity(self.bodies.len());
        for seed_id in self.bodies.keys() {
            {
                let seed = &self.bodies[seed_id];
                if seed.flags.contains(BodyFlags::ISLAND) {
                    continue;
                }
                if !seed.is_awake() || !seed.is_enabled() {
                    continue;
                }
                // The seed can be dynamic or kinematic.
                if seed.body_type == BodyType::Static {
                    continue;
                }
            }

            // Reset island and stack.
            self.island.clear();
            stack.clear();
            stack.push(seed_id);
            self.bodies[seed_id].flags |= BodyFlags::ISLAND;

            // Perform a depth first search (DFS) on the constraint graph.
            while let Some(body_id) = stack.pop() {
                // Grab the next body off the stack and add it to the
                // island.
                let body_type = {
                    let b = &mut self.bodies[body_id];
                    debug_assert!(b.is_enabled());
                    self.island.add_body(body_id, b);

                    // Make sure the body is awake (without resetting sleep
                    // timer).
                    b.flags |= BodyFlags::AWAKE;
                    b.body_type
                };

                // To keep islands as small as possible, we don't propagate
                // islands across static bodies.
                if body_type == BodyType::Static {
                    continue;
                }

                // Search all contacts connected to this body.
                let mut edge = self.bodies[body_id].contact_list;
                while let Some(end) = edge {
                    let contact_id = end.contact;
                    let (next, other, in_island, solid, sensor) = {
                        let contact = &self.contact_manager.contacts[contact_id];
                        let sensor_a = self.fixtures[contact.fixture_a].is_sensor;
                        let sensor_b = self.fixtures[contact.fixture_b].is_sensor;
                        (
                            contact.edges[end.end].next,
                            contact.edges[end.end].other,
                            contact.flags.contains(ContactFlags::ISLAND),
                            contact.is_enabled() && contact.is_touching(),
                            sensor_a || sensor_b,
                        )
                    };
                    edge = next;

                    // Has this contact already been added to an island?
                    // Is this contact solid and touching? Skip sensors.
                    if in_island || !solid || sensor {
                        continue;
                    }

                    self.island.add_contact(contact_id);
                    self.contact_manager.contacts[contact_id].flags |= ContactFlags::ISLAND;

                    // Was the other body already added to this island?
                    if self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    stack.push(other);
                    self.bodies[other].flags |= BodyFlags::ISLAND;
                }

                // Search all joints connected to this body.
                let mut edge = self.bodies[body_id].joint_list;
                while let Some(end) = edge {
                    let joint_id = end.joint;
                    let (next, other, in_island) = {
                        let joint = &self.joints[joint_id];
                        (
                            joint.edges[end.end].next,
                            joint.edges[end.end].other,
                            joint.island_flag,
                        )
                    };
                    edge = next;

                    if in_island {
                        continue;
                    }

                    // Don't simulate joints connected to disabled bodies.
                    if !self.bodies[other].is_enabled() {
                        continue;
                    }

                    self.island.add_joint(joint_id);
                    self.joints[joint_id].island_flag = true;

                    if self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    stack.push(other);
                    self.bodies[other].flags |= BodyFlags::ISLAND;
                }
            }

            let cm = &mut self.contact_manager;
            self.island.solve(
                step,
                self.gravity,
                self.allow_sleep,
                &mut self.bodies,
                &self.fixtures,
                &mut cm.contacts,
                &mut self.joints,
                &mut cm.contact_listener,
            );

            // Post solve cleanup: allow static bodies to participate in
            // other islands.
            for i in 0..self.island.bodies.len() {
                let id = self.island.bodies[i];
                if self.bodies[id].body_type == BodyType::Static {
                    self.bodies[id].flags.remove(BodyFlags::ISLAND);
                }
            }
        }

        // Synchronize fixtures, check for out of range bodies.
        for id in self.bodies.keys() {
            // If a body was not in an island then it did not move.
            if !self.bodies[id].flags.contains(BodyFlags::ISLAND) {
                continue;
            }
            if self.bodies[id].body_type == BodyType::Static {
                continue;
            }

            // Update fixtures (for broad-phase).
            self.synchronize_fixtures(id);
        }

        // Look for new contacts.
        self.contact_manager
            .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);
    }

    /// Find TOI contacts and solve them sub-stepping from the earliest
    /// impact.
    fn solve_toi(&mut self, step: &TimeStep) {
        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.flags.remove(BodyFlags::ISLAND);
                body.sweep.alpha0 = 0.0;
            }

            for (_, contact) in self.contact_manager.contacts.iter_mut() {
                // Invalidate TOI
                contact
                    .flags
                    .remove(ContactFlags::TOI | ContactFlags::ISLAND);
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        // Find TOI events and solve them.
        loop {
            // Find the first TOI.
            let mut min_contact: Option<ContactId> = None;
            let mut min_alpha = 1.0_f32;

            for contact_id in self.contact_manager.contacts.keys() {
                // Is this contact disabled?
                if !self.contact_manager.contacts[contact_id].is_enabled() {
                    continue;
                }

                // Prevent excessive sub-stepping.
                if self.contact_manager.contacts[contact_id].toi_count > MAX_SUB_STEPS {
                    continue;
                }

                let alpha;
                if self.contact_manager.contacts[contact_id]
                    .flags
                    .contains(ContactFlags::TOI)
                {
                    // This contact has a valid cached TOI.
                    alpha = self.contact_manager.contacts[contact_id].toi;
                } else {
                    let (fixture_a, fixture_b, child_a, child_b) = {
                        let c = &self.contact_manager.contacts[contact_id];
                        (c.fixture_a, c.fixture_b, c.child_index_a, c.child_index_b)
                    };

                    // Is there a sensor?
                    if self.fixtures[fixture_a].is_sensor || self.fixtures[fixture_b].is_sensor {
                        continue;
                    }

                    let body_a_id = self.fixtures[fixture_a].body;
                    let body_b_id = self.fixtures[fixture_b].body;

                    let type_a = self.bodies[body_a_id].body_type;
                    let type_b = self.bodies[body_b_id].body_type;
                    debug_assert!(type_a == BodyType::Dynamic || type_b == BodyType::Dynamic);

                    let active_a =
                        self.bodies[body_a_id].is_awake() && type_a != BodyType::Static;
                    let active_b =
                        self.bodies[body_b_id].is_awake() && type_b != BodyType::Static;

                    // Is at least one body active (awake and dynamic or
                    // kinematic)?
                    if !active_a && !active_b {
                        continue;
                    }

                    let collide_a =
                        self.bodies[body_a_id].is_bullet() || type_a != BodyType::Dynamic;
                    let collide_b =
                        self.bodies[body_b_id].is_bullet() || type_b != BodyType::Dynamic;

                    // Are these two non-bullet dynamic bodies?
                    if !collide_a && !collide_b {
                        continue;
                    }

                    // Compute the TOI for this contact. Put the sweeps onto
                    // the same time interval.
                    let alpha0_a = self.bodies[body_a_id].sweep.alpha0;
                    let alpha0_b = self.bodies[body_b_id].sweep.alpha0;
                    let alpha0 = alpha0_a.max(alpha0_b);
                    debug_assert!(alpha0 < 1.0);
                    if alpha0_a < alpha0 {
                        self.bodies[body_a_id].sweep.advance(alpha0);
                    } else if alpha0_b < alpha0 {
                        self.bodies[body_b_id].sweep.advance(alpha0);
                    }

                    // Compute the time of impact in interval [0, minTOI]
                    let output = {
                        let proxy_a =
                            DistanceProxy::new(&self.fixtures[fixture_a].shape, child_a);
                        let proxy_b =
                            DistanceProxy::new(&self.fixtures[fixture_b].shape, child_b);
                        time_of_impact(&ToiInput {
                            proxy_a: &proxy_a,
                            proxy_b: &proxy_b,
                            sweep_a: self.bodies[body_a_id].sweep,
                            sweep_b: self.bodies[body_b_id].sweep,
                            t_max: 1.0,
                        })
                    };

                    // Beta is the fraction of the remaining portion of the
                    // step.
                    let beta = output.t;
                    alpha = if output.state == ToiState::Touching {
                        (alpha0 + (1.0 - alpha0) * beta).min(1.0)
                    } else {
                        1.0
                    };

                    let contact = &mut self.contact_manager.contacts[contact_id];
                    contact.toi = alpha;
                    contact.flags |= ContactFlags::TOI;
                }

                if alpha < min_alpha {
                    // This is the minimum TOI found so far.
                    min_contact = Some(contact_id);
                    min_alpha = alpha;
                }
            }

            let min_contact = match min_contact {
                Some(id) if min_alpha < 1.0 - 10.0 * f32::EPSILON => id,
                _ => {
                    // No more TOI events. Done!
                    self.step_complete = true;
                    break;
                }
            };

            // Advance the bodies to the TOI.
            let (fixture_a, fixture_b) = {
                let c = &self.contact_manager.contacts[min_contact];
                (c.fixture_a, c.fixture_b)
            };
            let body_a_id = self.fixtures[fixture_a].body;
            let body_b_id = self.fixtures[fixture_b].body;

            let backup1 = self.bodies[body_a_id].sweep;
            let backup2 = self.bodies[body_b_id].sweep;

            self.bodies[body_a_id].advance(min_alpha);
            self.bodies[body_b_id].advance(min_alpha);

            // The TOI contact likely has some new contact points.
            self.contact_manager.contacts[min_contact].update(
                min_contact,
                &mut self.bodies,
                &self.fixtures,
                &mut self.contact_manager.contact_listener,
            );
            self.contact_manager.contacts[min_contact]
                .flags
                .remove(ContactFlags::TOI);
            self.contact_manager.contacts[min_contact].toi_count += 1;

            // Is the contact solid?
            if !self.contact_manager.contacts[min_contact].is_enabled()
                || !self.contact_manager.contacts[min_contact].is_touching()
            {
                // Restore the sweeps.
                self.contact_manager.contacts[min_contact].set_enabled(false);
                self.bodies[body_a_id].sweep = backup1;
                self.bodies[body_b_id].sweep = backup2;
                self.bodies[body_a_id].synchronize_transform();
                self.bodies[body_b_id].synchronize_transform();
                continue;
            }

            self.bodies[body_a_id].set_awake(true);
            self.bodies[body_b_id].set_awake(true);

            // Build the island.
            self.island.clear();
            {
                let b = &mut self.bodies[body_a_id];
                self.island.add_body(body_a_id, b);
                b.flags |= BodyFlags::ISLAND;
            }
            {
                let b = &mut self.bodies[body_b_id];
                self.island.add_body(body_b_id, b);
                b.flags |= BodyFlags::ISLAND;
            }
            self.island.add_contact(min_contact);
            self.contact_manager.contacts[min_contact].flags |= ContactFlags::ISLAND;

            // Get contacts on bodyA and bodyB.
            for seed in [body_a_id, body_b_id] {
                if self.bodies[seed].body_type != BodyType::Dynamic {
                    continue;
                }

                let mut edge = self.bodies[seed].contact_list;
                while let Some(end) = edge {
                    if self.island.bodies.len() == crate::common::MAX_TOI_CONTACTS
                        || self.island.contacts.len() == crate::common::MAX_TOI_CONTACTS
                    {
                        break;
                    }

                    let contact_id = end.contact;
                    let (next, other) = {
                        let c = &self.contact_manager.contacts[contact_id];
                        (c.edges[end.end].next, c.edges[end.end].other)
                    };
                    edge = next;

                    // Has this contact already been added to the island?
                    if self.contact_manager.contacts[contact_id]
                        .flags
                        .contains(ContactFlags::ISLAND)
                    {
                        continue;
                    }

                    // Only add static, kinematic, or bullet bodies.
                    if self.bodies[other].body_type == BodyType::Dynamic
                        && !self.bodies[seed].is_bullet()
                        && !self.bodies[other].is_bullet()
                    {
                        continue;
                    }

                    // Skip sensors.
                    let (sensor_a, sensor_b) = {
                        let c = &self.contact_manager.contacts[contact_id];
                        (
                            self.fixtures[c.fixture_a].is_sensor,
                            self.fixtures[c.fixture_b].is_sensor,
                        )
                    };
                    if sensor_a || sensor_b {
                        continue;
                    }

                    // Tentatively advance the body to the TOI.
                    let backup = self.bodies[other].sweep;
                    if !self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                        self.bodies[other].advance(min_alpha);
                    }

                    // Update the contact points.
                    self.contact_manager.contacts[contact_id].update(
                        contact_id,
                        &mut self.bodies,
                        &self.fixtures,
                        &mut self.contact_manager.contact_listener,
                    );

                    // Was the contact disabled by the user? Are there
                    // contact points?
                    if !self.contact_manager.contacts[contact_id].is_enabled()
                        || !self.contact_manager.contacts[contact_id].is_touching()
                    {
                        self.bodies[other].sweep = backup;
                        self.bodies[other].synchronize_transform();
                        continue;
                    }

                    // Add the contact to the island.
                    self.contact_manager.contacts[contact_id].flags |= ContactFlags::ISLAND;
                    self.island.add_contact(contact_id);

                    // Has the other body already been added to the island?
                    if self.bodies[other].flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    // Add the other body to the island.
                    let b = &mut self.bodies[other];
                    b.flags |= BodyFlags::ISLAND;
                    if b.body_type != BodyType::Static {
                        b.set_awake(true);
                    }
                    self.island.add_body(other, b);
                }
            }

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: if dt > 0.0 { 1.0 / dt } else { 0.0 },
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: 20,
                warm_starting: false,
            };

            let toi_index_a = self.bodies[body_a_id].island_index;
            let toi_index_b = self.bodies[body_b_id].island_index;
            let cm = &mut self.contact_manager;
            self.island.solve_toi(
                &sub_step,
                toi_index_a,
                toi_index_b,
                &mut self.bodies,
                &self.fixtures,
                &mut cm.contacts,
                &mut cm.contact_listener,
            );

            // Reset island flags and synchronize broad-phase proxies.
            for i in 0..self.island.bodies.len() {
                let body_id = self.island.bodies[i];
                self.bodies[body_id].flags.remove(BodyFlags::ISLAND);

                if self.bodies[body_id].body_type != BodyType::Dynamic {
                    continue;
                }

                self.synchronize_fixtures(body_id);

                // Invalidate all contact TOIs on this displaced body.
                let mut edge = self.bodies[body_id].contact_list;
                while let Some(end) = edge {
                    let contact = &mut self.contact_manager.contacts[end.contact];
                    contact
                        .flags
                        .remove(ContactFlags::TOI | ContactFlags::ISLAND);
                    edge = contact.edges[end.end].next;
                }
            }

            // Commit fixture proxy movements to the broad-phase so that
            // new contacts are created. Also, some contacts can be
            // destroyed.
            self.contact_manager
                .find_new_contacts(&mut self.bodies, &self.fixtures, &self.joints);

            if self.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    fn synchronize_fixtures(&mut self, id: BodyId) {
        let body = &self.bodies[id];
        let xf1 = body.sweep.get_transform(0.0);
        let xf2 = body.xf;
        let fixture_ids = body.fixtures.clone();
        for fid in fixture_ids {
            self.fixtures[fid].synchronize(&mut self.contact_manager.broad_phase, &xf1, &xf2);
        }
    }

    // Queries

    /// Query the world for all fixtures whose broad-phase AABB overlaps
    /// the provided AABB. Return false from the callback to terminate
    /// early.
    pub fn query_aabb<F: FnMut(FixtureId) -> bool>(&self, aabb: &Aabb, mut callback: F) {
        let broad_phase = &self.contact_manager.broad_phase;
        broad_phase.query(aabb, |proxy_id| {
            let proxy = broad_phase.get_user_data(proxy_id);
            callback(proxy.fixture)
        });
    }

    /// Ray-cast the world for all fixtures in the path of the ray. The
    /// callback controls continuation through its return value: -1 to
    /// ignore this fixture, 0 to terminate, the reported fraction to clip
    /// the ray to the hit, or 1 to continue unclipped.
    ///
    /// The ray-cast ignores shapes that contain the starting point.
    pub fn ray_cast<F: FnMut(FixtureId, Vec2, Vec2, f32) -> f32>(
        &self,
        point1: Vec2,
        point2: Vec2,
        mut callback: F,
    ) {
        let broad_phase = &self.contact_manager.broad_phase;
        let input = RayCastInput {
            p1: point1,
            p2: point2,
            max_fraction: 1.0,
        };
        broad_phase.ray_cast(&input, |sub_input, proxy_id| {
            let proxy = broad_phase.get_user_data(proxy_id);
            let fixture = &self.fixtures[proxy.fixture];
            let xf = self.bodies[fixture.body].transform();

            if let Some(output) = fixture.shape.ray_cast(sub_input, &xf, proxy.child_index) {
                let fraction = output.fraction;
                let point = (1.0 - fraction) * sub_input.p1 + fraction * sub_input.p2;
                return callback(proxy.fixture, point, output.normal, fraction);
            }

            sub_input.max_fraction
        });
    }

    /// Shift the world origin. Useful for large worlds where coordinates
    /// drift out of float precision. The body positions become relative to
    /// the new origin.
    pub fn shift_origin(&mut self, new_origin: Vec2) -> Result<(), WorldError> {
        if self.locked {
            warn!("shift_origin rejected: world is locked");
            return Err(WorldError::Locked("shift_origin"));
        }

        for (_, body) in self.bodies.iter_mut() {
            body.xf.p -= new_origin;
            body.sweep.c0 -= new_origin;
            body.sweep.c -= new_origin;
        }

        for (_, joint) in self.joints.iter_mut() {
            joint.shift_origin(new_origin);
        }

        self.contact_manager.broad_phase.shift_origin(new_origin);
        Ok(())
    }
}
