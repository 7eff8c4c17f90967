use crate::body::{Body, BodyId};
use crate::common::LINEAR_SLOP;
use crate::math::{Rot, Vec2};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// The pulley supports a minimum length well above the slop so that the
/// constraint never reaches its singular configuration at zero length.
pub const MIN_PULLEY_LENGTH: f32 = 2.0;

/// Pulley joint definition. This requires two ground anchors, two dynamic
/// bodies, anchor points on those bodies, and a pulley ratio.
#[derive(Clone, Debug)]
pub struct PulleyJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The first ground anchor in world coordinates. This point never
    /// moves.
    pub ground_anchor_a: Vec2,
    /// The second ground anchor in world coordinates. This point never
    /// moves.
    pub ground_anchor_b: Vec2,
    /// The local anchor point relative to bodyA's origin.
    pub local_anchor_a: Vec2,
    /// The local anchor point relative to bodyB's origin.
    pub local_anchor_b: Vec2,
    /// The a reference length for the segment attached to bodyA.
    pub length_a: f32,
    /// The a reference length for the segment attached to bodyB.
    pub length_b: f32,
    /// The pulley ratio, used to simulate a block-and-tackle.
    pub ratio: f32,
}

impl PulleyJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: true,
            user_data: 0,
            ground_anchor_a: Vec2::new(-1.0, 1.0),
            ground_anchor_b: Vec2::new(1.0, 1.0),
            local_anchor_a: Vec2::new(-1.0, 0.0),
            local_anchor_b: Vec2::new(1.0, 0.0),
            length_a: 0.0,
            length_b: 0.0,
            ratio: 1.0,
        }
    }

    /// Initialize the bodies, anchors, lengths, max lengths, and ratio
    /// using the world anchors.
    pub fn initialize(
        world: &crate::world::World,
        body_a: BodyId,
        body_b: BodyId,
        ground_anchor_a: Vec2,
        ground_anchor_b: Vec2,
        anchor_a: Vec2,
        anchor_b: Vec2,
        ratio: f32,
    ) -> Self {
        debug_assert!(ratio > f32::EPSILON);
        let mut def = Self::new(body_a, body_b);
        def.ground_anchor_a = ground_anchor_a;
        def.ground_anchor_b = ground_anchor_b;
        def.local_anchor_a = world.body(body_a).local_point(anchor_a);
        def.local_anchor_b = world.body(body_b).local_point(anchor_b);
        def.length_a = Vec2::distance(anchor_a, ground_anchor_a);
        def.length_b = Vec2::distance(anchor_b, ground_anchor_b);
        def.ratio = ratio;
        def
    }
}

// Pulley:
// length1 = norm(p1 - s1)
// length2 = norm(p2 - s2)
// C0 = (length1 + ratio * length2)_initial
// C = C0 - (length1 + ratio * length2)
// u1 = (p1 - s1) / norm(p1 - s1)
// u2 = (p2 - s2) / norm(p2 - s2)
// Cdot = -dot(u1, v1 + cross(w1, r1)) - ratio * dot(u2, v2 + cross(w2, r2))
// J = -[u1 cross(r1, u1) ratio * u2  ratio * cross(r2, u2)]
// K = J * invM * JT
//   = invMass1 + invI1 * cross(r1, u1)^2 + ratio^2 * (invMass2 + invI2 * cross(r2, u2)^2)

/// The pulley joint is connected to two bodies and two fixed ground
/// points. The pulley supports a ratio such that:
/// length1 + ratio * length2 <= constant
/// Yes, the force transmitted is scaled by the ratio.
/// Warning: the pulley joint can get a bit squirrelly by itself. They
/// often work better when combined with prismatic joints. You should also
/// cover the anchor points with static shapes to prevent one side from
/// going to zero length.
#[derive(Debug)]
pub struct PulleyJoint {
    ground_anchor_a: Vec2,
    ground_anchor_b: Vec2,
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length_a: f32,
    length_b: f32,
    constant: f32,
    ratio: f32,

    // Solver shared
    impulse: f32,

    // Solver temp
    index_a: usize,
    index_b: usize,
    u_a: Vec2,
    u_b: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    mass: f32,
}

impl PulleyJoint {
    pub(crate) fn new(def: &PulleyJointDef) -> Self {
        debug_assert!(def.ratio != 0.0);
        Self {
            ground_anchor_a: def.ground_anchor_a,
            ground_anchor_b: def.ground_anchor_b,
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length_a: def.length_a,
            length_b: def.length_b,
            constant: def.length_a + def.ratio * def.length_b,
            ratio: def.ratio,
            impulse: 0.0,
            index_a: 0,
            index_b: 0,
            u_a: Vec2::ZERO,
            u_b: Vec2::ZERO,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            mass: 0.0,
        }
    }

    pub fn ground_anchor_a(&self) -> Vec2 {
        self.ground_anchor_a
    }

    pub fn ground_anchor_b(&self) -> Vec2 {
        self.ground_anchor_b
    }

    pub fn length_a(&self) -> f32 {
        self.length_a
    }

    pub fn length_b(&self) -> f32 {
        self.length_b
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (inv_dt * self.impulse) * self.u_b
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.ground_anchor_a -= new_origin;
        self.ground_anchor_b -= new_origin;
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &Pool<BodyId, Body>,
        body_a: BodyId,
        body_b: BodyId,
    ) {
        let a = &bodies[body_a];
        let b = &bodies[body_b];
        self.index_a = a.island_index;
        self.index_b = b.island_index;
        self.local_center_a = a.sweep.local_center;
        self.local_center_b = b.sweep.local_center;
        self.inv_mass_a = a.inv_mass;
        self.inv_mass_b = b.inv_mass;
        self.inv_i_a = a.inv_inertia;
        self.inv_i_b = b.inv_inertia;

        let c_a = data.positions[self.index_a].c;
        let a_a = data.positions[self.index_a].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;

        let c_b = data.positions[self.index_b].c;
        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        self.r_a = q_a * (self.local_anchor_a - self.local_center_a);
        self.r_b = q_b * (self.local_anchor_b - self.local_center_b);

        // Get the pulley axes.
        self.u_a = c_a + self.r_a - self.ground_anchor_a;
        self.u_b = c_b + self.r_b - self.ground_anchor_b;

        let length_a = self.u_a.length();
        let length_b = self.u_b.length();

        // A segment at its singular length contributes no constraint this
        // step.
        if length_a > 10.0 * LINEAR_SLOP {
            self.u_a *= 1.0 / length_a;
        } else {
            self.u_a = Vec2::ZERO;
        }

        if length_b > 10.0 * LINEAR_SLOP {
            self.u_b *= 1.0 / length_b;
        } else {
            self.u_b = Vec2::ZERO;
        }

        // Compute effective mass.
        let ru_a = self.r_a.cross(self.u_a);
        let ru_b = self.r_b.cross(self.u_b);

        let m_a = self.inv_mass_a + self.inv_i_a * ru_a * ru_a;
        let m_b = self.inv_mass_b + self.inv_i_b * ru_b * ru_b;

        self.mass = m_a + self.ratio * self.ratio * m_b;

        if self.mass > 0.0 {
            self.mass = 1.0 / self.mass;
        }

        if data.step.warm_starting {
            // Scale impulses to support variable time steps.
            self.impulse *= data.step.dt_ratio;

            // Warm starting.
            let p_a = -self.impulse * self.u_a;
            let p_b = (-self.ratio * self.impulse) * self.u_b;

            v_a += self.inv_mass_a * p_a;
            w_a += self.inv_i_a * self.r_a.cross(p_a);
            v_b += self.inv_mass_b * p_b;
            w_b += self.inv_i_b * self.r_b.cross(p_b);
        } else {
            self.impulse = 0.0;
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);

        let cdot = -self.u_a.dot(vp_a) - self.ratio * self.u_b.dot(vp_b);
        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        let p_a = -impulse * self.u_a;
        let p_b = -self.ratio * impulse * self.u_b;
        v_a += self.inv_mass_a * p_a;
        w_a += self.inv_i_a * self.r_a.cross(p_a);
        v_b += self.inv_mass_b * p_b;
        w_b += self.inv_i_b * self.r_b.cross(p_b);

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut c_a = data.positions[self.index_a].c;
        let mut a_a = data.positions[self.index_a].a;
        let mut c_b = data.positions[self.index_b].c;
        let mut a_b = data.positions[self.index_b].a;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let r_a = q_a * (self.local_anchor_a - self.local_center_a);
        let r_b = q_b * (self.local_anchor_b - self.local_center_b);

        // Get the pulley axes.
        let mut u_a = c_a + r_a - self.ground_anchor_a;
        let mut u_b = c_b + r_b - self.ground_anchor_b;

        let length_a = u_a.length();
        let length_b = u_b.length();

        if length_a > 10.0 * LINEAR_SLOP {
            u_a *= 1.0 / length_a;
        } else {
            u_a = Vec2::ZERO;
        }

        if length_b > 10.0 * LINEAR_SLOP {
            u_b *= 1.0 / length_b;
        } else {
            u_b = Vec2::ZERO;
        }

        // Compute effective mass.
        let ru_a = r_a.cross(u_a);
        let ru_b = r_b.cross(u_b);

        let m_a = self.inv_mass_a + self.inv_i_a * ru_a * ru_a;
        let m_b = self.inv_mass_b + self.inv_i_b * ru_b * ru_b;

        let mut mass = m_a + self.ratio * self.ratio * m_b;

        if mass > 0.0 {
            mass = 1.0 / mass;
        }

        let c = self.constant - length_a - self.ratio * length_b;
        let linear_error = c.abs();

        let impulse = -mass * c;

        let p_a = -impulse * u_a;
        let p_b = -self.ratio * impulse * u_b;

        c_a += self.inv_mass_a * p_a;
        a_a += self.inv_i_a * r_a.cross(p_a);
        c_b += self.inv_mass_b * p_b;
        a_b += self.inv_i_b * r_b.cross(p_b);

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        linear_error < LINEAR_SLOP
    }
}
