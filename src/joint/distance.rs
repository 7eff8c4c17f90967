use crate::body::{Body, BodyId};
use crate::common::{LINEAR_SLOP, MAX_LINEAR_CORRECTION};
use crate::joint::soft_constraint_terms;
use crate::math::{Rot, Vec2};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// Distance joint definition. This requires defining an anchor point on
/// both bodies and the non-zero length of the distance joint. The
/// definition uses local anchor points so that the initial configuration
/// can violate the constraint slightly.
#[derive(Clone, Debug)]
pub struct DistanceJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The local anchor point relative to bodyA's origin.
    pub local_anchor_a: Vec2,
    /// The local anchor point relative to bodyB's origin.
    pub local_anchor_b: Vec2,
    /// The natural length between the anchor points. Must be larger than
    /// the linear slop or the constraint is numerically degenerate.
    pub length: f32,
    /// The mass-spring-damper frequency in Hertz. A value of 0 disables
    /// softness.
    pub frequency_hz: f32,
    /// The damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: f32,
}

impl DistanceJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            length: 1.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }

    /// Initialize the bodies, anchors, and rest length using world anchors.
    pub fn initialize(
        world: &crate::world::World,
        body_a: BodyId,
        body_b: BodyId,
        anchor_a: Vec2,
        anchor_b: Vec2,
    ) -> Self {
        let mut def = Self::new(body_a, body_b);
        def.local_anchor_a = world.body(body_a).local_point(anchor_a);
        def.local_anchor_b = world.body(body_b).local_point(anchor_b);
        def.length = Vec2::distance(anchor_a, anchor_b);
        def
    }
}

// 1-D constrained system
// m (v2 - v1) = lambda
// v2 + (beta/h) * C + gamma * lambda = 0, gamma has units of inverse mass.
// x2 = x1 + h * v2
//
// C = norm(p2 - p1) - L
// u = (p2 - p1) / norm(p2 - p1)
// Cdot = dot(u, v2 + cross(w2, r2) - v1 - cross(w1, r1))
// J = [-u -cross(r1, u) u cross(r2, u)]
// K = J * invM * JT
//   = invMass1 + invI1 * cross(r1, u)^2 + invMass2 + invI2 * cross(r2, u)^2

/// A distance joint constrains two points on two bodies to remain at a
/// fixed distance from each other. You can view this as a massless, rigid
/// rod. With a non-zero frequency the rod becomes a spring-damper.
#[derive(Debug)]
pub struct DistanceJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    length: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    // Solver shared
    impulse: f32,
    gamma: f32,
    bias: f32,

    // Solver temp
    index_a: usize,
    index_b: usize,
    u: Vec2,
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

impl DistanceJoint {
    pub(crate) fn new(def: &DistanceJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            length: def.length,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            impulse: 0.0,
            gamma: 0.0,
            bias: 0.0,
            index_a: 0,
            index_b: 0,
            u: Vec2::ZERO,
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

    pub fn length(&self) -> f32 {
        self.length
    }

    pub fn set_length(&mut self, length: f32) {
        self.length = length;
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    pub fn damping_ratio(&self) -> f32 {
        self.damping_ratio
    }

    pub fn set_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (inv_dt * self.impulse) * self.u
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
        self.u = c_b + self.r_b - c_a - self.r_a;

        // Handle singularity.
        let length = self.u.length();
        if length > LINEAR_SLOP {
            self.u *= 1.0 / length;
        } else {
            self.u = Vec2::ZERO;
        }

        let cr_a = self.r_a.cross(self.u);
        let cr_b = self.r_b.cross(self.u);
        let mut inv_mass = self.inv_mass_a
            + self.inv_i_a * cr_a * cr_a
            + self.inv_mass_b
            + self.inv_i_b * cr_b * cr_b;

        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = length - self.length;
            let (gamma, bias) = soft_constraint_terms(
                self.mass,
                self.frequency_hz,
                self.damping_ratio,
                c,
                data.step.dt,
            );
            self.gamma = gamma;
            self.bias = bias;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Scale the impulse to support a variable time step.
            self.impulse *= data.step.dt_ratio;

            let p = self.impulse * self.u;
            v_a -= self.inv_mass_a * p;
            w_a -= self.inv_i_a * self.r_a.cross(p);
            v_b += self.inv_mass_b * p;
            w_b += self.inv_i_b * self.r_b.cross(p);
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

        // Cdot = dot(u, v + cross(w, r))
        let vp_a = v_a + Vec2::scalar_cross(w_a, self.r_a);
        let vp_b = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let cdot = self.u.dot(vp_b - vp_a);

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = impulse * self.u;
        v_a -= self.inv_mass_a * p;
        w_a -= self.inv_i_a * self.r_a.cross(p);
        v_b += self.inv_mass_b * p;
        w_b += self.inv_i_b * self.r_b.cross(p);

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        if self.frequency_hz > 0.0 {
            // There is no position correction for soft distance constraints.
            return true;
        }

        let mut c_a = data.positions[self.index_a].c;
        let mut a_a = data.positions[self.index_a].a;
        let mut c_b = data.positions[self.index_b].c;
        let mut a_b = data.positions[self.index_b].a;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        let r_a = q_a * (self.local_anchor_a - self.local_center_a);
        let r_b = q_b * (self.local_anchor_b - self.local_center_b);
        let mut u = c_b + r_b - c_a - r_a;

        let length = u.length();
        u = u.normalize();
        let c = (length - self.length).clamp(-MAX_LINEAR_CORRECTION, MAX_LINEAR_CORRECTION);

        let impulse = -self.mass * c;
        let p = impulse * u;

        c_a -= self.inv_mass_a * p;
        a_a -= self.inv_i_a * r_a.cross(p);
        c_b += self.inv_mass_b * p;
        a_b += self.inv_i_b * r_b.cross(p);

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        c.abs() < LINEAR_SLOP
    }
}
