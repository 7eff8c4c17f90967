use crate::body::{Body, BodyId};
use crate::math::{Mat2x2, Rot, Vec2};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// Mouse joint definition. This requires a world target point, tuning
/// parameters, and the time step.
#[derive(Clone, Debug)]
pub struct MouseJointDef {
    /// A dummy body, typically the ground. It carries no constraint rows;
    /// it only gives the joint a second graph edge.
    pub body_a: BodyId,
    /// The body dragged toward the target.
    pub body_b: BodyId,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The initial world target point. This is assumed to coincide with
    /// the body anchor initially.
    pub target: Vec2,
    /// The maximum constraint force that can be exerted to move the
    /// candidate body. Usually you will express as some multiple of the
    /// weight (multiplier * mass * gravity).
    pub max_force: f32,
    /// The response speed.
    pub frequency_hz: f32,
    /// The damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: f32,
}

impl MouseJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            target: Vec2::ZERO,
            max_force: 0.0,
            frequency_hz: 5.0,
            damping_ratio: 0.7,
        }
    }
}

// p = attached point, m = mouse point
// C = p - m
// Cdot = v
//      = v + cross(w, r)
// J = [I r_skew]
// Identity used:
// w k % (rx i + ry j) = w * (-ry i + rx j)

/// A mouse joint is used to make a point on a body track a specified world
/// point. This a soft constraint with a maximum force. This allows the
/// constraint to stretch and without applying huge forces.
#[derive(Debug)]
pub struct MouseJoint {
    local_anchor_b: Vec2,
    target_a: Vec2,
    frequency_hz: f32,
    damping_ratio: f32,
    max_force: f32,

    // Solver shared
    impulse: Vec2,
    gamma: f32,
    beta: f32,

    // Solver temp
    index_b: usize,
    r_b: Vec2,
    local_center_b: Vec2,
    inv_mass_b: f32,
    inv_i_b: f32,
    mass: Mat2x2,
    c: Vec2,
}

impl MouseJoint {
    pub(crate) fn new(def: &MouseJointDef, bodies: &Pool<BodyId, Body>) -> Self {
        debug_assert!(def.target.is_valid());
        debug_assert!(def.max_force >= 0.0);
        debug_assert!(def.frequency_hz >= 0.0);
        debug_assert!(def.damping_ratio >= 0.0);

        Self {
            local_anchor_b: bodies[def.body_b].local_point(def.target),
            target_a: def.target,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            max_force: def.max_force,
            impulse: Vec2::ZERO,
            gamma: 0.0,
            beta: 0.0,
            index_b: 0,
            r_b: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_b: 0.0,
            inv_i_b: 0.0,
            mass: Mat2x2::ZERO,
            c: Vec2::ZERO,
        }
    }

    /// Update the target point. The attached body must be kept awake by
    /// the caller while dragging.
    pub fn set_target(&mut self, target: Vec2) {
        self.target_a = target;
    }

    pub fn target(&self) -> Vec2 {
        self.target_a
    }

    pub(crate) fn local_anchor_b(&self) -> Vec2 {
        self.local_anchor_b
    }

    pub fn set_max_force(&mut self, force: f32) {
        self.max_force = force;
    }

    pub fn max_force(&self) -> f32 {
        self.max_force
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * self.impulse
    }

    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        self.target_a -= new_origin;
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &Pool<BodyId, Body>,
        _body_a: BodyId,
        body_b: BodyId,
    ) {
        let b = &bodies[body_b];
        self.index_b = b.island_index;
        self.local_center_b = b.sweep.local_center;
        self.inv_mass_b = b.inv_mass;
        self.inv_i_b = b.inv_inertia;
        let mass = b.mass;

        let c_b = data.positions[self.index_b].c;
        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_b = Rot::new(a_b);

        // Frequency
        let omega = 2.0 * std::f32::consts::PI * self.frequency_hz;

        // Damping coefficient
        let d = 2.0 * mass * self.damping_ratio * omega;

        // Spring stiffness
        let k = mass * (omega * omega);

        // magic formulas
        // gamma has units of inverse mass.
        // beta has units of inverse time.
        let h = data.step.dt;
        self.gamma = h * (d + h * k);
        if self.gamma != 0.0 {
            self.gamma = 1.0 / self.gamma;
        }
        self.beta = h * k * self.gamma;

        // Compute the effective mass matrix.
        self.r_b = q_b * (self.local_anchor_b - self.local_center_b);

        // K    = [(1/m1 + 1/m2) * eye(2) - skew(r1) * invI1 * skew(r1) - skew(r2) * invI2 * skew(r2)]
        //      = [1/m1+1/m2     0    ] + invI1 * [r1.y*r1.y -r1.x*r1.y] + invI2 * [r1.y*r1.y -r1.x*r1.y]
        //        [    0     1/m1+1/m2]           [-r1.x*r1.y r1.x*r1.x]           [-r1.x*r1.y r1.x*r1.x]
        let k_mat = Mat2x2::from_cols(
            Vec2::new(
                self.inv_mass_b + self.inv_i_b * self.r_b.y * self.r_b.y + self.gamma,
                -self.inv_i_b * self.r_b.x * self.r_b.y,
            ),
            Vec2::new(
                -self.inv_i_b * self.r_b.x * self.r_b.y,
                self.inv_mass_b + self.inv_i_b * self.r_b.x * self.r_b.x + self.gamma,
            ),
        );

        self.mass = k_mat.invert();

        self.c = c_b + self.r_b - self.target_a;
        self.c *= self.beta;

        // Cheat with some damping
        w_b *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            v_b += self.inv_mass_b * self.impulse;
            w_b += self.inv_i_b * self.r_b.cross(self.impulse);
        } else {
            self.impulse = Vec2::ZERO;
        }

        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        // Cdot = v + cross(w, r)
        let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b);
        let mut impulse = self.mass * (-(cdot + self.c + self.gamma * self.impulse));

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.length_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.length();
        }
        impulse = self.impulse - old_impulse;

        v_b += self.inv_mass_b * impulse;
        w_b += self.inv_i_b * self.r_b.cross(impulse);

        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }
}
