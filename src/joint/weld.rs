use crate::body::{Body, BodyId};
use crate::common::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::joint::soft_constraint_terms;
use crate::math::{Mat2x2, Mat3x3, Rot, Vec2, Vec3};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// Weld joint definition. You need to specify local anchor points where
/// they are attached and the relative body angle. The position of the
/// anchor points is important for computing the reaction torque.
#[derive(Clone, Debug)]
pub struct WeldJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The local anchor point relative to bodyA's origin.
    pub local_anchor_a: Vec2,
    /// The local anchor point relative to bodyB's origin.
    pub local_anchor_b: Vec2,
    /// The bodyB angle minus bodyA angle in the reference state (radians).
    pub reference_angle: f32,
    /// The mass-spring-damper frequency in Hertz. Rotation only. Disable
    /// softness with a value of 0.
    pub frequency_hz: f32,
    /// The damping ratio. 0 = no damping, 1 = critical damping.
    pub damping_ratio: f32,
}

impl WeldJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
        }
    }

    /// Initialize the bodies, anchors, and reference angle using a world
    /// anchor point.
    pub fn initialize(
        world: &crate::world::World,
        body_a: BodyId,
        body_b: BodyId,
        anchor: Vec2,
    ) -> Self {
        let mut def = Self::new(body_a, body_b);
        def.local_anchor_a = world.body(body_a).local_point(anchor);
        def.local_anchor_b = world.body(body_b).local_point(anchor);
        def.reference_angle = world.body(body_b).angle() - world.body(body_a).angle();
        def
    }
}

// Point-to-point constraint
// C = p2 - p1
// Cdot = v2 - v1
//      = v2 + cross(w2, r2) - v1 - cross(w1, r1)
// J = [-I -r1_skew I r2_skew ]
//
// Angle constraint
// C = angle2 - angle1 - referenceAngle
// Cdot = w2 - w1
// J = [0 0 -1 0 0 1]

/// A weld joint essentially glues two bodies together. A weld joint may
/// distort somewhat because the island constraint solver is approximate;
/// it is not a substitute for attaching several fixtures to one body.
#[derive(Debug)]
pub struct WeldJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    // Solver shared
    impulse: Vec3,
    gamma: f32,
    bias: f32,

    // Solver temp
    index_a: usize,
    index_b: usize,
    r_a: Vec2,
    r_b: Vec2,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    mass: Mat3x3,
}

impl WeldJoint {
    pub(crate) fn new(def: &WeldJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            impulse: Vec3::ZERO,
            gamma: 0.0,
            bias: 0.0,
            index_a: 0,
            index_b: 0,
            r_a: Vec2::ZERO,
            r_b: Vec2::ZERO,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            mass: Mat3x3::ZERO,
        }
    }

    pub fn frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn set_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    pub fn set_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * Vec2::new(self.impulse.x, self.impulse.y)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse.z
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

        let a_a = data.positions[self.index_a].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;

        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);

        self.r_a = q_a * (self.local_anchor_a - self.local_center_a);
        self.r_b = q_b * (self.local_anchor_b - self.local_center_b);

        // J = [-I -r1_skew I r2_skew ]
        //     [ 0       -1 0       1 ]
        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        let k = Mat3x3::from_cols(
            Vec3::new(
                m_a + m_b + self.r_a.y * self.r_a.y * i_a + self.r_b.y * self.r_b.y * i_b,
                -self.r_a.y * self.r_a.x * i_a - self.r_b.y * self.r_b.x * i_b,
                -self.r_a.y * i_a - self.r_b.y * i_b,
            ),
            Vec3::new(
                -self.r_a.y * self.r_a.x * i_a - self.r_b.y * self.r_b.x * i_b,
                m_a + m_b + self.r_a.x * self.r_a.x * i_a + self.r_b.x * self.r_b.x * i_b,
                self.r_a.x * i_a + self.r_b.x * i_b,
            ),
            Vec3::new(
                -self.r_a.y * i_a - self.r_b.y * i_b,
                self.r_a.x * i_a + self.r_b.x * i_b,
                i_a + i_b,
            ),
        );

        if self.frequency_hz > 0.0 {
            self.mass = k.get_inverse22();

            let inv_i = i_a + i_b;
            let m = if inv_i > 0.0 { 1.0 / inv_i } else { 0.0 };

            let c = a_b - a_a - self.reference_angle;
            let (gamma, bias) =
                soft_constraint_terms(m, self.frequency_hz, self.damping_ratio, c, data.step.dt);
            self.gamma = gamma;
            self.bias = bias;

            let inv_i = inv_i + self.gamma;
            self.mass.col3.z = if inv_i != 0.0 { 1.0 / inv_i } else { 0.0 };
        } else if k.col3.z == 0.0 {
            self.mass = k.get_inverse22();
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = k.get_sym_inverse33();
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.impulse = data.step.dt_ratio * self.impulse;

            let p = Vec2::new(self.impulse.x, self.impulse.y);

            v_a -= m_a * p;
            w_a -= i_a * (self.r_a.cross(p) + self.impulse.z);

            v_b += m_b * p;
            w_b += i_b * (self.r_b.cross(p) + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
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

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        if self.frequency_hz > 0.0 {
            let cdot2 = w_b - w_a;

            let impulse2 = -self.mass.col3.z * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            let cdot1 = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);

            let mass22 = Mat2x2::from_cols(
                Vec2::new(self.mass.col1.x, self.mass.col1.y),
                Vec2::new(self.mass.col2.x, self.mass.col2.y),
            );
            let impulse1 = -(mass22 * cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            let p = impulse1;

            v_a -= m_a * p;
            w_a -= i_a * self.r_a.cross(p);

            v_b += m_b * p;
            w_b += i_b * self.r_b.cross(p);
        } else {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -(self.mass * cdot);
            self.impulse = self.impulse + impulse;

            let p = Vec2::new(impulse.x, impulse.y);

            v_a -= m_a * p;
            w_a -= i_a * (self.r_a.cross(p) + impulse.z);

            v_b += m_b * p;
            w_b += i_b * (self.r_b.cross(p) + impulse.z);
        }

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

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        let r_a = q_a * (self.local_anchor_a - self.local_center_a);
        let r_b = q_b * (self.local_anchor_b - self.local_center_b);

        let position_error;
        let angular_error;

        let k = Mat3x3::from_cols(
            Vec3::new(
                m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b,
                -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
                -r_a.y * i_a - r_b.y * i_b,
            ),
            Vec3::new(
                -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b,
                m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b,
                r_a.x * i_a + r_b.x * i_b,
            ),
            Vec3::new(
                -r_a.y * i_a - r_b.y * i_b,
                r_a.x * i_a + r_b.x * i_b,
                i_a + i_b,
            ),
        );

        if self.frequency_hz > 0.0 {
            let c1 = c_b + r_b - c_a - r_a;

            position_error = c1.length();
            angular_error = 0.0;

            let p = -k.solve22(c1);

            c_a -= m_a * p;
            a_a -= i_a * r_a.cross(p);

            c_b += m_b * p;
            a_b += i_b * r_b.cross(p);
        } else {
            let c1 = c_b + r_b - c_a - r_a;
            let c2 = a_b - a_a - self.reference_angle;

            position_error = c1.length();
            angular_error = c2.abs();

            let c = Vec3::new(c1.x, c1.y, c2);

            let impulse = if k.col3.z > 0.0 {
                -k.solve33(c)
            } else {
                let impulse2 = -k.solve22(c1);
                Vec3::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vec2::new(impulse.x, impulse.y);

            c_a -= m_a * p;
            a_a -= i_a * (r_a.cross(p) + impulse.z);

            c_b += m_b * p;
            a_b += i_b * (r_b.cross(p) + impulse.z);
        }

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
