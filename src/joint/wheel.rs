use crate::body::{Body, BodyId};
use crate::common::LINEAR_SLOP;
use crate::math::{Rot, Vec2};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// Wheel joint definition. This requires defining a line of motion using
/// an axis and an anchor point. The definition uses local anchor points
/// and a local axis so that the initial configuration can violate the
/// constraint slightly. The joint translation is zero when the local
/// anchor points coincide in world space.
#[derive(Clone, Debug)]
pub struct WheelJointDef {
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub collide_connected: bool,
    pub user_data: u64,
    /// The local anchor point relative to bodyA's origin.
    pub local_anchor_a: Vec2,
    /// The local anchor point relative to bodyB's origin.
    pub local_anchor_b: Vec2,
    /// The local translation axis in bodyA.
    pub local_axis_a: Vec2,
    /// Enable/disable the joint motor.
    pub enable_motor: bool,
    /// The maximum motor torque, usually in N-m.
    pub max_motor_torque: f32,
    /// The desired motor speed in radians per second.
    pub motor_speed: f32,
    /// Suspension frequency, zero indicates no suspension.
    pub frequency_hz: f32,
    /// Suspension damping ratio, one indicates critical damping.
    pub damping_ratio: f32,
}

impl WheelJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            local_axis_a: Vec2::new(1.0, 0.0),
            enable_motor: false,
            max_motor_torque: 0.0,
            motor_speed: 0.0,
            frequency_hz: 2.0,
            damping_ratio: 0.7,
        }
    }

    /// Initialize the bodies, anchors, axis, and reference angle using a
    /// world anchor and a world axis.
    pub fn initialize(
        world: &crate::world::World,
        body_a: BodyId,
        body_b: BodyId,
        anchor: Vec2,
        axis: Vec2,
    ) -> Self {
        let mut def = Self::new(body_a, body_b);
        def.local_anchor_a = world.body(body_a).local_point(anchor);
        def.local_anchor_b = world.body(body_b).local_point(anchor);
        def.local_axis_a = world.body(body_a).local_vector(axis);
        def
    }
}

// Linear constraint (point-to-line)
// d = pB - pA = xB + rB - xA - rA
// C = dot(ay, d)
// Cdot = dot(d, cross(wA, ay)) + dot(ay, vB + cross(wB, rB) - vA - cross(wA, rA))
//      = -dot(ay, vA) - dot(cross(d + rA, ay), wA) + dot(ay, vB) + dot(cross(rB, ay), vB)
// J = [-ay, -cross(d + rA, ay), ay, cross(rB, ay)]
//
// Spring linear constraint
// C = dot(ax, d)
// Cdot = = -dot(ax, vA) - dot(cross(d + rA, ax), wA) + dot(ax, vB) + dot(cross(rB, ax), wB)
// J = [-ax -cross(d+rA, ax) ax cross(rB, ax)]
//
// Motor rotational constraint
// Cdot = wB - wA
// J = [0 0 -1 0 0 1]

/// A wheel joint. This joint provides two degrees of freedom: translation
/// along an axis fixed in bodyA and rotation in the plane. The suspension
/// spring acts along the axis; a motor drives the rotation. This joint is
/// designed for vehicle suspensions.
#[derive(Debug)]
pub struct WheelJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) local_axis_a: Vec2,
    local_y_axis_a: Vec2,

    enable_motor: bool,
    max_motor_torque: f32,
    motor_speed: f32,
    frequency_hz: f32,
    damping_ratio: f32,

    // Solver shared
    impulse: f32,
    motor_impulse: f32,
    spring_impulse: f32,

    // Solver temp
    index_a: usize,
    index_b: usize,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    ax: Vec2,
    ay: Vec2,
    s_ax: f32,
    s_bx: f32,
    s_ay: f32,
    s_by: f32,
    mass: f32,
    motor_mass: f32,
    spring_mass: f32,
    bias: f32,
    gamma: f32,
}

impl WheelJoint {
    pub(crate) fn new(def: &WheelJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            local_axis_a: def.local_axis_a,
            local_y_axis_a: Vec2::scalar_cross(1.0, def.local_axis_a),
            enable_motor: def.enable_motor,
            max_motor_torque: def.max_motor_torque,
            motor_speed: def.motor_speed,
            frequency_hz: def.frequency_hz,
            damping_ratio: def.damping_ratio,
            impulse: 0.0,
            motor_impulse: 0.0,
            spring_impulse: 0.0,
            index_a: 0,
            index_b: 0,
            local_center_a: Vec2::ZERO,
            local_center_b: Vec2::ZERO,
            inv_mass_a: 0.0,
            inv_mass_b: 0.0,
            inv_i_a: 0.0,
            inv_i_b: 0.0,
            ax: Vec2::ZERO,
            ay: Vec2::ZERO,
            s_ax: 0.0,
            s_bx: 0.0,
            s_ay: 0.0,
            s_by: 0.0,
            mass: 0.0,
            motor_mass: 0.0,
            spring_mass: 0.0,
            bias: 0.0,
            gamma: 0.0,
        }
    }

    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    pub fn motor_speed(&self) -> f32 {
        self.motor_speed
    }

    pub fn set_motor_speed(&mut self, speed: f32) {
        self.motor_speed = speed;
    }

    pub fn set_max_motor_torque(&mut self, torque: f32) {
        self.max_motor_torque = torque;
    }

    pub fn motor_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
    }

    pub fn spring_frequency(&self) -> f32 {
        self.frequency_hz
    }

    pub fn set_spring_frequency(&mut self, hz: f32) {
        self.frequency_hz = hz;
    }

    pub fn set_spring_damping_ratio(&mut self, ratio: f32) {
        self.damping_ratio = ratio;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        inv_dt * (self.impulse * self.ay + self.spring_impulse * self.ax)
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.motor_impulse
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

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

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

        // Compute the effective masses.
        let r_a = q_a * (self.local_anchor_a - self.local_center_a);
        let r_b = q_b * (self.local_anchor_b - self.local_center_b);
        let d = c_b + r_b - c_a - r_a;

        // Point to line constraint
        {
            self.ay = q_a * self.local_y_axis_a;
            self.s_ay = (d + r_a).cross(self.ay);
            self.s_by = r_b.cross(self.ay);

            self.mass =
                m_a + m_b + i_a * self.s_ay * self.s_ay + i_b * self.s_by * self.s_by;

            if self.mass > 0.0 {
                self.mass = 1.0 / self.mass;
            }
        }

        // Spring constraint
        self.spring_mass = 0.0;
        self.bias = 0.0;
        self.gamma = 0.0;
        if self.frequency_hz > 0.0 {
            self.ax = q_a * self.local_axis_a;
            self.s_ax = (d + r_a).cross(self.ax);
            self.s_bx = r_b.cross(self.ax);

            let inv_mass = m_a + m_b + i_a * self.s_ax * self.s_ax + i_b * self.s_bx * self.s_bx;

            if inv_mass > 0.0 {
                self.spring_mass = 1.0 / inv_mass;

                let c = d.dot(self.ax);

                // Frequency
                let omega = 2.0 * std::f32::consts::PI * self.frequency_hz;

                // Damping coefficient
                let damp = 2.0 * self.spring_mass * self.damping_ratio * omega;

                // Spring stiffness
                let k = self.spring_mass * omega * omega;

                // magic formulas
                let h = data.step.dt;
                self.gamma = h * (damp + h * k);
                if self.gamma > 0.0 {
                    self.gamma = 1.0 / self.gamma;
                }

                self.bias = c * h * k * self.gamma;

                self.spring_mass = inv_mass + self.gamma;
                if self.spring_mass > 0.0 {
                    self.spring_mass = 1.0 / self.spring_mass;
                }
            }
        } else {
            self.spring_impulse = 0.0;
        }

        // Rotational motor
        if self.enable_motor {
            self.motor_mass = i_a + i_b;
            if self.motor_mass > 0.0 {
                self.motor_mass = 1.0 / self.motor_mass;
            }
        } else {
            self.motor_mass = 0.0;
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            // Account for variable time step.
            self.impulse *= data.step.dt_ratio;
            self.spring_impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = self.impulse * self.ay + self.spring_impulse * self.ax;
            let l_a = self.impulse * self.s_ay + self.spring_impulse * self.s_ax + self.motor_impulse;
            let l_b = self.impulse * self.s_by + self.spring_impulse * self.s_bx + self.motor_impulse;

            v_a -= self.inv_mass_a * p;
            w_a -= self.inv_i_a * l_a;

            v_b += self.inv_mass_b * p;
            w_b += self.inv_i_b * l_b;
        } else {
            self.impulse = 0.0;
            self.spring_impulse = 0.0;
            self.motor_impulse = 0.0;
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        // Solve spring constraint
        {
            let cdot = self.ax.dot(v_b - v_a) + self.s_bx * w_b - self.s_ax * w_a;
            let impulse =
                -self.spring_mass * (cdot + self.bias + self.gamma * self.spring_impulse);
            self.spring_impulse += impulse;

            let p = impulse * self.ax;
            let l_a = impulse * self.s_ax;
            let l_b = impulse * self.s_bx;

            v_a -= m_a * p;
            w_a -= i_a * l_a;

            v_b += m_b * p;
            w_b += i_b * l_b;
        }

        // Solve rotational motor constraint
        {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;

            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve point to line constraint
        {
            let cdot = self.ay.dot(v_b - v_a) + self.s_by * w_b - self.s_ay * w_a;
            let impulse = -self.mass * cdot;
            self.impulse += impulse;

            let p = impulse * self.ay;
            let l_a = impulse * self.s_ay;
            let l_b = impulse * self.s_by;

            v_a -= m_a * p;
            w_a -= i_a * l_a;

            v_b += m_b * p;
            w_b += i_b * l_b;
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

        let r_a = q_a * (self.local_anchor_a - self.local_center_a);
        let r_b = q_b * (self.local_anchor_b - self.local_center_b);
        let d = (c_b - c_a) + r_b - r_a;

        let ay = q_a * self.local_y_axis_a;

        let s_ay = (d + r_a).cross(ay);
        let s_by = r_b.cross(ay);

        let c = d.dot(ay);

        let k = self.inv_mass_a
            + self.inv_mass_b
            + self.inv_i_a * s_ay * s_ay
            + self.inv_i_b * s_by * s_by;

        let impulse = if k != 0.0 { -c / k } else { 0.0 };

        let p = impulse * ay;
        let l_a = impulse * s_ay;
        let l_b = impulse * s_by;

        c_a -= self.inv_mass_a * p;
        a_a -= self.inv_i_a * l_a;
        c_b += self.inv_mass_b * p;
        a_b += self.inv_i_b * l_b;

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        c.abs() <= LINEAR_SLOP
    }
}
