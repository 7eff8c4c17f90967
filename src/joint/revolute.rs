use crate::body::{Body, BodyId};
use crate::common::{ANGULAR_SLOP, LINEAR_SLOP, MAX_ANGULAR_CORRECTION};
use crate::joint::LimitState;
use crate::math::{Mat2x2, Mat3x3, Rot, Vec2, Vec3};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// Revolute joint definition. This requires defining an anchor point where
/// the bodies are joined. The definition uses local anchor points so that
/// the initial configuration can violate the constraint slightly. You also
/// need to specify the initial relative angle for joint limits. This helps
/// when saving and loading a game.
/// The local anchor points are measured from the body's origin rather than
/// the center of mass because:
/// 1. you might not know where the center of mass will be.
/// 2. if you add/remove shapes from a body and recompute the mass, the
///    joints will be broken.
#[derive(Clone, Debug)]
pub struct RevoluteJointDef {
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
    /// A flag to enable joint limits.
    pub enable_limit: bool,
    /// The lower angle for the joint limit (radians).
    pub lower_angle: f32,
    /// The upper angle for the joint limit (radians).
    pub upper_angle: f32,
    /// A flag to enable the joint motor.
    pub enable_motor: bool,
    /// The desired motor speed. Usually in radians per second.
    pub motor_speed: f32,
    /// The maximum motor torque used to achieve the desired motor speed.
    /// Usually in N-m.
    pub max_motor_torque: f32,
}

impl RevoluteJointDef {
    pub fn new(body_a: BodyId, body_b: BodyId) -> Self {
        Self {
            body_a,
            body_b,
            collide_connected: false,
            user_data: 0,
            local_anchor_a: Vec2::ZERO,
            local_anchor_b: Vec2::ZERO,
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
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
// Identity used:
// w k % (rx i + ry j) = w * (-ry i + rx j)
//
// Motor constraint
// Cdot = w2 - w1
// J = [0 0 -1 0 0 1]
// K = invI1 + invI2

/// A revolute joint constrains two bodies to share a common point while
/// they are free to rotate about the point. The relative rotation about
/// the shared point is the joint angle. You can limit the relative
/// rotation with a joint limit that specifies a lower and upper angle.
/// You can use a motor to drive the relative rotation about the shared
/// point. A maximum motor torque is provided so that infinite forces are
/// not generated.
#[derive(Debug)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    pub(crate) reference_angle: f32,

    enable_limit: bool,
    lower_angle: f32,
    upper_angle: f32,
    enable_motor: bool,
    motor_speed: f32,
    max_motor_torque: f32,

    // Solver shared
    impulse: Vec3,
    motor_impulse: f32,

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
    /// effective mass for point-to-point constraint.
    mass: Mat3x3,
    /// effective mass for motor/limit angular constraint.
    motor_mass: f32,
    limit_state: LimitState,
}

impl RevoluteJoint {
    pub(crate) fn new(def: &RevoluteJointDef) -> Self {
        Self {
            local_anchor_a: def.local_anchor_a,
            local_anchor_b: def.local_anchor_b,
            reference_angle: def.reference_angle,
            enable_limit: def.enable_limit,
            lower_angle: def.lower_angle,
            upper_angle: def.upper_angle,
            enable_motor: def.enable_motor,
            motor_speed: def.motor_speed,
            max_motor_torque: def.max_motor_torque,
            impulse: Vec3::ZERO,
            motor_impulse: 0.0,
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
            motor_mass: 0.0,
            limit_state: LimitState::Inactive,
        }
    }

    /// The current joint angle in radians, from body A to body B.
    pub fn joint_angle(&self, bodies: &Pool<BodyId, Body>, body_a: BodyId, body_b: BodyId) -> f32 {
        bodies[body_b].sweep.a - bodies[body_a].sweep.a - self.reference_angle
    }

    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.impulse.z = 0.0;
        }
    }

    pub fn limits(&self) -> (f32, f32) {
        (self.lower_angle, self.upper_angle)
    }

    pub fn set_limits(&mut self, lower: f32, upper: f32) {
        debug_assert!(lower <= upper);
        if lower != self.lower_angle || upper != self.upper_angle {
            self.impulse.z = 0.0;
            self.lower_angle = lower;
            self.upper_angle = upper;
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
        // r_skew = [-ry; rx]
        //
        // K = [ mA+mB+iA*ra.y^2+iB*rb.y^2,  -iA*ra.x*ra.y-iB*rb.x*rb.y, -iA*ra.y-iB*rb.y ]
        //     [  ...,                        mA+mB+iA*ra.x^2+iB*rb.x^2,  iA*ra.x+iB*rb.x ]
        //     [  ...,                        ...,                        iA+iB ]

        let m_a = self.inv_mass_a;
        let m_b = self.inv_mass_b;
        let i_a = self.inv_i_a;
        let i_b = self.inv_i_b;

        let fixed_rotation = i_a + i_b == 0.0;

        self.mass = Mat3x3::from_cols(
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

        self.motor_mass = i_a + i_b;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit && !fixed_rotation {
            let joint_angle = a_b - a_a - self.reference_angle;
            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.impulse = data.step.dt_ratio * self.impulse;
            self.motor_impulse *= data.step.dt_ratio;

            let p = Vec2::new(self.impulse.x, self.impulse.y);

            v_a -= m_a * p;
            w_a -= i_a * (self.r_a.cross(p) + self.motor_impulse + self.impulse.z);

            v_b += m_b * p;
            w_b += i_b * (self.r_b.cross(p) + self.motor_impulse + self.impulse.z);
        } else {
            self.impulse = Vec3::ZERO;
            self.motor_impulse = 0.0;
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

        let fixed_rotation = i_a + i_b == 0.0;

        // Solve motor constraint.
        if self.enable_motor && self.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (self.motor_impulse + impulse).clamp(-max_impulse, max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vec3::new(cdot1.x, cdot1.y, cdot2);

            let mut impulse = -self.mass.solve33(cdot);

            match self.limit_state {
                LimitState::Equal => {
                    self.impulse = self.impulse + impulse;
                }
                LimitState::AtLower => {
                    let new_impulse = self.impulse.z + impulse.z;
                    if new_impulse < 0.0 {
                        let rhs = -cdot1
                            + self.impulse.z * Vec2::new(self.mass.col3.x, self.mass.col3.y);
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse = self.impulse + impulse;
                    }
                }
                LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    if new_impulse > 0.0 {
                        let rhs = -cdot1
                            + self.impulse.z * Vec2::new(self.mass.col3.x, self.mass.col3.y);
                        let reduced = self.mass.solve22(rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse = self.impulse + impulse;
                    }
                }
                LimitState::Inactive => unreachable!(),
            }

            let p = Vec2::new(impulse.x, impulse.y);

            v_a -= m_a * p;
            w_a -= i_a * (self.r_a.cross(p) + impulse.z);

            v_b += m_b * p;
            w_b += i_b * (self.r_b.cross(p) + impulse.z);
        } else {
            // Solve point-to-point constraint
            let cdot = v_b + Vec2::scalar_cross(w_b, self.r_b)
                - v_a
                - Vec2::scalar_cross(w_a, self.r_a);
            let impulse = self.mass.solve22(-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

            v_a -= m_a * impulse;
            w_a -= i_a * self.r_a.cross(impulse);

            v_b += m_b * impulse;
            w_b += i_b * self.r_b.cross(impulse);
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

        let mut angular_error = 0.0;
        let position_error;

        let fixed_rotation = self.inv_i_a + self.inv_i_b == 0.0;

        // Solve angular limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let angle = a_b - a_a - self.reference_angle;
            let mut limit_impulse = 0.0;

            match self.limit_state {
                LimitState::Equal => {
                    // Prevent large angular corrections
                    let c = (angle - self.lower_angle)
                        .clamp(-MAX_ANGULAR_CORRECTION, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                    angular_error = c.abs();
                }
                LimitState::AtLower => {
                    let mut c = angle - self.lower_angle;
                    angular_error = -c;

                    // Prevent large angular corrections and allow some slop.
                    c = (c + ANGULAR_SLOP).clamp(-MAX_ANGULAR_CORRECTION, 0.0);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::AtUpper => {
                    let mut c = angle - self.upper_angle;
                    angular_error = c;

                    // Prevent large angular corrections and allow some slop.
                    c = (c - ANGULAR_SLOP).clamp(0.0, MAX_ANGULAR_CORRECTION);
                    limit_impulse = -self.motor_mass * c;
                }
                LimitState::Inactive => {}
            }

            a_a -= self.inv_i_a * limit_impulse;
            a_b += self.inv_i_b * limit_impulse;
        }

        // Solve point-to-point constraint.
        {
            let q_a = Rot::new(a_a);
            let q_b = Rot::new(a_b);
            let r_a = q_a * (self.local_anchor_a - self.local_center_a);
            let r_b = q_b * (self.local_anchor_b - self.local_center_b);

            let c = c_b + r_b - c_a - r_a;
            position_error = c.length();

            let m_a = self.inv_mass_a;
            let m_b = self.inv_mass_b;
            let i_a = self.inv_i_a;
            let i_b = self.inv_i_b;

            let k = Mat2x2::from_cols(
                Vec2::new(
                    m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
                    -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                ),
                Vec2::new(
                    -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y,
                    m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
                ),
            );

            let impulse = -k.solve(c);

            c_a -= m_a * impulse;
            a_a -= i_a * r_a.cross(impulse);

            c_b += m_b * impulse;
            a_b += i_b * r_b.cross(impulse);
        }

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }
}
