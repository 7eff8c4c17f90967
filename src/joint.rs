use crate::body::{Body, BodyId};
use crate::math::Vec2;
use crate::pool::{Pool, PoolKey};
use crate::time_step::SolverData;

pub mod distance;
pub mod friction;
pub mod gear;
pub mod motor;
pub mod mouse;
pub mod prismatic;
pub mod pulley;
pub mod revolute;
pub mod rope;
pub mod weld;
pub mod wheel;

pub use distance::{DistanceJoint, DistanceJointDef};
pub use friction::{FrictionJoint, FrictionJointDef};
pub use gear::{GearJoint, GearJointDef};
pub use motor::{MotorJoint, MotorJointDef};
pub use mouse::{MouseJoint, MouseJointDef};
pub use prismatic::{PrismaticJoint, PrismaticJointDef};
pub use pulley::{PulleyJoint, PulleyJointDef};
pub use revolute::{RevoluteJoint, RevoluteJointDef};
pub use rope::{RopeJoint, RopeJointDef};
pub use weld::{WeldJoint, WeldJointDef};
pub use wheel::{WheelJoint, WheelJointDef};

/// A handle to a joint stored in the world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JointId(pub(crate) u32);

impl PoolKey for JointId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        JointId(index as u32)
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum JointType {
    Distance,
    Revolute,
    Prismatic,
    Pulley,
    Gear,
    Mouse,
    Wheel,
    Weld,
    Friction,
    Rope,
    Motor,
}

/// Limit and inequality constraints track which side, if any, is active.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) enum LimitState {
    Inactive,
    AtLower,
    AtUpper,
    Equal,
}

/// Identifies one end (A or B) of a joint's edge pair.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JointEnd {
    pub joint: JointId,
    /// 0 = the edge stored for body A, 1 = the edge stored for body B.
    pub end: usize,
}

/// A joint edge is used to connect bodies and joints together
/// in a joint graph where each body is a node and each joint
/// is an edge. A joint edge belongs to a doubly linked list
/// maintained in each attached body. Each joint has two joint
/// edges, one for each attached body.
#[derive(Copy, Clone, Debug)]
pub struct JointEdge {
    /// Provides quick access to the other body attached.
    pub other: BodyId,
    pub prev: Option<JointEnd>,
    pub next: Option<JointEnd>,
}

/// Joint definitions are used to construct joints. The per-kind defs carry
/// the shared base fields (bodies, `collide_connected`, user data) inline.
#[derive(Clone, Debug)]
pub enum JointDef {
    Distance(DistanceJointDef),
    Revolute(RevoluteJointDef),
    Prismatic(PrismaticJointDef),
    Pulley(PulleyJointDef),
    Gear(GearJointDef),
    Mouse(MouseJointDef),
    Wheel(WheelJointDef),
    Weld(WeldJointDef),
    Friction(FrictionJointDef),
    Rope(RopeJointDef),
    Motor(MotorJointDef),
}

/// The per-kind constraint data and solver state.
#[derive(Debug)]
pub enum JointKind {
    Distance(DistanceJoint),
    Revolute(RevoluteJoint),
    Prismatic(PrismaticJoint),
    Pulley(PulleyJoint),
    Gear(GearJoint),
    Mouse(MouseJoint),
    Wheel(WheelJoint),
    Weld(WeldJoint),
    Friction(FrictionJoint),
    Rope(RopeJoint),
    Motor(MotorJoint),
}

/// The base joint: two bodies, the constraint graph edges, and the
/// kind-specific solver state. Joints are created through
/// `World::create_joint` and destroyed with `World::destroy_joint` or by
/// destroying an attached body.
#[derive(Debug)]
pub struct Joint {
    pub(crate) kind: JointKind,
    pub(crate) body_a: BodyId,
    pub(crate) body_b: BodyId,
    pub(crate) edges: [JointEdge; 2],
    pub(crate) island_flag: bool,
    pub(crate) collide_connected: bool,
    pub user_data: u64,
}

impl Joint {
    pub(crate) fn new(
        kind: JointKind,
        body_a: BodyId,
        body_b: BodyId,
        collide_connected: bool,
        user_data: u64,
    ) -> Self {
        Self {
            kind,
            body_a,
            body_b,
            edges: [
                JointEdge {
                    other: body_b,
                    prev: None,
                    next: None,
                },
                JointEdge {
                    other: body_a,
                    prev: None,
                    next: None,
                },
            ],
            island_flag: false,
            collide_connected,
            user_data,
        }
    }

    pub fn joint_type(&self) -> JointType {
        match &self.kind {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Pulley(_) => JointType::Pulley,
            JointKind::Gear(_) => JointType::Gear,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Wheel(_) => JointType::Wheel,
            JointKind::Weld(_) => JointType::Weld,
            JointKind::Friction(_) => JointType::Friction,
            JointKind::Rope(_) => JointType::Rope,
            JointKind::Motor(_) => JointType::Motor,
        }
    }

    pub fn body_a(&self) -> BodyId {
        self.body_a
    }

    pub fn body_b(&self) -> BodyId {
        self.body_b
    }

    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// The kind-specific data, for reading per-kind parameters.
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// The kind-specific data, for tuning motors, limits, and targets.
    /// Parameter changes do not wake the attached bodies; wake them with
    /// `Body::set_awake` if the change must take effect on a sleeping
    /// island.
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    pub(crate) fn init_velocity_constraints(
        &mut self,
        data: &mut SolverData,
        bodies: &Pool<BodyId, Body>,
    ) {
        let (a, b) = (self.body_a, self.body_b);
        match &mut self.kind {
            JointKind::Distance(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Revolute(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Prismatic(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Pulley(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Gear(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Mouse(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Wheel(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Weld(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Friction(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Rope(j) => j.init_velocity_constraints(data, bodies, a, b),
            JointKind::Motor(j) => j.init_velocity_constraints(data, bodies, a, b),
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_velocity_constraints(data),
            JointKind::Revolute(j) => j.solve_velocity_constraints(data),
            JointKind::Prismatic(j) => j.solve_velocity_constraints(data),
            JointKind::Pulley(j) => j.solve_velocity_constraints(data),
            JointKind::Gear(j) => j.solve_velocity_constraints(data),
            JointKind::Mouse(j) => j.solve_velocity_constraints(data),
            JointKind::Wheel(j) => j.solve_velocity_constraints(data),
            JointKind::Weld(j) => j.solve_velocity_constraints(data),
            JointKind::Friction(j) => j.solve_velocity_constraints(data),
            JointKind::Rope(j) => j.solve_velocity_constraints(data),
            JointKind::Motor(j) => j.solve_velocity_constraints(data),
        }
    }

    /// Returns true if the position errors are within tolerance.
    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        match &mut self.kind {
            JointKind::Distance(j) => j.solve_position_constraints(data),
            JointKind::Revolute(j) => j.solve_position_constraints(data),
            JointKind::Prismatic(j) => j.solve_position_constraints(data),
            JointKind::Pulley(j) => j.solve_position_constraints(data),
            JointKind::Gear(j) => j.solve_position_constraints(data),
            JointKind::Mouse(_) => true,
            JointKind::Wheel(j) => j.solve_position_constraints(data),
            JointKind::Weld(j) => j.solve_position_constraints(data),
            JointKind::Friction(_) => true,
            JointKind::Rope(j) => j.solve_position_constraints(data),
            JointKind::Motor(_) => true,
        }
    }

    /// The world anchor point on body A.
    pub(crate) fn anchor_a(&self, bodies: &Pool<BodyId, Body>) -> Vec2 {
        let body = &bodies[self.body_a];
        match &self.kind {
            JointKind::Distance(j) => body.world_point(j.local_anchor_a),
            JointKind::Revolute(j) => body.world_point(j.local_anchor_a),
            JointKind::Prismatic(j) => body.world_point(j.local_anchor_a),
            JointKind::Pulley(j) => body.world_point(j.local_anchor_a),
            JointKind::Gear(j) => body.world_point(j.local_anchor_a),
            JointKind::Mouse(j) => j.target(),
            JointKind::Wheel(j) => body.world_point(j.local_anchor_a),
            JointKind::Weld(j) => body.world_point(j.local_anchor_a),
            JointKind::Friction(j) => body.world_point(j.local_anchor_a),
            JointKind::Rope(j) => body.world_point(j.local_anchor_a),
            JointKind::Motor(_) => body.position(),
        }
    }

    /// The world anchor point on body B.
    pub(crate) fn anchor_b(&self, bodies: &Pool<BodyId, Body>) -> Vec2 {
        let body = &bodies[self.body_b];
        match &self.kind {
            JointKind::Distance(j) => body.world_point(j.local_anchor_b),
            JointKind::Revolute(j) => body.world_point(j.local_anchor_b),
            JointKind::Prismatic(j) => body.world_point(j.local_anchor_b),
            JointKind::Pulley(j) => body.world_point(j.local_anchor_b),
            JointKind::Gear(j) => body.world_point(j.local_anchor_b),
            JointKind::Mouse(j) => body.world_point(j.local_anchor_b()),
            JointKind::Wheel(j) => body.world_point(j.local_anchor_b),
            JointKind::Weld(j) => body.world_point(j.local_anchor_b),
            JointKind::Friction(j) => body.world_point(j.local_anchor_b),
            JointKind::Rope(j) => body.world_point(j.local_anchor_b),
            JointKind::Motor(_) => body.position(),
        }
    }

    /// The reaction force on body B at the joint anchor, in Newtons.
    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        match &self.kind {
            JointKind::Distance(j) => j.reaction_force(inv_dt),
            JointKind::Revolute(j) => j.reaction_force(inv_dt),
            JointKind::Prismatic(j) => j.reaction_force(inv_dt),
            JointKind::Pulley(j) => j.reaction_force(inv_dt),
            JointKind::Gear(j) => j.reaction_force(inv_dt),
            JointKind::Mouse(j) => j.reaction_force(inv_dt),
            JointKind::Wheel(j) => j.reaction_force(inv_dt),
            JointKind::Weld(j) => j.reaction_force(inv_dt),
            JointKind::Friction(j) => j.reaction_force(inv_dt),
            JointKind::Rope(j) => j.reaction_force(inv_dt),
            JointKind::Motor(j) => j.reaction_force(inv_dt),
        }
    }

    /// The reaction torque on body B, in N·m.
    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        match &self.kind {
            JointKind::Distance(_) => 0.0,
            JointKind::Revolute(j) => j.reaction_torque(inv_dt),
            JointKind::Prismatic(j) => j.reaction_torque(inv_dt),
            JointKind::Pulley(_) => 0.0,
            JointKind::Gear(j) => j.reaction_torque(inv_dt),
            JointKind::Mouse(_) => 0.0,
            JointKind::Wheel(j) => j.reaction_torque(inv_dt),
            JointKind::Weld(j) => j.reaction_torque(inv_dt),
            JointKind::Friction(j) => j.reaction_torque(inv_dt),
            JointKind::Rope(_) => 0.0,
            JointKind::Motor(j) => j.reaction_torque(inv_dt),
        }
    }

    /// Shift the origin for any points stored in world coordinates.
    pub(crate) fn shift_origin(&mut self, new_origin: Vec2) {
        match &mut self.kind {
            JointKind::Mouse(j) => j.shift_origin(new_origin),
            JointKind::Pulley(j) => j.shift_origin(new_origin),
            _ => {}
        }
    }

    /// Joints referencing other joints (gears) must go before their
    /// referents.
    pub(crate) fn referenced_joints(&self) -> Option<(JointId, JointId)> {
        match &self.kind {
            JointKind::Gear(j) => Some((j.joint1(), j.joint2())),
            _ => None,
        }
    }
}

/// Soft-constraint helper: convert frequency and damping ratio into the
/// per-step gamma and bias terms used by the velocity solver. `mass` is
/// the effective mass the spring acts against, `c` the position error.
/// Returns `(gamma, bias, softened_inv_mass_delta)` pieces inline where
/// used; kept here as the single reference for the mapping:
/// omega = 2 * pi * frequency, d = 2 * mass * damping_ratio * omega,
/// k = mass * omega^2, gamma = 1 / (h * (d + h * k)), bias = c * h * k *
/// gamma. Frequency must be less than half the step rate to stay stable.
#[inline]
pub(crate) fn soft_constraint_terms(
    mass: f32,
    frequency_hz: f32,
    damping_ratio: f32,
    c: f32,
    h: f32,
) -> (f32, f32) {
    let omega = 2.0 * std::f32::consts::PI * frequency_hz;
    let d = 2.0 * mass * damping_ratio * omega;
    let k = mass * omega * omega;
    let mut gamma = h * (d + h * k);
    if gamma != 0.0 {
        gamma = 1.0 / gamma;
    }
    let bias = c * h * k * gamma;
    (gamma, bias)
}
