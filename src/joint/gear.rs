use crate::body::{Body, BodyId};
use crate::common::LINEAR_SLOP;
use crate::joint::JointId;
use crate::math::{Rot, Vec2};
use crate::pool::Pool;
use crate::time_step::SolverData;

/// Gear joint definition. The gear couples two existing revolute or
/// prismatic joints that each have a fixed (ground) body as body A. Body A
/// of the gear is joint1's moving body and body B is joint2's moving body.
#[derive(Clone, Debug)]
pub struct GearJointDef {
    pub collide_connected: bool,
    pub user_data: u64,
    /// The first revolute/prismatic joint attached to the gear joint.
    pub joint1: JointId,
    /// The second revolute/prismatic joint attached to the gear joint.
    pub joint2: JointId,
    /// The gear ratio. Coordinates satisfy
    /// coordinate1 + ratio * coordinate2 = constant.
    pub ratio: f32,
}

impl GearJointDef {
    pub fn new(joint1: JointId, joint2: JointId) -> Self {
        Self {
            collide_connected: false,
            user_data: 0,
            joint1,
            joint2,
            ratio: 1.0,
        }
    }
}

/// Which coordinate a gear leg measures: an angle for revolute referents,
/// a translation along an axis for prismatic referents.
#[derive(Clone, Copy, Debug)]
pub(crate) enum GearLeg {
    Revolute {
        reference_angle: f32,
    },
    Prismatic {
        local_anchor_ground: Vec2,
        local_anchor_body: Vec2,
        local_axis: Vec2,
    },
}

// Gear Joint:
// C0 = (coordinate1 + ratio * coordinate2)_initial
// C = C0 - (coordinate1 + ratio * coordinate2)
// J = [J1 ratio * J2]
// where
// coordinate1 and coordinate2 are the angular or linear coordinates of
// the revolute or prismatic joints that were attached at gear creation.

/// A gear joint is used to connect two joints together. Either joint can
/// be a revolute or prismatic joint. You specify a gear ratio to bind the
/// motions together:
/// coordinate1 + ratio * coordinate2 = constant
/// The ratio can be negative or positive. If one joint is a revolute joint
/// and the other joint is a prismatic joint, then the ratio will have
/// length or length over angle units.
///
/// The gear holds onto its referent joints; destroying either referent
/// destroys the gear first and reports it through the destruction
/// listener.
#[derive(Debug)]
pub struct GearJoint {
    joint1: JointId,
    joint2: JointId,

    /// The ground body of each referent joint.
    pub(crate) body_c: BodyId,
    pub(crate) body_d: BodyId,

    pub(crate) local_anchor_a: Vec2,
    pub(crate) local_anchor_b: Vec2,
    leg_a: GearLeg,
    leg_b: GearLeg,

    ratio: f32,
    constant: f32,

    // Solver shared
    impulse: f32,

    // Solver temp
    index_a: usize,
    index_b: usize,
    index_c: usize,
    index_d: usize,
    lc_a: Vec2,
    lc_b: Vec2,
    lc_c: Vec2,
    lc_d: Vec2,
    m_a: f32,
    m_b: f32,
    m_c: f32,
    m_d: f32,
    i_a: f32,
    i_b: f32,
    i_c: f32,
    i_d: f32,
    jv_ac: Vec2,
    jv_bd: Vec2,
    jw_a: f32,
    jw_b: f32,
    jw_c: f32,
    jw_d: f32,
    mass: f32,
}

impl GearJoint {
    /// The world factory resolves the referent joints into legs and the
    /// initial coordinates before calling this.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        def: &GearJointDef,
        body_c: BodyId,
        body_d: BodyId,
        local_anchor_a: Vec2,
        local_anchor_b: Vec2,
        leg_a: GearLeg,
        leg_b: GearLeg,
        coordinate_a: f32,
        coordinate_b: f32,
    ) -> Self {
        Self {
            joint1: def.joint1,
            joint2: def.joint2,
            body_c,
            body_d,
            local_anchor_a,
            local_anchor_b,
            leg_a,
            leg_b,
            ratio: def.ratio,
            constant: coordinate_a + def.ratio * coordinate_b,
            impulse: 0.0,
            index_a: 0,
            index_b: 0,
            index_c: 0,
            index_d: 0,
            lc_a: Vec2::ZERO,
            lc_b: Vec2::ZERO,
            lc_c: Vec2::ZERO,
            lc_d: Vec2::ZERO,
            m_a: 0.0,
            m_b: 0.0,
            m_c: 0.0,
            m_d: 0.0,
            i_a: 0.0,
            i_b: 0.0,
            i_c: 0.0,
            i_d: 0.0,
            jv_ac: Vec2::ZERO,
            jv_bd: Vec2::ZERO,
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
        }
    }

    pub fn joint1(&self) -> JointId {
        self.joint1
    }

    pub fn joint2(&self) -> JointId {
        self.joint2
    }

    pub fn ratio(&self) -> f32 {
        self.ratio
    }

    pub fn set_ratio(&mut self, ratio: f32) {
        debug_assert!(ratio.is_finite());
        self.ratio = ratio;
    }

    pub fn reaction_force(&self, inv_dt: f32) -> Vec2 {
        (inv_dt * self.impulse) * self.jv_ac
    }

    pub fn reaction_torque(&self, inv_dt: f32) -> f32 {
        inv_dt * self.impulse * self.jw_a
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
        let c = &bodies[self.body_c];
        let d = &bodies[self.body_d];
        self.index_a = a.island_index;
        self.index_b = b.island_index;
        self.index_c = c.island_index;
        self.index_d = d.island_index;
        self.lc_a = a.sweep.local_center;
        self.lc_b = b.sweep.local_center;
        self.lc_c = c.sweep.local_center;
        self.lc_d = d.sweep.local_center;
        self.m_a = a.inv_mass;
        self.m_b = b.inv_mass;
        self.m_c = c.inv_mass;
        self.m_d = d.inv_mass;
        self.i_a = a.inv_inertia;
        self.i_b = b.inv_inertia;
        self.i_c = c.inv_inertia;
        self.i_d = d.inv_inertia;

        let a_a = data.positions[self.index_a].a;
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;

        let a_b = data.positions[self.index_b].a;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;

        let a_c = data.positions[self.index_c].a;
        let mut v_c = data.velocities[self.index_c].v;
        let mut w_c = data.velocities[self.index_c].w;

        let a_d = data.positions[self.index_d].a;
        let mut v_d = data.velocities[self.index_d].v;
        let mut w_d = data.velocities[self.index_d].w;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        let q_c = Rot::new(a_c);
        let q_d = Rot::new(a_d);

        self.mass = 0.0;

        match self.leg_a {
            GearLeg::Revolute { .. } => {
                self.jv_ac = Vec2::ZERO;
                self.jw_a = 1.0;
                self.jw_c = 1.0;
                self.mass += self.i_a + self.i_c;
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let u = q_c * local_axis;
                let r_c = q_c * (local_anchor_ground - self.lc_c);
                let r_a = q_a * (local_anchor_body - self.lc_a);
                self.jv_ac = u;
                self.jw_c = r_c.cross(u);
                self.jw_a = r_a.cross(u);
                self.mass += self.m_c
                    + self.m_a
                    + self.i_c * self.jw_c * self.jw_c
                    + self.i_a * self.jw_a * self.jw_a;
            }
        }

        match self.leg_b {
            GearLeg::Revolute { .. } => {
                self.jv_bd = Vec2::ZERO;
                self.jw_b = self.ratio;
                self.jw_d = self.ratio;
                self.mass += self.ratio * self.ratio * (self.i_b + self.i_d);
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let u = q_d * local_axis;
                let r_d = q_d * (local_anchor_ground - self.lc_d);
                let r_b = q_b * (local_anchor_body - self.lc_b);
                self.jv_bd = self.ratio * u;
                self.jw_d = self.ratio * r_d.cross(u);
                self.jw_b = self.ratio * r_b.cross(u);
                self.mass += self.ratio * self.ratio * (self.m_d + self.m_b)
                    + self.i_d * self.jw_d * self.jw_d
                    + self.i_b * self.jw_b * self.jw_b;
            }
        }

        // Compute effective mass.
        self.mass = if self.mass > 0.0 { 1.0 / self.mass } else { 0.0 };

        if data.step.warm_starting {
            v_a += (self.m_a * self.impulse) * self.jv_ac;
            w_a += self.i_a * self.impulse * self.jw_a;
            v_b += (self.m_b * self.impulse) * self.jv_bd;
            w_b += self.i_b * self.impulse * self.jw_b;
            v_c -= (self.m_c * self.impulse) * self.jv_ac;
            w_c -= self.i_c * self.impulse * self.jw_c;
            v_d -= (self.m_d * self.impulse) * self.jv_bd;
            w_d -= self.i_d * self.impulse * self.jw_d;
        } else {
            self.impulse = 0.0;
        }

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
        data.velocities[self.index_c].v = v_c;
        data.velocities[self.index_c].w = w_c;
        data.velocities[self.index_d].v = v_d;
        data.velocities[self.index_d].w = w_d;
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let mut v_a = data.velocities[self.index_a].v;
        let mut w_a = data.velocities[self.index_a].w;
        let mut v_b = data.velocities[self.index_b].v;
        let mut w_b = data.velocities[self.index_b].w;
        let mut v_c = data.velocities[self.index_c].v;
        let mut w_c = data.velocities[self.index_c].w;
        let mut v_d = data.velocities[self.index_d].v;
        let mut w_d = data.velocities[self.index_d].w;

        let mut cdot = self.jv_ac.dot(v_a - v_c) + self.jv_bd.dot(v_b - v_d);
        cdot += (self.jw_a * w_a - self.jw_c * w_c) + (self.jw_b * w_b - self.jw_d * w_d);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        v_a += (self.m_a * impulse) * self.jv_ac;
        w_a += self.i_a * impulse * self.jw_a;
        v_b += (self.m_b * impulse) * self.jv_bd;
        w_b += self.i_b * impulse * self.jw_b;
        v_c -= (self.m_c * impulse) * self.jv_ac;
        w_c -= self.i_c * impulse * self.jw_c;
        v_d -= (self.m_d * impulse) * self.jv_bd;
        w_d -= self.i_d * impulse * self.jw_d;

        data.velocities[self.index_a].v = v_a;
        data.velocities[self.index_a].w = w_a;
        data.velocities[self.index_b].v = v_b;
        data.velocities[self.index_b].w = w_b;
        data.velocities[self.index_c].v = v_c;
        data.velocities[self.index_c].w = w_c;
        data.velocities[self.index_d].v = v_d;
        data.velocities[self.index_d].w = w_d;
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let mut c_a = data.positions[self.index_a].c;
        let mut a_a = data.positions[self.index_a].a;
        let mut c_b = data.positions[self.index_b].c;
        let mut a_b = data.positions[self.index_b].a;
        let mut c_c = data.positions[self.index_c].c;
        let mut a_c = data.positions[self.index_c].a;
        let mut c_d = data.positions[self.index_d].c;
        let mut a_d = data.positions[self.index_d].a;

        let q_a = Rot::new(a_a);
        let q_b = Rot::new(a_b);
        let q_c = Rot::new(a_c);
        let q_d = Rot::new(a_d);

        let mut mass = 0.0;

        let jv_ac;
        let jv_bd;
        let jw_a;
        let jw_b;
        let jw_c;
        let jw_d;
        let coordinate_a;
        let coordinate_b;

        match self.leg_a {
            GearLeg::Revolute { reference_angle } => {
                jv_ac = Vec2::ZERO;
                jw_a = 1.0;
                jw_c = 1.0;
                mass += self.i_a + self.i_c;
                coordinate_a = a_a - a_c - reference_angle;
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let u = q_c * local_axis;
                let r_c = q_c * (local_anchor_ground - self.lc_c);
                let r_a = q_a * (local_anchor_body - self.lc_a);
                jv_ac = u;
                jw_c = r_c.cross(u);
                jw_a = r_a.cross(u);
                mass += self.m_c + self.m_a + self.i_c * jw_c * jw_c + self.i_a * jw_a * jw_a;

                let p_c = local_anchor_ground - self.lc_c;
                let p_a = q_c.mul_t_vec2(r_a + (c_a - c_c));
                coordinate_a = (p_a - p_c).dot(local_axis);
            }
        }

        match self.leg_b {
            GearLeg::Revolute { reference_angle } => {
                jv_bd = Vec2::ZERO;
                jw_b = self.ratio;
                jw_d = self.ratio;
                mass += self.ratio * self.ratio * (self.i_b + self.i_d);
                coordinate_b = a_b - a_d - reference_angle;
            }
            GearLeg::Prismatic {
                local_anchor_ground,
                local_anchor_body,
                local_axis,
            } => {
                let u = q_d * local_axis;
                let r_d = q_d * (local_anchor_ground - self.lc_d);
                let r_b = q_b * (local_anchor_body - self.lc_b);
                jv_bd = self.ratio * u;
                jw_d = self.ratio * r_d.cross(u);
                jw_b = self.ratio * r_b.cross(u);
                mass += self.ratio * self.ratio * (self.m_d + self.m_b)
                    + self.i_d * jw_d * jw_d
                    + self.i_b * jw_b * jw_b;

                let p_d = local_anchor_ground - self.lc_d;
                let p_b = q_d.mul_t_vec2(r_b + (c_b - c_d));
                coordinate_b = (p_b - p_d).dot(local_axis);
            }
        }

        let c = (coordinate_a + self.ratio * coordinate_b) - self.constant;

        let mut impulse = 0.0;
        if mass > 0.0 {
            impulse = -c / mass;
        }

        c_a += self.m_a * impulse * jv_ac;
        a_a += self.i_a * impulse * jw_a;
        c_b += self.m_b * impulse * jv_bd;
        a_b += self.i_b * impulse * jw_b;
        c_c -= self.m_c * impulse * jv_ac;
        a_c -= self.i_c * impulse * jw_c;
        c_d -= self.m_d * impulse * jv_bd;
        a_d -= self.i_d * impulse * jw_d;

        data.positions[self.index_a].c = c_a;
        data.positions[self.index_a].a = a_a;
        data.positions[self.index_b].c = c_b;
        data.positions[self.index_b].a = a_b;
        data.positions[self.index_c].c = c_c;
        data.positions[self.index_c].a = a_c;
        data.positions[self.index_d].c = c_d;
        data.positions[self.index_d].a = a_d;

        c.abs() < LINEAR_SLOP
    }
}
