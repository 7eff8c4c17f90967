use crate::body::{Body, BodyId};
use crate::collision::{Manifold, ManifoldType, WorldManifold};
use crate::common::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, TOI_BAUMGARTE,
};
use crate::contact::{Contact, ContactId};
use crate::fixture::{Fixture, FixtureId};
use crate::math::{Mat2x2, Rot, Transform, Vec2};
use crate::pool::Pool;
use crate::time_step::{Position, TimeStep, Velocity};

const BLOCK_SOLVE: bool = true;

#[derive(Copy, Clone, Default)]
pub(crate) struct VelocityConstraintPoint {
    pub r_a: Vec2,
    pub r_b: Vec2,
    pub normal_impulse: f32,
    pub tangent_impulse: f32,
    pub normal_mass: f32,
    pub tangent_mass: f32,
    pub velocity_bias: f32,
}

pub(crate) struct ContactVelocityConstraint {
    pub points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    pub normal: Vec2,
    normal_mass: Mat2x2,
    k: Mat2x2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    threshold: f32,
    tangent_speed: f32,
    pub point_count: usize,
    pub contact: ContactId,
}

#[derive(Copy, Clone)]
struct ContactPositionConstraint {
    local_points: [Vec2; MAX_MANIFOLD_POINTS],
    local_normal: Vec2,
    local_point: Vec2,
    index_a: usize,
    index_b: usize,
    inv_mass_a: f32,
    inv_mass_b: f32,
    local_center_a: Vec2,
    local_center_b: Vec2,
    inv_i_a: f32,
    inv_i_b: f32,
    manifold_type: ManifoldType,
    radius_a: f32,
    radius_b: f32,
    point_count: usize,
}

struct PositionSolverManifold {
    normal: Vec2,
    point: Vec2,
    separation: f32,
}

impl PositionSolverManifold {
    fn new(pc: &ContactPositionConstraint, xf_a: &Transform, xf_b: &Transform, index: usize) -> Self {
        debug_assert!(pc.point_count > 0);

        match pc.manifold_type {
            ManifoldType::Circles => {
                let point_a = xf_a.mul_vec2(pc.local_point);
                let point_b = xf_b.mul_vec2(pc.local_points[0]);
                let normal = (point_b - point_a).normalize();
                Self {
                    normal,
                    point: 0.5 * (point_a + point_b),
                    separation: (point_b - point_a).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceA => {
                let normal = xf_a.q * pc.local_normal;
                let plane_point = xf_a.mul_vec2(pc.local_point);

                let clip_point = xf_b.mul_vec2(pc.local_points[index]);
                Self {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q * pc.local_normal;
                let plane_point = xf_b.mul_vec2(pc.local_point);

                let clip_point = xf_a.mul_vec2(pc.local_points[index]);
                Self {
                    // Ensure normal points from A to B
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

/// Sequential-impulse contact constraint solver for one island. Bodies
/// are referenced through their island indices; the island-local position
/// and velocity arrays are passed into each solve call so that joint
/// solving can interleave with contact solving on the same state.
pub(crate) struct ContactSolver {
    position_constraints: Vec<ContactPositionConstraint>,
    pub velocity_constraints: Vec<ContactVelocityConstraint>,
}

impl ContactSolver {
    pub fn new(
        step: TimeStep,
        contact_ids: &[ContactId],
        contacts: &Pool<ContactId, Contact>,
        bodies: &Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
    ) -> Self {
        let mut velocity_constraints = Vec::with_capacity(contact_ids.len());
        let mut position_constraints = Vec::with_capacity(contact_ids.len());

        // Initialize position independent portions of the constraints.
        for &id in contact_ids {
            let contact = &contacts[id];

            let fixture_a = &fixtures[contact.fixture_a];
            let fixture_b = &fixtures[contact.fixture_b];
            let radius_a = fixture_a.shape.radius();
            let radius_b = fixture_b.shape.radius();
            let body_a = &bodies[contact.body_a()];
            let body_b = &bodies[contact.body_b()];
            let manifold = contact.manifold();

            let point_count = manifold.point_count;
            debug_assert!(point_count > 0);

            let mut vc = ContactVelocityConstraint {
                points: [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS],
                normal: Vec2::ZERO,
                normal_mass: Mat2x2::ZERO,
                k: Mat2x2::ZERO,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                friction: contact.friction,
                restitution: contact.restitution,
                threshold: contact.restitution_threshold,
                tangent_speed: contact.tangent_speed,
                point_count,
                contact: id,
            };

            let mut pc = ContactPositionConstraint {
                local_points: [Vec2::ZERO; MAX_MANIFOLD_POINTS],
                local_normal: manifold.local_normal,
                local_point: manifold.local_point,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                manifold_type: manifold.manifold_type,
                radius_a,
                radius_b,
                point_count,
            };

            for j in 0..point_count {
                let cp = &manifold.points[j];
                let vcp = &mut vc.points[j];

                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * cp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * cp.tangent_impulse;
                }

                pc.local_points[j] = cp.local_point;
            }

            velocity_constraints.push(vc);
            position_constraints.push(pc);
        }

        Self {
            position_constraints,
            velocity_constraints,
        }
    }

    /// Initialize position dependent portions of the velocity constraints.
    pub fn initialize_velocity_constraints(
        &mut self,
        contacts: &Pool<ContactId, Contact>,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(self.position_constraints.iter())
        {
            let radius_a = pc.radius_a;
            let radius_b = pc.radius_b;
            let manifold = contacts[vc.contact].manifold();

            let index_a = vc.index_a;
            let index_b = vc.index_b;

            let m_a = vc.inv_mass_a;
            let m_b = vc.inv_mass_b;
            let i_a = vc.inv_i_a;
            let i_b = vc.inv_i_b;
            let local_center_a = pc.local_center_a;
            let local_center_b = pc.local_center_b;

            let c_a = positions[index_a].c;
            let a_a = positions[index_a].a;
            let v_a = velocities[index_a].v;
            let w_a = velocities[index_a].w;

            let c_b = positions[index_b].c;
            let a_b = positions[index_b].a;
            let v_b = velocities[index_b].v;
            let w_b = velocities[index_b].w;

            debug_assert!(manifold.point_count > 0);

            let mut xf_a = Transform {
                p: Vec2::ZERO,
                q: Rot::new(a_a),
            };
            let mut xf_b = Transform {
                p: Vec2::ZERO,
                q: Rot::new(a_b),
            };
            xf_a.p = c_a - xf_a.q * local_center_a;
            xf_b.p = c_b - xf_b.q * local_center_b;

            let world_manifold =
                WorldManifold::initialize(manifold, &xf_a, radius_a, &xf_b, radius_b);

            vc.normal = world_manifold.normal;

            let point_count = vc.point_count;
            for j in 0..point_count {
                let vcp = &mut vc.points[j];

                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = vcp.r_a.cross(vc.normal);
                let rn_b = vcp.r_b.cross(vc.normal);

                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let tangent = vc.normal.cross_scalar(1.0);

                let rt_a = vcp.r_a.cross(tangent);
                let rt_b = vcp.r_b.cross(tangent);

                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;

                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Setup a velocity bias for restitution.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    v_b + Vec2::scalar_cross(w_b, vcp.r_b) - v_a - Vec2::scalar_cross(w_a, vcp.r_a),
                );
                if v_rel < -vc.threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // If we have two points, then prepare the block solver.
            if vc.point_count == 2 && BLOCK_SOLVE {
                let vcp1 = vc.points[0];
                let vcp2 = vc.points[1];

                let rn1_a = vcp1.r_a.cross(vc.normal);
                let rn1_b = vcp1.r_b.cross(vc.normal);
                let rn2_a = vcp2.r_a.cross(vc.normal);
                let rn2_b = vcp2.r_b.cross(vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                // Ensure a reasonable condition number.
                const K_MAX_CONDITION_NUMBER: f32 = 1000.0;
                if k11 * k11 < K_MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    // K is safe to invert.
                    vc.k = Mat2x2::from_cols(Vec2::new(k11, k12), Vec2::new(k12, k22));
                    vc.normal_mass = vc.k.invert();
                } else {
                    // The constraints are redundant, just use one.
                    vc.point_count = 1;
                }
            }
        }
    }

    pub fn warm_start(&mut self, velocities: &mut [Velocity]) {
        // Warm start.
        for vc in &self.velocity_constraints {
            let index_a = vc.index_a;
            let index_b = vc.index_b;
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_i_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_i_b;
            let point_count = vc.point_count;

            let mut v_a = velocities[index_a].v;
            let mut w_a = velocities[index_a].w;
            let mut v_b = velocities[index_b].v;
            let mut w_b = velocities[index_b].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);

            for vcp in vc.points.iter().take(point_count) {
                let p = vcp.normal_impulse * normal + vcp.tangent_impulse * tangent;
                w_a -= i_a * vcp.r_a.cross(p);
                v_a -= m_a * p;
                w_b += i_b * vcp.r_b.cross(p);
                v_b += m_b * p;
            }

            velocities[index_a].v = v_a;
            velocities[index_a].w = w_a;
            velocities[index_b].v = v_b;
            velocities[index_b].w = w_b;
        }
    }

    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        for vc in &mut self.velocity_constraints {
            let index_a = vc.index_a;
            let index_b = vc.index_b;
            let m_a = vc.inv_mass_a;
            let i_a = vc.inv_i_a;
            let m_b = vc.inv_mass_b;
            let i_b = vc.inv_i_b;
            let point_count = vc.point_count;

            let mut v_a = velocities[index_a].v;
            let mut w_a = velocities[index_a].w;
            let mut v_b = velocities[index_b].v;
            let mut w_b = velocities[index_b].w;

            let normal = vc.normal;
            let tangent = normal.cross_scalar(1.0);
            let friction = vc.friction;

            debug_assert!(point_count == 1 || point_count == 2);

            // Solve tangent constraints first because non-penetration is
            // more important than friction.
            for vcp in vc.points.iter_mut().take(point_count) {
                // Relative velocity at contact
                let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                    - v_a
                    - Vec2::scalar_cross(w_a, vcp.r_a);

                // Compute tangent force
                let vt = dv.dot(tangent) - vc.tangent_speed;
                let mut lambda = vcp.tangent_mass * (-vt);

                // Clamp the accumulated force
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                // Apply contact impulse
                let p = lambda * tangent;

                v_a -= m_a * p;
                w_a -= i_a * vcp.r_a.cross(p);

                v_b += m_b * p;
                w_b += i_b * vcp.r_b.cross(p);
            }

            // Solve normal constraints
            if point_count == 1 || !BLOCK_SOLVE {
                for vcp in vc.points.iter_mut().take(point_count) {
                    // Relative velocity at contact
                    let dv = v_b + Vec2::scalar_cross(w_b, vcp.r_b)
                        - v_a
                        - Vec2::scalar_cross(w_a, vcp.r_a);

                    // Compute normal impulse
                    let vn = dv.dot(normal);
                    let mut lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                    // Clamp the accumulated impulse
                    let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                    lambda = new_impulse - vcp.normal_impulse;
                    vcp.normal_impulse = new_impulse;

                    // Apply contact impulse
                    let p = lambda * normal;

                    v_a -= m_a * p;
                    w_a -= i_a * vcp.r_a.cross(p);

                    v_b += m_b * p;
                    w_b += i_b * vcp.r_b.cross(p);
                }
            } else {
                // Block solver developed in collaboration with Dirk
                // Gregorius (back in 01/07 on Box2D_Lite). Build the mini
                // LCP for this contact patch:
                //
                // vn = A * x + b, vn >= 0, x >= 0 and vn_i * x_i = 0 with
                // i = 1..2
                //
                // A = J * W * JT and J = ( -n, -r1 x n, n, r2 x n )
                // b = vn0 - velocityBias
                //
                // The system is solved using the "Total enumeration method"
                // (s. Murty). The complementary constraint vn_i * x_i
                // implies that we must have in any solution either vn_i = 0
                // or x_i = 0. So for the 2D contact problem the cases
                // vn1 = 0 and vn2 = 0, x1 = 0 and x2 = 0, x1 = 0 and
                // vn2 = 0, x2 = 0 and vn1 = 0 need to be tested. The first
                // valid solution that satisfies the problem is chosen.
                //
                // In order to account for the accumulated impulse 'a'
                // (because of the iterative nature of the solver which only
                // requires that the accumulated impulse is clamped and not
                // the incremental impulse) we change the impulse variable
                // (x_i).
                //
                // Substitute:
                //
                // x = a + d
                //
                // a := old total impulse
                // x := new total impulse
                // d := incremental impulse
                //
                // For the current iteration we extend the formula for the
                // incremental impulse to compute the new total impulse:
                //
                // vn = A * d + b
                //    = A * (x - a) + b
                //    = A * x + b - A * a
                //    = A * x + b'
                // b' = b - A * a;

                let a = Vec2::new(vc.points[0].normal_impulse, vc.points[1].normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                let cp1_ra = vc.points[0].r_a;
                let cp1_rb = vc.points[0].r_b;
                let cp2_ra = vc.points[1].r_a;
                let cp2_rb = vc.points[1].r_b;

                // Relative velocity at contact
                let dv1 = v_b + Vec2::scalar_cross(w_b, cp1_rb) - v_a - Vec2::scalar_cross(w_a, cp1_ra);
                let dv2 = v_b + Vec2::scalar_cross(w_b, cp2_rb) - v_a - Vec2::scalar_cross(w_a, cp2_ra);

                // Compute normal velocity
                let vn1 = dv1.dot(normal);
                let vn2 = dv2.dot(normal);

                let mut b = Vec2::new(
                    vn1 - vc.points[0].velocity_bias,
                    vn2 - vc.points[1].velocity_bias,
                );

                // Compute b'
                b -= vc.k * a;

                let mut applied = None;

                loop {
                    //
                    // Case 1: vn = 0
                    //
                    // 0 = A * x + b'
                    //
                    // Solve for x:
                    //
                    // x = - inv(A) * b'
                    //
                    let x = -(vc.normal_mass * b);

                    if x.x >= 0.0 && x.y >= 0.0 {
                        applied = Some(x);
                        break;
                    }

                    //
                    // Case 2: vn1 = 0 and x2 = 0
                    //
                    //   0 = a11 * x1 + a12 * 0 + b1'
                    // vn2 = a21 * x1 + a22 * 0 + b2'
                    //
                    let x = Vec2::new(-vc.points[0].normal_mass * b.x, 0.0);
                    let vn2 = vc.k.col1.y * x.x + b.y;

                    if x.x >= 0.0 && vn2 >= 0.0 {
                        applied = Some(x);
                        break;
                    }

                    //
                    // Case 3: vn2 = 0 and x1 = 0
                    //
                    // vn1 = a11 * 0 + a12 * x2 + b1'
                    //   0 = a21 * 0 + a22 * x2 + b2'
                    //
                    let x = Vec2::new(0.0, -vc.points[1].normal_mass * b.y);
                    let vn1 = vc.k.col2.x * x.y + b.x;

                    if x.y >= 0.0 && vn1 >= 0.0 {
                        applied = Some(x);
                        break;
                    }

                    //
                    // Case 4: x1 = 0 and x2 = 0
                    //
                    // vn1 = b1
                    // vn2 = b2
                    //
                    if b.x >= 0.0 && b.y >= 0.0 {
                        applied = Some(Vec2::ZERO);
                        break;
                    }

                    // No solution, give up. This is hit sometimes, but it
                    // doesn't seem to matter.
                    break;
                }

                if let Some(x) = applied {
                    // Get the incremental impulse
                    let d = x - a;

                    // Apply incremental impulse
                    let p1 = d.x * normal;
                    let p2 = d.y * normal;
                    v_a -= m_a * (p1 + p2);
                    w_a -= i_a * (cp1_ra.cross(p1) + cp2_ra.cross(p2));

                    v_b += m_b * (p1 + p2);
                    w_b += i_b * (cp1_rb.cross(p1) + cp2_rb.cross(p2));

                    // Accumulate
                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
            }

            velocities[index_a].v = v_a;
            velocities[index_a].w = w_a;
            velocities[index_b].v = v_b;
            velocities[index_b].w = w_b;
        }
    }

    /// Persist accumulated impulses into the contact manifolds for warm
    /// starting the next step.
    pub fn store_impulses(&self, contacts: &mut Pool<ContactId, Contact>) {
        for vc in &self.velocity_constraints {
            let manifold: &mut Manifold = &mut contacts[vc.contact].manifold;

            for j in 0..vc.point_count {
                manifold.points[j].normal_impulse = vc.points[j].normal_impulse;
                manifold.points[j].tangent_impulse = vc.points[j].tangent_impulse;
            }
        }
    }

    /// Sequential solver for position corrections. Returns true once the
    /// worst separation is within tolerance.
    pub fn solve_position_constraints(&mut self, positions: &mut [Position]) -> bool {
        let mut min_separation = 0.0_f32;

        for pc in &self.position_constraints {
            let index_a = pc.index_a;
            let index_b = pc.index_b;
            let local_center_a = pc.local_center_a;
            let m_a = pc.inv_mass_a;
            let i_a = pc.inv_i_a;
            let local_center_b = pc.local_center_b;
            let m_b = pc.inv_mass_b;
            let i_b = pc.inv_i_b;
            let point_count = pc.point_count;

            let mut c_a = positions[index_a].c;
            let mut a_a = positions[index_a].a;

            let mut c_b = positions[index_b].c;
            let mut a_b = positions[index_b].a;

            // Solve normal constraints
            for j in 0..point_count {
                let q_a = Rot::new(a_a);
                let q_b = Rot::new(a_b);
                let xf_a = Transform {
                    p: c_a - q_a * local_center_a,
                    q: q_a,
                };
                let xf_b = Transform {
                    p: c_b - q_b * local_center_b,
                    q: q_b,
                };

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);

                let normal = psm.normal;
                let point = psm.point;
                let separation = psm.separation;

                let r_a = point - c_a;
                let r_b = point - c_b;

                // Track max constraint error.
                min_separation = min_separation.min(separation);

                // Prevent large corrections and allow slop.
                let c = (BAUMGARTE * (separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);

                // Compute the effective mass.
                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Compute normal impulse
                let impulse = if k > 0.0 { -c / k } else { 0.0 };

                let p = impulse * normal;

                c_a -= m_a * p;
                a_a -= i_a * r_a.cross(p);

                c_b += m_b * p;
                a_b += i_b * r_b.cross(p);
            }

            positions[index_a].c = c_a;
            positions[index_a].a = a_a;

            positions[index_b].c = c_b;
            positions[index_b].a = a_b;
        }

        // We can't expect min_separation >= -LINEAR_SLOP because we don't
        // push the separation above -LINEAR_SLOP.
        min_separation >= -3.0 * LINEAR_SLOP
    }

    /// Sequential position solver for TOI sub-steps: only the two TOI
    /// bodies move, everything else in the mini-island is treated as
    /// infinitely heavy ballast.
    pub fn solve_toi_position_constraints(
        &mut self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let mut min_separation = 0.0_f32;

        for pc in &self.position_constraints {
            let index_a = pc.index_a;
            let index_b = pc.index_b;
            let local_center_a = pc.local_center_a;
            let local_center_b = pc.local_center_b;
            let point_count = pc.point_count;

            let (m_a, i_a) = if index_a == toi_index_a || index_a == toi_index_b {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (0.0, 0.0)
            };

            let (m_b, i_b) = if index_b == toi_index_a || index_b == toi_index_b {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (0.0, 0.0)
            };

            let mut c_a = positions[index_a].c;
            let mut a_a = positions[index_a].a;

            let mut c_b = positions[index_b].c;
            let mut a_b = positions[index_b].a;

            // Solve normal constraints
            for j in 0..point_count {
                let q_a = Rot::new(a_a);
                let q_b = Rot::new(a_b);
                let xf_a = Transform {
                    p: c_a - q_a * local_center_a,
                    q: q_a,
                };
                let xf_b = Transform {
                    p: c_b - q_b * local_center_b,
                    q: q_b,
                };

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);

                let normal = psm.normal;
                let point = psm.point;
                let separation = psm.separation;

                let r_a = point - c_a;
                let r_b = point - c_b;

                // Track max constraint error.
                min_separation = min_separation.min(separation);

                // Prevent large corrections and allow slop.
                let c = (TOI_BAUMGARTE * (separation + LINEAR_SLOP))
                    .clamp(-MAX_LINEAR_CORRECTION, 0.0);

                // Compute the effective mass.
                let rn_a = r_a.cross(normal);
                let rn_b = r_b.cross(normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Compute normal impulse
                let impulse = if k > 0.0 { -c / k } else { 0.0 };

                let p = impulse * normal;

                c_a -= m_a * p;
                a_a -= i_a * r_a.cross(p);

                c_b += m_b * p;
                a_b += i_b * r_b.cross(p);
            }

            positions[index_a].c = c_a;
            positions[index_a].a = a_a;

            positions[index_b].c = c_b;
            positions[index_b].a = a_b;
        }

        // We can't expect min_separation >= -LINEAR_SLOP because we don't
        // push the separation above -LINEAR_SLOP.
        min_separation >= -1.5 * LINEAR_SLOP
    }
}
