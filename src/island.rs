//! Transient islands of coupled awake bodies.
//!
//! The world builds one island per connected component of the awake
//! constraint graph and solves each in turn: integrate velocities, solve
//! velocity constraints, integrate positions, correct positions, then
//! write the state back to the bodies and evaluate sleep. The island's
//! buffers persist across steps so per-step allocation settles to zero.

use crate::body::{Body, BodyId, BodyType};
use crate::common::{
    ANGULAR_SLEEP_TOLERANCE, LINEAR_SLEEP_TOLERANCE, MAX_ROTATION, MAX_ROTATION_SQUARED,
    MAX_TRANSLATION, MAX_TRANSLATION_SQUARED, TIME_TO_SLEEP,
};
use crate::contact::{Contact, ContactId};
use crate::contact_solver::ContactSolver;
use crate::fixture::{Fixture, FixtureId};
use crate::joint::{Joint, JointId};
use crate::math::Vec2;
use crate::pool::Pool;
use crate::time_step::{Position, SolverData, TimeStep, Velocity};
use crate::world_callbacks::{ContactImpulse, ContactListener};

pub(crate) struct Island {
    pub bodies: Vec<BodyId>,
    pub contacts: Vec<ContactId>,
    pub joints: Vec<JointId>,

    positions: Vec<Position>,
    velocities: Vec<Velocity>,
}

impl Island {
    pub fn new() -> Self {
        Island {
            bodies: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            positions: Vec::new(),
            velocities: Vec::new(),
        }
    }

    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// Add a body and assign its island-local index.
    pub fn add_body(&mut self, id: BodyId, body: &mut Body) {
        body.island_index = self.bodies.len();
        self.bodies.push(id);
    }

    pub fn add_contact(&mut self, id: ContactId) {
        self.contacts.push(id);
    }

    pub fn add_joint(&mut self, id: JointId) {
        self.joints.push(id);
    }

    #[allow(clippy::too_many_arguments)]
    pub fn solve(
        &mut self,
        step: &TimeStep,
        gravity: Vec2,
        allow_sleep: bool,
        bodies: &mut Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
        contacts: &mut Pool<ContactId, Contact>,
        joints: &mut Pool<JointId, Joint>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let h = step.dt;

        self.positions.clear();
        self.velocities.clear();

        // Integrate velocities and apply damping. Initialize the body
        // state.
        for &id in &self.bodies {
            let b = &mut bodies[id];

            let c = b.sweep.c;
            let a = b.sweep.a;
            let mut v = b.linear_velocity;
            let mut w = b.angular_velocity;

            // Store positions for continuous collision.
            b.sweep.c0 = b.sweep.c;
            b.sweep.a0 = b.sweep.a;

            if b.body_type == BodyType::Dynamic {
                // Integrate velocities.
                v += h * (b.gravity_scale * gravity + b.inv_mass * b.force);
                w += h * b.inv_inertia * b.torque;

                // Apply damping.
                // ODE: dv/dt + c * v = 0
                // Solution: v(t) = v0 * exp(-c * t)
                // Time step: v(t + dt) = v0 * exp(-c * (t + dt))
                //                      = v0 * exp(-c * t) * exp(-c * dt)
                //                      = v * exp(-c * dt)
                // v2 = exp(-c * dt) * v1
                // Pade approximation:
                // v2 = v1 * 1 / (1 + c * dt)
                v *= 1.0 / (1.0 + h * b.linear_damping);
                w *= 1.0 / (1.0 + h * b.angular_damping);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        // Initialize velocity constraints.
        let mut contact_solver = ContactSolver::new(*step, &self.contacts, contacts, bodies, fixtures);
        contact_solver.initialize_velocity_constraints(contacts, &self.positions, &self.velocities);

        if step.warm_starting {
            contact_solver.warm_start(&mut self.velocities);
        }

        for &jid in &self.joints {
            let mut data = SolverData {
                step: *step,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };
            joints[jid].init_velocity_constraints(&mut data, bodies);
        }

        // Solve velocity constraints.
        for _ in 0..step.velocity_iterations {
            for &jid in &self.joints {
                let mut data = SolverData {
                    step: *step,
                    positions: &mut self.positions,
                    velocities: &mut self.velocities,
                };
                joints[jid].solve_velocity_constraints(&mut data);
            }

            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Store impulses for warm starting.
        contact_solver.store_impulses(contacts);

        // Integrate positions.
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            let mut c = position.c;
            let mut a = position.a;
            let mut v = velocity.v;
            let mut w = velocity.w;

            // Check for large velocities.
            let translation = h * v;
            if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
                let ratio = MAX_TRANSLATION / translation.length();
                v *= ratio;
            }

            let rotation = h * w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                let ratio = MAX_ROTATION / rotation.abs();
                w *= ratio;
            }

            // Integrate.
            c += h * v;
            a += h * w;

            position.c = c;
            position.a = a;
            velocity.v = v;
            velocity.w = w;
        }

        // Solve position constraints.
        let mut position_solved = false;
        for _ in 0..step.position_iterations {
            let contacts_okay = contact_solver.solve_position_constraints(&mut self.positions);

            let mut joints_okay = true;
            for &jid in &self.joints {
                let mut data = SolverData {
                    step: *step,
                    positions: &mut self.positions,
                    velocities: &mut self.velocities,
                };
                let joint_okay = joints[jid].solve_position_constraints(&mut data);
                joints_okay = joints_okay && joint_okay;
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small.
                position_solved = true;
                break;
            }
        }

        // Copy state buffers back to the bodies.
        for (i, &id) in self.bodies.iter().enumerate() {
            let body = &mut bodies[id];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        self.report(&contact_solver, contacts, listener);

        if allow_sleep {
            let mut min_sleep_time = f32::MAX;

            const LIN_TOL_SQR: f32 = LINEAR_SLEEP_TOLERANCE * LINEAR_SLEEP_TOLERANCE;
            const ANG_TOL_SQR: f32 = ANGULAR_SLEEP_TOLERANCE * ANGULAR_SLEEP_TOLERANCE;

            for &id in &self.bodies {
                let b = &mut bodies[id];
                if b.body_type == BodyType::Static {
                    continue;
                }

                if !b.is_sleeping_allowed()
                    || b.angular_velocity * b.angular_velocity > ANG_TOL_SQR
                    || b.linear_velocity.dot(b.linear_velocity) > LIN_TOL_SQR
                {
                    b.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    b.sleep_time += h;
                    min_sleep_time = min_sleep_time.min(b.sleep_time);
                }
            }

            if min_sleep_time >= TIME_TO_SLEEP && position_solved {
                for &id in &self.bodies {
                    bodies[id].set_awake(false);
                }
            }
        }
    }

    /// Solve one TOI mini-island: the two advanced bodies move, the rest
    /// anchor the contact patch.
    #[allow(clippy::too_many_arguments)]
    pub fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        toi_index_a: usize,
        toi_index_b: usize,
        bodies: &mut Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
        contacts: &mut Pool<ContactId, Contact>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        self.positions.clear();
        self.velocities.clear();

        // Initialize the body state.
        for &id in &self.bodies {
            let b = &bodies[id];
            self.positions.push(Position {
                c: b.sweep.c,
                a: b.sweep.a,
            });
            self.velocities.push(Velocity {
                v: b.linear_velocity,
                w: b.angular_velocity,
            });
        }

        let mut contact_solver =
            ContactSolver::new(*sub_step, &self.contacts, contacts, bodies, fixtures);

        // Solve position constraints.
        for _ in 0..sub_step.position_iterations {
            let contacts_okay = contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            );
            if contacts_okay {
                break;
            }
        }

        // Leap of faith to new safe state. The sweep origins are advanced
        // so a failed TOI next pass starts from here.
        bodies[self.bodies[toi_index_a]].sweep.c0 = self.positions[toi_index_a].c;
        bodies[self.bodies[toi_index_a]].sweep.a0 = self.positions[toi_index_a].a;
        bodies[self.bodies[toi_index_b]].sweep.c0 = self.positions[toi_index_b].c;
        bodies[self.bodies[toi_index_b]].sweep.a0 = self.positions[toi_index_b].a;

        // No warm starting is needed for TOI events because warm
        // starting impulses were applied in the discrete solver.
        contact_solver.initialize_velocity_constraints(contacts, &self.positions, &self.velocities);

        // Solve velocity constraints.
        for _ in 0..sub_step.velocity_iterations {
            contact_solver.solve_velocity_constraints(&mut self.velocities);
        }

        // Don't store the TOI contact forces for warm starting
        // because they can be quite large.

        let h = sub_step.dt;

        // Integrate positions.
        for (position, velocity) in self.positions.iter_mut().zip(self.velocities.iter_mut()) {
            let mut c = position.c;
            let mut a = position.a;
            let mut v = velocity.v;
            let mut w = velocity.w;

            // Check for large velocities.
            let translation = h * v;
            if translation.dot(translation) > MAX_TRANSLATION_SQUARED {
                let ratio = MAX_TRANSLATION / translation.length();
                v *= ratio;
            }

            let rotation = h * w;
            if rotation * rotation > MAX_ROTATION_SQUARED {
                let ratio = MAX_ROTATION / rotation.abs();
                w *= ratio;
            }

            // Integrate.
            c += h * v;
            a += h * w;

            position.c = c;
            position.a = a;
            velocity.v = v;
            velocity.w = w;
        }

        // Sync bodies.
        for (i, &id) in self.bodies.iter().enumerate() {
            let body = &mut bodies[id];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        self.report(&contact_solver, contacts, listener);
    }

    fn report(
        &self,
        contact_solver: &ContactSolver,
        contacts: &Pool<ContactId, Contact>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let listener = match listener {
            Some(listener) => listener,
            None => return,
        };

        for vc in &contact_solver.velocity_constraints {
            let mut impulse = ContactImpulse {
                count: vc.point_count,
                ..Default::default()
            };
            for j in 0..vc.point_count {
                impulse.normal_impulses[j] = vc.points[j].normal_impulse;
                impulse.tangent_impulses[j] = vc.points[j].tangent_impulse;
            }

            let contact = &contacts[vc.contact];
            listener.post_solve(&contact.info(vc.contact), &impulse);
        }
    }
}
