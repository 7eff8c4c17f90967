use bitflags::bitflags;

use crate::body::{Body, BodyId};
use crate::collide;
use crate::collision::Manifold;
use crate::distance::test_overlap;
use crate::fixture::{Fixture, FixtureId};
use crate::pool::{Pool, PoolKey};
use crate::shape::{Shape, ShapeType};
use crate::world_callbacks::{ContactInfo, ContactListener};

/// A handle to a contact owned by the contact manager. Contacts are
/// created and destroyed by the engine; handles are only valid between
/// the broad-phase overlap beginning and ending.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContactId(pub(crate) u32);

impl PoolKey for ContactId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        ContactId(index as u32)
    }
}

/// Identifies one end (A or B) of a contact's edge pair; the body-side
/// intrusive contact lists are threaded through these.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContactEnd {
    pub contact: ContactId,
    /// 0 = the edge stored on body A, 1 = the edge stored on body B.
    pub end: usize,
}

/// A contact edge is used to connect bodies and contacts together in a
/// contact graph where each body is a node and each contact is an edge.
/// Each contact has two edges, one rooted at each body, linked into that
/// body's list.
#[derive(Copy, Clone, Debug)]
pub struct ContactEdge {
    /// The body on the other side of this contact.
    pub other: BodyId,
    pub prev: Option<ContactEnd>,
    pub next: Option<ContactEnd>,
}

bitflags! {
    #[derive(Copy, Clone, Debug, PartialEq, Eq)]
    pub(crate) struct ContactFlags: u32 {
        /// Used when crawling the contact graph when forming islands.
        const ISLAND = 0x0001;
        /// Set when the shapes are touching.
        const TOUCHING = 0x0002;
        /// This contact can be disabled (by user).
        const ENABLED = 0x0004;
        /// This contact needs filtering because a fixture filter was
        /// changed.
        const FILTER = 0x0008;
        /// This bullet contact had a TOI event.
        const BULLET_HIT = 0x0010;
        /// This contact has a valid cached TOI.
        const TOI = 0x0020;
    }
}

/// The class manages contact between two shapes. A contact exists for each
/// overlapping AABB in the broad-phase (except if filtered). Therefore a
/// contact object may exist that has no actual contact points.
#[derive(Debug)]
pub struct Contact {
    pub(crate) flags: ContactFlags,

    /// One edge per body; `edges[0].other` is body B seen from body A.
    pub(crate) edges: [ContactEdge; 2],

    pub(crate) fixture_a: FixtureId,
    pub(crate) fixture_b: FixtureId,

    pub(crate) child_index_a: usize,
    pub(crate) child_index_b: usize,

    pub(crate) manifold: Manifold,

    pub(crate) toi_count: usize,
    pub(crate) toi: f32,

    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,

    /// Conveyor-belt style surface speed along the tangent, m/s.
    pub(crate) tangent_speed: f32,
}

/// Friction mixing law. The idea is to allow either fixture to drive the
/// friction to zero. For example, anything slides on ice.
#[inline]
pub fn mix_friction(friction1: f32, friction2: f32) -> f32 {
    (friction1 * friction2).sqrt()
}

/// Restitution mixing law. The idea is to allow for anything to bounce off
/// an inelastic surface. For example, a superball bounces on anything.
#[inline]
pub fn mix_restitution(restitution1: f32, restitution2: f32) -> f32 {
    restitution1.max(restitution2)
}

/// Restitution mixing law. This picks the lowest value.
#[inline]
pub fn mix_restitution_threshold(threshold1: f32, threshold2: f32) -> f32 {
    threshold1.min(threshold2)
}

/// Would a contact between these two shape types produce a manifold with
/// this ordering? Returns `Some(swap)` with whether the fixtures must be
/// exchanged to reach the canonical order, or `None` when the pair cannot
/// collide (edges and chains have no interior and never collide with each
/// other).
pub(crate) fn dispatch_order(type_a: ShapeType, type_b: ShapeType) -> Option<bool> {
    use ShapeType::*;
    match (type_a, type_b) {
        (Circle, Circle) | (Polygon, Circle) | (Polygon, Polygon) => Some(false),
        (Edge, Circle) | (Edge, Polygon) | (Chain, Circle) | (Chain, Polygon) => Some(false),
        (Circle, Polygon) | (Circle, Edge) | (Polygon, Edge) | (Circle, Chain)
        | (Polygon, Chain) => Some(true),
        (Edge, Edge) | (Edge, Chain) | (Chain, Edge) | (Chain, Chain) => None,
    }
}

impl Contact {
    pub(crate) fn new(
        fixture_a: FixtureId,
        child_index_a: usize,
        fixture_b: FixtureId,
        child_index_b: usize,
        fixtures: &Pool<FixtureId, Fixture>,
    ) -> Self {
        let fa = &fixtures[fixture_a];
        let fb = &fixtures[fixture_b];
        Self {
            flags: ContactFlags::ENABLED,
            edges: [
                ContactEdge {
                    other: fb.body,
                    prev: None,
                    next: None,
                },
                ContactEdge {
                    other: fa.body,
                    prev: None,
                    next: None,
                },
            ],
            fixture_a,
            fixture_b,
            child_index_a,
            child_index_b,
            manifold: Manifold::default(),
            toi_count: 0,
            toi: 1.0,
            friction: mix_friction(fa.friction, fb.friction),
            restitution: mix_restitution(fa.restitution, fb.restitution),
            restitution_threshold: mix_restitution_threshold(
                fa.restitution_threshold,
                fb.restitution_threshold,
            ),
            tangent_speed: 0.0,
        }
    }

    /// Get the contact manifold. Do not modify the manifold unless you
    /// understand the internals of the solver.
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    pub fn fixture_a(&self) -> FixtureId {
        self.fixture_a
    }

    pub fn fixture_b(&self) -> FixtureId {
        self.fixture_b
    }

    pub fn child_index_a(&self) -> usize {
        self.child_index_a
    }

    pub fn child_index_b(&self) -> usize {
        self.child_index_b
    }

    /// Is this contact touching?
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    /// Enable/disable this contact. This can be used inside the pre-solve
    /// contact listener. The contact is only disabled for the current time
    /// step (or sub-step in continuous collisions).
    pub fn set_enabled(&mut self, flag: bool) {
        if flag {
            self.flags |= ContactFlags::ENABLED;
        } else {
            self.flags.remove(ContactFlags::ENABLED);
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    /// Override the default friction mixture. This value persists until
    /// set or reset.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    pub fn reset_friction(&mut self, fixtures: &Pool<FixtureId, Fixture>) {
        self.friction = mix_friction(
            fixtures[self.fixture_a].friction,
            fixtures[self.fixture_b].friction,
        );
    }

    /// Override the default restitution mixture. This value persists until
    /// set or reset.
    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn reset_restitution(&mut self, fixtures: &Pool<FixtureId, Fixture>) {
        self.restitution = mix_restitution(
            fixtures[self.fixture_a].restitution,
            fixtures[self.fixture_b].restitution,
        );
    }

    pub fn set_tangent_speed(&mut self, speed: f32) {
        self.tangent_speed = speed;
    }

    pub fn tangent_speed(&self) -> f32 {
        self.tangent_speed
    }

    pub(crate) fn flag_for_filtering(&mut self) {
        self.flags |= ContactFlags::FILTER;
    }

    pub(crate) fn body_a(&self) -> BodyId {
        self.edges[1].other
    }

    pub(crate) fn body_b(&self) -> BodyId {
        self.edges[0].other
    }

    pub(crate) fn info(&self, id: ContactId) -> ContactInfo {
        ContactInfo {
            contact: id,
            fixture_a: self.fixture_a,
            fixture_b: self.fixture_b,
            body_a: self.body_a(),
            body_b: self.body_b(),
            child_index_a: self.child_index_a,
            child_index_b: self.child_index_b,
            touching: self.is_touching(),
        }
    }

    /// Run the narrow phase for the current fixture transforms.
    pub(crate) fn evaluate(
        &self,
        fixtures: &Pool<FixtureId, Fixture>,
        xf_a: &crate::math::Transform,
        xf_b: &crate::math::Transform,
    ) -> Manifold {
        let shape_a = &fixtures[self.fixture_a].shape;
        let shape_b = &fixtures[self.fixture_b].shape;

        match (shape_a, shape_b) {
            (Shape::Circle(a), Shape::Circle(b)) => collide::collide_circles(a, xf_a, b, xf_b),
            (Shape::Polygon(a), Shape::Circle(b)) => {
                collide::collide_polygon_and_circle(a, xf_a, b, xf_b)
            }
            (Shape::Polygon(a), Shape::Polygon(b)) => collide::collide_polygons(a, xf_a, b, xf_b),
            (Shape::Edge(a), Shape::Circle(b)) => {
                collide::collide_edge_and_circle(a, xf_a, b, xf_b)
            }
            (Shape::Edge(a), Shape::Polygon(b)) => {
                collide::collide_edge_and_polygon(a, xf_a, b, xf_b)
            }
            (Shape::Chain(chain), Shape::Circle(b)) => {
                let edge = chain.get_child_edge(self.child_index_a);
                collide::collide_edge_and_circle(&edge, xf_a, b, xf_b)
            }
            (Shape::Chain(chain), Shape::Polygon(b)) => {
                let edge = chain.get_child_edge(self.child_index_a);
                collide::collide_edge_and_polygon(&edge, xf_a, b, xf_b)
            }
            _ => unreachable!("contact created for a non-colliding shape pair"),
        }
    }

    /// Update the contact manifold and touching status and fire the
    /// matching listener events. Sensors produce no manifold.
    pub(crate) fn update(
        &mut self,
        self_id: ContactId,
        bodies: &mut Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
        listener: &mut Option<Box<dyn ContactListener>>,
    ) {
        let old_manifold = self.manifold;

        // Re-enable this contact.
        self.flags |= ContactFlags::ENABLED;

        let was_touching = self.flags.contains(ContactFlags::TOUCHING);

        let sensor_a = fixtures[self.fixture_a].is_sensor;
        let sensor_b = fixtures[self.fixture_b].is_sensor;
        let sensor = sensor_a || sensor_b;

        let body_a_id = self.body_a();
        let body_b_id = self.body_b();
        let xf_a = bodies[body_a_id].transform();
        let xf_b = bodies[body_b_id].transform();

        let touching;
        if sensor {
            let shape_a = &fixtures[self.fixture_a].shape;
            let shape_b = &fixtures[self.fixture_b].shape;
            touching = test_overlap(
                shape_a,
                self.child_index_a,
                shape_b,
                self.child_index_b,
                &xf_a,
                &xf_b,
            );

            // Sensors don't generate manifolds.
            self.manifold.point_count = 0;
        } else {
            self.manifold = self.evaluate(fixtures, &xf_a, &xf_b);
            touching = self.manifold.point_count > 0;

            // Match old contact ids to new contact ids and copy the
            // stored impulses to warm start the solver.
            for i in 0..self.manifold.point_count {
                let mp2 = &mut self.manifold.points[i];
                mp2.normal_impulse = 0.0;
                mp2.tangent_impulse = 0.0;

                for mp1 in old_manifold.points.iter().take(old_manifold.point_count) {
                    if mp1.id == mp2.id {
                        mp2.normal_impulse = mp1.normal_impulse;
                        mp2.tangent_impulse = mp1.tangent_impulse;
                        break;
                    }
                }
            }

            if touching != was_touching {
                bodies[body_a_id].set_awake(true);
                bodies[body_b_id].set_awake(true);
            }
        }

        if touching {
            self.flags |= ContactFlags::TOUCHING;
        } else {
            self.flags.remove(ContactFlags::TOUCHING);
        }

        if let Some(listener) = listener {
            if !was_touching && touching {
                listener.begin_contact(&self.info(self_id));
            }
            if was_touching && !touching {
                listener.end_contact(&self.info(self_id));
            }
            if !sensor && touching {
                let mut enabled = self.is_enabled();
                listener.pre_solve(&self.info(self_id), &old_manifold, &mut enabled);
                self.set_enabled(enabled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn mixing_rules() {
        assert_relative_eq!(mix_friction(0.5, 0.5), 0.5);
        assert_relative_eq!(mix_friction(0.0, 1.0), 0.0);
        assert_relative_eq!(mix_restitution(0.2, 0.9), 0.9);
        assert_relative_eq!(mix_restitution_threshold(1.0, 0.5), 0.5);
    }

    #[test]
    fn edge_pairs_never_collide() {
        use ShapeType::*;
        assert_eq!(dispatch_order(Edge, Edge), None);
        assert_eq!(dispatch_order(Chain, Chain), None);
        assert_eq!(dispatch_order(Circle, Polygon), Some(true));
        assert_eq!(dispatch_order(Polygon, Circle), Some(false));
    }
}
