//! Listener and filter interfaces the world reports through.
//!
//! Implementations must not mutate the world from inside a callback; the
//! world is locked during a step and mutation entry points return
//! [`crate::error::WorldError::Locked`]. Buffer your intent and apply it
//! after the step returns.

use crate::body::BodyId;
use crate::collision::Manifold;
use crate::common::MAX_MANIFOLD_POINTS;
use crate::contact::ContactId;
use crate::fixture::FixtureId;
use crate::fixture::Filter;
use crate::joint::JointId;

/// A snapshot describing the contact a callback refers to. Do not hold on
/// to it past the callback; the ids may dangle after this step.
#[derive(Copy, Clone, Debug)]
pub struct ContactInfo {
    pub contact: ContactId,
    pub fixture_a: FixtureId,
    pub fixture_b: FixtureId,
    pub body_a: BodyId,
    pub body_b: BodyId,
    pub child_index_a: usize,
    pub child_index_b: usize,
    pub touching: bool,
}

/// Contact impulses for reporting. Impulses are used instead of forces
/// because sub-step forces may approach infinity for rigid body collisions.
/// These match up one-to-one with the manifold points.
#[derive(Copy, Clone, Debug, Default)]
pub struct ContactImpulse {
    pub normal_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub tangent_impulses: [f32; MAX_MANIFOLD_POINTS],
    pub count: usize,
}

/// Implement this trait to get contact information. You can use these
/// results for things like sounds and game logic. You can also get contact
/// results by traversing the contact list after the time step.
///
/// Callbacks fire inside the time step, so the world is locked: do not
/// create or destroy entities from a callback.
pub trait ContactListener {
    /// Called when two fixtures begin to touch.
    fn begin_contact(&mut self, _contact: &ContactInfo) {}

    /// Called when two fixtures cease to touch. This may fire outside a
    /// step when a touching contact is destroyed, for instance by
    /// destroying one of its bodies.
    fn end_contact(&mut self, _contact: &ContactInfo) {}

    /// This is called after a contact is updated, before it goes to the
    /// solver. This allows you to inspect the old manifold and, by setting
    /// `enabled` to false, disable the contact for the current sub-step
    /// only (it is re-enabled on the next narrow-phase update).
    /// May fire multiple times per step during continuous collision.
    fn pre_solve(&mut self, _contact: &ContactInfo, _old_manifold: &Manifold, _enabled: &mut bool) {
    }

    /// Lets you inspect the accumulated impulses after the velocity solve.
    fn post_solve(&mut self, _contact: &ContactInfo, _impulse: &ContactImpulse) {}
}

/// Implement this trait to provide custom fixture-pair admission on top of
/// the hard rules (same body, body types, joint `collide_connected`).
pub trait ContactFilter {
    /// Return true if contact calculations should be performed between
    /// these two fixtures.
    /// This is called when a pair's AABBs start to overlap, not per step.
    fn should_collide(&self, filter_a: &Filter, filter_b: &Filter) -> bool {
        default_should_collide(filter_a, filter_b)
    }
}

/// Group index wins when both fixtures are in the same non-zero group;
/// otherwise the category/mask bits decide.
pub fn default_should_collide(filter_a: &Filter, filter_b: &Filter) -> bool {
    if filter_a.group_index == filter_b.group_index && filter_a.group_index != 0 {
        return filter_a.group_index > 0;
    }

    (filter_a.mask_bits & filter_b.category_bits) != 0
        && (filter_a.category_bits & filter_b.mask_bits) != 0
}

/// The stock filter: pure category/mask/group logic.
pub struct DefaultContactFilter;

impl ContactFilter for DefaultContactFilter {}

/// Destroying a body cascades into its joints and touching contacts. This
/// listener lets you drop your own handles before they dangle.
pub trait DestructionListener {
    /// Called when a joint is about to be destroyed due to the destruction
    /// of one of its attached bodies, or because a gear joint lost one of
    /// its referent joints.
    fn joint_destroyed(&mut self, _joint: JointId) {}

    /// Called when a fixture is about to be destroyed due to the
    /// destruction of its body.
    fn fixture_destroyed(&mut self, _fixture: FixtureId) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_index_overrides_masks() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.group_index = -3;
        b.group_index = -3;
        // Masks would pass, but the shared negative group forbids.
        assert!(!default_should_collide(&a, &b));

        a.group_index = 3;
        b.group_index = 3;
        // Shared positive group collides even with disjoint masks.
        a.mask_bits = 0;
        assert!(default_should_collide(&a, &b));
    }

    #[test]
    fn masks_must_accept_both_ways() {
        let mut a = Filter::default();
        let mut b = Filter::default();
        a.category_bits = 0x0002;
        b.mask_bits = 0x0001; // does not accept category 2
        assert!(!default_should_collide(&a, &b));
        b.mask_bits = 0x0003;
        assert!(default_should_collide(&a, &b));
    }
}
