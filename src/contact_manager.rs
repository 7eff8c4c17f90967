use crate::body::{Body, BodyId, BodyType};
use crate::broad_phase::BroadPhase;
use crate::contact::{dispatch_order, Contact, ContactEnd, ContactFlags, ContactId};
use crate::fixture::{Fixture, FixtureId, ProxyRef};
use crate::joint::{Joint, JointId};
use crate::pool::Pool;
use crate::world_callbacks::{ContactFilter, ContactListener, DefaultContactFilter};

/// Owns the broad-phase and the contact pool. Creates contacts when AABBs
/// begin to overlap, runs the narrow phase between steps, and destroys
/// contacts whose AABBs separate.
pub struct ContactManager {
    pub(crate) broad_phase: BroadPhase<ProxyRef>,
    pub(crate) contacts: Pool<ContactId, Contact>,
    pub(crate) contact_filter: Box<dyn ContactFilter>,
    pub(crate) contact_listener: Option<Box<dyn ContactListener>>,
}

/// Joints with `collide_connected == false` suppress contacts between the
/// bodies they connect. At least one body must be dynamic for any contact.
pub(crate) fn should_collide_bodies(
    bodies: &Pool<BodyId, Body>,
    joints: &Pool<JointId, Joint>,
    body_a: BodyId,
    body_b: BodyId,
) -> bool {
    if bodies[body_a].body_type != BodyType::Dynamic
        && bodies[body_b].body_type != BodyType::Dynamic
    {
        return false;
    }

    // Does a joint prevent collision?
    let mut edge = bodies[body_b].joint_list;
    while let Some(end) = edge {
        let joint = &joints[end.joint];
        let e = &joint.edges[end.end];
        if e.other == body_a && !joint.collide_connected {
            return false;
        }
        edge = e.next;
    }

    true
}

impl ContactManager {
    pub fn new() -> Self {
        Self {
            broad_phase: BroadPhase::new(),
            contacts: Pool::new(),
            contact_filter: Box::new(DefaultContactFilter),
            contact_listener: None,
        }
    }

    /// Broad-phase callback for a freshly overlapping proxy pair.
    fn add_pair(
        contacts: &mut Pool<ContactId, Contact>,
        bodies: &mut Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
        joints: &Pool<JointId, Joint>,
        contact_filter: &dyn ContactFilter,
        proxy_a: ProxyRef,
        proxy_b: ProxyRef,
    ) {
        let fixture_a = proxy_a.fixture;
        let fixture_b = proxy_b.fixture;
        let child_a = proxy_a.child_index;
        let child_b = proxy_b.child_index;

        let body_a = fixtures[fixture_a].body;
        let body_b = fixtures[fixture_b].body;

        // Are the fixtures on the same body?
        if body_a == body_b {
            return;
        }

        // Does a contact already exist? Walk body B's contact edges; both
        // orders count as a duplicate.
        let mut edge = bodies[body_b].contact_list;
        while let Some(end) = edge {
            let contact = &contacts[end.contact];
            let e = &contact.edges[end.end];
            if e.other == body_a {
                let f_a = contact.fixture_a;
                let f_b = contact.fixture_b;
                let i_a = contact.child_index_a;
                let i_b = contact.child_index_b;

                if f_a == fixture_a && f_b == fixture_b && i_a == child_a && i_b == child_b {
                    return;
                }
                if f_a == fixture_b && f_b == fixture_a && i_a == child_b && i_b == child_a {
                    return;
                }
            }
            edge = e.next;
        }

        // Does a joint override collision? Is at least one body dynamic?
        if !should_collide_bodies(bodies, joints, body_a, body_b) {
            return;
        }

        // Check user filtering.
        if !contact_filter.should_collide(&fixtures[fixture_a].filter, &fixtures[fixture_b].filter)
        {
            return;
        }

        // The dispatch table decides the canonical fixture order and
        // rejects pairs that cannot produce a manifold.
        let type_a = fixtures[fixture_a].shape.shape_type();
        let type_b = fixtures[fixture_b].shape.shape_type();
        let swap = match dispatch_order(type_a, type_b) {
            Some(swap) => swap,
            None => return,
        };

        let (fixture_a, child_a, fixture_b, child_b) = if swap {
            (fixture_b, child_b, fixture_a, child_a)
        } else {
            (fixture_a, child_a, fixture_b, child_b)
        };

        let contact = Contact::new(fixture_a, child_a, fixture_b, child_b, fixtures);
        let id = contacts.insert(contact);
        Self::link(contacts, bodies, id);

        // Wake up touching-capable pairs so the solver revisits them.
        if !fixtures[fixture_a].is_sensor && !fixtures[fixture_b].is_sensor {
            bodies[contacts[id].body_a()].set_awake(true);
            bodies[contacts[id].body_b()].set_awake(true);
        }
    }

    /// Connect the contact's two edges into its bodies' intrusive lists
    /// (prepend, like every other linkage here).
    fn link(contacts: &mut Pool<ContactId, Contact>, bodies: &mut Pool<BodyId, Body>, id: ContactId) {
        let body_a = contacts[id].body_a();
        let body_b = contacts[id].body_b();

        for (end, body) in [(0usize, body_a), (1usize, body_b)] {
            let head = bodies[body].contact_list;
            contacts[id].edges[end].prev = None;
            contacts[id].edges[end].next = head;
            if let Some(head) = head {
                contacts[head.contact].edges[head.end].prev = Some(ContactEnd { contact: id, end });
            }
            bodies[body].contact_list = Some(ContactEnd { contact: id, end });
        }
    }

    fn unlink(
        contacts: &mut Pool<ContactId, Contact>,
        bodies: &mut Pool<BodyId, Body>,
        id: ContactId,
    ) {
        let body_a = contacts[id].body_a();
        let body_b = contacts[id].body_b();

        for (end, body) in [(0usize, body_a), (1usize, body_b)] {
            let edge = contacts[id].edges[end];
            if let Some(prev) = edge.prev {
                contacts[prev.contact].edges[prev.end].next = edge.next;
            } else {
                bodies[body].contact_list = edge.next;
            }
            if let Some(next) = edge.next {
                contacts[next.contact].edges[next.end].prev = edge.prev;
            }
        }
    }

    /// Destroy a contact, firing `end_contact` if it was touching.
    pub(crate) fn destroy(&mut self, id: ContactId, bodies: &mut Pool<BodyId, Body>) {
        if self.contacts[id].is_touching() {
            if let Some(listener) = &mut self.contact_listener {
                listener.end_contact(&self.contacts[id].info(id));
            }
            // The pair is separating; give the solver a chance to settle
            // whatever they were resting on.
            bodies[self.contacts[id].body_a()].set_awake(true);
            bodies[self.contacts[id].body_b()].set_awake(true);
        }

        Self::unlink(&mut self.contacts, bodies, id);
        self.contacts.remove(id);
    }

    /// Ask the broad-phase for newly overlapping pairs and create contacts
    /// for them.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
        joints: &Pool<JointId, Joint>,
    ) {
        let contacts = &mut self.contacts;
        let contact_filter = self.contact_filter.as_ref();
        self.broad_phase.update_pairs(|proxy_a, proxy_b| {
            Self::add_pair(
                contacts,
                bodies,
                fixtures,
                joints,
                contact_filter,
                proxy_a,
                proxy_b,
            );
        });
    }

    /// This is the top level collision call for the time step. Here all
    /// the narrow phase collision is processed for the world contact list.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut Pool<BodyId, Body>,
        fixtures: &Pool<FixtureId, Fixture>,
        joints: &Pool<JointId, Joint>,
    ) {
        // Update awake contacts.
        for id in self.contacts.keys() {
            let (fixture_a, fixture_b, child_a, child_b, body_a, body_b) = {
                let c = &self.contacts[id];
                (
                    c.fixture_a,
                    c.fixture_b,
                    c.child_index_a,
                    c.child_index_b,
                    c.body_a(),
                    c.body_b(),
                )
            };

            // Is this contact flagged for filtering?
            if self.contacts[id].flags.contains(ContactFlags::FILTER) {
                // Should these bodies collide?
                if !should_collide_bodies(bodies, joints, body_a, body_b) {
                    self.destroy(id, bodies);
                    continue;
                }

                // Check user filtering.
                if !self
                    .contact_filter
                    .should_collide(&fixtures[fixture_a].filter, &fixtures[fixture_b].filter)
                {
                    self.destroy(id, bodies);
                    continue;
                }

                // Clear the filtering flag.
                self.contacts[id].flags.remove(ContactFlags::FILTER);
            }

            let active_a =
                bodies[body_a].is_awake() && bodies[body_a].body_type != BodyType::Static;
            let active_b =
                bodies[body_b].is_awake() && bodies[body_b].body_type != BodyType::Static;

            // At least one body must be awake and it must be dynamic or
            // kinematic.
            if !active_a && !active_b {
                continue;
            }

            let proxy_id_a = fixtures[fixture_a].proxies[child_a].proxy_id;
            let proxy_id_b = fixtures[fixture_b].proxies[child_b].proxy_id;
            let overlap = self.broad_phase.test_overlap(proxy_id_a, proxy_id_b);

            // Here we destroy contacts that cease to overlap in the
            // broad-phase.
            if !overlap {
                self.destroy(id, bodies);
                continue;
            }

            // The contact persists.
            self.contacts[id].update(id, bodies, fixtures, &mut self.contact_listener);
        }
    }

    /// Destroy every contact attached to a body. Used by body destruction
    /// and disabling.
    pub(crate) fn destroy_body_contacts(
        &mut self,
        bodies: &mut Pool<BodyId, Body>,
        body: BodyId,
    ) {
        while let Some(end) = bodies[body].contact_list {
            self.destroy(end.contact, bodies);
        }
    }

    /// Flag this fixture's contacts for re-filtering on the next step.
    /// `body` is the fixture's owner; its edge list bounds the walk.
    pub(crate) fn flag_contacts_for_filtering(
        &mut self,
        bodies: &Pool<BodyId, Body>,
        body: BodyId,
        fixture: FixtureId,
    ) {
        let mut edge = bodies[body].contact_list;
        while let Some(end) = edge {
            let c = &mut self.contacts[end.contact];
            if c.fixture_a == fixture || c.fixture_b == fixture {
                c.flag_for_filtering();
            }
            edge = c.edges[end.end].next;
        }
    }
}

impl Default for ContactManager {
    fn default() -> Self {
        Self::new()
    }
}
