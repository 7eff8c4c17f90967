use crate::body::BodyId;
use crate::broad_phase::BroadPhase;
use crate::collision::Aabb;
use crate::math::Transform;
use crate::pool::PoolKey;
use crate::settings::LENGTH_UNITS_PER_METER;
use crate::shape::{MassData, Shape};

/// A handle to a fixture stored in the world.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureId(pub(crate) u32);

impl PoolKey for FixtureId {
    fn index(self) -> usize {
        self.0 as usize
    }
    fn from_index(index: usize) -> Self {
        FixtureId(index as u32)
    }
}

/// This holds contact filtering data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Filter {
    /// The collision category bits. Normally you would just set one bit.
    pub category_bits: u16,
    /// The collision mask bits. This states the categories that this shape
    /// would accept for collision.
    pub mask_bits: u16,
    /// Collision groups allow a certain group of objects to never collide
    /// (negative) or always collide (positive). Zero means no collision
    /// group. Non-zero group filtering always wins against the mask bits.
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Self {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

/// A fixture definition is used to create a fixture. You can reuse fixture
/// definitions safely.
#[derive(Clone, Debug)]
pub struct FixtureDef {
    /// The shape, cloned into the fixture.
    pub shape: Shape,
    /// The density, usually in kg/m^2.
    pub density: f32,
    /// The friction coefficient, usually in the range [0,1].
    pub friction: f32,
    /// The restitution (elasticity) usually in the range [0,1].
    pub restitution: f32,
    /// Restitution velocity threshold, usually in m/s. Collisions above this
    /// speed have restitution applied (will bounce).
    pub restitution_threshold: f32,
    /// A sensor shape collects contact information but never generates a
    /// collision response.
    pub is_sensor: bool,
    /// Contact filtering data.
    pub filter: Filter,
    /// Use this to store application specific fixture data.
    pub user_data: u64,
}

impl FixtureDef {
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            density: 0.0,
            friction: 0.2,
            restitution: 0.0,
            restitution_threshold: 1.0 * LENGTH_UNITS_PER_METER,
            is_sensor: false,
            filter: Filter::default(),
            user_data: 0,
        }
    }
}

/// This proxy is used internally to connect fixtures to the broad-phase.
#[derive(Debug, Clone, Copy)]
pub(crate) struct FixtureProxy {
    pub aabb: Aabb,
    pub child_index: usize,
    pub proxy_id: usize,
}

/// The broad-phase user data: one per fixture child.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub(crate) struct ProxyRef {
    pub fixture: FixtureId,
    pub child_index: usize,
}

/// A fixture binds a shape to a body and adds material properties such as
/// friction and restitution. Fixtures are created via
/// `World::create_fixture` and die with their body.
#[derive(Debug)]
pub struct Fixture {
    pub(crate) body: BodyId,
    pub(crate) shape: Shape,
    pub(crate) density: f32,
    pub(crate) friction: f32,
    pub(crate) restitution: f32,
    pub(crate) restitution_threshold: f32,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxies: Vec<FixtureProxy>,
    pub user_data: u64,
}

impl Fixture {
    pub(crate) fn new(def: &FixtureDef, body: BodyId) -> Self {
        Self {
            body,
            shape: def.shape.clone(),
            density: def.density,
            friction: def.friction,
            restitution: def.restitution,
            restitution_threshold: def.restitution_threshold,
            is_sensor: def.is_sensor,
            filter: def.filter,
            proxies: Vec::new(),
            user_data: def.user_data,
        }
    }

    pub fn body(&self) -> BodyId {
        self.body
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// Flag the fixture as a sensor or not. A sensor reports overlap but
    /// never produces a collision response.
    pub fn set_sensor(&mut self, sensor: bool) {
        self.is_sensor = sensor;
    }

    pub fn filter_data(&self) -> Filter {
        self.filter
    }

    pub fn friction(&self) -> f32 {
        self.friction
    }

    /// This will not update the friction of existing contacts; use
    /// `Contact::reset_friction` for that.
    pub fn set_friction(&mut self, friction: f32) {
        self.friction = friction;
    }

    pub fn restitution(&self) -> f32 {
        self.restitution
    }

    pub fn set_restitution(&mut self, restitution: f32) {
        self.restitution = restitution;
    }

    pub fn density(&self) -> f32 {
        self.density
    }

    /// Setting the density does not automatically adjust the mass of the
    /// body; call `World::reset_mass_data(body)` afterwards.
    pub fn set_density(&mut self, density: f32) {
        debug_assert!(density.is_finite() && density >= 0.0);
        self.density = density;
    }

    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// The fat AABB of one proxy. Only valid while the fixture is
    /// registered with the broad-phase.
    pub fn aabb(&self, child_index: usize) -> Aabb {
        self.proxies[child_index].aabb
    }

    /// These support body activation/deactivation.
    pub(crate) fn create_proxies(
        &mut self,
        broad_phase: &mut BroadPhase<ProxyRef>,
        xf: &Transform,
        self_id: FixtureId,
    ) {
        debug_assert!(self.proxies.is_empty());

        // Create proxies in the broad-phase.
        for child_index in 0..self.shape.child_count() {
            let aabb = self.shape.compute_aabb(xf, child_index);
            let proxy_id = broad_phase.create_proxy(
                &aabb,
                ProxyRef {
                    fixture: self_id,
                    child_index,
                },
            );
            self.proxies.push(FixtureProxy {
                aabb,
                child_index,
                proxy_id,
            });
        }
    }

    pub(crate) fn destroy_proxies(&mut self, broad_phase: &mut BroadPhase<ProxyRef>) {
        for proxy in self.proxies.drain(..) {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase<ProxyRef>,
        transform1: &Transform,
        transform2: &Transform,
    ) {
        for proxy in self.proxies.iter_mut() {
            // Compute an AABB that covers the swept shape (may miss some
            // rotation effect).
            let aabb1 = self.shape.compute_aabb(transform1, proxy.child_index);
            let aabb2 = self.shape.compute_aabb(transform2, proxy.child_index);

            proxy.aabb = aabb1.combine(&aabb2);

            let displacement = aabb2.center() - aabb1.center();

            broad_phase.move_proxy(proxy.proxy_id, &proxy.aabb, displacement);
        }
    }

    /// Force the broad-phase to revisit this fixture's pairs after a
    /// filter change.
    pub(crate) fn refilter_proxies(&mut self, broad_phase: &mut BroadPhase<ProxyRef>) {
        for proxy in self.proxies.iter() {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }
}
