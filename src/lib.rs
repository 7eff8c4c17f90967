//! pulse2d is a 2D rigid body physics engine: bodies carry fixtures,
//! joints constrain body pairs, and [`world::World::step`] advances time
//! with a sequential-impulse constraint solver, contact islands, sleep
//! management, and conservative-advancement continuous collision for fast
//! bodies.
//!
//! ```
//! use pulse2d::{BodyDef, BodyType, FixtureDef, PolygonShape, Shape, Vec2, World};
//!
//! let mut world = World::new(Vec2::new(0.0, -10.0));
//!
//! let mut ground_box = PolygonShape::new();
//! ground_box.set_as_box(50.0, 10.0);
//! let mut ground_def = BodyDef::new();
//! ground_def.position = Vec2::new(0.0, -10.0);
//! let ground = world.create_body(&ground_def).unwrap();
//! world
//!     .create_fixture(ground, &FixtureDef::new(Shape::Polygon(ground_box)))
//!     .unwrap();
//!
//! let mut body_def = BodyDef::new();
//! body_def.body_type = BodyType::Dynamic;
//! body_def.position = Vec2::new(0.0, 4.0);
//! let body = world.create_body(&body_def).unwrap();
//! let mut dynamic_box = PolygonShape::new();
//! dynamic_box.set_as_box(1.0, 1.0);
//! let mut fixture_def = FixtureDef::new(Shape::Polygon(dynamic_box));
//! fixture_def.density = 1.0;
//! fixture_def.friction = 0.3;
//! world.create_fixture(body, &fixture_def).unwrap();
//!
//! for _ in 0..60 {
//!     world.step(1.0 / 60.0, 8, 3);
//!     world.clear_forces();
//! }
//! assert!(world.body(body).position().y < 4.0);
//! ```

pub mod body;
pub mod broad_phase;
pub mod collide;
pub mod collision;
pub mod common;
pub mod contact;
pub mod contact_manager;
pub mod contact_solver;
pub mod distance;
pub mod dynamic_tree;
pub mod error;
pub mod fixture;
pub mod island;
pub mod joint;
pub mod math;
pub mod pool;
pub mod settings;
pub mod shape;
pub mod time_of_impact;
pub mod time_step;
pub mod world;
pub mod world_callbacks;

pub use body::{Body, BodyDef, BodyId, BodyType};
pub use collision::{Aabb, Manifold, ManifoldType, RayCastInput, RayCastOutput, WorldManifold};
pub use contact::{Contact, ContactId};
pub use error::WorldError;
pub use fixture::{Filter, Fixture, FixtureDef, FixtureId};
pub use joint::{
    DistanceJointDef, FrictionJointDef, GearJointDef, Joint, JointDef, JointId, JointKind,
    JointType, MotorJointDef, MouseJointDef, PrismaticJointDef, PulleyJointDef, RevoluteJointDef,
    RopeJointDef, WeldJointDef, WheelJointDef,
};
pub use math::{Mat2x2, Mat3x3, Rot, Sweep, Transform, Vec2, Vec3};
pub use shape::{ChainShape, CircleShape, EdgeShape, MassData, PolygonShape, Shape, ShapeType};
pub use world::World;
pub use world_callbacks::{
    ContactFilter, ContactImpulse, ContactInfo, ContactListener, DestructionListener,
};
