//! Joint behavior under stepping: motors, limits, length constraints, and
//! the gear-referent destruction contract.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use pulse2d::{
    BodyDef, BodyId, BodyType, CircleShape, DestructionListener, DistanceJointDef, FixtureDef,
    GearJointDef, JointDef, JointId, JointKind, MotorJointDef, MouseJointDef, PolygonShape,
    PrismaticJointDef, RevoluteJointDef, RopeJointDef, Shape, Vec2, WeldJointDef, World,
    WorldError,
};

const DT: f32 = 1.0 / 60.0;

fn box_shape(hx: f32, hy: f32) -> Shape {
    let mut poly = PolygonShape::new();
    poly.set_as_box(hx, hy);
    Shape::Polygon(poly)
}

fn static_body(world: &mut World, position: Vec2) -> BodyId {
    let mut def = BodyDef::new();
    def.position = position;
    world.create_body(&def).unwrap()
}

fn dynamic_circle(world: &mut World, position: Vec2, radius: f32) -> BodyId {
    let mut def = BodyDef::new();
    def.body_type = BodyType::Dynamic;
    def.position = position;
    let body = world.create_body(&def).unwrap();
    let mut fixture = FixtureDef::new(Shape::Circle(CircleShape::new(radius)));
    fixture.density = 1.0;
    world.create_fixture(body, &fixture).unwrap();
    body
}

fn dynamic_box(world: &mut World, position: Vec2, hx: f32, hy: f32) -> BodyId {
    let mut def = BodyDef::new();
    def.body_type = BodyType::Dynamic;
    def.position = position;
    let body = world.create_body(&def).unwrap();
    let mut fixture = FixtureDef::new(box_shape(hx, hy));
    fixture.density = 1.0;
    world.create_fixture(body, &fixture).unwrap();
    body
}

#[test]
fn revolute_motor_tracks_commanded_speed() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = static_body(&mut world, Vec2::ZERO);
    let disk = dynamic_circle(&mut world, Vec2::ZERO, 0.5);

    let mut def = RevoluteJointDef::initialize(&world, ground, disk, Vec2::ZERO);
    def.enable_motor = true;
    def.motor_speed = std::f32::consts::PI;
    def.max_motor_torque = 100.0;
    world.create_joint(&JointDef::Revolute(def)).unwrap();

    // 4 seconds of simulation.
    for _ in 0..240 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let angle = world.body(disk).angle();
    assert!(
        (angle - 4.0 * std::f32::consts::PI).abs() < 0.05,
        "joint angle {} after 4s",
        angle
    );
}

#[test]
fn revolute_limit_stops_rotation() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = static_body(&mut world, Vec2::ZERO);
    // A pendulum arm whose weight would swing it far past the limit.
    let arm = dynamic_box(&mut world, Vec2::new(1.0, 0.0), 1.0, 0.1);

    let mut def = RevoluteJointDef::initialize(&world, ground, arm, Vec2::ZERO);
    def.enable_limit = true;
    def.lower_angle = -0.25;
    def.upper_angle = 0.25;
    world.create_joint(&JointDef::Revolute(def)).unwrap();

    for _ in 0..240 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let angle = world.body(arm).angle();
    assert!(angle >= -0.3 && angle <= 0.3, "angle {} escaped limits", angle);
}

#[test]
fn distance_joint_holds_its_length() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let anchor = static_body(&mut world, Vec2::new(0.0, 10.0));
    let bob = dynamic_circle(&mut world, Vec2::new(0.0, 7.0), 0.3);

    let def =
        DistanceJointDef::initialize(&world, anchor, bob, Vec2::new(0.0, 10.0), Vec2::new(0.0, 7.0));
    world.create_joint(&JointDef::Distance(def)).unwrap();

    // Kick it sideways and let it swing.
    world.body_mut(bob).set_linear_velocity(Vec2::new(5.0, 0.0));

    for _ in 0..300 {
        world.step(DT, 8, 3);
        world.clear_forces();
        let d = Vec2::distance(world.body(bob).position(), Vec2::new(0.0, 10.0));
        assert!((d - 3.0).abs() < 0.1, "rod length drifted to {}", d);
    }
}

#[test]
fn prismatic_limits_confine_translation() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ground = static_body(&mut world, Vec2::ZERO);
    let slider = dynamic_box(&mut world, Vec2::ZERO, 0.5, 0.5);

    // Vertical axis: gravity pulls the slider into the lower limit.
    let mut def =
        PrismaticJointDef::initialize(&world, ground, slider, Vec2::ZERO, Vec2::new(0.0, 1.0));
    def.enable_limit = true;
    def.lower_translation = -2.0;
    def.upper_translation = 0.5;
    world.create_joint(&JointDef::Prismatic(def)).unwrap();

    for _ in 0..240 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let body = world.body(slider);
    assert_relative_eq!(body.position().x, 0.0, epsilon = 1e-3);
    assert!(
        body.position().y > -2.1 && body.position().y < -1.9,
        "slider rests at {}",
        body.position().y
    );
}

#[test]
fn prismatic_motor_drives_translation() {
    let mut world = World::new(Vec2::ZERO);
    let ground = static_body(&mut world, Vec2::ZERO);
    let slider = dynamic_box(&mut world, Vec2::ZERO, 0.5, 0.5);

    let mut def =
        PrismaticJointDef::initialize(&world, ground, slider, Vec2::ZERO, Vec2::new(1.0, 0.0));
    def.enable_motor = true;
    def.motor_speed = 1.0;
    def.max_motor_force = 100.0;
    world.create_joint(&JointDef::Prismatic(def)).unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    // Two seconds at 1 m/s.
    assert_relative_eq!(world.body(slider).position().x, 2.0, epsilon = 0.05);
    assert_relative_eq!(world.body(slider).position().y, 0.0, epsilon = 1e-3);
}

#[test]
fn rope_joint_caps_the_distance() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let anchor = static_body(&mut world, Vec2::new(0.0, 10.0));
    let bob = dynamic_circle(&mut world, Vec2::new(0.0, 9.0), 0.3);

    let mut def = RopeJointDef::new(anchor, bob);
    def.local_anchor_a = Vec2::ZERO;
    def.local_anchor_b = Vec2::ZERO;
    def.max_length = 3.0;
    world.create_joint(&JointDef::Rope(def)).unwrap();

    for _ in 0..300 {
        world.step(DT, 8, 3);
        world.clear_forces();
        let d = Vec2::distance(world.body(bob).position(), Vec2::new(0.0, 10.0));
        assert!(d < 3.1, "rope stretched to {}", d);
    }

    // It should end up hanging at full extension.
    let d = Vec2::distance(world.body(bob).position(), Vec2::new(0.0, 10.0));
    assert!((d - 3.0).abs() < 0.1, "hanging length {}", d);
}

#[test]
fn weld_joint_keeps_relative_pose() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let base = dynamic_box(&mut world, Vec2::new(0.0, 5.0), 1.0, 0.25);
    let tip = dynamic_box(&mut world, Vec2::new(2.0, 5.0), 1.0, 0.25);

    let def = WeldJointDef::initialize(&world, base, tip, Vec2::new(1.0, 5.0));
    world.create_joint(&JointDef::Weld(def)).unwrap();

    // Free fall with a shared spin: the weld transmits it rigidly enough.
    world.body_mut(base).set_angular_velocity(1.0);

    for _ in 0..60 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let offset = world.body(tip).position() - world.body(base).position();
    assert_relative_eq!(offset.length(), 2.0, epsilon = 0.1);
    let relative_angle = world.body(tip).angle() - world.body(base).angle();
    assert!(relative_angle.abs() < 0.1, "weld twisted by {relative_angle}");
}

#[test]
fn pulley_trades_length_by_the_ratio() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let ga = Vec2::new(-2.0, 10.0);
    let gb = Vec2::new(2.0, 10.0);

    // The left body is heavier, so it descends and hoists the right one.
    let left = dynamic_box(&mut world, Vec2::new(-2.0, 5.0), 0.8, 0.8);
    let right = dynamic_box(&mut world, Vec2::new(2.0, 5.0), 0.4, 0.4);

    let def = pulley_def(&world, left, right, ga, gb);
    world.create_joint(&JointDef::Pulley(def)).unwrap();

    let total0 = pulley_total(&world, left, right, ga, gb);

    for _ in 0..180 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let total = pulley_total(&world, left, right, ga, gb);
    assert_relative_eq!(total, total0, epsilon = 0.1);
    assert!(world.body(left).position().y < 5.0 - 0.2);
    assert!(world.body(right).position().y > 5.0 + 0.2);
}

fn pulley_def(
    world: &World,
    left: BodyId,
    right: BodyId,
    ga: Vec2,
    gb: Vec2,
) -> pulse2d::PulleyJointDef {
    pulse2d::PulleyJointDef::initialize(
        world,
        left,
        right,
        ga,
        gb,
        world.body(left).position(),
        world.body(right).position(),
        1.0,
    )
}

fn pulley_total(world: &World, left: BodyId, right: BodyId, ga: Vec2, gb: Vec2) -> f32 {
    Vec2::distance(world.body(left).position(), ga)
        + Vec2::distance(world.body(right).position(), gb)
}

#[test]
fn gear_couples_two_revolute_joints() {
    let mut world = World::new(Vec2::ZERO);
    let ground = static_body(&mut world, Vec2::ZERO);
    let wheel_a = dynamic_circle(&mut world, Vec2::new(-1.0, 0.0), 0.5);
    let wheel_b = dynamic_circle(&mut world, Vec2::new(1.0, 0.0), 0.5);

    let mut def_a = RevoluteJointDef::initialize(&world, ground, wheel_a, Vec2::new(-1.0, 0.0));
    def_a.enable_motor = true;
    def_a.motor_speed = 2.0;
    def_a.max_motor_torque = 50.0;
    let joint_a = world.create_joint(&JointDef::Revolute(def_a)).unwrap();

    let def_b = RevoluteJointDef::initialize(&world, ground, wheel_b, Vec2::new(1.0, 0.0));
    let joint_b = world.create_joint(&JointDef::Revolute(def_b)).unwrap();

    let mut gear = GearJointDef::new(joint_a, joint_b);
    gear.ratio = 2.0;
    world.create_joint(&JointDef::Gear(gear)).unwrap();

    for _ in 0..120 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    // angle_a + ratio * angle_b stays at its initial value (zero).
    let constraint = world.body(wheel_a).angle() + 2.0 * world.body(wheel_b).angle();
    assert!(constraint.abs() < 0.05, "gear constraint drifted to {constraint}");
    assert!(world.body(wheel_a).angle() > 1.0);
}

struct GearWatcher {
    destroyed: Rc<RefCell<Vec<JointId>>>,
}

impl DestructionListener for GearWatcher {
    fn joint_destroyed(&mut self, joint: JointId) {
        self.destroyed.borrow_mut().push(joint);
    }
}

#[test]
fn destroying_a_referent_joint_destroys_the_gear_first() {
    let mut world = World::new(Vec2::ZERO);
    let destroyed = Rc::new(RefCell::new(Vec::new()));
    world.set_destruction_listener(Box::new(GearWatcher {
        destroyed: destroyed.clone(),
    }));

    let ground = static_body(&mut world, Vec2::ZERO);
    let wheel_a = dynamic_circle(&mut world, Vec2::new(-1.0, 0.0), 0.5);
    let wheel_b = dynamic_circle(&mut world, Vec2::new(1.0, 0.0), 0.5);

    let joint_a = world
        .create_joint(&JointDef::Revolute(RevoluteJointDef::initialize(
            &world,
            ground,
            wheel_a,
            Vec2::new(-1.0, 0.0),
        )))
        .unwrap();
    let joint_b = world
        .create_joint(&JointDef::Revolute(RevoluteJointDef::initialize(
            &world,
            ground,
            wheel_b,
            Vec2::new(1.0, 0.0),
        )))
        .unwrap();
    let gear = world
        .create_joint(&JointDef::Gear(GearJointDef::new(joint_a, joint_b)))
        .unwrap();

    // Destroying a referent takes the dependent gear with it, reported
    // before the pool slot is reused.
    world.destroy_joint(joint_a).unwrap();
    assert_eq!(destroyed.borrow().as_slice(), &[gear]);
    assert_eq!(world.joint_count(), 1);

    // The remaining joint is untouched and still destroyable.
    world.destroy_joint(joint_b).unwrap();
    assert_eq!(world.joint_count(), 0);

    // The world keeps stepping cleanly afterwards.
    for _ in 0..10 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }
}

#[test]
fn mouse_joint_drags_body_to_target() {
    let mut world = World::new(Vec2::ZERO);
    let ground = static_body(&mut world, Vec2::ZERO);
    let body = dynamic_box(&mut world, Vec2::ZERO, 0.5, 0.5);

    let mut def = MouseJointDef::new(ground, body);
    def.target = Vec2::ZERO;
    def.max_force = 1000.0;
    let joint = world.create_joint(&JointDef::Mouse(def)).unwrap();

    if let JointKind::Mouse(mouse) = world.joint_mut(joint).kind_mut() {
        mouse.set_target(Vec2::new(3.0, 2.0));
    } else {
        panic!("expected a mouse joint");
    }

    for _ in 0..180 {
        world.body_mut(body).set_awake(true);
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let p = world.body(body).position();
    assert!(
        Vec2::distance(p, Vec2::new(3.0, 2.0)) < 0.1,
        "body ended at {:?}",
        p
    );
}

#[test]
fn motor_joint_drives_toward_offset_pose() {
    let mut world = World::new(Vec2::ZERO);
    let ground = static_body(&mut world, Vec2::ZERO);
    let body = dynamic_box(&mut world, Vec2::ZERO, 0.5, 0.5);

    let mut def = MotorJointDef::initialize(&world, ground, body);
    def.linear_offset = Vec2::new(2.0, 1.0);
    def.angular_offset = 0.5;
    def.max_force = 500.0;
    def.max_torque = 500.0;
    world.create_joint(&JointDef::Motor(def)).unwrap();

    for _ in 0..300 {
        world.body_mut(body).set_awake(true);
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let p = world.body(body).position();
    assert!(Vec2::distance(p, Vec2::new(2.0, 1.0)) < 0.1, "pose at {:?}", p);
    assert!((world.body(body).angle() - 0.5).abs() < 0.1);
}

#[test]
fn joint_on_one_body_is_rejected() {
    let mut world = World::new(Vec2::ZERO);
    let body = dynamic_box(&mut world, Vec2::ZERO, 0.5, 0.5);

    let def = DistanceJointDef::new(body, body);
    let err = world.create_joint(&JointDef::Distance(def)).unwrap_err();
    assert!(matches!(err, WorldError::InvalidArgument(_)));
}

#[test]
fn collide_connected_false_suppresses_contact() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let a = dynamic_circle(&mut world, Vec2::new(0.0, 0.0), 0.5);
    let b = dynamic_circle(&mut world, Vec2::new(0.0, 0.8), 0.5);

    // Overlapping circles pinned together with a non-colliding joint.
    let mut def = DistanceJointDef::new(a, b);
    def.length = 0.8;
    def.collide_connected = false;
    world.create_joint(&JointDef::Distance(def)).unwrap();

    for _ in 0..60 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    // Despite overlapping radii (1.0 combined > 0.8 apart), no contact
    // pushes them apart.
    let d = Vec2::distance(world.body(a).position(), world.body(b).position());
    assert!((d - 0.8).abs() < 0.05, "connected pair separated to {}", d);
}
