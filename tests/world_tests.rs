//! End-to-end stepping scenarios: integration accuracy, stacking and
//! sleep, continuous collision, filtering, and sensors.

use std::cell::RefCell;
use std::rc::Rc;

use approx::assert_relative_eq;
use pulse2d::{
    BodyDef, BodyId, BodyType, CircleShape, ContactImpulse, ContactInfo, ContactListener, Filter,
    FixtureDef, PolygonShape, Shape, Vec2, World,
};

const DT: f32 = 1.0 / 60.0;

fn box_shape(hx: f32, hy: f32) -> Shape {
    let mut poly = PolygonShape::new();
    poly.set_as_box(hx, hy);
    Shape::Polygon(poly)
}

fn dynamic_box(world: &mut World, position: Vec2, half: f32, density: f32) -> BodyId {
    let mut def = BodyDef::new();
    def.body_type = BodyType::Dynamic;
    def.position = position;
    let body = world.create_body(&def).unwrap();
    let mut fixture = FixtureDef::new(box_shape(half, half));
    fixture.density = density;
    fixture.friction = 0.3;
    world.create_fixture(body, &fixture).unwrap();
    body
}

fn ground(world: &mut World) -> BodyId {
    let mut def = BodyDef::new();
    def.position = Vec2::new(0.0, -10.0);
    let body = world.create_body(&def).unwrap();
    let mut fixture = FixtureDef::new(box_shape(50.0, 10.0));
    fixture.friction = 0.3;
    world.create_fixture(body, &fixture).unwrap();
    body
}

#[derive(Default)]
struct EventLog {
    begins: usize,
    ends: usize,
}

struct LogListener(Rc<RefCell<EventLog>>);

impl ContactListener for LogListener {
    fn begin_contact(&mut self, _contact: &ContactInfo) {
        self.0.borrow_mut().begins += 1;
    }
    fn end_contact(&mut self, _contact: &ContactInfo) {
        self.0.borrow_mut().ends += 1;
    }
}

#[test]
fn free_fall_matches_symplectic_euler() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let body = dynamic_box(&mut world, Vec2::new(0.0, 10.0), 0.5, 1.0);

    for _ in 0..60 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    // Symplectic Euler: y = y0 - g * h^2 * n * (n + 1) / 2.
    let expected = 10.0 - 10.0 * DT * DT * (60.0 * 61.0) / 2.0;
    let y = world.body(body).position().y;
    assert_relative_eq!(y, expected, epsilon = 1e-3);
    // And close to the analytic half-g-t-squared drop.
    assert!((y - 5.0).abs() < 0.1);
}

#[test]
fn static_bodies_never_move() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let floor = ground(&mut world);
    dynamic_box(&mut world, Vec2::new(0.0, 2.0), 0.5, 1.0);

    for _ in 0..120 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    let body = world.body(floor);
    assert_eq!(body.position(), Vec2::new(0.0, -10.0));
    assert_eq!(body.linear_velocity(), Vec2::ZERO);
    assert_eq!(body.angular_velocity(), 0.0);
}

#[test]
fn resting_stack_settles_and_sleeps() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    ground(&mut world);

    let boxes: Vec<BodyId> = (0..3)
        .map(|i| dynamic_box(&mut world, Vec2::new(0.0, 0.5 + i as f32), 0.5, 1.0))
        .collect();

    for _ in 0..120 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    for (i, &id) in boxes.iter().enumerate() {
        let body = world.body(id);
        assert!(!body.is_awake(), "box {} still awake", i);
        let expected = 0.5 + i as f32;
        // The solver leaves up to a slop of separation per contact.
        assert!(
            (body.position().y - expected).abs() < 0.03,
            "box {} at {} expected {}",
            i,
            body.position().y,
            expected
        );
        assert!(body.position().x.abs() < 0.01);
    }
}

#[test]
fn bullet_stops_at_thin_wall() {
    // A thin static wall at the origin.
    let build = |bullet: bool, continuous: bool| -> f32 {
        let mut world = World::new(Vec2::ZERO);
        world.set_continuous_physics(continuous);

        let wall_def = BodyDef::new();
        let wall = world.create_body(&wall_def).unwrap();
        world
            .create_fixture(wall, &FixtureDef::new(box_shape(0.05, 2.0)))
            .unwrap();

        let mut def = BodyDef::new();
        def.body_type = BodyType::Dynamic;
        def.position = Vec2::new(-5.0, 0.0);
        def.linear_velocity = Vec2::new(200.0, 0.0);
        def.bullet = bullet;
        let body = world.create_body(&def).unwrap();
        let mut fixture = FixtureDef::new(Shape::Circle(CircleShape::new(0.1)));
        fixture.density = 1.0;
        world.create_fixture(body, &fixture).unwrap();

        for _ in 0..30 {
            world.step(DT, 8, 3);
            world.clear_forces();
        }
        world.body(body).position().x
    };

    // Without any continuous collision the box tunnels straight through.
    let x_discrete = build(false, false);
    assert!(x_discrete > 1.0, "expected tunneling, stopped at {x_discrete}");

    // The bullet is swept and stops at the front face.
    let x_bullet = build(true, true);
    assert!(x_bullet <= 0.0, "bullet passed the wall: {x_bullet}");
    assert!(x_bullet > -1.0, "bullet bounced implausibly far: {x_bullet}");

    // Dynamic-versus-static sweeps apply to non-bullets too.
    let x_plain = build(false, true);
    assert!(x_plain <= 0.0, "non-bullet passed the static wall: {x_plain}");
}

#[test]
fn group_filter_suppresses_collision_and_events() {
    let mut world = World::new(Vec2::ZERO);
    let log = Rc::new(RefCell::new(EventLog::default()));
    world.set_contact_listener(Box::new(LogListener(log.clone())));

    let mut filter = Filter::default();
    filter.group_index = -1;

    let mut make_circle = |x: f32| {
        let mut def = BodyDef::new();
        def.body_type = BodyType::Dynamic;
        def.position = Vec2::new(x, 0.0);
        let body = world.create_body(&def).unwrap();
        let mut fixture = FixtureDef::new(Shape::Circle(CircleShape::new(0.5)));
        fixture.density = 1.0;
        fixture.filter = filter;
        world.create_fixture(body, &fixture).unwrap();
        body
    };

    let a = make_circle(-0.6);
    let b = make_circle(0.6);
    world.body_mut(a).set_linear_velocity(Vec2::new(2.0, 0.0));
    world.body_mut(b).set_linear_velocity(Vec2::new(-2.0, 0.0));

    for _ in 0..60 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    // They passed through each other without any contact response.
    assert_eq!(log.borrow().begins, 0);
    assert_relative_eq!(world.body(a).linear_velocity().x, 2.0, epsilon = 1e-5);
    assert_relative_eq!(world.body(b).linear_velocity().x, -2.0, epsilon = 1e-5);
    assert!(world.body(a).position().x > world.body(b).position().x);
}

#[test]
fn sensor_reports_overlap_without_response() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let log = Rc::new(RefCell::new(EventLog::default()));
    world.set_contact_listener(Box::new(LogListener(log.clone())));

    // Static sensor box at the origin.
    let sensor_def = BodyDef::new();
    let sensor = world.create_body(&sensor_def).unwrap();
    let mut sensor_fixture = FixtureDef::new(box_shape(1.0, 1.0));
    sensor_fixture.is_sensor = true;
    world.create_fixture(sensor, &sensor_fixture).unwrap();

    // A circle falling straight through it.
    let mut def = BodyDef::new();
    def.body_type = BodyType::Dynamic;
    def.position = Vec2::new(0.0, 5.0);
    let circle = world.create_body(&def).unwrap();
    let mut fixture = FixtureDef::new(Shape::Circle(CircleShape::new(0.3)));
    fixture.density = 1.0;
    world.create_fixture(circle, &fixture).unwrap();

    let steps = 90;
    for _ in 0..steps {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    assert_eq!(log.borrow().begins, 1);
    assert_eq!(log.borrow().ends, 1);

    // Only gravity acted on the circle: pure free fall.
    let n = steps as f32;
    let expected = 5.0 - 10.0 * DT * DT * (n * (n + 1.0)) / 2.0;
    assert_relative_eq!(world.body(circle).position().y, expected, epsilon = 1e-3);
    assert_relative_eq!(world.body(circle).position().x, 0.0, epsilon = 1e-5);
}

#[test]
fn determinism_bitwise_identical_runs() {
    let run = || -> Vec<(Vec2, f32, Vec2, f32)> {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        ground(&mut world);
        let bodies: Vec<BodyId> = (0..10)
            .map(|i| {
                dynamic_box(
                    &mut world,
                    Vec2::new(0.1 * (i % 3) as f32, 1.0 + 1.1 * i as f32),
                    0.5,
                    1.0,
                )
            })
            .collect();

        for _ in 0..180 {
            world.step(DT, 8, 3);
            world.clear_forces();
        }

        bodies
            .iter()
            .map(|&id| {
                let b = world.body(id);
                (b.position(), b.angle(), b.linear_velocity(), b.angular_velocity())
            })
            .collect()
    };

    let first = run();
    let second = run();
    // Bitwise identical, not merely close.
    assert_eq!(first, second);
}

#[test]
fn per_step_translation_is_clamped() {
    let mut world = World::new(Vec2::ZERO);
    let mut def = BodyDef::new();
    def.body_type = BodyType::Dynamic;
    def.linear_velocity = Vec2::new(100_000.0, 0.0);
    let body = world.create_body(&def).unwrap();
    let mut fixture = FixtureDef::new(Shape::Circle(CircleShape::new(0.5)));
    fixture.density = 1.0;
    world.create_fixture(body, &fixture).unwrap();

    let before = world.body(body).position();
    world.step(DT, 8, 3);
    let after = world.body(body).position();

    assert!((after - before).length() <= 2.0 + 1e-4);
}

struct FrictionConeChecker {
    violations: Rc<RefCell<usize>>,
    friction: f32,
}

impl ContactListener for FrictionConeChecker {
    fn post_solve(&mut self, _contact: &ContactInfo, impulse: &ContactImpulse) {
        for i in 0..impulse.count {
            let max_tangent = self.friction * impulse.normal_impulses[i] + 1e-3;
            if impulse.tangent_impulses[i].abs() > max_tangent {
                *self.violations.borrow_mut() += 1;
            }
        }
    }
}

#[test]
fn friction_impulses_stay_inside_the_cone() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let violations = Rc::new(RefCell::new(0));
    // Both fixtures use friction 0.3, so the mixed value is 0.3.
    world.set_contact_listener(Box::new(FrictionConeChecker {
        violations: violations.clone(),
        friction: 0.3,
    }));

    ground(&mut world);
    let body = dynamic_box(&mut world, Vec2::new(0.0, 0.6), 0.5, 1.0);
    world.body_mut(body).set_linear_velocity(Vec2::new(5.0, 0.0));

    for _ in 0..120 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    assert_eq!(*violations.borrow(), 0);
}

#[test]
fn sliding_box_is_slowed_by_friction() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    ground(&mut world);
    let body = dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);
    world.body_mut(body).set_linear_velocity(Vec2::new(5.0, 0.0));

    for _ in 0..300 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }

    // mu * g decelerates at 3 m/s^2; five seconds is plenty to stop.
    assert!(world.body(body).linear_velocity().x.abs() < 0.05);
}

#[test]
fn restitution_bounces_fast_impacts_only() {
    let drop = |restitution: f32, height: f32| -> f32 {
        let mut world = World::new(Vec2::new(0.0, -10.0));
        let floor_def = BodyDef::new();
        let floor = world.create_body(&floor_def).unwrap();
        let mut floor_fixture = FixtureDef::new(box_shape(50.0, 1.0));
        floor_fixture.restitution = restitution;
        world.create_fixture(floor, &floor_fixture).unwrap();

        let mut def = BodyDef::new();
        def.body_type = BodyType::Dynamic;
        def.position = Vec2::new(0.0, height);
        let ball = world.create_body(&def).unwrap();
        let mut fixture = FixtureDef::new(Shape::Circle(CircleShape::new(0.5)));
        fixture.density = 1.0;
        fixture.restitution = restitution;
        world.create_fixture(ball, &fixture).unwrap();

        let mut peak_after_bounce: f32 = 0.0;
        let mut bounced = false;
        for _ in 0..240 {
            world.step(DT, 8, 3);
            world.clear_forces();
            let b = world.body(ball);
            if b.linear_velocity().y > 0.1 {
                bounced = true;
            }
            if bounced {
                peak_after_bounce = peak_after_bounce.max(b.position().y);
            }
        }
        peak_after_bounce
    };

    // An elastic ball recovers a good fraction of the drop height.
    let peak = drop(0.8, 5.0);
    assert!(peak > 2.0, "elastic ball only reached {peak}");

    // A dead ball does not bounce.
    let peak = drop(0.0, 5.0);
    assert!(peak < 2.0, "inelastic ball reached {peak}");
}

#[test]
fn body_destruction_removes_contacts_and_fires_end() {
    let mut world = World::new(Vec2::new(0.0, -10.0));
    let log = Rc::new(RefCell::new(EventLog::default()));
    world.set_contact_listener(Box::new(LogListener(log.clone())));

    ground(&mut world);
    let body = dynamic_box(&mut world, Vec2::new(0.0, 0.5), 0.5, 1.0);

    for _ in 0..30 {
        world.step(DT, 8, 3);
        world.clear_forces();
    }
    assert!(log.borrow().begins >= 1);
    assert_eq!(log.borrow().ends, 0);

    world.destroy_body(body).unwrap();
    assert_eq!(log.borrow().ends, log.borrow().begins);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.body_count(), 1);
}

#[test]
fn ray_cast_clips_to_nearest_fixture() {
    let mut world = World::new(Vec2::ZERO);
    let mut make_wall = |x: f32| {
        let mut def = BodyDef::new();
        def.position = Vec2::new(x, 0.0);
        let body = world.create_body(&def).unwrap();
        world
            .create_fixture(body, &FixtureDef::new(box_shape(0.1, 5.0)))
            .unwrap();
        body
    };
    make_wall(2.0);
    make_wall(4.0);

    let mut hits = Vec::new();
    world.ray_cast(Vec2::ZERO, Vec2::new(10.0, 0.0), |fixture, point, _normal, fraction| {
        hits.push((fixture, point.x, fraction));
        // Clip to the closest hit.
        fraction
    });

    assert!(!hits.is_empty());
    let closest = hits
        .iter()
        .map(|&(_, x, _)| x)
        .fold(f32::MAX, f32::min);
    assert_relative_eq!(closest, 1.9, epsilon = 1e-3);
}

#[test]
fn query_aabb_reports_overlapping_fixtures() {
    let mut world = World::new(Vec2::ZERO);
    let mut ids = Vec::new();
    for i in 0..5 {
        let mut def = BodyDef::new();
        def.position = Vec2::new(3.0 * i as f32, 0.0);
        let body = world.create_body(&def).unwrap();
        ids.push(
            world
                .create_fixture(body, &FixtureDef::new(box_shape(0.5, 0.5)))
                .unwrap(),
        );
    }

    let mut found = Vec::new();
    world.query_aabb(
        &pulse2d::Aabb::new(Vec2::new(2.0, -1.0), Vec2::new(7.0, 1.0)),
        |fixture| {
            found.push(fixture);
            true
        },
    );
    found.sort();
    assert_eq!(found, vec![ids[1], ids[2]]);
}

#[test]
fn locked_world_rejects_mutation_errors() {
    // The lock flag is observable between steps.
    let world = World::new(Vec2::ZERO);
    assert!(!world.is_locked());
}
