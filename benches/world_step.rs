use criterion::{criterion_group, criterion_main, Criterion};
use pulse2d::{BodyDef, BodyType, FixtureDef, PolygonShape, Shape, Vec2, World};

fn build_pyramid(base: usize) -> World {
    let mut world = World::new(Vec2::new(0.0, -10.0));

    let mut ground_def = BodyDef::new();
    ground_def.position = Vec2::new(0.0, -10.0);
    let ground = world.create_body(&ground_def).unwrap();
    let mut ground_box = PolygonShape::new();
    ground_box.set_as_box(100.0, 10.0);
    world
        .create_fixture(ground, &FixtureDef::new(Shape::Polygon(ground_box)))
        .unwrap();

    let mut shape = PolygonShape::new();
    shape.set_as_box(0.5, 0.5);

    for row in 0..base {
        let count = base - row;
        let y = 0.55 + 1.1 * row as f32;
        for i in 0..count {
            let x = 1.1 * (i as f32 - 0.5 * (count - 1) as f32);
            let mut def = BodyDef::new();
            def.body_type = BodyType::Dynamic;
            def.position = Vec2::new(x, y);
            let body = world.create_body(&def).unwrap();
            let mut fixture = FixtureDef::new(Shape::Polygon(shape.clone()));
            fixture.density = 1.0;
            fixture.friction = 0.3;
            world.create_fixture(body, &fixture).unwrap();
        }
    }

    world
}

fn bench_step(c: &mut Criterion) {
    c.bench_function("pyramid_10_step", |b| {
        let mut world = build_pyramid(10);
        // Warm up so the benchmark measures steady-state stepping.
        for _ in 0..30 {
            world.step(1.0 / 60.0, 8, 3);
            world.clear_forces();
        }
        b.iter(|| {
            world.step(1.0 / 60.0, 8, 3);
            world.clear_forces();
        });
    });
}

criterion_group!(benches, bench_step);
criterion_main!(benches);
