use crate::collision::{Aabb, RayCastInput, RayCastOutput};
use crate::common::{MAX_POLYGON_VERTICES, POLYGON_RADIUS};
use crate::math::{Transform, Vec2};

/// Holds the mass data computed for a shape.
#[derive(Copy, Clone, Debug, Default)]
pub struct MassData {
    /// The mass of the shape, usually in kilograms.
    pub mass: f32,

    /// The position of the shape's centroid relative to the shape's origin.
    pub center: Vec2,

    /// The rotational inertia of the shape about the local origin.
    pub inertia: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ShapeType {
    Circle,
    Edge,
    Polygon,
    Chain,
}

/// A solid circle shape, centered at `position` in the parent body's frame.
#[derive(Clone, Debug)]
pub struct CircleShape {
    pub radius: f32,
    pub position: Vec2,
}

impl CircleShape {
    pub fn new(radius: f32) -> Self {
        Self {
            radius,
            position: Vec2::ZERO,
        }
    }
}

/// A line segment (edge) shape. These can be connected in chains or loops
/// to other edge shapes. Edges are one-sided when ghost vertices are
/// present: collision only registers on the side of the outward normal.
#[derive(Clone, Debug)]
pub struct EdgeShape {
    pub vertex1: Vec2,
    pub vertex2: Vec2,
    /// Optional adjacent vertices used for smooth chain collision.
    pub vertex0: Option<Vec2>,
    pub vertex3: Option<Vec2>,
}

impl EdgeShape {
    pub fn new(v1: Vec2, v2: Vec2) -> Self {
        Self {
            vertex1: v1,
            vertex2: v2,
            vertex0: None,
            vertex3: None,
        }
    }
}

/// A solid convex polygon. Vertices are in counter-clockwise order and the
/// interior must be to the left of each edge. At most
/// [`MAX_POLYGON_VERTICES`] vertices.
#[derive(Clone, Debug)]
pub struct PolygonShape {
    pub centroid: Vec2,
    pub vertices: [Vec2; MAX_POLYGON_VERTICES],
    pub normals: [Vec2; MAX_POLYGON_VERTICES],
    pub count: usize,
}

impl PolygonShape {
    pub fn new() -> Self {
        Self {
            centroid: Vec2::ZERO,
            vertices: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            normals: [Vec2::ZERO; MAX_POLYGON_VERTICES],
            count: 0,
        }
    }

    /// Build vertices to represent an axis-aligned box centered on the
    /// local origin. `hx` and `hy` are the half-width and half-height.
    pub fn set_as_box(&mut self, hx: f32, hy: f32) {
        self.count = 4;
        self.vertices[0] = Vec2::new(-hx, -hy);
        self.vertices[1] = Vec2::new(hx, -hy);
        self.vertices[2] = Vec2::new(hx, hy);
        self.vertices[3] = Vec2::new(-hx, hy);
        self.normals[0] = Vec2::new(0.0, -1.0);
        self.normals[1] = Vec2::new(1.0, 0.0);
        self.normals[2] = Vec2::new(0.0, 1.0);
        self.normals[3] = Vec2::new(-1.0, 0.0);
        self.centroid = Vec2::ZERO;
    }

    /// Build vertices to represent an oriented box offset from the local
    /// origin.
    pub fn set_as_box_at(&mut self, hx: f32, hy: f32, center: Vec2, angle: f32) {
        self.set_as_box(hx, hy);
        self.centroid = center;

        let xf = Transform::new(center, angle);
        for i in 0..4 {
            self.vertices[i] = xf.mul_vec2(self.vertices[i]);
            self.normals[i] = xf.q * self.normals[i];
        }
    }

    /// Create a convex hull from the given points. Welds vertices closer
    /// than half the linear slop and discards interior points. Returns
    /// false (leaving the shape untouched) when fewer than 3 distinct
    /// vertices survive or the hull degenerates.
    pub fn set(&mut self, points: &[Vec2]) -> bool {
        if points.len() < 3 || points.len() > MAX_POLYGON_VERTICES {
            return false;
        }

        // Perform welding and copy vertices into a local buffer.
        let weld_tolerance_sq = {
            let tol = 0.5 * crate::common::LINEAR_SLOP;
            tol * tol
        };
        let mut ps: Vec<Vec2> = Vec::with_capacity(points.len());
        for &v in points {
            if ps
                .iter()
                .all(|&p| Vec2::distance_squared(p, v) >= weld_tolerance_sq)
            {
                ps.push(v);
            }
        }

        if ps.len() < 3 {
            return false;
        }

        // Find the rightmost point on the hull.
        let mut i0 = 0;
        let mut x0 = ps[0].x;
        for (i, p) in ps.iter().enumerate().skip(1) {
            if p.x > x0 || (p.x == x0 && p.y < ps[i0].y) {
                i0 = i;
                x0 = p.x;
            }
        }

        // Gift wrapping.
        let mut hull = [0usize; MAX_POLYGON_VERTICES];
        let mut m = 0;
        let mut ih = i0;
        loop {
            if m >= MAX_POLYGON_VERTICES {
                return false;
            }
            hull[m] = ih;
            m += 1;

            let mut ie = 0;
            for j in 1..ps.len() {
                if ie == ih {
                    ie = j;
                    continue;
                }

                let r = ps[ie] - ps[hull[m - 1]];
                let v = ps[j] - ps[hull[m - 1]];
                let c = r.cross(v);
                if c < 0.0 {
                    ie = j;
                }
                // Collinear: pick the farther point.
                if c == 0.0 && v.length_squared() > r.length_squared() {
                    ie = j;
                }
            }

            ih = ie;
            if ie == i0 {
                break;
            }
        }

        if m < 3 {
            return false;
        }

        for i in 0..m {
            self.vertices[i] = ps[hull[i]];
        }
        self.count = m;

        // Compute normals. Ensure the edges have non-zero length.
        for i in 0..m {
            let i2 = if i + 1 < m { i + 1 } else { 0 };
            let edge = self.vertices[i2] - self.vertices[i];
            if edge.length_squared() <= f32::EPSILON * f32::EPSILON {
                return false;
            }
            self.normals[i] = edge.cross_scalar(1.0).normalize();
        }

        self.centroid = compute_centroid(&self.vertices[..m]);
        true
    }
}

impl Default for PolygonShape {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_centroid(vs: &[Vec2]) -> Vec2 {
    debug_assert!(vs.len() >= 3);

    let mut c = Vec2::ZERO;
    let mut area = 0.0;

    // Get a reference point inside the polygon for numerical accuracy.
    let origin = vs[0];

    const INV3: f32 = 1.0 / 3.0;

    for i in 1..vs.len() - 1 {
        let e1 = vs[i] - origin;
        let e2 = vs[i + 1] - origin;

        let d = e1.cross(e2);
        let triangle_area = 0.5 * d;
        area += triangle_area;

        // Area-weighted centroid
        c += triangle_area * INV3 * (e1 + e2);
    }

    if area > f32::EPSILON {
        c = origin + (1.0 / area) * c;
    } else {
        c = origin;
    }
    c
}

/// A chain of line segments, used for terrain. Owns its vertices; each
/// consecutive pair is one edge child in the broad-phase.
#[derive(Clone, Debug)]
pub struct ChainShape {
    pub vertices: Vec<Vec2>,
    /// Closed loop chains wrap the last vertex back to the first.
    pub is_loop: bool,
}

impl ChainShape {
    /// An open chain with two ghostless end edges.
    pub fn create_chain(vertices: &[Vec2]) -> Self {
        debug_assert!(vertices.len() >= 2);
        Self {
            vertices: vertices.to_vec(),
            is_loop: false,
        }
    }

    /// A closed loop. The winding order determines the normal direction.
    pub fn create_loop(vertices: &[Vec2]) -> Self {
        debug_assert!(vertices.len() >= 3);
        Self {
            vertices: vertices.to_vec(),
            is_loop: true,
        }
    }

    pub fn edge_count(&self) -> usize {
        if self.is_loop {
            self.vertices.len()
        } else {
            self.vertices.len() - 1
        }
    }

    /// Materialize one child as an edge, including the ghost vertices of
    /// its neighbors.
    pub fn get_child_edge(&self, index: usize) -> EdgeShape {
        debug_assert!(index < self.edge_count());
        let n = self.vertices.len();
        let v1 = self.vertices[index];
        let v2 = self.vertices[(index + 1) % n];

        let mut edge = EdgeShape::new(v1, v2);
        if self.is_loop {
            edge.vertex0 = Some(self.vertices[(index + n - 1) % n]);
            edge.vertex3 = Some(self.vertices[(index + 2) % n]);
        } else {
            if index > 0 {
                edge.vertex0 = Some(self.vertices[index - 1]);
            }
            if index + 2 < n {
                edge.vertex3 = Some(self.vertices[index + 2]);
            }
        }
        edge
    }
}

/// A shape is used for collision detection. Shapes are bound to bodies by
/// fixtures and carry no position data of their own beyond local offsets.
#[derive(Clone, Debug)]
pub enum Shape {
    Circle(CircleShape),
    Edge(EdgeShape),
    Polygon(PolygonShape),
    Chain(ChainShape),
}

impl Shape {
    pub fn shape_type(&self) -> ShapeType {
        match self {
            Shape::Circle(_) => ShapeType::Circle,
            Shape::Edge(_) => ShapeType::Edge,
            Shape::Polygon(_) => ShapeType::Polygon,
            Shape::Chain(_) => ShapeType::Chain,
        }
    }

    /// The shape skin radius used by the solver's clipping tolerances.
    pub fn radius(&self) -> f32 {
        match self {
            Shape::Circle(c) => c.radius,
            _ => POLYGON_RADIUS,
        }
    }

    /// The number of child primitives.
    pub fn child_count(&self) -> usize {
        match self {
            Shape::Chain(chain) => chain.edge_count(),
            _ => 1,
        }
    }

    /// Test a world point for containment. Sensors on edges and chains
    /// never contain points (they have no interior).
    pub fn test_point(&self, xf: &Transform, p: Vec2) -> bool {
        match self {
            Shape::Circle(circle) => {
                let center = xf.mul_vec2(circle.position);
                let d = p - center;
                d.dot(d) <= circle.radius * circle.radius
            }
            Shape::Polygon(poly) => {
                let p_local = xf.mul_t_vec2(p);
                for i in 0..poly.count {
                    let dot = poly.normals[i].dot(p_local - poly.vertices[i]);
                    if dot > 0.0 {
                        return false;
                    }
                }
                true
            }
            Shape::Edge(_) | Shape::Chain(_) => false,
        }
    }

    /// Compute an AABB for a child shape under the given transform.
    pub fn compute_aabb(&self, xf: &Transform, child_index: usize) -> Aabb {
        match self {
            Shape::Circle(circle) => {
                let p = xf.mul_vec2(circle.position);
                let r = Vec2::splat(circle.radius);
                Aabb::new(p - r, p + r)
            }
            Shape::Edge(edge) => edge_aabb(xf, edge.vertex1, edge.vertex2),
            Shape::Polygon(poly) => {
                let mut lower = xf.mul_vec2(poly.vertices[0]);
                let mut upper = lower;
                for i in 1..poly.count {
                    let v = xf.mul_vec2(poly.vertices[i]);
                    lower = lower.min(v);
                    upper = upper.max(v);
                }
                let r = Vec2::splat(POLYGON_RADIUS);
                Aabb::new(lower - r, upper + r)
            }
            Shape::Chain(chain) => {
                let edge = chain.get_child_edge(child_index);
                edge_aabb(xf, edge.vertex1, edge.vertex2)
            }
        }
    }

    /// Compute mass, centroid, and rotational inertia from the density.
    /// Edges and chains carry no mass; attach them to static bodies.
    pub fn compute_mass(&self, density: f32) -> MassData {
        match self {
            Shape::Circle(circle) => {
                let mass = density * std::f32::consts::PI * circle.radius * circle.radius;
                MassData {
                    mass,
                    center: circle.position,
                    // inertia about the local origin
                    inertia: mass
                        * (0.5 * circle.radius * circle.radius
                            + circle.position.dot(circle.position)),
                }
            }
            Shape::Polygon(poly) => polygon_mass(poly, density),
            Shape::Edge(edge) => MassData {
                mass: 0.0,
                center: 0.5 * (edge.vertex1 + edge.vertex2),
                inertia: 0.0,
            },
            Shape::Chain(_) => MassData::default(),
        }
    }

    /// Cast a ray against a child shape.
    pub fn ray_cast(
        &self,
        input: &RayCastInput,
        xf: &Transform,
        child_index: usize,
    ) -> Option<RayCastOutput> {
        match self {
            Shape::Circle(circle) => circle_ray_cast(circle, input, xf),
            Shape::Edge(edge) => edge_ray_cast(edge.vertex1, edge.vertex2, input, xf),
            Shape::Polygon(poly) => polygon_ray_cast(poly, input, xf),
            Shape::Chain(chain) => {
                let edge = chain.get_child_edge(child_index);
                edge_ray_cast(edge.vertex1, edge.vertex2, input, xf)
            }
        }
    }
}

fn edge_aabb(xf: &Transform, v1: Vec2, v2: Vec2) -> Aabb {
    let p1 = xf.mul_vec2(v1);
    let p2 = xf.mul_vec2(v2);
    let r = Vec2::splat(POLYGON_RADIUS);
    Aabb::new(p1.min(p2) - r, p1.max(p2) + r)
}

fn polygon_mass(poly: &PolygonShape, density: f32) -> MassData {
    // A full derivation lives in the usual references; the integrals are
    // evaluated per triangle fan around a reference vertex.
    debug_assert!(poly.count >= 3);

    let mut center = Vec2::ZERO;
    let mut area = 0.0;
    let mut inertia = 0.0;

    let origin = poly.vertices[0];

    const INV3: f32 = 1.0 / 3.0;

    for i in 1..poly.count - 1 {
        let e1 = poly.vertices[i] - origin;
        let e2 = poly.vertices[i + 1] - origin;

        let d = e1.cross(e2);
        let triangle_area = 0.5 * d;
        area += triangle_area;

        center += triangle_area * INV3 * (e1 + e2);

        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;
        inertia += (0.25 * INV3 * d) * (intx2 + inty2);
    }

    let mass = density * area;
    if area > f32::EPSILON {
        center = (1.0 / area) * center;
    }
    let center_world = origin + center;

    // Inertia is relative to the reference vertex; shift to the local
    // origin via the parallel axis theorem.
    let inertia = density * inertia + mass * (center_world.dot(center_world) - center.dot(center));

    MassData {
        mass,
        center: center_world,
        inertia,
    }
}

fn circle_ray_cast(
    circle: &CircleShape,
    input: &RayCastInput,
    xf: &Transform,
) -> Option<RayCastOutput> {
    let position = xf.mul_vec2(circle.position);
    let s = input.p1 - position;
    let b = s.dot(s) - circle.radius * circle.radius;

    // Solve quadratic equation.
    let r = input.p2 - input.p1;
    let c = s.dot(r);
    let rr = r.dot(r);
    let sigma = c * c - rr * b;

    // Check for negative discriminant and short segment.
    if sigma < 0.0 || rr < f32::EPSILON {
        return None;
    }

    // Find the point of intersection of the line with the circle.
    let mut a = -(c + sigma.sqrt());

    // Is the intersection point on the segment?
    if 0.0 <= a && a <= input.max_fraction * rr {
        a /= rr;
        return Some(RayCastOutput {
            fraction: a,
            normal: (s + a * r).normalize(),
        });
    }

    None
}

// p = p1 + t * d
// v = v1 + s * e
// p1 + t * d = v1 + s * e
// s * e - t * d = p1 - v1
fn edge_ray_cast(
    v1: Vec2,
    v2: Vec2,
    input: &RayCastInput,
    xf: &Transform,
) -> Option<RayCastOutput> {
    // Put the ray into the edge's frame of reference.
    let p1 = xf.q.mul_t_vec2(input.p1 - xf.p);
    let p2 = xf.q.mul_t_vec2(input.p2 - xf.p);
    let d = p2 - p1;

    let e = v2 - v1;

    // Normal points to the right, looking from v1 at v2
    let normal = Vec2::new(e.y, -e.x).normalize();

    // q = p1 + t * d
    // dot(normal, q - v1) = 0
    // dot(normal, p1 - v1) + t * dot(normal, d) = 0
    let numerator = normal.dot(v1 - p1);
    let denominator = normal.dot(d);

    if denominator == 0.0 {
        return None;
    }

    let t = numerator / denominator;
    if t < 0.0 || input.max_fraction < t {
        return None;
    }

    let q = p1 + t * d;

    // q = v1 + s * r, with r = v2 - v1
    let rr = e.dot(e);
    if rr == 0.0 {
        return None;
    }
    let s = (q - v1).dot(e) / rr;
    if s < 0.0 || 1.0 < s {
        return None;
    }

    let normal = if numerator > 0.0 {
        -(xf.q * normal)
    } else {
        xf.q * normal
    };

    Some(RayCastOutput {
        fraction: t,
        normal,
    })
}

fn polygon_ray_cast(
    poly: &PolygonShape,
    input: &RayCastInput,
    xf: &Transform,
) -> Option<RayCastOutput> {
    // Put the ray into the polygon's frame of reference.
    let p1 = xf.q.mul_t_vec2(input.p1 - xf.p);
    let p2 = xf.q.mul_t_vec2(input.p2 - xf.p);
    let d = p2 - p1;

    let mut lower = 0.0;
    let mut upper = input.max_fraction;

    let mut index = None;

    for i in 0..poly.count {
        // p = p1 + a * d
        // dot(normal_i, p - v_i) = 0
        // dot(normal_i, p1 - v_i) + a * dot(normal_i, d) = 0
        let numerator = poly.normals[i].dot(poly.vertices[i] - p1);
        let denominator = poly.normals[i].dot(d);

        if denominator == 0.0 {
            if numerator < 0.0 {
                return None;
            }
        } else {
            // Note: we want this predicate without division:
            // lower < numerator / denominator, where denominator < 0
            // Since denominator < 0, we have to flip the inequality:
            // lower < numerator / denominator <==> denominator * lower > numerator.
            if denominator < 0.0 && numerator < lower * denominator {
                // Increase lower.
                // The segment enters this half-space.
                lower = numerator / denominator;
                index = Some(i);
            } else if denominator > 0.0 && numerator < upper * denominator {
                // Decrease upper.
                // The segment exits this half-space.
                upper = numerator / denominator;
            }
        }

        if upper < lower {
            return None;
        }
    }

    debug_assert!(0.0 <= lower && lower <= input.max_fraction);

    index.map(|i| RayCastOutput {
        fraction: lower,
        normal: xf.q * poly.normals[i],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn box_mass_matches_closed_form() {
        let mut poly = PolygonShape::new();
        poly.set_as_box(1.0, 2.0);
        let md = Shape::Polygon(poly).compute_mass(3.0);
        // 2x4 box at density 3: m = 24, I = m(w^2+h^2)/12 about centroid.
        assert_relative_eq!(md.mass, 24.0, epsilon = 1e-4);
        assert_relative_eq!(md.center.x, 0.0, epsilon = 1e-5);
        assert_relative_eq!(md.inertia, 24.0 * (4.0 + 16.0) / 12.0, epsilon = 1e-3);
    }

    #[test]
    fn hull_discards_interior_points() {
        let mut poly = PolygonShape::new();
        let ok = poly.set(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(2.0, 0.0),
            Vec2::new(1.0, 0.5), // interior
            Vec2::new(2.0, 2.0),
            Vec2::new(0.0, 2.0),
        ]);
        assert!(ok);
        assert_eq!(poly.count, 4);
    }

    #[test]
    fn degenerate_hull_is_rejected() {
        let mut poly = PolygonShape::new();
        let ok = poly.set(&[Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(2.0, 0.0)]);
        assert!(!ok);
    }

    #[test]
    fn circle_ray_cast_front_face() {
        let circle = CircleShape::new(1.0);
        let shape = Shape::Circle(circle);
        let input = RayCastInput {
            p1: Vec2::new(-3.0, 0.0),
            p2: Vec2::new(3.0, 0.0),
            max_fraction: 1.0,
        };
        let out = shape.ray_cast(&input, &Transform::IDENTITY, 0).unwrap();
        assert_relative_eq!(out.fraction, 2.0 / 6.0, epsilon = 1e-5);
        assert_relative_eq!(out.normal.x, -1.0, epsilon = 1e-5);
    }

    #[test]
    fn chain_children_share_vertices() {
        let chain = ChainShape::create_chain(&[
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(2.0, 1.0),
        ]);
        assert_eq!(chain.edge_count(), 2);
        let e0 = chain.get_child_edge(0);
        let e1 = chain.get_child_edge(1);
        assert_eq!(e0.vertex2, e1.vertex1);
        assert_eq!(e0.vertex3, Some(Vec2::new(2.0, 1.0)));
        assert_eq!(e1.vertex0, Some(Vec2::new(0.0, 0.0)));
    }
}
