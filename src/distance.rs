//! GJK distance between convex shapes, with simplex caching for warm
//! starts across conservative-advancement iterations.

use crate::math::{Transform, Vec2};
use crate::shape::Shape;

/// A distance proxy is used by the GJK algorithm. It encapsulates any
/// convex shape child as a point cloud with a skin radius.
#[derive(Clone, Debug)]
pub struct DistanceProxy {
    pub vertices: Vec<Vec2>,
    pub radius: f32,
}

impl DistanceProxy {
    /// Initialize the proxy from a shape child.
    pub fn new(shape: &Shape, child_index: usize) -> Self {
        match shape {
            Shape::Circle(circle) => Self {
                vertices: vec![circle.position],
                radius: circle.radius,
            },
            Shape::Polygon(poly) => Self {
                vertices: poly.vertices[..poly.count].to_vec(),
                radius: shape.radius(),
            },
            Shape::Edge(edge) => Self {
                vertices: vec![edge.vertex1, edge.vertex2],
                radius: shape.radius(),
            },
            Shape::Chain(chain) => {
                let edge = chain.get_child_edge(child_index);
                Self {
                    vertices: vec![edge.vertex1, edge.vertex2],
                    radius: shape.radius(),
                }
            }
        }
    }

    /// Get the supporting vertex index in the given direction.
    pub fn get_support(&self, d: Vec2) -> usize {
        let mut best_index = 0;
        let mut best_value = self.vertices[0].dot(d);
        for (i, v) in self.vertices.iter().enumerate().skip(1) {
            let value = v.dot(d);
            if value > best_value {
                best_index = i;
                best_value = value;
            }
        }
        best_index
    }

    #[inline]
    pub fn vertex(&self, index: usize) -> Vec2 {
        self.vertices[index]
    }

    #[inline]
    pub fn count(&self) -> usize {
        self.vertices.len()
    }
}

/// Used to warm start the distance routine across calls.
#[derive(Clone, Copy, Debug, Default)]
pub struct SimplexCache {
    /// Length or area of the cached simplex, used for validity checking.
    pub metric: f32,
    pub count: u16,
    /// Vertices on shape A
    pub index_a: [u8; 3],
    /// Vertices on shape B
    pub index_b: [u8; 3],
}

pub struct DistanceInput<'a> {
    pub proxy_a: &'a DistanceProxy,
    pub proxy_b: &'a DistanceProxy,
    pub transform_a: Transform,
    pub transform_b: Transform,
    pub use_radii: bool,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct DistanceOutput {
    /// Closest point on shapeA
    pub point_a: Vec2,
    /// Closest point on shapeB
    pub point_b: Vec2,
    pub distance: f32,
    /// Number of GJK iterations used
    pub iterations: usize,
}

#[derive(Clone, Copy, Default)]
struct SimplexVertex {
    /// support point in proxyA, world frame
    w_a: Vec2,
    /// support point in proxyB, world frame
    w_b: Vec2,
    /// w_b - w_a
    w: Vec2,
    /// barycentric coordinate for closest point
    a: f32,
    index_a: usize,
    index_b: usize,
}

#[derive(Clone, Copy, Default)]
struct Simplex {
    v1: SimplexVertex,
    v2: SimplexVertex,
    v3: SimplexVertex,
    count: usize,
}

impl Simplex {
    fn vertex(&self, i: usize) -> &SimplexVertex {
        match i {
            0 => &self.v1,
            1 => &self.v2,
            _ => &self.v3,
        }
    }

    fn vertex_mut(&mut self, i: usize) -> &mut SimplexVertex {
        match i {
            0 => &mut self.v1,
            1 => &mut self.v2,
            _ => &mut self.v3,
        }
    }

    fn read_cache(
        &mut self,
        cache: &SimplexCache,
        proxy_a: &DistanceProxy,
        xf_a: &Transform,
        proxy_b: &DistanceProxy,
        xf_b: &Transform,
    ) {
        debug_assert!(cache.count <= 3);

        // Copy data from cache.
        self.count = cache.count as usize;
        for i in 0..self.count {
            let index_a = cache.index_a[i] as usize;
            let index_b = cache.index_b[i] as usize;
            let w_a = xf_a.mul_vec2(proxy_a.vertex(index_a));
            let w_b = xf_b.mul_vec2(proxy_b.vertex(index_b));
            *self.vertex_mut(i) = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 0.0,
                index_a,
                index_b,
            };
        }

        // Compute the new simplex metric, if it is substantially different
        // than old metric then flush the simplex.
        if self.count > 1 {
            let metric1 = cache.metric;
            let metric2 = self.get_metric();
            if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                self.count = 0;
            }
        }

        // If the cache is empty or invalid ...
        if self.count == 0 {
            let w_a = xf_a.mul_vec2(proxy_a.vertex(0));
            let w_b = xf_b.mul_vec2(proxy_b.vertex(0));
            self.v1 = SimplexVertex {
                w_a,
                w_b,
                w: w_b - w_a,
                a: 1.0,
                index_a: 0,
                index_b: 0,
            };
            self.count = 1;
        }
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.get_metric();
        cache.count = self.count as u16;
        for i in 0..self.count {
            cache.index_a[i] = self.vertex(i).index_a as u8;
            cache.index_b[i] = self.vertex(i).index_b as u8;
        }
    }

    fn get_search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v1.w,
            2 => {
                let e12 = self.v2.w - self.v1.w;
                let sgn = e12.cross(-self.v1.w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    Vec2::scalar_cross(1.0, e12)
                } else {
                    // Origin is right of e12.
                    e12.cross_scalar(1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn get_witness_points(&self) -> (Vec2, Vec2) {
        match self.count {
            1 => (self.v1.w_a, self.v1.w_b),
            2 => (
                self.v1.a * self.v1.w_a + self.v2.a * self.v2.w_a,
                self.v1.a * self.v1.w_b + self.v2.a * self.v2.w_b,
            ),
            3 => {
                let p = self.v1.a * self.v1.w_a + self.v2.a * self.v2.w_a + self.v3.a * self.v3.w_a;
                (p, p)
            }
            _ => (Vec2::ZERO, Vec2::ZERO),
        }
    }

    fn get_metric(&self) -> f32 {
        match self.count {
            1 => 0.0,
            2 => Vec2::distance(self.v1.w, self.v2.w),
            3 => (self.v2.w - self.v1.w).cross(self.v3.w - self.v1.w),
            _ => 0.0,
        }
    }

    // Solve a line segment using barycentric coordinates.
    //
    // p = a1 * w1 + a2 * w2
    // a1 + a2 = 1
    //
    // The vector from the origin to the closest point on the line is
    // perpendicular to the line.
    // e12 = w2 - w1
    // dot(p, e) = 0
    // a1 * dot(w1, e) + a2 * dot(w2, e) = 0
    //
    // 2-by-2 linear system
    // [1      1     ][a1] = [1]
    // [w1.e12 w2.e12][a2] = [0]
    //
    // Define
    // d12_1 =  dot(w2, e12)
    // d12_2 = -dot(w1, e12)
    // d12 = d12_1 + d12_2
    //
    // Solution
    // a1 = d12_1 / d12
    // a2 = d12_2 / d12
    fn solve2(&mut self) {
        let w1 = self.v1.w;
        let w2 = self.v2.w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            // a2 <= 0, so we clamp it to 0
            self.v1.a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            // a1 <= 0, so we clamp it to 0
            self.v2.a = 1.0;
            self.count = 1;
            self.v1 = self.v2;
            return;
        }

        // Must be in e12 region.
        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v1.a = d12_1 * inv_d12;
        self.v2.a = d12_2 * inv_d12;
        self.count = 2;
    }

    // Possible regions:
    // - points[2]
    // - edge points[0]-points[2]
    // - edge points[1]-points[2]
    // - inside the triangle
    fn solve3(&mut self) {
        let w1 = self.v1.w;
        let w2 = self.v2.w;
        let w3 = self.v3.w;

        // Edge12
        let e12 = w2 - w1;
        let w1e12 = w1.dot(e12);
        let w2e12 = w2.dot(e12);
        let d12_1 = w2e12;
        let d12_2 = -w1e12;

        // Edge13
        let e13 = w3 - w1;
        let w1e13 = w1.dot(e13);
        let w3e13 = w3.dot(e13);
        let d13_1 = w3e13;
        let d13_2 = -w1e13;

        // Edge23
        let e23 = w3 - w2;
        let w2e23 = w2.dot(e23);
        let w3e23 = w3.dot(e23);
        let d23_1 = w3e23;
        let d23_2 = -w2e23;

        // Triangle123
        let n123 = e12.cross(e13);

        let d123_1 = n123 * w2.cross(w3);
        let d123_2 = n123 * w3.cross(w1);
        let d123_3 = n123 * w1.cross(w2);

        // w1 region
        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v1.a = 1.0;
            self.count = 1;
            return;
        }

        // e12
        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv_d12 = 1.0 / (d12_1 + d12_2);
            self.v1.a = d12_1 * inv_d12;
            self.v2.a = d12_2 * inv_d12;
            self.count = 2;
            return;
        }

        // e13
        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv_d13 = 1.0 / (d13_1 + d13_2);
            self.v1.a = d13_1 * inv_d13;
            self.v3.a = d13_2 * inv_d13;
            self.count = 2;
            self.v2 = self.v3;
            return;
        }

        // w2 region
        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v2.a = 1.0;
            self.count = 1;
            self.v1 = self.v2;
            return;
        }

        // w3 region
        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v3.a = 1.0;
            self.count = 1;
            self.v1 = self.v3;
            return;
        }

        // e23
        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv_d23 = 1.0 / (d23_1 + d23_2);
            self.v2.a = d23_1 * inv_d23;
            self.v3.a = d23_2 * inv_d23;
            self.count = 2;
            self.v1 = self.v3;
            return;
        }

        // Must be in triangle123
        let inv_d123 = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v1.a = d123_1 * inv_d123;
        self.v2.a = d123_2 * inv_d123;
        self.v3.a = d123_3 * inv_d123;
        self.count = 3;
    }
}

/// Compute the closest points between two shapes, warm started from the
/// cache. On exit the cache is updated for the next call.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput) -> DistanceOutput {
    const MAX_ITERS: usize = 20;

    let proxy_a = input.proxy_a;
    let proxy_b = input.proxy_b;
    let xf_a = input.transform_a;
    let xf_b = input.transform_b;

    // Initialize the simplex.
    let mut simplex = Simplex::default();
    simplex.read_cache(cache, proxy_a, &xf_a, proxy_b, &xf_b);

    // These store the vertices of the last simplex so that we
    // can check for duplicates and prevent cycling.
    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < MAX_ITERS {
        // Copy simplex so we can identify duplicates.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.vertex(i).index_a;
            save_b[i] = simplex.vertex(i).index_b;
        }

        match simplex.count {
            1 => {}
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => unreachable!(),
        }

        // If we have 3 points, then the origin is in the corresponding
        // triangle.
        if simplex.count == 3 {
            break;
        }

        // Get search direction.
        let d = simplex.get_search_direction();

        // Ensure the search direction is numerically fit.
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin is probably contained by a line segment
            // or triangle. Thus the shapes are overlapped.

            // We can't return zero here even though there may be overlap.
            // In case the simplex is a point, segment, or triangle it is
            // difficult to determine if the origin is contained in the CSO
            // or very close to it.
            break;
        }

        // Compute a tentative new simplex vertex using support points.
        let index_a = proxy_a.get_support(xf_a.q.mul_t_vec2(-d));
        let index_b = proxy_b.get_support(xf_b.q.mul_t_vec2(d));
        let w_a = xf_a.mul_vec2(proxy_a.vertex(index_a));
        let w_b = xf_b.mul_vec2(proxy_b.vertex(index_b));

        iter += 1;

        // Check for duplicate support points. This is the main termination
        // criteria.
        let mut duplicate = false;
        for i in 0..save_count {
            if index_a == save_a[i] && index_b == save_b[i] {
                duplicate = true;
                break;
            }
        }

        // If we found a duplicate support point we must exit to avoid
        // cycling.
        if duplicate {
            break;
        }

        // New vertex is ok and needed.
        let count = simplex.count;
        *simplex.vertex_mut(count) = SimplexVertex {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 0.0,
            index_a,
            index_b,
        };
        simplex.count += 1;
    }

    let (mut point_a, mut point_b) = simplex.get_witness_points();
    let mut dist = Vec2::distance(point_a, point_b);

    // Cache the simplex.
    simplex.write_cache(cache);

    // Apply radii if requested.
    if input.use_radii {
        let r_a = proxy_a.radius;
        let r_b = proxy_b.radius;

        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shapes are still not overlapped.
            // Move the witness points to the outer surface.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            // Shapes are overlapped when radii are considered.
            // Move the witness points to the middle.
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// Determine if two generic shape children overlap, radii included.
pub fn test_overlap(
    shape_a: &Shape,
    index_a: usize,
    shape_b: &Shape,
    index_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let proxy_a = DistanceProxy::new(shape_a, index_a);
    let proxy_b = DistanceProxy::new(shape_b, index_b);

    let mut cache = SimplexCache::default();
    let output = distance(
        &mut cache,
        &DistanceInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            transform_a: *xf_a,
            transform_b: *xf_b,
            use_radii: true,
        },
    );

    output.distance < 10.0 * f32::EPSILON
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{CircleShape, PolygonShape};
    use approx::assert_relative_eq;

    #[test]
    fn circle_circle_distance() {
        let a = Shape::Circle(CircleShape::new(1.0));
        let b = Shape::Circle(CircleShape::new(1.0));
        let proxy_a = DistanceProxy::new(&a, 0);
        let proxy_b = DistanceProxy::new(&b, 0);
        let mut cache = SimplexCache::default();
        let out = distance(
            &mut cache,
            &DistanceInput {
                proxy_a: &proxy_a,
                proxy_b: &proxy_b,
                transform_a: Transform::new(Vec2::ZERO, 0.0),
                transform_b: Transform::new(Vec2::new(5.0, 0.0), 0.0),
                use_radii: true,
            },
        );
        assert_relative_eq!(out.distance, 3.0, epsilon = 1e-4);
    }

    #[test]
    fn box_box_distance_and_overlap() {
        let mut p1 = PolygonShape::new();
        p1.set_as_box(1.0, 1.0);
        let mut p2 = PolygonShape::new();
        p2.set_as_box(1.0, 1.0);
        let a = Shape::Polygon(p1);
        let b = Shape::Polygon(p2);

        let xf_a = Transform::new(Vec2::ZERO, 0.0);
        let far = Transform::new(Vec2::new(10.0, 0.0), 0.0);
        let near = Transform::new(Vec2::new(1.5, 0.0), 0.0);

        assert!(!test_overlap(&a, 0, &b, 0, &xf_a, &far));
        assert!(test_overlap(&a, 0, &b, 0, &xf_a, &near));

        let proxy_a = DistanceProxy::new(&a, 0);
        let proxy_b = DistanceProxy::new(&b, 0);
        let mut cache = SimplexCache::default();
        let out = distance(
            &mut cache,
            &DistanceInput {
                proxy_a: &proxy_a,
                proxy_b: &proxy_b,
                transform_a: xf_a,
                transform_b: far,
                use_radii: false,
            },
        );
        assert_relative_eq!(out.distance, 8.0, epsilon = 1e-3);
    }
}
