use crate::common::MAX_MANIFOLD_POINTS;
use crate::math::{Transform, Vec2};

/// The feature type on a shape that produced a contact point.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ContactFeatureType {
    #[default]
    Vertex = 0,
    Face = 1,
}

/// The features that intersect to form the contact point.
/// Packs into 4 bytes; the packed key is what warm starting matches on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct ContactFeature {
    /// Feature index on shapeA
    pub index_a: u8,
    /// Feature index on shapeB
    pub index_b: u8,
    /// The feature type on shapeA
    pub type_a: ContactFeatureType,
    /// The feature type on shapeB
    pub type_b: ContactFeatureType,
}

impl ContactFeature {
    pub const NULL_FEATURE: u8 = u8::MAX;

    pub fn vertex_vertex(index_a: u8, index_b: u8) -> Self {
        Self {
            index_a,
            index_b,
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Vertex,
        }
    }

    /// Used to quickly compare contact ids.
    #[inline]
    pub fn key(&self) -> u32 {
        (self.index_a as u32)
            | (self.index_b as u32) << 8
            | (self.type_a as u32) << 16
            | (self.type_b as u32) << 24
    }

    /// Swap the A and B sides of the id, for when contact creation swaps
    /// the fixture order.
    pub fn swapped(&self) -> Self {
        Self {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

/// A manifold point is a contact point belonging to a contact
/// manifold. It holds details related to the geometry and dynamics
/// of the contact points.
/// The local point usage depends on the manifold type:
/// - Circles: the local center of circleB
/// - FaceA: the local center of circleB or the clip point of polygonB
/// - FaceB: the clip point of polygonA
/// This structure is stored across time steps, so we keep it small.
/// Note: the impulses are used for internal caching and may not
/// provide reliable contact forces, especially for high speed collisions.
#[derive(Copy, Clone, Debug, Default)]
pub struct ManifoldPoint {
    /// Usage depends on manifold type.
    pub local_point: Vec2,
    /// The non-penetration impulse.
    pub normal_impulse: f32,
    /// The friction impulse.
    pub tangent_impulse: f32,
    /// Uniquely identifies a contact point between two shapes.
    pub id: ContactFeature,
}

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum ManifoldType {
    #[default]
    Circles,
    FaceA,
    FaceB,
}

/// A manifold for two touching convex shapes.
/// Supported contact scenarios:
/// - clip point versus plane with radius
/// - point versus point with radius (circles)
/// The local point usage depends on the manifold type:
/// - Circles: the local center of circleA
/// - FaceA: the center of faceA
/// - FaceB: the center of faceB
/// Similarly the local normal usage:
/// - Circles: not used
/// - FaceA: the normal on polygonA
/// - FaceB: the normal on polygonB
/// We store contacts in this way so that position correction can
/// account for movement, which is critical for continuous physics.
#[derive(Copy, Clone, Debug, Default)]
pub struct Manifold {
    /// The points of contact.
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Not used for Circles.
    pub local_normal: Vec2,
    /// Usage depends on manifold type.
    pub local_point: Vec2,
    pub manifold_type: ManifoldType,
    /// The number of manifold points.
    pub point_count: usize,
}

/// This is used to compute the current state of a contact manifold.
#[derive(Copy, Clone, Debug, Default)]
pub struct WorldManifold {
    /// World vector pointing from A to B.
    pub normal: Vec2,
    /// World contact point (point of intersection).
    pub points: [Vec2; MAX_MANIFOLD_POINTS],
    /// A negative value indicates overlap, in meters.
    pub separations: [f32; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluate the manifold with supplied transforms. This assumes
    /// modest motion from the original state. This does not change the
    /// point count, impulses, etc. The radii must come from the shapes
    /// that generated the manifold.
    pub fn initialize(
        manifold: &Manifold,
        xf_a: &Transform,
        radius_a: f32,
        xf_b: &Transform,
        radius_b: f32,
    ) -> Self {
        let mut out = Self::default();
        if manifold.point_count == 0 {
            return out;
        }

        match manifold.manifold_type {
            ManifoldType::Circles => {
                let mut normal = Vec2::new(1.0, 0.0);
                let point_a = xf_a.mul_vec2(manifold.local_point);
                let point_b = xf_b.mul_vec2(manifold.points[0].local_point);
                if Vec2::distance_squared(point_a, point_b) > f32::EPSILON * f32::EPSILON {
                    normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + radius_a * normal;
                let c_b = point_b - radius_b * normal;
                out.normal = normal;
                out.points[0] = 0.5 * (c_a + c_b);
                out.separations[0] = (c_b - c_a).dot(normal);
            }
            ManifoldType::FaceA => {
                out.normal = xf_a.q * manifold.local_normal;
                let plane_point = xf_a.mul_vec2(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_b.mul_vec2(manifold.points[i].local_point);
                    let c_a = clip_point
                        + (radius_a - (clip_point - plane_point).dot(out.normal)) * out.normal;
                    let c_b = clip_point - radius_b * out.normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_b - c_a).dot(out.normal);
                }
            }
            ManifoldType::FaceB => {
                let normal = xf_b.q * manifold.local_normal;
                let plane_point = xf_b.mul_vec2(manifold.local_point);

                for i in 0..manifold.point_count {
                    let clip_point = xf_a.mul_vec2(manifold.points[i].local_point);
                    let c_b =
                        clip_point + (radius_b - (clip_point - plane_point).dot(normal)) * normal;
                    let c_a = clip_point - radius_a * normal;
                    out.points[i] = 0.5 * (c_a + c_b);
                    out.separations[i] = (c_a - c_b).dot(normal);
                }

                // Ensure normal points from A to B.
                out.normal = -normal;
            }
        }

        out
    }
}

/// Used for computing contact manifolds.
#[derive(Copy, Clone, Debug, Default)]
pub struct ClipVertex {
    pub v: Vec2,
    pub id: ContactFeature,
}

/// Clipping for contact manifolds. Sutherland-Hodgman against a single
/// plane; returns the number of output points (0, 1 or 2).
pub fn clip_segment_to_line(
    v_out: &mut [ClipVertex; 2],
    v_in: &[ClipVertex; 2],
    normal: Vec2,
    offset: f32,
    vertex_index_a: usize,
) -> usize {
    // Start with no output points
    let mut count = 0;

    // Calculate the distance of end points to the line
    let distance0 = normal.dot(v_in[0].v) - offset;
    let distance1 = normal.dot(v_in[1].v) - offset;

    // If the points are behind the plane
    if distance0 <= 0.0 {
        v_out[count] = v_in[0];
        count += 1;
    }
    if distance1 <= 0.0 {
        v_out[count] = v_in[1];
        count += 1;
    }

    // If the points are on different sides of the plane
    if distance0 * distance1 < 0.0 {
        // Find intersection point of edge and plane
        let interp = distance0 / (distance0 - distance1);
        v_out[count].v = v_in[0].v + interp * (v_in[1].v - v_in[0].v);

        // VertexA is hitting edgeB.
        v_out[count].id = ContactFeature {
            index_a: vertex_index_a as u8,
            index_b: v_in[0].id.index_b,
            type_a: ContactFeatureType::Vertex,
            type_b: ContactFeatureType::Face,
        };
        count += 1;
    }

    count
}

/// Ray-cast input data. The ray extends from p1 to p1 + max_fraction * (p2 - p1).
#[derive(Copy, Clone, Debug)]
pub struct RayCastInput {
    pub p1: Vec2,
    pub p2: Vec2,
    pub max_fraction: f32,
}

/// Ray-cast output data. The ray hits at p1 + fraction * (p2 - p1), where p1
/// and p2 come from RayCastInput.
#[derive(Copy, Clone, Debug, Default)]
pub struct RayCastOutput {
    pub normal: Vec2,
    pub fraction: f32,
}

/// An axis aligned bounding box.
#[derive(Copy, Clone, Debug)]
pub struct Aabb {
    /// The lower vertex.
    pub lower_bound: Vec2,
    /// The upper vertex.
    pub upper_bound: Vec2,
}

impl Default for Aabb {
    fn default() -> Self {
        Self {
            lower_bound: Vec2::ZERO,
            upper_bound: Vec2::ZERO,
        }
    }
}

impl Aabb {
    pub fn new(lower_bound: Vec2, upper_bound: Vec2) -> Self {
        Self {
            lower_bound,
            upper_bound,
        }
    }

    /// Verify that the bounds are sorted and finite.
    pub fn is_valid(&self) -> bool {
        let d = self.upper_bound - self.lower_bound;
        d.x >= 0.0 && d.y >= 0.0 && self.lower_bound.is_valid() && self.upper_bound.is_valid()
    }

    /// Get the center of the AABB.
    #[inline]
    pub fn center(&self) -> Vec2 {
        0.5 * (self.lower_bound + self.upper_bound)
    }

    /// Get the extents of the AABB (half-widths).
    #[inline]
    pub fn extents(&self) -> Vec2 {
        0.5 * (self.upper_bound - self.lower_bound)
    }

    /// Get the perimeter length.
    #[inline]
    pub fn get_perimeter(&self) -> f32 {
        let wx = self.upper_bound.x - self.lower_bound.x;
        let wy = self.upper_bound.y - self.lower_bound.y;
        2.0 * (wx + wy)
    }

    /// The union of this and another AABB.
    #[inline]
    pub fn combine(&self, other: &Aabb) -> Aabb {
        Aabb {
            lower_bound: self.lower_bound.min(other.lower_bound),
            upper_bound: self.upper_bound.max(other.upper_bound),
        }
    }

    /// Does this AABB fully contain the other?
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.lower_bound.x <= other.lower_bound.x
            && self.lower_bound.y <= other.lower_bound.y
            && other.upper_bound.x <= self.upper_bound.x
            && other.upper_bound.y <= self.upper_bound.y
    }

    /// From Real-time Collision Detection, p179: slab clipping against
    /// both axes.
    pub fn ray_cast(&self, input: &RayCastInput) -> Option<RayCastOutput> {
        let mut tmin = f32::MIN;
        let mut tmax = f32::MAX;

        let p = input.p1;
        let d = input.p2 - input.p1;
        let abs_d = d.abs();

        let mut normal = Vec2::ZERO;

        for i in 0..2 {
            let (di, abs_di, pi, lo, hi) = if i == 0 {
                (d.x, abs_d.x, p.x, self.lower_bound.x, self.upper_bound.x)
            } else {
                (d.y, abs_d.y, p.y, self.lower_bound.y, self.upper_bound.y)
            };

            if abs_di < f32::EPSILON {
                // Parallel.
                if pi < lo || hi < pi {
                    return None;
                }
            } else {
                let inv_d = 1.0 / di;
                let mut t1 = (lo - pi) * inv_d;
                let mut t2 = (hi - pi) * inv_d;

                // Sign of the normal vector.
                let mut s = -1.0;
                if t1 > t2 {
                    std::mem::swap(&mut t1, &mut t2);
                    s = 1.0;
                }

                // Push the min up
                if t1 > tmin {
                    normal = if i == 0 {
                        Vec2::new(s, 0.0)
                    } else {
                        Vec2::new(0.0, s)
                    };
                    tmin = t1;
                }

                // Pull the max down
                tmax = tmax.min(t2);

                if tmin > tmax {
                    return None;
                }
            }
        }

        // Does the ray start inside the box?
        // Does the ray intersect beyond the max fraction?
        if tmin < 0.0 || input.max_fraction < tmin {
            return None;
        }

        Some(RayCastOutput {
            fraction: tmin,
            normal,
        })
    }
}

/// Do two AABBs overlap?
#[inline]
pub fn test_overlap_aabb(a: &Aabb, b: &Aabb) -> bool {
    let d1 = b.lower_bound - a.upper_bound;
    let d2 = a.lower_bound - b.upper_bound;
    !(d1.x > 0.0 || d1.y > 0.0 || d2.x > 0.0 || d2.y > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn feature_key_round_trips_swap() {
        let id = ContactFeature {
            index_a: 3,
            index_b: 7,
            type_a: ContactFeatureType::Face,
            type_b: ContactFeatureType::Vertex,
        };
        let swapped = id.swapped();
        assert_eq!(swapped.index_a, 7);
        assert_eq!(swapped.type_a, ContactFeatureType::Vertex);
        assert_eq!(swapped.swapped(), id);
        assert_ne!(id.key(), swapped.key());
    }

    #[test]
    fn aabb_overlap_and_combine() {
        let a = Aabb::new(Vec2::new(0.0, 0.0), Vec2::new(1.0, 1.0));
        let b = Aabb::new(Vec2::new(0.5, 0.5), Vec2::new(2.0, 2.0));
        let c = Aabb::new(Vec2::new(3.0, 3.0), Vec2::new(4.0, 4.0));
        assert!(test_overlap_aabb(&a, &b));
        assert!(!test_overlap_aabb(&a, &c));
        let u = a.combine(&b);
        assert!(u.contains(&a));
        assert!(u.contains(&b));
    }

    #[test]
    fn aabb_ray_cast_hits_near_face() {
        let aabb = Aabb::new(Vec2::new(1.0, -1.0), Vec2::new(2.0, 1.0));
        let input = RayCastInput {
            p1: Vec2::new(0.0, 0.0),
            p2: Vec2::new(4.0, 0.0),
            max_fraction: 1.0,
        };
        let out = aabb.ray_cast(&input).unwrap();
        assert!((out.fraction - 0.25).abs() < 1e-6);
        assert_eq!(out.normal, Vec2::new(-1.0, 0.0));
    }
}
