//! Pairwise narrow-phase collision: given two shape children and their
//! transforms, produce a contact manifold.

use crate::collision::{
    clip_segment_to_line, ClipVertex, ContactFeature, ContactFeatureType, Manifold, ManifoldPoint,
    ManifoldType,
};
use crate::common::{MAX_MANIFOLD_POINTS, POLYGON_RADIUS};
use crate::math::{Transform, Vec2};
use crate::shape::{CircleShape, EdgeShape, PolygonShape};

/// Compute the collision manifold between two circles.
pub fn collide_circles(
    circle_a: &CircleShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    let p_a = xf_a.mul_vec2(circle_a.position);
    let p_b = xf_b.mul_vec2(circle_b.position);

    let d = p_b - p_a;
    let dist_sqr = d.dot(d);
    let r = circle_a.radius + circle_b.radius;
    if dist_sqr > r * r {
        return manifold;
    }

    manifold.manifold_type = ManifoldType::Circles;
    manifold.local_point = circle_a.position;
    manifold.local_normal = Vec2::ZERO;
    manifold.point_count = 1;

    manifold.points[0] = ManifoldPoint {
        local_point: circle_b.position,
        id: ContactFeature::vertex_vertex(0, 0),
        ..Default::default()
    };
    manifold
}

/// Compute the collision manifold between a polygon and a circle.
pub fn collide_polygon_and_circle(
    polygon_a: &PolygonShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle position in the frame of the polygon.
    let c = xf_b.mul_vec2(circle_b.position);
    let c_local = xf_a.mul_t_vec2(c);

    // Find the min separating edge.
    let mut normal_index = 0;
    let mut separation = f32::MIN;
    let radius = POLYGON_RADIUS + circle_b.radius;
    let vertex_count = polygon_a.count;

    for i in 0..vertex_count {
        let s = polygon_a.normals[i].dot(c_local - polygon_a.vertices[i]);
        if s > radius {
            // Early out.
            return manifold;
        }
        if s > separation {
            separation = s;
            normal_index = i;
        }
    }

    // Vertices that subtend the incident face.
    let vert_index1 = normal_index;
    let vert_index2 = if vert_index1 + 1 < vertex_count {
        vert_index1 + 1
    } else {
        0
    };
    let v1 = polygon_a.vertices[vert_index1];
    let v2 = polygon_a.vertices[vert_index2];

    // If the center is inside the polygon ...
    if separation < f32::EPSILON {
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = polygon_a.normals[normal_index];
        manifold.local_point = 0.5 * (v1 + v2);
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position,
            id: ContactFeature::vertex_vertex(0, 0),
            ..Default::default()
        };
        return manifold;
    }

    // Compute barycentric coordinates.
    let u1 = (c_local - v1).dot(v2 - v1);
    let u2 = (c_local - v2).dot(v1 - v2);
    if u1 <= 0.0 {
        if Vec2::distance_squared(c_local, v1) > radius * radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = (c_local - v1).normalize();
        manifold.local_point = v1;
    } else if u2 <= 0.0 {
        if Vec2::distance_squared(c_local, v2) > radius * radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = (c_local - v2).normalize();
        manifold.local_point = v2;
    } else {
        let face_center = 0.5 * (v1 + v2);
        let s = (c_local - face_center).dot(polygon_a.normals[vert_index1]);
        if s > radius {
            return manifold;
        }
        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::FaceA;
        manifold.local_normal = polygon_a.normals[vert_index1];
        manifold.local_point = face_center;
    }

    manifold.points[0] = ManifoldPoint {
        local_point: circle_b.position,
        id: ContactFeature::vertex_vertex(0, 0),
        ..Default::default()
    };
    manifold
}

// Find the max separation between poly1 and poly2 using edge normals from
// poly1.
fn find_max_separation(
    poly1: &PolygonShape,
    xf1: &Transform,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> (f32, usize) {
    let count1 = poly1.count;
    let count2 = poly2.count;
    let xf = xf2.mul_t(*xf1);

    let mut best_index = 0;
    let mut max_separation = f32::MIN;
    for i in 0..count1 {
        // Get poly1 normal in frame2.
        let n = xf.q * poly1.normals[i];
        let v1 = xf.mul_vec2(poly1.vertices[i]);

        // Find deepest point for normal i.
        let mut si = f32::MAX;
        for j in 0..count2 {
            let sij = n.dot(poly2.vertices[j] - v1);
            if sij < si {
                si = sij;
            }
        }

        if si > max_separation {
            max_separation = si;
            best_index = i;
        }
    }

    (max_separation, best_index)
}

fn find_incident_edge(
    poly1: &PolygonShape,
    xf1: &Transform,
    edge1: usize,
    poly2: &PolygonShape,
    xf2: &Transform,
) -> [ClipVertex; 2] {
    let normals1 = &poly1.normals;
    let count2 = poly2.count;

    debug_assert!(edge1 < poly1.count);

    // Get the normal of the reference edge in poly2's frame.
    let normal1 = xf2.q.mul_t_vec2(xf1.q * normals1[edge1]);

    // Find the incident edge on poly2.
    let mut index = 0;
    let mut min_dot = f32::MAX;
    for i in 0..count2 {
        let dot = normal1.dot(poly2.normals[i]);
        if dot < min_dot {
            min_dot = dot;
            index = i;
        }
    }

    // Build the clip vertices for the incident edge.
    let i1 = index;
    let i2 = if i1 + 1 < count2 { i1 + 1 } else { 0 };

    [
        ClipVertex {
            v: xf2.mul_vec2(poly2.vertices[i1]),
            id: ContactFeature {
                index_a: edge1 as u8,
                index_b: i1 as u8,
                type_a: ContactFeatureType::Face,
                type_b: ContactFeatureType::Vertex,
            },
        },
        ClipVertex {
            v: xf2.mul_vec2(poly2.vertices[i2]),
            id: ContactFeature {
                index_a: edge1 as u8,
                index_b: i2 as u8,
                type_a: ContactFeatureType::Face,
                type_b: ContactFeatureType::Vertex,
            },
        },
    ]
}

/// Compute the collision manifold between two polygons using the SAT
/// reference/incident face clipping method.
// The normal points from 1 to 2
pub fn collide_polygons(
    poly_a: &PolygonShape,
    xf_a: &Transform,
    poly_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = 2.0 * POLYGON_RADIUS;

    let (separation_a, edge_a) = find_max_separation(poly_a, xf_a, poly_b, xf_b);
    if separation_a > total_radius {
        return manifold;
    }

    let (separation_b, edge_b) = find_max_separation(poly_b, xf_b, poly_a, xf_a);
    if separation_b > total_radius {
        return manifold;
    }

    let poly1; // reference polygon
    let poly2; // incident polygon
    let xf1;
    let xf2;
    let edge1; // reference edge
    let flip;
    const TOL: f32 = 0.1 * crate::common::LINEAR_SLOP;

    if separation_b > separation_a + TOL {
        poly1 = poly_b;
        poly2 = poly_a;
        xf1 = xf_b;
        xf2 = xf_a;
        edge1 = edge_b;
        manifold.manifold_type = ManifoldType::FaceB;
        flip = true;
    } else {
        poly1 = poly_a;
        poly2 = poly_b;
        xf1 = xf_a;
        xf2 = xf_b;
        edge1 = edge_a;
        manifold.manifold_type = ManifoldType::FaceA;
        flip = false;
    }

    let incident_edge = find_incident_edge(poly1, xf1, edge1, poly2, xf2);

    let count1 = poly1.count;
    let iv1 = edge1;
    let iv2 = if edge1 + 1 < count1 { edge1 + 1 } else { 0 };

    let mut v11 = poly1.vertices[iv1];
    let mut v12 = poly1.vertices[iv2];

    let local_tangent = (v12 - v11).normalize();

    let local_normal = local_tangent.cross_scalar(1.0);
    let plane_point = 0.5 * (v11 + v12);

    let tangent = xf1.q * local_tangent;
    let normal = tangent.cross_scalar(1.0);

    v11 = xf1.mul_vec2(v11);
    v12 = xf1.mul_vec2(v12);

    // Face offset.
    let front_offset = normal.dot(v11);

    // Side offsets, extended by polytope skin thickness.
    let side_offset1 = -tangent.dot(v11) + total_radius;
    let side_offset2 = tangent.dot(v12) + total_radius;

    // Clip incident edge against extruded edge1 side edges.
    let mut clip_points1 = [ClipVertex::default(); 2];
    let mut clip_points2 = [ClipVertex::default(); 2];

    // Clip to box side 1
    let np = clip_segment_to_line(&mut clip_points1, &incident_edge, -tangent, side_offset1, iv1);
    if np < 2 {
        return manifold;
    }

    // Clip to negative box side 1
    let np = clip_segment_to_line(&mut clip_points2, &clip_points1, tangent, side_offset2, iv2);
    if np < 2 {
        return manifold;
    }

    // Now clip_points2 contains the clipped points.
    manifold.local_normal = local_normal;
    manifold.local_point = plane_point;

    let mut point_count = 0;
    for cp in clip_points2.iter().take(MAX_MANIFOLD_POINTS) {
        let separation = normal.dot(cp.v) - front_offset;

        if separation <= total_radius {
            let mp = &mut manifold.points[point_count];
            mp.local_point = xf2.mul_t_vec2(cp.v);
            mp.id = cp.id;
            if flip {
                // Swap features
                mp.id = mp.id.swapped();
            }
            point_count += 1;
        }
    }

    manifold.point_count = point_count;
    manifold
}

/// Compute the collision manifold between an edge and a circle.
pub fn collide_edge_and_circle(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    circle_b: &CircleShape,
    xf_b: &Transform,
) -> Manifold {
    let mut manifold = Manifold::default();

    // Compute circle in frame of edge.
    let q = xf_a.mul_t_vec2(xf_b.mul_vec2(circle_b.position));

    let a = edge_a.vertex1;
    let b = edge_a.vertex2;
    let e = b - a;

    // Normal points to the right for a CCW winding.
    let n = Vec2::new(e.y, -e.x);
    let offset = n.dot(q - a);

    let one_sided = edge_a.vertex0.is_some() || edge_a.vertex3.is_some();
    if one_sided && offset < 0.0 {
        return manifold;
    }

    // Barycentric coordinates
    let u = e.dot(b - q);
    let v = e.dot(q - a);

    let radius = POLYGON_RADIUS + circle_b.radius;

    // Region A
    if v <= 0.0 {
        let p = a;
        let d = q - p;
        let dd = d.dot(d);
        if dd > radius * radius {
            return manifold;
        }

        // Is there an edge connected to A?
        if let Some(a1) = edge_a.vertex0 {
            let b1 = a;
            let e1 = b1 - a1;
            let u1 = e1.dot(b1 - q);

            // Is the circle in Region AB of the previous edge?
            if u1 > 0.0 {
                return manifold;
            }
        }

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position,
            id: ContactFeature::vertex_vertex(0, 0),
            ..Default::default()
        };
        return manifold;
    }

    // Region B
    if u <= 0.0 {
        let p = b;
        let d = q - p;
        let dd = d.dot(d);
        if dd > radius * radius {
            return manifold;
        }

        // Is there an edge connected to B?
        if let Some(b2) = edge_a.vertex3 {
            let a2 = b;
            let e2 = b2 - a2;
            let v2 = e2.dot(q - a2);

            // Is the circle in Region AB of the next edge?
            if v2 > 0.0 {
                return manifold;
            }
        }

        manifold.point_count = 1;
        manifold.manifold_type = ManifoldType::Circles;
        manifold.local_normal = Vec2::ZERO;
        manifold.local_point = p;
        manifold.points[0] = ManifoldPoint {
            local_point: circle_b.position,
            id: ContactFeature {
                index_a: 1,
                index_b: 0,
                type_a: ContactFeatureType::Vertex,
                type_b: ContactFeatureType::Vertex,
            },
            ..Default::default()
        };
        return manifold;
    }

    // Region AB
    let den = e.dot(e);
    debug_assert!(den > 0.0);
    let p = (1.0 / den) * (u * a + v * b);
    let d = q - p;
    let dd = d.dot(d);
    if dd > radius * radius {
        return manifold;
    }

    let n = if offset < 0.0 {
        Vec2::new(-n.x, -n.y)
    } else {
        n
    };

    manifold.point_count = 1;
    manifold.manifold_type = ManifoldType::FaceA;
    manifold.local_normal = n.normalize();
    manifold.local_point = a;
    manifold.points[0] = ManifoldPoint {
        local_point: circle_b.position,
        id: ContactFeature {
            index_a: 0,
            index_b: 0,
            type_a: ContactFeatureType::Face,
            type_b: ContactFeatureType::Vertex,
        },
        ..Default::default()
    };
    manifold
}

/// Compute the collision manifold between a one-sided edge and a polygon.
///
/// The edge is widened into a two-vertex hull and run through the polygon
/// clipper; the one-sided filter then drops manifolds whose normal points
/// into the back side of the edge so chain interiors do not catch bodies.
pub fn collide_edge_and_polygon(
    edge_a: &EdgeShape,
    xf_a: &Transform,
    polygon_b: &PolygonShape,
    xf_b: &Transform,
) -> Manifold {
    let mut hull = PolygonShape::new();
    hull.count = 2;
    hull.vertices[0] = edge_a.vertex1;
    hull.vertices[1] = edge_a.vertex2;

    let e = edge_a.vertex2 - edge_a.vertex1;
    if e.length_squared() <= f32::EPSILON * f32::EPSILON {
        return Manifold::default();
    }
    let n = Vec2::new(e.y, -e.x).normalize();
    hull.normals[0] = n;
    hull.normals[1] = -n;
    hull.centroid = 0.5 * (edge_a.vertex1 + edge_a.vertex2);

    let manifold = collide_polygons(&hull, xf_a, polygon_b, xf_b);

    let one_sided = edge_a.vertex0.is_some() || edge_a.vertex3.is_some();
    if one_sided && manifold.point_count > 0 {
        // The outward normal of the edge, in edge-local space.
        let world_normal = match manifold.manifold_type {
            ManifoldType::FaceA => xf_a.q * manifold.local_normal,
            ManifoldType::FaceB => -(xf_b.q * manifold.local_normal),
            ManifoldType::Circles => xf_a.q * manifold.local_normal,
        };
        if world_normal.dot(xf_a.q * n) < 0.0 {
            return Manifold::default();
        }
    }

    manifold
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn separated_circles_produce_no_points() {
        let a = CircleShape::new(0.5);
        let b = CircleShape::new(0.5);
        let m = collide_circles(
            &a,
            &Transform::new(Vec2::ZERO, 0.0),
            &b,
            &Transform::new(Vec2::new(2.0, 0.0), 0.0),
        );
        assert_eq!(m.point_count, 0);
    }

    #[test]
    fn touching_circles_produce_one_point() {
        let a = CircleShape::new(0.5);
        let b = CircleShape::new(0.6);
        let m = collide_circles(
            &a,
            &Transform::new(Vec2::ZERO, 0.0),
            &b,
            &Transform::new(Vec2::new(1.0, 0.0), 0.0),
        );
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::Circles);
    }

    #[test]
    fn stacked_boxes_produce_two_points() {
        let mut a = PolygonShape::new();
        a.set_as_box(1.0, 1.0);
        let mut b = PolygonShape::new();
        b.set_as_box(1.0, 1.0);
        let m = collide_polygons(
            &a,
            &Transform::new(Vec2::ZERO, 0.0),
            &b,
            &Transform::new(Vec2::new(0.0, 1.99), 0.0),
        );
        assert_eq!(m.point_count, 2);
    }

    #[test]
    fn polygon_circle_face_contact() {
        let mut a = PolygonShape::new();
        a.set_as_box(1.0, 1.0);
        let b = CircleShape::new(0.5);
        let m = collide_polygon_and_circle(
            &a,
            &Transform::new(Vec2::ZERO, 0.0),
            &b,
            &Transform::new(Vec2::new(0.0, 1.4), 0.0),
        );
        assert_eq!(m.point_count, 1);
        assert_eq!(m.manifold_type, ManifoldType::FaceA);
        assert_relative_eq!(m.local_normal.y, 1.0, epsilon = 1e-5);
    }

    #[test]
    fn edge_circle_interior_contact() {
        let edge = EdgeShape::new(Vec2::new(-1.0, 0.0), Vec2::new(1.0, 0.0));
        let circle = CircleShape::new(0.5);
        let m = collide_edge_and_circle(
            &edge,
            &Transform::new(Vec2::ZERO, 0.0),
            &circle,
            &Transform::new(Vec2::new(0.0, -0.4), 0.0),
        );
        assert_eq!(m.point_count, 1);
    }

    #[test]
    fn edge_polygon_contact() {
        let edge = EdgeShape::new(Vec2::new(-2.0, 0.0), Vec2::new(2.0, 0.0));
        let mut poly = PolygonShape::new();
        poly.set_as_box(0.5, 0.5);
        let m = collide_edge_and_polygon(
            &edge,
            &Transform::new(Vec2::ZERO, 0.0),
            &poly,
            &Transform::new(Vec2::new(0.0, 0.49), 0.0),
        );
        assert!(m.point_count > 0);
    }
}
