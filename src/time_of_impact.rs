//! Time of impact for a pair of swept shapes.
//!
//! Conservative advancement: run GJK on the shape cores at the current
//! time, build a separation function along the witness axis, and
//! root-find the earliest time where the separation drops to the target
//! tolerance. The shapes must not be rotated by more than 90 degrees over
//! the step for the separation bound to hold, which the per-step rotation
//! clamp guarantees.

use crate::common::LINEAR_SLOP;
use crate::distance::{distance, DistanceInput, DistanceProxy, SimplexCache};
use crate::math::{Sweep, Transform, Vec2};

pub struct ToiInput<'a> {
    pub proxy_a: &'a DistanceProxy,
    pub proxy_b: &'a DistanceProxy,
    pub sweep_a: Sweep,
    pub sweep_b: Sweep,
    /// Defines the sweep interval [0, t_max].
    pub t_max: f32,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ToiState {
    Unknown,
    /// The root finder failed to converge; the caller should fall back to
    /// discrete handling.
    Failed,
    /// The shapes were already overlapped at the start of the interval.
    Overlapped,
    /// First touch found inside the interval.
    Touching,
    /// No contact within the interval; `t` is `t_max`.
    Separated,
}

#[derive(Copy, Clone, Debug)]
pub struct ToiOutput {
    pub state: ToiState,
    pub t: f32,
}

#[derive(Copy, Clone, PartialEq, Eq)]
enum SeparationType {
    Points,
    FaceA,
    FaceB,
}

struct SeparationFunction<'a> {
    proxy_a: &'a DistanceProxy,
    proxy_b: &'a DistanceProxy,
    sweep_a: Sweep,
    sweep_b: Sweep,
    sep_type: SeparationType,
    local_point: Vec2,
    axis: Vec2,
}

impl<'a> SeparationFunction<'a> {
    fn new(
        cache: &SimplexCache,
        proxy_a: &'a DistanceProxy,
        sweep_a: Sweep,
        proxy_b: &'a DistanceProxy,
        sweep_b: Sweep,
        t1: f32,
    ) -> Self {
        debug_assert!(0 < cache.count && cache.count < 3);

        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        if cache.count == 1 {
            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_a = xf_a.mul_vec2(local_point_a);
            let point_b = xf_b.mul_vec2(local_point_b);
            let axis = (point_b - point_a).normalize();
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                sep_type: SeparationType::Points,
                local_point: Vec2::ZERO,
                axis,
            }
        } else if cache.index_a[0] == cache.index_a[1] {
            // Two points on B and one on A.
            let local_point_b1 = proxy_b.vertex(cache.index_b[0] as usize);
            let local_point_b2 = proxy_b.vertex(cache.index_b[1] as usize);

            let mut axis = (local_point_b2 - local_point_b1).cross_scalar(1.0).normalize();
            let normal = xf_b.q * axis;

            let local_point = 0.5 * (local_point_b1 + local_point_b2);
            let point_b = xf_b.mul_vec2(local_point);

            let local_point_a = proxy_a.vertex(cache.index_a[0] as usize);
            let point_a = xf_a.mul_vec2(local_point_a);

            let s = (point_a - point_b).dot(normal);
            if s < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                sep_type: SeparationType::FaceB,
                local_point,
                axis,
            }
        } else {
            // Two points on A and one or two points on B.
            let local_point_a1 = proxy_a.vertex(cache.index_a[0] as usize);
            let local_point_a2 = proxy_a.vertex(cache.index_a[1] as usize);

            let mut axis = (local_point_a2 - local_point_a1).cross_scalar(1.0).normalize();
            let normal = xf_a.q * axis;

            let local_point = 0.5 * (local_point_a1 + local_point_a2);
            let point_a = xf_a.mul_vec2(local_point);

            let local_point_b = proxy_b.vertex(cache.index_b[0] as usize);
            let point_b = xf_b.mul_vec2(local_point_b);

            let s = (point_b - point_a).dot(normal);
            if s < 0.0 {
                axis = -axis;
            }
            Self {
                proxy_a,
                proxy_b,
                sweep_a,
                sweep_b,
                sep_type: SeparationType::FaceA,
                local_point,
                axis,
            }
        }
    }

    /// The minimum separation at time `t` along the function's axis, plus
    /// the witness vertex indices that achieve it.
    fn find_min_separation(&self, t: f32) -> (f32, usize, usize) {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.sep_type {
            SeparationType::Points => {
                let axis_a = xf_a.q.mul_t_vec2(self.axis);
                let axis_b = xf_b.q.mul_t_vec2(-self.axis);

                let index_a = self.proxy_a.get_support(axis_a);
                let index_b = self.proxy_b.get_support(axis_b);

                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_a));
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(self.axis), index_a, index_b)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q * self.axis;
                let point_a = xf_a.mul_vec2(self.local_point);

                let axis_b = xf_b.q.mul_t_vec2(-normal);
                let index_b = self.proxy_b.get_support(axis_b);
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_b));

                ((point_b - point_a).dot(normal), usize::MAX, index_b)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q * self.axis;
                let point_b = xf_b.mul_vec2(self.local_point);

                let axis_a = xf_a.q.mul_t_vec2(-normal);
                let index_a = self.proxy_a.get_support(axis_a);
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_a));

                ((point_a - point_b).dot(normal), index_a, usize::MAX)
            }
        }
    }

    /// The separation of a fixed witness pair at time `t`.
    fn evaluate(&self, index_a: usize, index_b: usize, t: f32) -> f32 {
        let xf_a = self.sweep_a.get_transform(t);
        let xf_b = self.sweep_b.get_transform(t);

        match self.sep_type {
            SeparationType::Points => {
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_a));
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(self.axis)
            }
            SeparationType::FaceA => {
                let normal = xf_a.q * self.axis;
                let point_a = xf_a.mul_vec2(self.local_point);
                let point_b = xf_b.mul_vec2(self.proxy_b.vertex(index_b));
                (point_b - point_a).dot(normal)
            }
            SeparationType::FaceB => {
                let normal = xf_b.q * self.axis;
                let point_b = xf_b.mul_vec2(self.local_point);
                let point_a = xf_a.mul_vec2(self.proxy_a.vertex(index_a));
                (point_a - point_b).dot(normal)
            }
        }
    }
}

/// Compute the upper bound on time before two shapes penetrate. Time is
/// represented as a fraction between [0, t_max]. This uses conservative
/// advancement, so missed collisions are impossible as long as the root
/// finder converges.
pub fn time_of_impact(input: &ToiInput) -> ToiOutput {
    const MAX_ITERATIONS: usize = 20;
    const MAX_ROOT_ITERATIONS: usize = 50;

    let mut output = ToiOutput {
        state: ToiState::Unknown,
        t: input.t_max,
    };

    let proxy_a = input.proxy_a;
    let proxy_b = input.proxy_b;

    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Large rotations can make the root finder fail, so normalize the
    // sweep angles.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;

    let total_radius = proxy_a.radius + proxy_b.radius;
    let target = LINEAR_SLOP.max(total_radius - 3.0 * LINEAR_SLOP);
    let tolerance = 0.25 * LINEAR_SLOP;
    debug_assert!(target > tolerance);

    let mut t1 = 0.0;
    let mut iter = 0;

    // Prepare input for distance query.
    let mut cache = SimplexCache::default();

    // The outer loop progressively attempts to compute new separating axes.
    // This loop terminates when an axis is repeated (no progress is made).
    loop {
        let xf_a = sweep_a.get_transform(t1);
        let xf_b = sweep_b.get_transform(t1);

        // Get the distance between shapes. We can also use the results
        // to get a separating axis.
        let distance_output = distance(
            &mut cache,
            &DistanceInput {
                proxy_a,
                proxy_b,
                transform_a: xf_a,
                transform_b: xf_b,
                use_radii: false,
            },
        );

        // If the shapes are overlapped, we give up on continuous collision.
        if distance_output.distance <= 0.0 {
            // Failure!
            output.state = ToiState::Overlapped;
            output.t = 0.0;
            break;
        }

        if distance_output.distance < target + tolerance {
            // Victory!
            output.state = ToiState::Touching;
            output.t = t1;
            break;
        }

        // Initialize the separating axis.
        let fcn = SeparationFunction::new(&cache, proxy_a, sweep_a, proxy_b, sweep_b, t1);

        // Compute the TOI on the separating axis. We do this by successively
        // resolving the deepest point. This loop is bounded by the number of
        // vertices.
        let mut done = false;
        let mut t2 = t_max;
        let mut push_back_iter = 0;
        loop {
            // Find the deepest point at t2. Store the witness point indices.
            let (mut s2, index_a, index_b) = fcn.find_min_separation(t2);

            // Is the final configuration separated?
            if s2 > target + tolerance {
                // Victory!
                output.state = ToiState::Separated;
                output.t = t_max;
                done = true;
                break;
            }

            // Has the separation reached tolerance?
            if s2 > target - tolerance {
                // Advance the sweeps
                t1 = t2;
                break;
            }

            // Compute the initial separation of the witness points.
            let mut s1 = fcn.evaluate(index_a, index_b, t1);

            // Check for initial overlap. This might happen if the root finder
            // runs out of iterations.
            if s1 < target - tolerance {
                output.state = ToiState::Failed;
                output.t = t1;
                done = true;
                break;
            }

            // Check for touching
            if s1 <= target + tolerance {
                // Victory! t1 should hold the TOI (could be 0.0).
                output.state = ToiState::Touching;
                output.t = t1;
                done = true;
                break;
            }

            // Compute 1D root of: f(x) - target = 0
            let mut root_iters = 0;
            let mut a1 = t1;
            let mut a2 = t2;
            loop {
                // Use a mix of the secant rule and bisection.
                let t = if root_iters & 1 != 0 {
                    // Secant rule to improve convergence.
                    a1 + (target - s1) * (a2 - a1) / (s2 - s1)
                } else {
                    // Bisection to guarantee progress.
                    0.5 * (a1 + a2)
                };

                root_iters += 1;

                let s = fcn.evaluate(index_a, index_b, t);

                if (s - target).abs() < tolerance {
                    // t2 holds a tentative value for t1
                    t2 = t;
                    break;
                }

                // Ensure we continue to bracket the root.
                if s > target {
                    a1 = t;
                    s1 = s;
                } else {
                    a2 = t;
                    s2 = s;
                }

                if root_iters == MAX_ROOT_ITERATIONS {
                    break;
                }
            }

            push_back_iter += 1;

            if push_back_iter == crate::common::MAX_POLYGON_VERTICES {
                break;
            }
        }

        iter += 1;

        if done {
            break;
        }

        if iter == MAX_ITERATIONS {
            // Root finder got stuck. Semi-victory.
            output.state = ToiState::Failed;
            output.t = t1;
            break;
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{CircleShape, PolygonShape, Shape};
    use approx::assert_relative_eq;

    fn sweep_line(c0: Vec2, c: Vec2) -> Sweep {
        Sweep {
            local_center: Vec2::ZERO,
            c0,
            c,
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }

    #[test]
    fn head_on_circles_touch_midway() {
        let a = Shape::Circle(CircleShape::new(0.5));
        let b = Shape::Circle(CircleShape::new(0.5));
        let proxy_a = DistanceProxy::new(&a, 0);
        let proxy_b = DistanceProxy::new(&b, 0);

        // A moves +x by 10 over the step; B is fixed at x=10.
        // Surfaces meet when centers are 1 apart, i.e. after 9 of travel.
        let out = time_of_impact(&ToiInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            sweep_a: sweep_line(Vec2::ZERO, Vec2::new(10.0, 0.0)),
            sweep_b: sweep_line(Vec2::new(10.0, 0.0), Vec2::new(10.0, 0.0)),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Touching);
        assert_relative_eq!(out.t, 0.9, epsilon = 0.01);
    }

    #[test]
    fn bullet_against_thin_wall_is_not_missed() {
        let bullet = Shape::Circle(CircleShape::new(0.05));
        let mut wall_poly = PolygonShape::new();
        wall_poly.set_as_box(0.05, 2.0);
        let wall = Shape::Polygon(wall_poly);

        let proxy_a = DistanceProxy::new(&bullet, 0);
        let proxy_b = DistanceProxy::new(&wall, 0);

        // The bullet crosses the wall entirely within one step.
        let out = time_of_impact(&ToiInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            sweep_a: sweep_line(Vec2::new(-5.0, 0.0), Vec2::new(5.0, 0.0)),
            sweep_b: sweep_line(Vec2::ZERO, Vec2::ZERO),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Touching);
        assert!(out.t > 0.0 && out.t < 0.5);
    }

    #[test]
    fn parallel_paths_stay_separated() {
        let a = Shape::Circle(CircleShape::new(0.5));
        let b = Shape::Circle(CircleShape::new(0.5));
        let proxy_a = DistanceProxy::new(&a, 0);
        let proxy_b = DistanceProxy::new(&b, 0);

        let out = time_of_impact(&ToiInput {
            proxy_a: &proxy_a,
            proxy_b: &proxy_b,
            sweep_a: sweep_line(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0)),
            sweep_b: sweep_line(Vec2::new(0.0, 5.0), Vec2::new(10.0, 5.0)),
            t_max: 1.0,
        });
        assert_eq!(out.state, ToiState::Separated);
        assert_relative_eq!(out.t, 1.0);
    }
}
