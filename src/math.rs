use std::ops::{Add, AddAssign, Mul, MulAssign, Neg, Sub, SubAssign};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Vec2 {
    pub const ZERO: Self = Self::splat(0.0);
    pub const ONE: Self = Self::splat(1.0);

    #[inline(always)]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    #[inline(always)]
    pub const fn splat(value: f32) -> Self {
        Self { x: value, y: value }
    }

    #[inline]
    pub fn length(&self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    #[inline]
    pub fn length_squared(&self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    #[inline]
    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    #[inline]
    pub fn cross(&self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// v x s, yielding a vector.
    #[inline]
    pub fn cross_scalar(&self, scalar: f32) -> Self {
        Self {
            x: scalar * self.y,
            y: -scalar * self.x,
        }
    }

    /// s x v, yielding a vector.
    #[inline]
    pub fn scalar_cross(scalar: f32, vec: Self) -> Self {
        Self {
            x: -scalar * vec.y,
            y: scalar * vec.x,
        }
    }

    /// A vector perpendicular to this one, rotated +90 degrees.
    #[inline]
    pub fn skew(&self) -> Self {
        Self {
            x: -self.y,
            y: self.x,
        }
    }

    /// Unit vector in the same direction, or zero when the length is
    /// numerically insignificant.
    #[inline]
    pub fn normalize(&self) -> Self {
        let len = self.length();
        if len < f32::EPSILON {
            return Self::ZERO;
        }
        let inv = 1.0 / len;
        Self {
            x: self.x * inv,
            y: self.y * inv,
        }
    }

    #[inline]
    pub fn distance(a: Self, b: Self) -> f32 {
        (a - b).length()
    }

    #[inline]
    pub fn distance_squared(a: Self, b: Self) -> f32 {
        (a - b).length_squared()
    }

    #[inline]
    pub fn abs(&self) -> Self {
        Self {
            x: self.x.abs(),
            y: self.y.abs(),
        }
    }

    #[inline]
    pub fn min(&self, other: Self) -> Self {
        Self {
            x: self.x.min(other.x),
            y: self.y.min(other.y),
        }
    }

    #[inline]
    pub fn max(&self, other: Self) -> Self {
        Self {
            x: self.x.max(other.x),
            y: self.y.max(other.y),
        }
    }

    #[inline]
    pub fn clamp(&self, min: Self, max: Self) -> Self {
        self.max(min).min(max)
    }

    #[inline]
    pub fn is_valid(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Default for Vec2 {
    #[inline(always)]
    fn default() -> Self {
        Self { x: 0.0, y: 0.0 }
    }
}

impl Add for Vec2 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl AddAssign for Vec2 {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

impl Neg for Vec2 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self {
            x: -self.x,
            y: -self.y,
        }
    }
}

impl Sub for Vec2 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl SubAssign for Vec2 {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.x -= other.x;
        self.y -= other.y;
    }
}

impl Mul<f32> for Vec2 {
    type Output = Self;
    #[inline]
    fn mul(self, other: f32) -> Self {
        Self {
            x: self.x * other,
            y: self.y * other,
        }
    }
}

impl Mul<Vec2> for f32 {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self * other.x,
            y: self * other.y,
        }
    }
}

impl MulAssign<f32> for Vec2 {
    #[inline]
    fn mul_assign(&mut self, other: f32) {
        self.x *= other;
        self.y *= other;
    }
}

/// A column vector with three rows, used by the block joint solvers.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Self = Self {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    #[inline(always)]
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn dot(&self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    #[inline]
    pub fn cross(&self, other: Self) -> Self {
        Self {
            x: self.y * other.z - self.z * other.y,
            y: self.z * other.x - self.x * other.z,
            z: self.x * other.y - self.y * other.x,
        }
    }
}

impl Add for Vec3 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }
}

impl Sub for Vec3 {
    type Output = Self;
    #[inline]
    fn sub(self, other: Self) -> Self {
        Self::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }
}

impl Neg for Vec3 {
    type Output = Self;
    #[inline]
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

impl Mul<Vec3> for f32 {
    type Output = Vec3;
    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        Vec3::new(self * v.x, self * v.y, self * v.z)
    }
}

#[derive(Copy, Clone, Debug)]
pub struct Mat2x2 {
    pub col1: Vec2,
    pub col2: Vec2,
}

impl Mat2x2 {
    pub const ZERO: Mat2x2 = Mat2x2 {
        col1: Vec2::ZERO,
        col2: Vec2::ZERO,
    };

    pub const IDENTITY: Mat2x2 = Mat2x2 {
        col1: Vec2::new(1.0, 0.0),
        col2: Vec2::new(0.0, 1.0),
    };

    #[inline(always)]
    pub const fn new(m00: f32, m01: f32, m10: f32, m11: f32) -> Self {
        Self {
            col1: Vec2::new(m00, m10),
            col2: Vec2::new(m01, m11),
        }
    }

    #[inline(always)]
    pub const fn from_cols(col1: Vec2, col2: Vec2) -> Self {
        Self { col1, col2 }
    }

    #[inline]
    pub const fn transpose(&self) -> Self {
        Self {
            col1: Vec2::new(self.col1.x, self.col2.x),
            col2: Vec2::new(self.col1.y, self.col2.y),
        }
    }

    #[inline]
    pub fn determinant(&self) -> f32 {
        self.col1.x * self.col2.y - self.col2.x * self.col1.y
    }

    /// The inverse, or the zero matrix when this matrix is singular.
    #[inline]
    pub fn invert(&self) -> Self {
        let det = self.determinant();
        if det == 0.0 {
            return Self::ZERO;
        }
        let inv_det = det.recip();
        Self::new(
            inv_det * self.col2.y,
            -inv_det * self.col2.x,
            -inv_det * self.col1.y,
            inv_det * self.col1.x,
        )
    }

    /// Solve A * x = b. Degenerate systems yield x = 0 so the asking
    /// constraint simply applies no impulse this iteration.
    #[inline]
    pub fn solve(&self, b: Vec2) -> Vec2 {
        let mut det = self.determinant();
        if det != 0.0 {
            det = det.recip();
        }
        Vec2::new(
            det * (self.col2.y * b.x - self.col2.x * b.y),
            det * (self.col1.x * b.y - self.col1.y * b.x),
        )
    }
}

impl Add for Mat2x2 {
    type Output = Self;
    #[inline]
    fn add(self, other: Self) -> Self {
        Self {
            col1: self.col1 + other.col1,
            col2: self.col2 + other.col2,
        }
    }
}

impl Mul<Vec2> for Mat2x2 {
    type Output = Vec2;
    #[inline]
    fn mul(self, v: Vec2) -> Vec2 {
        Vec2::new(
            self.col1.x * v.x + self.col2.x * v.y,
            self.col1.y * v.x + self.col2.y * v.y,
        )
    }
}

/// A 3-by-3 matrix stored in column-major order.
#[derive(Copy, Clone, Debug)]
pub struct Mat3x3 {
    pub col1: Vec3,
    pub col2: Vec3,
    pub col3: Vec3,
}

impl Mat3x3 {
    pub const ZERO: Mat3x3 = Mat3x3 {
        col1: Vec3::ZERO,
        col2: Vec3::ZERO,
        col3: Vec3::ZERO,
    };

    #[inline(always)]
    pub const fn from_cols(col1: Vec3, col2: Vec3, col3: Vec3) -> Self {
        Self { col1, col2, col3 }
    }

    /// Solve A * x = b for the full 3x3 system. Degenerate systems yield
    /// x = 0.
    pub fn solve33(&self, b: Vec3) -> Vec3 {
        let mut det = self.col1.dot(self.col2.cross(self.col3));
        if det != 0.0 {
            det = det.recip();
        }
        Vec3::new(
            det * b.dot(self.col2.cross(self.col3)),
            det * self.col1.dot(b.cross(self.col3)),
            det * self.col1.dot(self.col2.cross(b)),
        )
    }

    /// Solve A * x = b using only the upper-left 2x2 block. Degenerate
    /// systems yield x = 0.
    pub fn solve22(&self, b: Vec2) -> Vec2 {
        let a11 = self.col1.x;
        let a12 = self.col2.x;
        let a21 = self.col1.y;
        let a22 = self.col2.y;
        let mut det = a11 * a22 - a12 * a21;
        if det != 0.0 {
            det = det.recip();
        }
        Vec2::new(det * (a22 * b.x - a12 * b.y), det * (a11 * b.y - a21 * b.x))
    }

    /// The inverse of the upper-left 2x2 block, widened with a zero third
    /// row and column.
    pub fn get_inverse22(&self) -> Self {
        let a = self.col1.x;
        let b = self.col2.x;
        let c = self.col1.y;
        let d = self.col2.y;
        let mut det = a * d - b * c;
        if det != 0.0 {
            det = det.recip();
        }
        Self {
            col1: Vec3::new(det * d, -det * c, 0.0),
            col2: Vec3::new(-det * b, det * a, 0.0),
            col3: Vec3::ZERO,
        }
    }

    /// The symmetric inverse of the full matrix, used by soft weld
    /// constraints.
    pub fn get_sym_inverse33(&self) -> Self {
        let mut det = self.col1.dot(self.col2.cross(self.col3));
        if det != 0.0 {
            det = det.recip();
        }
        let a11 = self.col1.x;
        let a12 = self.col2.x;
        let a13 = self.col3.x;
        let a22 = self.col2.y;
        let a23 = self.col3.y;
        let a33 = self.col3.z;

        let m11 = det * (a22 * a33 - a23 * a23);
        let m12 = det * (a13 * a23 - a12 * a33);
        let m13 = det * (a12 * a23 - a13 * a22);
        let m22 = det * (a11 * a33 - a13 * a13);
        let m23 = det * (a13 * a12 - a11 * a23);
        let m33 = det * (a11 * a22 - a12 * a12);

        Self {
            col1: Vec3::new(m11, m12, m13),
            col2: Vec3::new(m12, m22, m23),
            col3: Vec3::new(m13, m23, m33),
        }
    }
}

impl Mul<Vec3> for Mat3x3 {
    type Output = Vec3;
    #[inline]
    fn mul(self, v: Vec3) -> Vec3 {
        v.x * self.col1 + v.y * self.col2 + v.z * self.col3
    }
}

/// A rotation stored as a sine/cosine pair.
#[derive(Copy, Clone, Debug)]
pub struct Rot {
    /// Sine
    pub s: f32,
    /// Cosine
    pub c: f32,
}

impl Rot {
    pub const IDENTITY: Self = Self { s: 0.0, c: 1.0 };

    /// Construct a new rotation from an angle in radians.
    #[inline(always)]
    pub fn new(angle: f32) -> Self {
        Self {
            s: angle.sin(),
            c: angle.cos(),
        }
    }

    /// Get the angle in radians.
    #[inline]
    pub fn get_angle(&self) -> f32 {
        self.s.atan2(self.c)
    }

    /// Get the X-axis
    #[inline]
    pub fn get_x_axis(&self) -> Vec2 {
        Vec2::new(self.c, self.s)
    }

    /// Get the Y-axis
    #[inline]
    pub fn get_y_axis(&self) -> Vec2 {
        Vec2::new(-self.s, self.c)
    }

    /// Get the inverse of this rotation.
    #[inline]
    pub fn get_inverse(&self) -> Self {
        Self {
            s: -self.s,
            c: self.c,
        }
    }

    /// Inverse-rotate a vector.
    #[inline]
    pub fn mul_t_vec2(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.c * v.x + self.s * v.y, -self.s * v.x + self.c * v.y)
    }

    /// Transpose multiply: self^T * other.
    #[inline]
    pub fn mul_t(&self, other: Self) -> Self {
        Self {
            s: self.c * other.s - self.s * other.c,
            c: self.c * other.c + self.s * other.s,
        }
    }
}

impl Mul for Rot {
    type Output = Self;
    #[inline]
    fn mul(self, other: Self) -> Self {
        Self {
            s: self.s * other.c + self.c * other.s,
            c: self.c * other.c - self.s * other.s,
        }
    }
}

impl Mul<Vec2> for Rot {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        Vec2 {
            x: self.c * other.x - self.s * other.y,
            y: self.s * other.x + self.c * other.y,
        }
    }
}

impl Default for Rot {
    #[inline(always)]
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// A transform contains translation and rotation. It is used to represent
/// the position and orientation of rigid frames.
#[derive(Clone, Copy, Debug, Default)]
pub struct Transform {
    pub p: Vec2,
    pub q: Rot,
}

impl Transform {
    pub const IDENTITY: Self = Self {
        p: Vec2::ZERO,
        q: Rot::IDENTITY,
    };

    /// Set this based on the position and angle.
    #[inline(always)]
    pub fn new(p: Vec2, angle: f32) -> Self {
        Self {
            p,
            q: Rot::new(angle),
        }
    }

    /// Get the angle in radians.
    #[inline]
    pub fn get_angle(&self) -> f32 {
        self.q.get_angle()
    }

    /// Transform a point from local into world coordinates.
    #[inline]
    pub fn mul_vec2(&self, v: Vec2) -> Vec2 {
        self.q * v + self.p
    }

    /// Transform a point from world into local coordinates.
    #[inline]
    pub fn mul_t_vec2(&self, v: Vec2) -> Vec2 {
        self.q.mul_t_vec2(v - self.p)
    }

    /// Compose two transforms.
    #[inline]
    pub fn mul(&self, t: Self) -> Self {
        Self {
            p: self.mul_vec2(t.p),
            q: self.q * t.q,
        }
    }

    /// Express `t` relative to this frame.
    #[inline]
    pub fn mul_t(&self, t: Self) -> Self {
        Self {
            p: self.q.mul_t_vec2(t.p - self.p),
            q: self.q.mul_t(t.q),
        }
    }
}

impl Mul<Vec2> for Transform {
    type Output = Vec2;
    #[inline]
    fn mul(self, other: Vec2) -> Vec2 {
        self.mul_vec2(other)
    }
}

/// This describes the motion of a body/shape for TOI computation.
/// Shapes are defined with respect to the body origin, which may
/// not coincide with the center of mass. However, to support dynamics
/// we must interpolate the center of mass position.
#[derive(Clone, Copy, Debug, Default)]
pub struct Sweep {
    /// Local center of mass position
    pub local_center: Vec2,

    /// Center world positions
    pub c0: Vec2,
    pub c: Vec2,

    /// World angles
    pub a0: f32,
    pub a: f32,

    /// Fraction of the current time step in the range [0,1]
    /// c0 and a0 are the positions at alpha0.
    pub alpha0: f32,
}

impl Sweep {
    /// Get the interpolated transform at a specific time.
    /// `beta` is a factor in [0,1], where 0 indicates alpha0.
    pub fn get_transform(&self, beta: f32) -> Transform {
        let mut xf = Transform {
            p: (1.0 - beta) * self.c0 + beta * self.c,
            q: Rot::new((1.0 - beta) * self.a0 + beta * self.a),
        };
        // Shift to origin.
        xf.p -= xf.q * self.local_center;
        xf
    }

    /// Advance the sweep forward, yielding a new initial state.
    /// `alpha` is the new initial time.
    pub fn advance(&mut self, alpha: f32) {
        debug_assert!(self.alpha0 < 1.0);
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += beta * (self.c - self.c0);
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Normalize the angles to keep them near zero across long runs.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn equality_with_tolerance(m1: Mat2x2, m2: Mat2x2, tolerance: f32) -> bool {
        ((m1.col1.x - m2.col1.x).abs() < tolerance)
            && ((m1.col1.y - m2.col1.y).abs() < tolerance)
            && ((m1.col2.x - m2.col2.x).abs() < tolerance)
            && ((m1.col2.y - m2.col2.y).abs() < tolerance)
    }

    #[test]
    fn test_invert() {
        let m = Mat2x2::new(1.0, 2.0, 3.0, 4.0);
        let result = m.invert();
        let expected = Mat2x2::new(-2.0, 1.0, 3.0 / 2.0, -1.0 / 2.0);
        assert!(equality_with_tolerance(result, expected, 0.0001));
    }

    #[test]
    fn test_solve22() {
        let m = Mat2x2::new(2.0, 1.0, 1.0, 3.0);
        let b = Vec2::new(5.0, 10.0);
        let x = m.solve(b);
        let back = m * x;
        assert_relative_eq!(back.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, b.y, epsilon = 1e-5);
    }

    #[test]
    fn test_solve33() {
        let m = Mat3x3::from_cols(
            Vec3::new(4.0, 1.0, 0.0),
            Vec3::new(1.0, 3.0, 1.0),
            Vec3::new(0.0, 1.0, 2.0),
        );
        let b = Vec3::new(1.0, 2.0, 3.0);
        let x = m.solve33(b);
        let back = m * x;
        assert_relative_eq!(back.x, b.x, epsilon = 1e-5);
        assert_relative_eq!(back.y, b.y, epsilon = 1e-5);
        assert_relative_eq!(back.z, b.z, epsilon = 1e-5);
    }

    #[test]
    fn transform_round_trip() {
        let xf = Transform::new(Vec2::new(1.0, -2.0), 0.7);
        let p = Vec2::new(3.0, 4.0);
        let q = xf.mul_t_vec2(xf.mul_vec2(p));
        assert_relative_eq!(q.x, p.x, epsilon = 1e-5);
        assert_relative_eq!(q.y, p.y, epsilon = 1e-5);
    }

    #[test]
    fn sweep_advance_preserves_endpoint() {
        let mut sweep = Sweep {
            local_center: Vec2::ZERO,
            c0: Vec2::new(0.0, 0.0),
            c: Vec2::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            alpha0: 0.0,
        };
        sweep.advance(0.5);
        assert_relative_eq!(sweep.c0.x, 5.0, epsilon = 1e-5);
        assert_relative_eq!(sweep.a0, 0.5, epsilon = 1e-5);
        // The end of the sweep is untouched.
        assert_relative_eq!(sweep.c.x, 10.0, epsilon = 1e-5);
    }
}
