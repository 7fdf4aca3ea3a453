//! Compensated (double-double) arithmetic for the high-precision matrix
//! cross-check.
//!
//! The camera keeps a second view matrix computed with error-free
//! transformations alongside the plain `f64` one. Nothing in the render path
//! consumes it; tests assert the two agree, which catches catastrophic
//! cancellation as the eye moves across the 1 m .. 1e7 m altitude range.

use nalgebra::{Matrix4, Point3, Vector3};

/// An unevaluated sum of two `f64`s carrying ~31 significant digits.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DDouble {
    hi: f64,
    lo: f64,
}

#[inline]
fn two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    let bb = s - a;
    (s, (a - (s - bb)) + (b - bb))
}

#[inline]
fn quick_two_sum(a: f64, b: f64) -> (f64, f64) {
    let s = a + b;
    (s, b - (s - a))
}

#[inline]
fn two_prod(a: f64, b: f64) -> (f64, f64) {
    let p = a * b;
    (p, a.mul_add(b, -p))
}

impl DDouble {
    pub const ZERO: DDouble = DDouble { hi: 0.0, lo: 0.0 };
    pub const ONE: DDouble = DDouble { hi: 1.0, lo: 0.0 };

    pub fn new(x: f64) -> Self {
        Self { hi: x, lo: 0.0 }
    }

    pub fn value(self) -> f64 {
        self.hi + self.lo
    }

    pub fn sqrt(self) -> Self {
        if self.hi == 0.0 {
            return Self::ZERO;
        }
        // One Newton step on top of the f64 square root doubles its
        // precision, which is all a double-double can hold.
        let approx = self.hi.sqrt();
        let a = Self::new(approx);
        let correction = (self - a * a) * Self::new(0.5 / approx);
        a + correction
    }
}

impl std::ops::Add for DDouble {
    type Output = DDouble;
    fn add(self, rhs: DDouble) -> DDouble {
        let (s, e) = two_sum(self.hi, rhs.hi);
        let (hi, lo) = quick_two_sum(s, e + self.lo + rhs.lo);
        DDouble { hi, lo }
    }
}

impl std::ops::Sub for DDouble {
    type Output = DDouble;
    fn sub(self, rhs: DDouble) -> DDouble {
        self + (-rhs)
    }
}

impl std::ops::Neg for DDouble {
    type Output = DDouble;
    fn neg(self) -> DDouble {
        DDouble {
            hi: -self.hi,
            lo: -self.lo,
        }
    }
}

impl std::ops::Mul for DDouble {
    type Output = DDouble;
    fn mul(self, rhs: DDouble) -> DDouble {
        let (p, e) = two_prod(self.hi, rhs.hi);
        let (hi, lo) = quick_two_sum(p, e + self.hi * rhs.lo + self.lo * rhs.hi);
        DDouble { hi, lo }
    }
}

impl std::ops::Div for DDouble {
    type Output = DDouble;
    fn div(self, rhs: DDouble) -> DDouble {
        let q1 = self.hi / rhs.hi;
        let r = self - rhs * DDouble::new(q1);
        let q2 = r.hi / rhs.hi;
        let r = r - rhs * DDouble::new(q2);
        let q3 = r.hi / rhs.hi;
        let (s, e) = quick_two_sum(q1, q2);
        DDouble { hi: s, lo: e } + DDouble::new(q3)
    }
}

type DVec3 = [DDouble; 3];

fn dvec(v: &Vector3<f64>) -> DVec3 {
    [DDouble::new(v.x), DDouble::new(v.y), DDouble::new(v.z)]
}

fn dpoint(p: &Point3<f64>) -> DVec3 {
    dvec(&p.coords)
}

fn dsub(a: &DVec3, b: &DVec3) -> DVec3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

fn ddot(a: &DVec3, b: &DVec3) -> DDouble {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn dcross(a: &DVec3, b: &DVec3) -> DVec3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dnormalize(a: &DVec3) -> DVec3 {
    let inv = DDouble::ONE / ddot(a, a).sqrt();
    [a[0] * inv, a[1] * inv, a[2] * inv]
}

/// A row-major 4x4 matrix of double-doubles.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreciseMat4 {
    m: [[DDouble; 4]; 4],
}

impl PreciseMat4 {
    pub fn identity() -> Self {
        let mut m = [[DDouble::ZERO; 4]; 4];
        for (i, row) in m.iter_mut().enumerate() {
            row[i] = DDouble::ONE;
        }
        Self { m }
    }

    /// Right-handed look-at view matrix, entry-for-entry the same layout as
    /// `Matrix4::look_at_rh`.
    pub fn look_at_rh(eye: &Point3<f64>, target: &Point3<f64>, up: &Vector3<f64>) -> Self {
        let eye_v = dpoint(eye);
        let f = dnormalize(&dsub(&dpoint(target), &eye_v));
        let s = dnormalize(&dcross(&f, &dvec(up)));
        let u = dcross(&s, &f);

        let mut m = Self::identity();
        for i in 0..3 {
            m.m[0][i] = s[i];
            m.m[1][i] = u[i];
            m.m[2][i] = -f[i];
        }
        m.m[0][3] = -ddot(&s, &eye_v);
        m.m[1][3] = -ddot(&u, &eye_v);
        m.m[2][3] = ddot(&f, &eye_v);
        m
    }

    /// Perspective matrix with the near/far-dependent entries carried in
    /// double-double; the focal term comes from the `f64` tangent, which is
    /// an input-level quantity.
    pub fn perspective(fovy: f64, aspect: f64, near: f64, far: f64) -> Self {
        let focal = DDouble::ONE / DDouble::new((fovy / 2.0).tan());
        let n = DDouble::new(near);
        let fr = DDouble::new(far);
        let depth = n - fr;

        let mut m = Self { m: [[DDouble::ZERO; 4]; 4] };
        m.m[0][0] = focal / DDouble::new(aspect);
        m.m[1][1] = focal;
        m.m[2][2] = (fr + n) / depth;
        m.m[2][3] = (DDouble::new(2.0) * fr * n) / depth;
        m.m[3][2] = -DDouble::ONE;
        m
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.m[row][col].value()
    }

    /// Largest absolute entry-wise difference against a plain `f64` matrix.
    pub fn max_abs_diff(&self, other: &Matrix4<f64>) -> f64 {
        let mut worst = 0.0_f64;
        for r in 0..4 {
            for c in 0..4 {
                let d = (self.get(r, c) - other[(r, c)]).abs();
                if d > worst {
                    worst = d;
                }
            }
        }
        worst
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ddouble_recovers_cancellation() {
        // (big + small) - big loses `small` entirely in f64 but not here.
        let big = DDouble::new(1.0e16);
        let small = DDouble::new(1.0);
        let sum = big + small;
        assert_relative_eq!((sum - big).value(), 1.0);
    }

    #[test]
    fn test_ddouble_mul_div_inverse() {
        let a = DDouble::new(3.1415926535897932);
        let b = DDouble::new(2.7182818284590452);
        let back = a * b / b;
        assert_relative_eq!(back.value(), a.value(), epsilon = 1e-15);
    }

    #[test]
    fn test_ddouble_sqrt() {
        let x = DDouble::new(2.0);
        let r = x.sqrt();
        assert_relative_eq!((r * r).value(), 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_look_at_matches_f64_near_origin() {
        let eye = Point3::new(0.0, -10.0, 4.0);
        let target = Point3::new(0.0, 0.0, 0.0);
        let up = Vector3::new(0.0, 0.0, 1.0);

        let dd = PreciseMat4::look_at_rh(&eye, &target, &up);
        let std = Matrix4::look_at_rh(&eye, &target, &up);
        assert!(dd.max_abs_diff(&std) < 1e-12);
    }

    #[test]
    fn test_perspective_matches_f64() {
        let dd = PreciseMat4::perspective(45f64.to_radians(), 1.5, 1.0, 1.0e8);
        let std = Matrix4::new_perspective(1.5, 45f64.to_radians(), 1.0, 1.0e8);
        assert!(dd.max_abs_diff(&std) < 1e-9);
    }
}
