use nalgebra::{Point3, Vector3};

use crate::core::constants::GEOM_EPSILON;
use crate::geom::ray::Ray;

/// A plane `Ax + By + Cz + D = 0`.
///
/// The sign of [`Plane::side`] encodes which half-space a homogeneous point
/// `(x, y, z, 1)` lies in. Coefficients are not required to be normalized;
/// frustum planes in particular are kept in clip-space scale on purpose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
}

impl Plane {
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self { a, b, c, d }
    }

    /// Plane through three points, or `None` if they are collinear.
    pub fn from_points(p0: &Point3<f64>, p1: &Point3<f64>, p2: &Point3<f64>) -> Option<Plane> {
        let normal = (p1 - p0).cross(&(p2 - p0));
        if normal.norm() < GEOM_EPSILON {
            return None;
        }
        let d = -normal.dot(&p0.coords);
        Some(Self::new(normal.x, normal.y, normal.z, d))
    }

    pub fn normal(&self) -> Vector3<f64> {
        Vector3::new(self.a, self.b, self.c)
    }

    /// Signed, scale-dependent distance of a point: the dot product of the
    /// homogeneous point `(x, y, z, 1)` with the plane 4-vector.
    pub fn side(&self, p: &Point3<f64>) -> f64 {
        self.a * p.x + self.b * p.y + self.c * p.z + self.d
    }

    /// The intersection line of two planes, or `None` if they are parallel.
    ///
    /// The direction is the cross product of the normalized normals. A point
    /// on the line is solved with Cramer's rule on the three possible 2x2
    /// minors of the two plane equations; the minor with the
    /// largest-magnitude determinant is used, checked in order Z, Y, X, to
    /// keep the division away from near-singular minors.
    pub fn cross(&self, other: &Plane) -> Option<Ray> {
        let n0 = self.normal().normalize();
        let n1 = other.normal().normalize();
        let direction = n0.cross(&n1);
        if direction.norm() < GEOM_EPSILON {
            return None;
        }

        let (a0, b0, c0, d0) = (self.a, self.b, self.c, self.d);
        let (a1, b1, c1, d1) = (other.a, other.b, other.c, other.d);

        // Determinants of the minors obtained by pinning z, y, x to zero.
        let det_z = a0 * b1 - a1 * b0;
        let det_y = a0 * c1 - a1 * c0;
        let det_x = b0 * c1 - b1 * c0;

        let az = det_z.abs();
        let ay = det_y.abs();
        let ax = det_x.abs();

        let origin = if az >= ay && az >= ax && az > 0.0 {
            // z = 0: solve a·x + b·y = -d in both planes.
            let x = (b0 * d1 - b1 * d0) / det_z;
            let y = (a1 * d0 - a0 * d1) / det_z;
            Point3::new(x, y, 0.0)
        } else if ay >= ax && ay > 0.0 {
            // y = 0
            let x = (c0 * d1 - c1 * d0) / det_y;
            let z = (a1 * d0 - a0 * d1) / det_y;
            Point3::new(x, 0.0, z)
        } else if ax > 0.0 {
            // x = 0
            let y = (c0 * d1 - c1 * d0) / det_x;
            let z = (b1 * d0 - b0 * d1) / det_x;
            Point3::new(0.0, y, z)
        } else {
            return None;
        };

        Some(Ray::new(origin, direction))
    }
}
