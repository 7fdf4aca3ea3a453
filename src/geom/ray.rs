use nalgebra::{Point3, Vector3};

use crate::core::constants::GEOM_EPSILON;
use crate::geom::sphere::{Sphere, Spheroid};
use crate::geom::triangle::Triangle;

/// Barycentric coordinates and ray parameter of a ray/triangle crossing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    pub u: f64,
    pub v: f64,
    pub t: f64,
}

/// A ray: origin plus normalized direction.
///
/// A zero-length direction is degenerate and not guarded against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub origin: Point3<f64>,
    pub direction: Vector3<f64>,
}

impl Ray {
    pub fn new(origin: Point3<f64>, direction: Vector3<f64>) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray toward a target point.
    pub fn toward(origin: Point3<f64>, target: Point3<f64>) -> Self {
        Self::new(origin, target - origin)
    }

    pub fn point_at(&self, t: f64) -> Point3<f64> {
        self.origin + self.direction * t
    }

    /// Möller–Trumbore ray/triangle crossing.
    ///
    /// Returns `None` when the ray is near-parallel to the triangle plane or
    /// the barycentric coordinates fall outside the triangle. `t` may be
    /// negative; guarding against behind-the-origin hits is the caller's
    /// responsibility.
    pub fn cross_triangle(&self, tri: &Triangle) -> Option<TriangleHit> {
        let e1 = tri.p1 - tri.p0;
        let e2 = tri.p2 - tri.p0;
        let q = self.direction.cross(&e2);
        let a = e1.dot(&q);
        if a.abs() < GEOM_EPSILON {
            return None;
        }

        let f = 1.0 / a;
        let s = self.origin - tri.p0;
        let u = f * s.dot(&q);
        if u < 0.0 {
            return None;
        }

        let r = s.cross(&e1);
        let v = f * self.direction.dot(&r);
        if v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = f * e2.dot(&r);
        Some(TriangleHit { u, v, t })
    }

    /// Nearest crossing with a sphere that is in front of (or marginally
    /// behind) the origin.
    pub fn cross_sphere(&self, sphere: &Sphere) -> Option<Point3<f64>> {
        let (t0, t1) = self.sphere_roots(sphere)?;
        self.select_front_root(t0, t1).map(|t| self.point_at(t))
    }

    /// Both crossings with a sphere, nearest first.
    pub fn cross_sphere_all(&self, sphere: &Sphere) -> Option<[Point3<f64>; 2]> {
        let (t0, t1) = self.sphere_roots(sphere)?;
        Some([self.point_at(t0), self.point_at(t1)])
    }

    /// Nearest front crossing with an axis-aligned spheroid.
    pub fn cross_spheroid(&self, spheroid: &Spheroid) -> Option<Point3<f64>> {
        let (t0, t1) = self.spheroid_roots(spheroid)?;
        self.select_front_root(t0, t1).map(|t| self.point_at(t))
    }

    /// Both crossings with an axis-aligned spheroid, nearest first.
    pub fn cross_spheroid_all(&self, spheroid: &Spheroid) -> Option<[Point3<f64>; 2]> {
        let (t0, t1) = self.spheroid_roots(spheroid)?;
        Some([self.point_at(t0), self.point_at(t1)])
    }

    fn sphere_roots(&self, sphere: &Sphere) -> Option<(f64, f64)> {
        let oc = self.origin - sphere.center;
        let b = self.direction.dot(&oc);
        let c = oc.dot(&oc) - sphere.radius * sphere.radius;
        let discriminant = b * b - c;
        if discriminant < 0.0 {
            return None;
        }
        let sq = discriminant.sqrt();
        Some((-b - sq, -b + sq))
    }

    fn spheroid_roots(&self, spheroid: &Spheroid) -> Option<(f64, f64)> {
        // Scale by the semi-axes to reduce the quadric to a unit sphere.
        let oc = self.origin - spheroid.center;
        let m = oc.component_div(&spheroid.semi_axes);
        let n = self.direction.component_div(&spheroid.semi_axes);

        let a = n.dot(&n);
        let b = m.dot(&n);
        let c = m.dot(&m) - 1.0;
        let discriminant = b * b - a * c;
        if discriminant < 0.0 {
            return None;
        }
        let sq = discriminant.sqrt();
        Some(((-b - sq) / a, (-b + sq) / a))
    }

    /// Smallest root that is in front of (or on) the origin, with a
    /// tolerance proportional to the root spread so grazing hits at the
    /// origin are not lost to rounding.
    fn select_front_root(&self, t0: f64, t1: f64) -> Option<f64> {
        let tol = -(t1 - t0).abs() * GEOM_EPSILON;
        if t0 >= tol {
            Some(t0)
        } else if t1 >= tol {
            Some(t1)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_triangle() -> Triangle {
        Triangle::new(
            Point3::new(0.0, 0.0, 0.0),
            Point3::new(0.0, 1.0, 0.0),
            Point3::new(1.0, 0.0, 0.0),
        )
    }

    #[test]
    fn test_triangle_hit_through_vertex() {
        let ray = Ray::toward(Point3::new(0.0, 0.0, 10.0), Point3::new(0.0, 0.0, 0.0));
        let hit = ray.cross_triangle(&unit_triangle()).unwrap();
        assert_relative_eq!(hit.t, 10.0, epsilon = 1e-9);
        assert_relative_eq!(hit.u, 0.0, epsilon = 1e-9);
        assert_relative_eq!(hit.v, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle_hit_barycentric() {
        let tri = unit_triangle();
        let target = tri.barycentric(0.3, 0.1);
        let ray = Ray::toward(Point3::new(0.0, 0.0, 10.0), target);
        let hit = ray.cross_triangle(&tri).unwrap();
        assert_relative_eq!(hit.u, 0.3, epsilon = 1e-9);
        assert_relative_eq!(hit.v, 0.1, epsilon = 1e-9);
    }

    #[test]
    fn test_triangle_miss() {
        let ray = Ray::toward(Point3::new(0.0, 0.0, 10.0), Point3::new(1.0, 1.0, 0.0));
        assert!(ray.cross_triangle(&unit_triangle()).is_none());
    }

    #[test]
    fn test_triangle_parallel_ray() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 1.0), Vector3::new(1.0, 0.0, 0.0));
        assert!(ray.cross_triangle(&unit_triangle()).is_none());
    }

    #[test]
    fn test_triangle_negative_t_reported() {
        // The crossing is behind the origin; the hit is still reported with
        // t < 0 and it is up to the caller to care.
        let ray = Ray::new(Point3::new(0.25, 0.25, 1.0), Vector3::new(0.0, 0.0, 1.0));
        let hit = ray.cross_triangle(&unit_triangle()).unwrap();
        assert!(hit.t < 0.0);
    }

    #[test]
    fn test_sphere_front_hit() {
        let sphere = Sphere::new(Point3::origin(), 1.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let hit = ray.cross_sphere(&sphere).unwrap();
        assert_relative_eq!(hit.z, 1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere_all_roots() {
        let sphere = Sphere::new(Point3::origin(), 1.0);
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        let [near, far] = ray.cross_sphere_all(&sphere).unwrap();
        assert_relative_eq!(near.z, 1.0, epsilon = 1e-9);
        assert_relative_eq!(far.z, -1.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere_inside_selects_exit() {
        let sphere = Sphere::new(Point3::origin(), 2.0);
        let ray = Ray::new(Point3::origin(), Vector3::new(1.0, 0.0, 0.0));
        let hit = ray.cross_sphere(&sphere).unwrap();
        assert_relative_eq!(hit.x, 2.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sphere_behind_misses() {
        let sphere = Sphere::new(Point3::new(0.0, 0.0, -5.0), 1.0);
        let ray = Ray::new(Point3::origin(), Vector3::new(0.0, 0.0, 1.0));
        assert!(ray.cross_sphere(&sphere).is_none());
    }

    #[test]
    fn test_sphere_miss() {
        let sphere = Sphere::new(Point3::origin(), 1.0);
        let ray = Ray::new(Point3::new(0.0, 5.0, 5.0), Vector3::new(0.0, 0.0, -1.0));
        assert!(ray.cross_sphere(&sphere).is_none());
    }

    #[test]
    fn test_spheroid_matches_sphere_when_round() {
        let spheroid = Spheroid::new(Point3::origin(), Vector3::new(1.0, 1.0, 1.0));
        let sphere = Sphere::new(Point3::origin(), 1.0);
        let ray = Ray::new(Point3::new(3.0, 0.5, 0.0), Vector3::new(-1.0, 0.0, 0.0));
        let a = ray.cross_spheroid(&spheroid).unwrap();
        let b = ray.cross_sphere(&sphere).unwrap();
        assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
    }

    #[test]
    fn test_spheroid_squashed_axis() {
        // Semi-axis 0.5 along z: a vertical ray from above hits at z = 0.5.
        let spheroid = Spheroid::new(Point3::origin(), Vector3::new(1.0, 1.0, 0.5));
        let ray = Ray::new(Point3::new(0.0, 0.0, 4.0), Vector3::new(0.0, 0.0, -1.0));
        let hit = ray.cross_spheroid(&spheroid).unwrap();
        assert_relative_eq!(hit.z, 0.5, epsilon = 1e-9);

        let [near, far] = ray.cross_spheroid_all(&spheroid).unwrap();
        assert_relative_eq!(near.z, 0.5, epsilon = 1e-9);
        assert_relative_eq!(far.z, -0.5, epsilon = 1e-9);
    }
}
