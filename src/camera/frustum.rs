use nalgebra::{Matrix4, Point3, RowVector4, Vector4};

use crate::camera::{Camera, Projection};
use crate::geom::{Plane, Ray};

/// The six clip planes of a camera/projection pair, plus the cached points
/// visibility tests keep asking for.
///
/// Planes are extracted from `M = projection * view` by the row
/// sum/difference technique and deliberately left unnormalized: downstream
/// distance comparisons run in clip-space-scaled units, and the tie-break
/// behavior of the tile tests depends on that scale. A plane whose row comes
/// out non-finite (an infinite far distance, for instance) is stored as
/// `None` and treated as no constraint.
#[derive(Debug, Clone)]
pub struct Frustum {
    pub left: Option<Plane>,
    pub right: Option<Plane>,
    pub bottom: Option<Plane>,
    pub top: Option<Plane>,
    pub near: Option<Plane>,
    pub far: Option<Plane>,
    /// The camera eye.
    pub viewpoint: Point3<f64>,
    /// The camera look-at point.
    pub targetpoint: Point3<f64>,
    /// The clip-space origin unprojected through `M⁻¹`.
    pub centerpoint: Option<Point3<f64>>,
}

fn plane_from_row(row: RowVector4<f64>) -> Option<Plane> {
    if row.iter().all(|v| v.is_finite()) {
        Some(Plane::new(row[0], row[1], row[2], row[3]))
    } else {
        None
    }
}

fn unproject_origin(m: &Matrix4<f64>) -> Option<Point3<f64>> {
    let inv = m.try_inverse()?;
    let v = inv * Vector4::new(0.0, 0.0, 0.0, 1.0);
    if v.w.abs() < f64::EPSILON || !v.iter().all(|c| c.is_finite()) {
        return None;
    }
    Some(Point3::new(v.x / v.w, v.y / v.w, v.z / v.w))
}

impl Frustum {
    /// Build the frustum for the current camera/projection state. Called
    /// fresh every frame; a frustum has no lifecycle of its own.
    pub fn new(projection: &Projection, camera: &Camera) -> Self {
        let m = projection.matrix() * camera.view_matrix();
        let r0 = m.row(0);
        let r1 = m.row(1);
        let r2 = m.row(2);
        let r3 = m.row(3);

        Self {
            left: plane_from_row(r3 + r0),
            right: plane_from_row(r3 - r0),
            bottom: plane_from_row(r3 + r1),
            top: plane_from_row(r3 - r1),
            near: plane_from_row(r3 + r2),
            far: plane_from_row(r3 - r2),
            viewpoint: camera.from_point(),
            targetpoint: camera.target_point(),
            centerpoint: unproject_origin(&m),
        }
    }

    /// The planes in fixed order: left, right, bottom, top, near, far.
    pub fn planes(&self) -> [&Option<Plane>; 6] {
        [
            &self.left,
            &self.right,
            &self.bottom,
            &self.top,
            &self.near,
            &self.far,
        ]
    }

    /// True when the point is on the inner side of every present plane; a
    /// missing plane always passes.
    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        self.planes()
            .iter()
            .all(|plane| plane.map_or(true, |pl| pl.side(p) >= 0.0))
    }

    /// The four side-edge rays of the frustum: left∩bottom, bottom∩right,
    /// right∩top, left∩top. Pairs with a missing or parallel plane
    /// contribute nothing.
    pub fn edge_rays(&self) -> Vec<Ray> {
        let pairs = [
            (&self.left, &self.bottom),
            (&self.bottom, &self.right),
            (&self.right, &self.top),
            (&self.left, &self.top),
        ];
        pairs
            .iter()
            .filter_map(|(a, b)| match (a, b) {
                (Some(pa), Some(pb)) => pa.cross(pb),
                _ => None,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frustum_above() -> (Frustum, Camera) {
        let camera = Camera::above(118.767335, 32.050471, 1.0e6);
        let projection = Projection::default();
        (Frustum::new(&projection, &camera), camera)
    }

    #[test]
    fn test_target_inside_eye_behind() {
        let (frustum, camera) = frustum_above();
        assert!(frustum.contains_point(&camera.target_point()));

        // A point behind the eye, away from the globe, fails the near plane.
        let behind = camera.from_point()
            + (camera.from_point() - camera.target_point()).normalize() * 1_000.0;
        assert!(!frustum.contains_point(&behind));
    }

    #[test]
    fn test_all_planes_present_for_finite_projection() {
        let (frustum, _) = frustum_above();
        assert!(frustum.planes().iter().all(|p| p.is_some()));
        assert_eq!(frustum.edge_rays().len(), 4);
    }

    #[test]
    fn test_infinite_far_becomes_unconstrained() {
        let camera = Camera::above(0.0, 0.0, 1.0e6);
        let projection = Projection::new(45f64.to_radians(), 1.0, 1.0, f64::INFINITY);
        let frustum = Frustum::new(&projection, &camera);

        assert!(frustum.far.is_none());
        // The side planes survive, and the target still classifies inside.
        assert!(frustum.left.is_some());
        assert!(frustum.contains_point(&camera.target_point()));
    }

    #[test]
    fn test_centerpoint_between_near_and_far() {
        let (frustum, camera) = frustum_above();
        let center = frustum.centerpoint.expect("invertible projection");
        // The clip-space origin lies on the view axis in front of the eye.
        let dir = (camera.target_point() - camera.from_point()).normalize();
        let along = (center - camera.from_point()).dot(&dir);
        assert!(along > 0.0);
    }

    #[test]
    fn test_edge_rays_lie_on_their_planes() {
        let (frustum, _) = frustum_above();
        let left = frustum.left.unwrap();
        let bottom = frustum.bottom.unwrap();
        let ray = left.cross(&bottom).unwrap();
        assert!(left.side(&ray.origin).abs() < 1e-4);
        assert!(bottom.side(&ray.origin).abs() < 1e-4);
    }
}
