use nalgebra::{Point3, Vector3};

use crate::core::constants::{EARTH_POLAR_RADIUS, EARTH_RADIUS};

/// A sphere: center plus radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sphere {
    pub center: Point3<f64>,
    pub radius: f64,
}

impl Sphere {
    pub fn new(center: Point3<f64>, radius: f64) -> Self {
        Self { center, radius }
    }

    /// The spherical Earth approximation used by the visibility heuristics.
    pub fn earth() -> Self {
        Self::new(Point3::origin(), EARTH_RADIUS)
    }
}

/// An axis-aligned ellipsoid: center plus three semi-axes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spheroid {
    pub center: Point3<f64>,
    pub semi_axes: Vector3<f64>,
}

impl Spheroid {
    pub fn new(center: Point3<f64>, semi_axes: Vector3<f64>) -> Self {
        Self { center, semi_axes }
    }

    /// The WGS84 ellipsoid centered at the origin.
    pub fn wgs84() -> Self {
        Self::new(
            Point3::origin(),
            Vector3::new(EARTH_RADIUS, EARTH_RADIUS, EARTH_POLAR_RADIUS),
        )
    }
}
