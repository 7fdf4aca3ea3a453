//! Coordinate reference system conversions.
//!
//! Pure, stateless transforms between the three frames the engine works in:
//! geodetic longitude/latitude/altitude (EPSG:4326), Web-Mercator meters
//! (EPSG:3857) and geocentric ECEF meters on the WGS84 ellipsoid. Everything
//! downstream (tile corners, camera altitude) goes through [`forward`].

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::f64::consts::{FRAC_PI_2, FRAC_PI_4, PI};

use crate::core::constants::{EARTH_ECCENTRICITY_SQ, EARTH_RADIUS};

/// The coordinate reference systems the engine converts between.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Crs {
    /// Longitude/latitude in degrees, altitude in meters (EPSG:4326).
    Geodetic,
    /// Web-Mercator meters, origin at lon/lat 0 (EPSG:3857).
    WebMercator,
    /// Earth-centered earth-fixed Cartesian meters (WGS84 geocentric).
    Geocentric,
}

/// A 3D position tagged with the frame it is expressed in.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CrsPoint {
    pub v: Vector3<f64>,
    pub crs: Crs,
}

impl CrsPoint {
    pub fn new(v: Vector3<f64>, crs: Crs) -> Self {
        Self { v, crs }
    }

    /// Reproject into another frame.
    pub fn to(&self, crs: Crs) -> CrsPoint {
        CrsPoint::new(forward(self.crs, crs, self.v), crs)
    }
}

/// Reproject a coordinate from one frame to another.
///
/// Geodetic coordinates are `(lon_deg, lat_deg, alt_m)`; Web-Mercator
/// coordinates are `(x_m, y_m, alt_m)` with the altitude passed through.
pub fn forward(from: Crs, to: Crs, v: Vector3<f64>) -> Vector3<f64> {
    match (from, to) {
        (a, b) if a == b => v,
        (Crs::Geodetic, Crs::WebMercator) => geodetic_to_mercator(v),
        (Crs::WebMercator, Crs::Geodetic) => mercator_to_geodetic(v),
        (Crs::Geodetic, Crs::Geocentric) => geodetic_to_geocentric(v),
        (Crs::Geocentric, Crs::Geodetic) => geocentric_to_geodetic(v),
        (Crs::WebMercator, Crs::Geocentric) => {
            geodetic_to_geocentric(mercator_to_geodetic(v))
        }
        (Crs::Geocentric, Crs::WebMercator) => {
            geodetic_to_mercator(geocentric_to_geodetic(v))
        }
        _ => unreachable!(),
    }
}

fn geodetic_to_mercator(v: Vector3<f64>) -> Vector3<f64> {
    let x = v.x.to_radians() * EARTH_RADIUS;
    let y = (FRAC_PI_4 + v.y.to_radians() / 2.0).tan().ln() * EARTH_RADIUS;
    Vector3::new(x, y, v.z)
}

fn mercator_to_geodetic(v: Vector3<f64>) -> Vector3<f64> {
    let lon = (v.x / EARTH_RADIUS).to_degrees();
    let lat = (2.0 * (v.y / EARTH_RADIUS).exp().atan() - FRAC_PI_2).to_degrees();
    Vector3::new(lon, lat, v.z)
}

fn geodetic_to_geocentric(v: Vector3<f64>) -> Vector3<f64> {
    let lon = v.x.to_radians();
    let lat = v.y.to_radians();
    let h = v.z;
    let sin_lat = lat.sin();
    let cos_lat = lat.cos();
    // Prime-vertical radius of curvature.
    let n = EARTH_RADIUS / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
    Vector3::new(
        (n + h) * cos_lat * lon.cos(),
        (n + h) * cos_lat * lon.sin(),
        (n * (1.0 - EARTH_ECCENTRICITY_SQ) + h) * sin_lat,
    )
}

fn geocentric_to_geodetic(v: Vector3<f64>) -> Vector3<f64> {
    let lon = v.y.atan2(v.x);
    let p = (v.x * v.x + v.y * v.y).sqrt();

    // Degenerate polar axis: latitude is ±90, altitude measured along z.
    if p < 1e-9 {
        let lat = if v.z >= 0.0 { FRAC_PI_2 } else { -FRAC_PI_2 };
        let b = EARTH_RADIUS * (1.0 - EARTH_ECCENTRICITY_SQ).sqrt();
        return Vector3::new(lon.to_degrees(), lat.to_degrees(), v.z.abs() - b);
    }

    // Fixed-point iteration on the geodetic latitude; converges in a handful
    // of rounds for any point outside the core.
    let mut lat = (v.z / (p * (1.0 - EARTH_ECCENTRICITY_SQ))).atan();
    let mut n = EARTH_RADIUS;
    for _ in 0..8 {
        let sin_lat = lat.sin();
        n = EARTH_RADIUS / (1.0 - EARTH_ECCENTRICITY_SQ * sin_lat * sin_lat).sqrt();
        let next = ((v.z + EARTH_ECCENTRICITY_SQ * n * sin_lat) / p).atan();
        if (next - lat).abs() < 1e-14 {
            lat = next;
            break;
        }
        lat = next;
    }
    let h = p / lat.cos() - n;
    Vector3::new(lon.to_degrees(), lat.to_degrees(), h)
}

/// Half the side length of the square Web-Mercator world, in meters.
pub fn mercator_half_world() -> f64 {
    PI * EARTH_RADIUS
}
