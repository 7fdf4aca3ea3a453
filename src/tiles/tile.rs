use image::RgbaImage;
use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::camera::frustum::Frustum;
use crate::core::constants::{DEFAULT_SUBDOMAINS, EARTH_RADIUS};
use crate::core::crs::{forward, Crs};
use crate::geom::Triangle;

/// Identity of a slippy-map tile: zoom level plus grid coordinates, origin
/// at the top-left of the Web-Mercator square.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileKey {
    pub z: u8,
    pub x: u32,
    pub y: u32,
}

impl TileKey {
    pub fn new(z: u8, x: u32, y: u32) -> Self {
        Self { z, x, y }
    }

    /// The four children one level down, in the fixed quadrant order the
    /// quadtree uses everywhere: (2x,2y), (2x+1,2y), (2x,2y+1), (2x+1,2y+1).
    pub fn children(&self) -> [TileKey; 4] {
        let (z, x, y) = (self.z + 1, self.x * 2, self.y * 2);
        [
            TileKey::new(z, x, y),
            TileKey::new(z, x + 1, y),
            TileKey::new(z, x, y + 1),
            TileKey::new(z, x + 1, y + 1),
        ]
    }

    pub fn parent(&self) -> Option<TileKey> {
        if self.z == 0 {
            None
        } else {
            Some(TileKey::new(self.z - 1, self.x / 2, self.y / 2))
        }
    }

    /// This key's ancestor coordinate at a shallower level.
    pub fn ancestor_at(&self, z: u8) -> Option<TileKey> {
        if z > self.z {
            return None;
        }
        let shift = self.z - z;
        Some(TileKey::new(z, self.x >> shift, self.y >> shift))
    }

    pub fn is_valid(&self) -> bool {
        let max = 1u32 << self.z.min(31);
        self.x < max && self.y < max
    }
}

/// An axis-aligned Web-Mercator rectangle in meters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Extent {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl Extent {
    /// Half-open containment: a point on the max edge belongs to the
    /// neighboring tile.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.xmin && x < self.xmax && y > self.ymin && y <= self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// One imagery tile.
///
/// Immutable once constructed except for the image/ready pair, which is set
/// exactly once when the fetch completes.
#[derive(Debug, Clone)]
pub struct Tile {
    pub key: TileKey,
    url_template: String,
    image: Option<RgbaImage>,
    ready: bool,
}

impl Tile {
    pub fn new(key: TileKey, url_template: impl Into<String>) -> Self {
        Self {
            key,
            url_template: url_template.into(),
            image: None,
            ready: false,
        }
    }

    /// Substitute `{z}`, `{x}`, `{y}` (and `{s}`, rotated over the default
    /// subdomain list keyed by `(x + y) % len`) into the template.
    pub fn url(&self) -> String {
        let mut url = self
            .url_template
            .replace("{z}", &self.key.z.to_string())
            .replace("{x}", &self.key.x.to_string())
            .replace("{y}", &self.key.y.to_string());
        if url.contains("{s}") {
            let idx = ((self.key.x + self.key.y) % DEFAULT_SUBDOMAINS.len() as u32) as usize;
            url = url.replace("{s}", DEFAULT_SUBDOMAINS[idx]);
        }
        url
    }

    /// The tile's Web-Mercator extent, derived analytically from the slippy
    /// scheme: the world square is `2π·R` wide and the y origin is at the
    /// top (north) edge.
    pub fn extent(&self) -> Extent {
        let world = 2.0 * PI * EARTH_RADIUS;
        let size = world / (1u64 << self.key.z) as f64;
        let half = world / 2.0;
        let xmin = -half + self.key.x as f64 * size;
        let ymax = half - self.key.y as f64 * size;
        Extent {
            xmin,
            ymin: ymax - size,
            xmax: xmin + size,
            ymax,
        }
    }

    /// The four extent corners reprojected to geocentric coordinates, in
    /// quad order: (xmin,ymin), (xmax,ymin), (xmax,ymax), (xmin,ymax).
    pub fn corners_geocentric(&self) -> [Point3<f64>; 4] {
        let e = self.extent();
        let corner = |x: f64, y: f64| {
            Point3::from(forward(
                Crs::WebMercator,
                Crs::Geocentric,
                Vector3::new(x, y, 0.0),
            ))
        };
        [
            corner(e.xmin, e.ymin),
            corner(e.xmax, e.ymin),
            corner(e.xmax, e.ymax),
            corner(e.xmin, e.ymax),
        ]
    }

    /// The four child tiles sharing this tile's URL template.
    pub fn sub_tiles(&self) -> [Tile; 4] {
        self.key
            .children()
            .map(|key| Tile::new(key, self.url_template.clone()))
    }

    /// True when the whole tile sits on the far side of the body from the
    /// camera.
    ///
    /// Each corner's outward normal is taken as its normalized position, a
    /// sphere tangent approximation. On the real ellipsoid the tangent
    /// normal differs slightly, so this can misjudge tiles right at the limb
    /// as the frustum narrows during a zoom.
    pub fn is_back(&self, frustum: &Frustum) -> bool {
        self.corners_geocentric().iter().all(|corner| {
            let normal = corner.coords.normalize();
            let to_camera = frustum.viewpoint - *corner;
            normal.dot(&to_camera) < 0.0
        })
    }

    /// Frustum test on the tile's corner quad.
    ///
    /// Separating-plane reject, then trivial corner accept, then the
    /// edge-ray fallback for the case where the frustum pokes through the
    /// tile interior without containing any corner. The edge-ray crossing is
    /// a line test (`t` unguarded), so the crossing direction sign does not
    /// matter.
    pub fn intersect_frustum(&self, frustum: &Frustum) -> bool {
        let corners = self.corners_geocentric();

        for plane in frustum.planes().into_iter().flatten() {
            if corners.iter().all(|c| plane.side(c) < 0.0) {
                return false;
            }
        }

        if corners.iter().any(|c| frustum.contains_point(c)) {
            return true;
        }

        let triangles = [
            Triangle::new(corners[0], corners[1], corners[2]),
            Triangle::new(corners[0], corners[2], corners[3]),
        ];
        for ray in frustum.edge_rays() {
            for tri in &triangles {
                if ray.cross_triangle(tri).is_some() {
                    return true;
                }
            }
        }
        false
    }

    /// Back-face reject first; the frustum tests only run if it passes.
    pub fn visible(&self, frustum: &Frustum) -> bool {
        !self.is_back(frustum) && self.intersect_frustum(frustum)
    }

    /// Attach the fetched image. First completion wins; later calls no-op.
    pub fn complete(&mut self, image: RgbaImage) {
        if self.ready {
            log::debug!("tile {:?} completed twice, keeping first image", self.key);
            return;
        }
        self.image = Some(image);
        self.ready = true;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn image(&self) -> Option<&RgbaImage> {
        self.image.as_ref()
    }

    pub fn url_template(&self) -> &str {
        &self.url_template
    }
}
