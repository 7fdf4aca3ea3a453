//! Engine-wide constants derived from WGS84 and common web-map conventions.
//! Keeping them in a single place makes it easier to tweak engine-wide magic numbers.

/// WGS84 equatorial radius in meters (also the Web-Mercator sphere radius).
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// WGS84 polar semi-axis in meters.
pub const EARTH_POLAR_RADIUS: f64 = 6_356_752.314_245;

/// Square of the WGS84 first eccentricity.
pub const EARTH_ECCENTRICITY_SQ: f64 = 6.694_379_990_141_316e-3;

/// Latitude at which the square Web-Mercator world is clipped.
pub const MAX_LATITUDE: f64 = 85.051_128_779_8;

/// Default square tile size in pixels.
pub const TILE_SIZE: u32 = 256;

/// Tiles at or below this level are fetched as a full grid; culling
/// heuristics are unreliable at whole-globe scale.
pub const BOOTSTRAP_LEVEL: u8 = 6;

/// Default pyramid depth bounds.
pub const DEFAULT_MIN_LEVEL: u8 = 2;
pub const DEFAULT_MAX_LEVEL: u8 = 20;

/// Tolerance below which geometric determinants count as degenerate.
pub const GEOM_EPSILON: f64 = 1e-6;

/// Subdomains rotated into `{s}` URL templates.
pub const DEFAULT_SUBDOMAINS: [&str; 3] = ["a", "b", "c"];
