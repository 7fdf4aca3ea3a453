//! # tinyearth
//!
//! A globe tile-visibility and streaming engine.
//!
//! Every frame, a perspective camera orbits a planet-sized body; this crate
//! decides which slippy-map imagery tiles are visible from it, schedules
//! their asynchronous retrieval, and maintains a level-of-detail quadtree
//! cache that a render loop can read leaves from. Rendering itself is out of
//! scope: the crate ends at the interleaved vertex-buffer contract in
//! [`tiles::mesh`].

pub mod camera;
pub mod core;
pub mod geom;
pub mod tiles;

// Re-export public API
pub use crate::core::{
    constants,
    crs::{forward, Crs, CrsPoint},
};

pub use camera::{frustum::Frustum, projection::Projection, Camera, CameraEvent};

pub use geom::{
    plane::Plane,
    ray::{Ray, TriangleHit},
    sphere::{Sphere, Spheroid},
    triangle::Triangle,
};

pub use tiles::{
    provider::{ProviderStats, TileProvider, TileProviderOptions},
    source::{HttpFetcher, ImageFetcher, SolidFetcher, TileSource},
    tile::{Extent, Tile, TileKey},
    tree::{TileNode, TileTree},
};

/// Result type used throughout the library
pub type Result<T> = std::result::Result<T, TinyEarthError>;

/// Common error types
#[derive(Debug, thiserror::Error)]
pub enum TinyEarthError {
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("image decode error: {0}")]
    Decode(#[from] image::ImageError),

    #[error("tile fetch failed: {0}")]
    Fetch(String),

    #[error("invalid tile URL template: {0}")]
    UrlTemplate(String),
}

/// Error type alias for convenience
pub type Error = TinyEarthError;
