//! The tile pyramid: identity and visibility, the quadtree cache, the
//! fetching source and the camera-driven scheduler.

pub mod mesh;
pub mod provider;
pub mod source;
pub mod tile;
pub mod tree;

pub use provider::{ProviderStats, TileProvider, TileProviderOptions};
pub use source::{HttpFetcher, ImageFetcher, SolidFetcher, TileSource};
pub use tile::{Extent, Tile, TileKey};
pub use tree::{TileNode, TileTree};
