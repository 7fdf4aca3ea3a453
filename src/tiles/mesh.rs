//! The render-mesh contract.
//!
//! Rendering lives outside this crate; what it consumes is a flat vertex
//! buffer per ready tile. Each vertex is 8 interleaved `f32`s,
//! `[x, y, z, u, v, nx, ny, nz]`, covering the tile's Web-Mercator
//! footprint, recursively quartered down to the requested depth. Positions
//! are reprojected to geocentric coordinates; the normal is the normalized
//! position (sphere approximation), matching the back-face heuristic.

use nalgebra::Vector3;

use crate::core::crs::{forward, Crs};
use crate::tiles::tile::{Extent, Tile};

/// Floats per vertex: position, texture coordinate, normal.
pub const VERTEX_STRIDE: usize = 8;

/// Vertices per un-subdivided cell (two triangles).
const VERTS_PER_CELL: usize = 6;

/// Tessellate a tile into an interleaved vertex buffer.
///
/// Depth 0 yields a single two-triangle quad; each further level quarters
/// every cell, so the buffer holds `4^depth * 6` vertices.
pub fn tessellate(tile: &Tile, depth: u8) -> Vec<f32> {
    let extent = tile.extent();
    let cells = 4usize.pow(depth as u32);
    let mut out = Vec::with_capacity(cells * VERTS_PER_CELL * VERTEX_STRIDE);
    subdivide(&extent, &extent, depth, &mut out);
    out
}

fn subdivide(tile_extent: &Extent, cell: &Extent, depth: u8, out: &mut Vec<f32>) {
    if depth == 0 {
        emit_cell(tile_extent, cell, out);
        return;
    }
    let mx = (cell.xmin + cell.xmax) / 2.0;
    let my = (cell.ymin + cell.ymax) / 2.0;
    let quads = [
        Extent { xmin: cell.xmin, ymin: my, xmax: mx, ymax: cell.ymax },
        Extent { xmin: mx, ymin: my, xmax: cell.xmax, ymax: cell.ymax },
        Extent { xmin: cell.xmin, ymin: cell.ymin, xmax: mx, ymax: my },
        Extent { xmin: mx, ymin: cell.ymin, xmax: cell.xmax, ymax: my },
    ];
    for quad in &quads {
        subdivide(tile_extent, quad, depth - 1, out);
    }
}

fn emit_cell(tile_extent: &Extent, cell: &Extent, out: &mut Vec<f32>) {
    let a = (cell.xmin, cell.ymin);
    let b = (cell.xmax, cell.ymin);
    let c = (cell.xmax, cell.ymax);
    let d = (cell.xmin, cell.ymax);
    for &(x, y) in &[a, b, c, a, c, d] {
        emit_vertex(tile_extent, x, y, out);
    }
}

fn emit_vertex(tile_extent: &Extent, x: f64, y: f64, out: &mut Vec<f32>) {
    let position = forward(Crs::WebMercator, Crs::Geocentric, Vector3::new(x, y, 0.0));
    let normal = position.normalize();

    // Texture v runs top-down: the image origin is the tile's north edge.
    let u = (x - tile_extent.xmin) / tile_extent.width();
    let v = (tile_extent.ymax - y) / tile_extent.height();

    out.extend_from_slice(&[
        position.x as f32,
        position.y as f32,
        position.z as f32,
        u as f32,
        v as f32,
        normal.x as f32,
        normal.y as f32,
        normal.z as f32,
    ]);
}
