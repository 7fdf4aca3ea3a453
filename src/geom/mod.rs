//! Geometry kernel: pure intersection math on `nalgebra` points and vectors.
//!
//! Degenerate inputs (parallel planes, near-zero determinants, collinear
//! points) yield `None` rather than errors; callers check before using the
//! result.

pub mod plane;
pub mod ray;
pub mod sphere;
pub mod triangle;

pub use plane::Plane;
pub use ray::{Ray, TriangleHit};
pub use sphere::{Sphere, Spheroid};
pub use triangle::Triangle;
