//! Analytic ray-primitive intersection.
//!
//! Each primitive has a dedicated free function computing the raw ray
//! parameter(s), plus a geometry type wrapping it into a full
//! [`Intersection`](crate::Intersection).

mod cube;
mod plane;
mod polygon;
mod sphere;
mod triangle;

pub use cube::Cube;
pub use plane::{intersect_plane, Plane};
pub use polygon::RegularPolygon;
pub use sphere::{intersect_sphere, Sphere};
pub use triangle::{intersect_triangle, TriangleHit};
