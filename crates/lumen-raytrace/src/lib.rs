#![warn(missing_docs)]

//! Ray intersection engine for the lumen ray tracer.
//!
//! Every shape implements [`Geometry`] and lives in a [`Scene`] arena.
//! Composite shapes ([`Csg`], [`Instance`]) refer to their operands by
//! [`GeometryId`], so the arena is the only owner and queries stay
//! read-only once [`Scene::prepare`] has built the acceleration structures.
//!
//! # Architecture
//!
//! - [`Ray`] / [`Intersection`] - query and result records
//! - [`Aabb`] - axis-aligned boxes, slab and box/triangle overlap tests
//! - [`intersect`] - analytic primitives and the fast triangle test
//! - [`KdTree`] - median or SAH split KD-tree over triangles
//! - [`Mesh`] - indexed triangle meshes, with [`parse_obj`] for OBJ input
//! - [`Csg`] - boolean combinations by boundary-event merging
//! - [`Heightfield`] - grid terrain with an optional max-height pyramid
//!
//! # Example
//!
//! ```
//! use lumen_math::{Point3, Vec3};
//! use lumen_raytrace::{Csg, Plane, Ray, Scene, Sphere};
//!
//! let mut scene = Scene::new();
//! let ball = scene.add(Sphere::new(Point3::origin(), 1.0));
//! let floor = scene.add(Plane::new(0.0));
//! scene.add_node(Csg::minus(ball, floor));
//! scene.prepare().unwrap();
//!
//! let down = Ray::new(Point3::new(0.0, 5.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
//! let hit = scene.closest_hit(&down).unwrap();
//! assert!((hit.point.y - 1.0).abs() < 1e-9);
//! ```

mod bbox;
mod csg;
mod error;
mod geometry;
mod heightfield;
mod instance;
pub mod intersect;
mod kdtree;
mod mesh;
mod obj;
mod ray;
mod scene;
mod settings;

pub use bbox::Aabb;
pub use csg::{Csg, CsgOp, MAX_CSG_EVENTS};
pub use error::{Result, TraceError};
pub use geometry::Geometry;
pub use heightfield::Heightfield;
pub use instance::Instance;
pub use intersect::{intersect_triangle, Cube, Plane, RegularPolygon, Sphere, TriangleHit};
pub use kdtree::{KdNode, KdStats, KdTree};
pub use mesh::{Mesh, MeshTriangle};
pub use obj::{load_obj, parse_obj};
pub use ray::{Intersection, Ray, SurfaceDerivatives};
pub use scene::{GeometryId, Scene};
pub use settings::{HeightfieldSettings, KdSettings, MeshSettings, SplitStrategy};
