//! The uniform intersection contract shared by every geometry variant.

use std::fmt::Debug;

use lumen_math::Point3;

use crate::error::Result;
use crate::{Aabb, Intersection, Ray, Scene};

/// Something a ray can hit.
///
/// Queries take the owning [`Scene`] so composite geometry (CSG, instances)
/// can resolve the children it refers to by id. Implementations must be
/// read-only during queries: after [`Geometry::prepare`] has run, any number
/// of threads may intersect the same geometry concurrently.
pub trait Geometry: Send + Sync + Debug {
    /// Nearest intersection in front of the ray origin, if any.
    fn intersect(&self, ray: &Ray, scene: &Scene) -> Option<Intersection>;

    /// Whether `point` lies inside the solid this geometry bounds.
    ///
    /// Open surfaces report the side they consider "inside" so that CSG can
    /// track parity across them.
    fn is_inside(&self, point: &Point3, scene: &Scene) -> bool;

    /// World-space bounds, when finite.
    fn bounds(&self) -> Option<Aabb> {
        None
    }

    /// One-time build step run before any query (bounding boxes, trees).
    fn prepare(&mut self) -> Result<()> {
        Ok(())
    }
}
