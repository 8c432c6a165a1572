//! Transformed references to geometry stored elsewhere in the scene.

use lumen_math::{Point3, Transform};

use crate::scene::GeometryId;
use crate::{Aabb, Geometry, Intersection, Ray, Scene};

/// A geometry placed in the world through a model transform.
///
/// The target is queried in its own object space. The local ray keeps the
/// transformed (un-normalized) direction, so ray parameters match between
/// the two spaces and distances need no correction.
#[derive(Debug, Clone)]
pub struct Instance {
    /// Geometry being placed.
    pub target: GeometryId,
    /// Object-to-world transform.
    pub transform: Transform,
    /// Bounds of the target, mapped to world space. Filled in by [`Instance::with_bounds`].
    bounds: Option<Aabb>,
}

impl Instance {
    /// Place `target` with `transform`.
    pub fn new(target: GeometryId, transform: Transform) -> Self {
        Self {
            target,
            transform,
            bounds: None,
        }
    }

    /// Record world-space bounds from the target's object-space box.
    ///
    /// The box is read once, here. A [`Mesh`](crate::Mesh) only knows its box
    /// after [`Geometry::prepare`], so prepare the scene before instancing a
    /// mesh or the instance reports no bounds.
    pub fn with_bounds(mut self, scene: &Scene) -> Self {
        self.bounds = scene
            .get(self.target)
            .and_then(|g| g.bounds())
            .filter(|b| !b.is_empty())
            .map(|local| {
                let mut world = Aabb::empty();
                for mask in 0..8 {
                    world.add(&self.transform.point(&local.corner(mask)));
                }
                world
            });
        self
    }
}

impl Geometry for Instance {
    fn intersect(&self, ray: &Ray, scene: &Scene) -> Option<Intersection> {
        let local = Ray {
            origin: self.transform.undo_point(&ray.origin),
            direction: self.transform.undo_direction(&ray.direction),
        };
        let mut hit = scene.intersect(self.target, &local)?;
        hit.point = self.transform.point(&hit.point);
        hit.normal = self
            .transform
            .normal(&hit.normal)
            .try_normalize(0.0)
            .unwrap_or(hit.normal);
        Some(hit)
    }

    fn is_inside(&self, point: &Point3, scene: &Scene) -> bool {
        scene.is_inside(self.target, &self.transform.undo_point(point))
    }

    fn bounds(&self) -> Option<Aabb> {
        self.bounds
    }
}
