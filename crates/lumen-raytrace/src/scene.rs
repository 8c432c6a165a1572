//! Geometry arena.
//!
//! Owns every geometry of a scene. Composite geometry refers to its
//! children by [`GeometryId`], so ownership is flat and teardown is just
//! dropping the arena.

use log::{debug, info};
use lumen_math::Point3;
use slotmap::{new_key_type, SlotMap};

use crate::error::Result;
use crate::{Geometry, Intersection, Ray};

new_key_type! {
    /// Key of a geometry inside a [`Scene`].
    pub struct GeometryId;
}

/// Arena of geometries plus the ordered list of top-level scene nodes.
#[derive(Debug, Default)]
pub struct Scene {
    geometries: SlotMap<GeometryId, Box<dyn Geometry>>,
    nodes: Vec<GeometryId>,
}

impl Scene {
    /// Create an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a geometry without making it directly visible.
    ///
    /// Use this for CSG operands and instanced prototypes.
    pub fn add<G: Geometry + 'static>(&mut self, geometry: G) -> GeometryId {
        self.geometries.insert(Box::new(geometry))
    }

    /// Store a geometry and make it a top-level node.
    pub fn add_node<G: Geometry + 'static>(&mut self, geometry: G) -> GeometryId {
        let id = self.add(geometry);
        self.nodes.push(id);
        id
    }

    /// Make an already stored geometry a top-level node.
    pub fn show(&mut self, id: GeometryId) {
        if self.geometries.contains_key(id) && !self.nodes.contains(&id) {
            self.nodes.push(id);
        }
    }

    /// Look up a geometry.
    pub fn get(&self, id: GeometryId) -> Option<&dyn Geometry> {
        self.geometries.get(id).map(|g| g.as_ref())
    }

    /// Top-level nodes in insertion order.
    pub fn nodes(&self) -> &[GeometryId] {
        &self.nodes
    }

    /// Number of stored geometries.
    pub fn len(&self) -> usize {
        self.geometries.len()
    }

    /// True if the arena holds no geometry.
    pub fn is_empty(&self) -> bool {
        self.geometries.is_empty()
    }

    /// Run every geometry's one-time build step.
    ///
    /// Must complete before rendering starts; queries never mutate geometry.
    pub fn prepare(&mut self) -> Result<()> {
        for (id, geometry) in self.geometries.iter_mut() {
            debug!("preparing geometry {:?}", id);
            geometry.prepare()?;
        }
        info!(
            "scene ready: {} geometries, {} top-level nodes",
            self.geometries.len(),
            self.nodes.len()
        );
        Ok(())
    }

    /// Intersect one geometry, stamping the hit with its id.
    ///
    /// Hits that already carry an id (forwarded from a child) keep it.
    /// Unknown ids never intersect.
    pub fn intersect(&self, id: GeometryId, ray: &Ray) -> Option<Intersection> {
        let geometry = self.geometries.get(id)?;
        let mut hit = geometry.intersect(ray, self)?;
        hit.geometry.get_or_insert(id);
        Some(hit)
    }

    /// Inside test for one geometry; unknown ids are never inside.
    pub fn is_inside(&self, id: GeometryId, point: &Point3) -> bool {
        self.geometries
            .get(id)
            .is_some_and(|g| g.is_inside(point, self))
    }

    /// Nearest hit over all top-level nodes.
    pub fn closest_hit(&self, ray: &Ray) -> Option<Intersection> {
        self.nodes
            .iter()
            .filter_map(|&id| self.intersect(id, ray))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Plane, Sphere};
    use lumen_math::Vec3;

    #[test]
    fn test_closest_hit_stamps_id() {
        let mut scene = Scene::new();
        let floor = scene.add_node(Plane::new(0.0));
        let ball = scene.add_node(Sphere::new(Point3::new(0.0, 2.0, 0.0), 1.0));
        scene.prepare().unwrap();

        let down = Ray::new(Point3::new(0.0, 10.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let hit = scene.closest_hit(&down).unwrap();
        assert_eq!(hit.geometry, Some(ball));
        assert!((hit.distance - 7.0).abs() < 1e-9);

        let beside = Ray::new(Point3::new(5.0, 10.0, 0.0), Vec3::new(0.0, -1.0, 0.0));
        let hit = scene.closest_hit(&beside).unwrap();
        assert_eq!(hit.geometry, Some(floor));
    }

    #[test]
    fn test_hidden_geometry_not_traced() {
        let mut scene = Scene::new();
        let ball = scene.add(Sphere::new(Point3::origin(), 1.0));
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::z());
        assert!(scene.closest_hit(&ray).is_none());
        assert!(scene.intersect(ball, &ray).is_some());
        scene.show(ball);
        scene.show(ball);
        assert_eq!(scene.nodes().len(), 1);
        assert!(scene.closest_hit(&ray).is_some());
    }

    #[test]
    fn test_removed_id_is_inert() {
        let mut other = Scene::new();
        let foreign = other.add(Sphere::new(Point3::origin(), 1.0));
        let scene = Scene::new();
        let ray = Ray::new(Point3::new(0.0, 0.0, -5.0), Vec3::z());
        assert!(scene.intersect(foreign, &ray).is_none());
        assert!(!scene.is_inside(foreign, &Point3::origin()));
    }
}
