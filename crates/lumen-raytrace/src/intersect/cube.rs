//! Axis-aligned cube, intersected one face at a time.

use lumen_math::{Axis, Point2, Point3, Tolerance, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Aabb, Geometry, Intersection, Ray, Scene};

/// An axis-aligned cube.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Cube {
    /// Center point.
    pub center: Point3,
    /// Half the edge length.
    pub half_side: f64,
}

impl Cube {
    /// Create a cube from its center and full edge length.
    pub fn new(center: Point3, side: f64) -> Self {
        Self {
            center,
            half_side: side / 2.0,
        }
    }

    /// Intersect the face perpendicular to `axis` at `level`.
    fn intersect_side(&self, ray: &Ray, axis: Axis, level: f64) -> Option<Intersection> {
        let dim = axis.index();
        let dir = ray.direction[dim];
        if Tolerance::is_zero(dir, Tolerance::AXIS_ZERO) {
            return None;
        }
        let t = (level - ray.origin[dim]) / dir;
        if t < 0.0 {
            return None;
        }

        let point = ray.at(t);
        let (u, v) = axis.others();
        let (cu, cv) = (self.center[u.index()], self.center[v.index()]);
        let h = self.half_side;
        if !Tolerance::is_between(point[u.index()], cu - h, cu + h, Tolerance::EPSILON)
            || !Tolerance::is_between(point[v.index()], cv - h, cv + h, Tolerance::EPSILON)
        {
            return None;
        }

        let mut normal = Vec3::zeros();
        normal[dim] = -dir.signum();
        let uv = Point2::new(point[u.index()], point[v.index()]);
        Some(Intersection::new(t, point, normal, uv))
    }
}

impl Geometry for Cube {
    fn intersect(&self, ray: &Ray, _scene: &Scene) -> Option<Intersection> {
        Axis::ALL
            .into_iter()
            .flat_map(|axis| {
                let c = self.center[axis.index()];
                [c - self.half_side, c + self.half_side].map(|level| (axis, level))
            })
            .filter_map(|(axis, level)| self.intersect_side(ray, axis, level))
            .min_by(|a, b| a.distance.total_cmp(&b.distance))
    }

    fn is_inside(&self, point: &Point3, _scene: &Scene) -> bool {
        Axis::ALL.into_iter().all(|axis| {
            let c = self.center[axis.index()];
            Tolerance::is_between(point[axis.index()], c - self.half_side, c + self.half_side, 0.0)
        })
    }

    fn bounds(&self) -> Option<Aabb> {
        let h = Vec3::repeat(self.half_side);
        Some(Aabb::new(self.center - h, self.center + h))
    }
}
