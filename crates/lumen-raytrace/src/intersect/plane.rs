//! Horizontal plane, optionally bounded to a square.

use lumen_math::{Point2, Point3, Tolerance, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Geometry, Intersection, Ray, Scene};

/// The plane `y = height`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Plane {
    /// Elevation of the plane.
    pub height: f64,
    /// Half-size of the square `|x| <= limit, |z| <= limit` the plane is
    /// clipped to; `None` for an infinite plane.
    pub limit: Option<f64>,
}

impl Plane {
    /// Infinite plane at `height`.
    pub fn new(height: f64) -> Self {
        Self {
            height,
            limit: None,
        }
    }

    /// Square plane at `height` covering `[-limit, limit]` in X and Z.
    pub fn bounded(height: f64, limit: f64) -> Self {
        Self {
            height,
            limit: Some(limit),
        }
    }

    fn within_limit(&self, p: &Point3) -> bool {
        self.limit
            .map_or(true, |limit| p.x.abs() <= limit && p.z.abs() <= limit)
    }
}

/// Intersect a ray with the plane `y = height`.
///
/// Returns the ray parameter, or `None` if the ray is parallel to the plane
/// or moving away from it.
pub fn intersect_plane(ray: &Ray, height: f64) -> Option<f64> {
    let (start, dir) = (ray.origin.y, ray.direction.y);
    if Tolerance::is_zero(dir, Tolerance::PARALLEL) {
        return None;
    }
    if (start > height && dir > 0.0) || (start < height && dir < 0.0) {
        return None;
    }
    Some((height - start) / dir)
}

impl Geometry for Plane {
    fn intersect(&self, ray: &Ray, _scene: &Scene) -> Option<Intersection> {
        let t = intersect_plane(ray, self.height)?;
        let point = ray.at(t);
        if !self.within_limit(&point) {
            return None;
        }
        let side = if ray.origin.y > self.height { 1.0 } else { -1.0 };
        Some(Intersection::new(
            t,
            point,
            Vec3::new(0.0, side, 0.0),
            Point2::new(point.x, point.z),
        ))
    }

    fn is_inside(&self, point: &Point3, _scene: &Scene) -> bool {
        point.y < self.height && self.within_limit(point)
    }
}
