//! Horizontal regular polygon.

use std::f64::consts::PI;

use lumen_math::{Point2, Point3, Tolerance, Vec3};
use serde::{Deserialize, Serialize};

use super::plane::intersect_plane;
use crate::{Geometry, Intersection, Ray, Scene};

/// A regular polygon lying in the plane `y = center.y`.
///
/// The first vertex sits at angle 0 (on +X from the center); the rest
/// follow counter-clockwise when viewed with X right and Z up.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegularPolygon {
    /// Center point; its Y coordinate is the polygon's elevation.
    pub center: Point3,
    /// Number of sides (at least 3).
    pub sides: u32,
    /// Distance from the center to each vertex.
    pub radius: f64,
}

/// Twice the signed area of the XZ triangle `(a, b, p)`.
fn signed_area(a: &Point2, b: &Point2, p: &Point2) -> f64 {
    (b.x - a.x) * (p.y - a.y) - (b.y - a.y) * (p.x - a.x)
}

impl RegularPolygon {
    /// Create a polygon; fewer than 3 sides is clamped to a triangle.
    pub fn new(center: Point3, sides: u32, radius: f64) -> Self {
        Self {
            center,
            sides: sides.max(3),
            radius,
        }
    }

    fn sector_width(&self) -> f64 {
        2.0 * PI / self.sides.max(3) as f64
    }

    /// XZ position of vertex `index` (wrapping).
    pub fn vertex(&self, index: u32) -> Point2 {
        let angle = (index % self.sides.max(3)) as f64 * self.sector_width();
        Point2::new(
            self.center.x + self.radius * angle.cos(),
            self.center.z + self.radius * angle.sin(),
        )
    }

    /// Whether the XZ projection of `point` lies within the outline.
    ///
    /// The point is classified against the sector it falls in: inside iff the
    /// triangles (center, v_i), (v_i, v_i+1) and (v_i+1, center) all wind the
    /// same way around it.
    pub fn contains_xz(&self, point: &Point3) -> bool {
        let (dx, dz) = (point.x - self.center.x, point.z - self.center.z);
        let mut angle = dz.atan2(dx);
        if angle < 0.0 {
            angle += 2.0 * PI;
        }
        let sector = ((angle / self.sector_width()) as u32).min(self.sides.max(3) - 1);

        let c = Point2::new(self.center.x, self.center.z);
        let p = Point2::new(point.x, point.z);
        let a = self.vertex(sector);
        let b = self.vertex(sector + 1);
        let areas = [
            signed_area(&c, &a, &p),
            signed_area(&a, &b, &p),
            signed_area(&b, &c, &p),
        ];
        let eps = Tolerance::PARALLEL;
        areas.iter().all(|&s| s >= -eps) || areas.iter().all(|&s| s <= eps)
    }
}

impl Geometry for RegularPolygon {
    fn intersect(&self, ray: &Ray, _scene: &Scene) -> Option<Intersection> {
        let t = intersect_plane(ray, self.center.y)?;
        let point = ray.at(t);
        if !self.contains_xz(&point) {
            return None;
        }
        let side = if ray.origin.y > self.center.y { 1.0 } else { -1.0 };
        Some(Intersection::new(
            t,
            point,
            Vec3::new(0.0, side, 0.0),
            Point2::new(point.x, point.z),
        ))
    }

    /// A flat polygon only contains points lying on it.
    fn is_inside(&self, point: &Point3, _scene: &Scene) -> bool {
        Tolerance::is_zero(point.y - self.center.y, Tolerance::EPSILON) && self.contains_xz(point)
    }
}
