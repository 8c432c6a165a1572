//! Ray-sphere intersection (quadratic equation).

use std::f64::consts::PI;

use lumen_math::{Point2, Point3, Vec3};
use serde::{Deserialize, Serialize};

use crate::{Aabb, Geometry, Intersection, Ray, Scene};

/// A solid sphere.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sphere {
    /// Center point.
    pub center: Point3,
    /// Radius.
    pub radius: f64,
}

impl Sphere {
    /// Create a sphere.
    pub fn new(center: Point3, radius: f64) -> Self {
        Self { center, radius }
    }
}

/// Intersect a ray with a sphere, returning both roots sorted by t.
///
/// Roots may be negative; `None` means the ray's line misses the sphere.
pub fn intersect_sphere(ray: &Ray, center: &Point3, radius: f64) -> Option<(f64, f64)> {
    let oc = ray.origin - center;
    let d = ray.direction;

    // Quadratic: |oc + t*d|^2 = r^2
    let a = d.dot(&d);
    let b = 2.0 * oc.dot(&d);
    let c = oc.dot(&oc) - radius * radius;

    let discriminant = b * b - 4.0 * a * c;
    if discriminant < 0.0 || a == 0.0 {
        return None;
    }

    let sqrt_disc = discriminant.sqrt();
    Some(((-b - sqrt_disc) / (2.0 * a), (-b + sqrt_disc) / (2.0 * a)))
}

/// Compute the (u, v) surface parameters for a point on a sphere.
///
/// u = longitude [0, 2π) around +Y starting at +X, v = latitude [-π/2, π/2]
fn compute_sphere_uv(sphere: &Sphere, point: &Point3) -> Point2 {
    let to_point = (point - sphere.center) / sphere.radius;
    let v = to_point.y.clamp(-1.0, 1.0).asin();

    if to_point.x.hypot(to_point.z) < 1e-12 {
        // At a pole - longitude is undefined, use 0
        return Point2::new(0.0, v);
    }

    let u = to_point.z.atan2(to_point.x);
    let u = if u < 0.0 { u + 2.0 * PI } else { u };
    Point2::new(u, v)
}

impl Geometry for Sphere {
    fn intersect(&self, ray: &Ray, _scene: &Scene) -> Option<Intersection> {
        let (near, far) = intersect_sphere(ray, &self.center, self.radius)?;

        // From inside, the exit point is reported with an inward normal.
        let (t, sign) = if near > 0.0 {
            (near, 1.0)
        } else if far > 0.0 {
            (far, -1.0)
        } else {
            return None;
        };

        let point = ray.at(t);
        let normal = sign * (point - self.center) / self.radius;
        let uv = compute_sphere_uv(self, &point);
        Some(Intersection::new(t, point, normal, uv))
    }

    fn is_inside(&self, point: &Point3, _scene: &Scene) -> bool {
        (point - self.center).norm_squared() <= self.radius * self.radius
    }

    fn bounds(&self) -> Option<Aabb> {
        let r = Vec3::repeat(self.radius);
        Some(Aabb::new(self.center - r, self.center + r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit() -> Sphere {
        Sphere::new(Point3::origin(), 1.0)
    }

    #[test]
    fn test_ray_sphere_through_center() {
        let ray = Ray::new(Point3::new(0.0, 0.0, -10.0), Vec3::new(0.0, 0.0, 1.0));
        let (t1, t2) = intersect_sphere(&ray, &Point3::origin(), 1.0).unwrap();
        assert!((t1 - 9.0).abs() < 1e-10);
        assert!((t2 - 11.0).abs() < 1e-10);

        let hit = unit().intersect(&ray, &Scene::new()).unwrap();
        assert!((hit.distance - 9.0).abs() < 1e-10);
        assert!((hit.point - Point3::new(0.0, 0.0, -1.0)).norm() < 1e-10);
        assert!((hit.normal - Vec3::new(0.0, 0.0, -1.0)).norm() < 1e-10);
    }

    #[test]
    fn test_ray_sphere_miss() {
        let ray = Ray::new(Point3::new(2.0, 2.0, -10.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(unit().intersect(&ray, &Scene::new()).is_none());
    }

    #[test]
    fn test_ray_sphere_tangent_is_stable() {
        let ray = Ray::new(Point3::new(1.0, 0.0, -10.0), Vec3::new(0.0, 0.0, 1.0));
        if let Some(hit) = unit().intersect(&ray, &Scene::new()) {
            assert!((hit.distance - 10.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_ray_from_inside_uses_far_root() {
        let ray = Ray::new(Point3::origin(), Vec3::new(1.0, 0.0, 0.0));
        let hit = unit().intersect(&ray, &Scene::new()).unwrap();
        assert!((hit.distance - 1.0).abs() < 1e-10);
        // Normal faces back into the sphere.
        assert!((hit.normal - Vec3::new(-1.0, 0.0, 0.0)).norm() < 1e-10);
    }

    #[test]
    fn test_sphere_behind() {
        let ray = Ray::new(Point3::new(0.0, 0.0, 5.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(unit().intersect(&ray, &Scene::new()).is_none());
    }

    #[test]
    fn test_sphere_uv() {
        let s = Sphere::new(Point3::new(1.0, 1.0, 1.0), 2.0);
        let uv = compute_sphere_uv(&s, &Point3::new(1.0, 1.0, 3.0));
        assert!((uv.x - PI / 2.0).abs() < 1e-12);
        assert!(uv.y.abs() < 1e-12);
        let pole = compute_sphere_uv(&s, &Point3::new(1.0, 3.0, 1.0));
        assert_eq!(pole.x, 0.0);
        assert!((pole.y - PI / 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_sphere_inside_and_bounds() {
        let s = Sphere::new(Point3::new(0.0, 2.0, 0.0), 1.0);
        let scene = Scene::new();
        assert!(s.is_inside(&Point3::new(0.0, 2.5, 0.0), &scene));
        assert!(s.is_inside(&Point3::new(0.0, 3.0, 0.0), &scene));
        assert!(!s.is_inside(&Point3::new(0.0, 3.1, 0.0), &scene));
        let b = s.bounds().unwrap();
        assert_eq!(b.min, Point3::new(-1.0, 1.0, -1.0));
        assert_eq!(b.max, Point3::new(1.0, 3.0, 1.0));
    }
}
