//! Seeded random rays and accelerated-vs-reference agreement checks.

use std::time::Instant;

use log::warn;
use lumen_math::{Point3, Vec3};
use lumen_raytrace::{Aabb, Intersection, Ray};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::Serialize;

/// Two answers for the same ray agree if their distances differ by less than this.
const DISTANCE_TOLERANCE: f64 = 1e-9;

/// Mismatching rays logged individually before going quiet.
const LOGGED_MISMATCHES: usize = 5;

/// Outcome of firing the same rays through two query paths.
#[derive(Debug, Serialize)]
pub struct Agreement {
    pub rays: usize,
    pub hits: usize,
    pub mismatches: usize,
    pub fast_ms: f64,
    pub reference_ms: f64,
}

fn uniform_in(rng: &mut StdRng, bounds: &Aabb) -> Point3 {
    let mut p = Point3::origin();
    for i in 0..3 {
        p[i] = if bounds.max[i] > bounds.min[i] {
            rng.gen_range(bounds.min[i]..bounds.max[i])
        } else {
            bounds.min[i]
        };
    }
    p
}

/// Rays from a sphere around `bounds` aimed at points inside it.
pub fn rays_around(bounds: &Aabb, count: usize, seed: u64) -> Vec<Ray> {
    let mut rng = StdRng::seed_from_u64(seed);
    let center = Point3::from((bounds.min.coords + bounds.max.coords) * 0.5);
    let radius = (bounds.max - bounds.min).norm().max(1.0) * 2.0;
    (0..count)
        .map(|_| {
            let dir = loop {
                let v = Vec3::new(
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                    rng.gen_range(-1.0..1.0),
                );
                let n = v.norm();
                if n > 1e-3 && n <= 1.0 {
                    break v / n;
                }
            };
            let origin = center + dir * radius;
            let target = uniform_in(&mut rng, bounds);
            Ray::new(origin, target - origin)
        })
        .collect()
}

/// Rays from above `bounds` aimed down into it.
pub fn rays_from_above(bounds: &Aabb, count: usize, seed: u64) -> Vec<Ray> {
    let mut rng = StdRng::seed_from_u64(seed);
    let extent = bounds.max - bounds.min;
    let lift = bounds.max.y + extent.x.max(extent.z) * 0.25 + 1.0;
    (0..count)
        .map(|_| {
            let origin = Point3::new(
                rng.gen_range(bounds.min.x - extent.x * 0.5..bounds.max.x + extent.x * 0.5),
                lift,
                rng.gen_range(bounds.min.z - extent.z * 0.5..bounds.max.z + extent.z * 0.5),
            );
            let target = uniform_in(&mut rng, bounds);
            Ray::new(origin, target - origin)
        })
        .collect()
}

fn distances<F>(rays: &[Ray], query: F) -> (Vec<Option<f64>>, f64)
where
    F: Fn(&Ray) -> Option<Intersection> + Sync,
{
    let start = Instant::now();
    let out = rays
        .par_iter()
        .map(|ray| query(ray).map(|hit| hit.distance))
        .collect();
    (out, start.elapsed().as_secs_f64() * 1e3)
}

/// Fire `rays` through both paths in parallel and count disagreements.
pub fn compare<F, R>(rays: &[Ray], fast: F, reference: R) -> Agreement
where
    F: Fn(&Ray) -> Option<Intersection> + Sync,
    R: Fn(&Ray) -> Option<Intersection> + Sync,
{
    let (fast_hits, fast_ms) = distances(rays, fast);
    let (reference_hits, reference_ms) = distances(rays, reference);

    let mut mismatches = 0;
    for (i, (a, b)) in fast_hits.iter().zip(&reference_hits).enumerate() {
        let agree = match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => (a - b).abs() < DISTANCE_TOLERANCE,
            _ => false,
        };
        if !agree {
            if mismatches < LOGGED_MISMATCHES {
                warn!("ray {} {:?}: fast {:?} vs reference {:?}", i, rays[i], a, b);
            }
            mismatches += 1;
        }
    }

    Agreement {
        rays: rays.len(),
        hits: reference_hits.iter().flatten().count(),
        mismatches,
        fast_ms,
        reference_ms,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_raytrace::{Geometry, Scene, Sphere};

    fn unit_box() -> Aabb {
        Aabb::new(Point3::new(-1.0, -1.0, -1.0), Point3::new(1.0, 1.0, 1.0))
    }

    #[test]
    fn test_rays_are_seeded() {
        let a = rays_around(&unit_box(), 16, 3);
        let b = rays_around(&unit_box(), 16, 3);
        let c = rays_around(&unit_box(), 16, 4);
        assert_eq!(a.len(), 16);
        assert!(a.iter().zip(&b).all(|(x, y)| x.origin == y.origin));
        assert!(a.iter().zip(&c).any(|(x, y)| x.origin != y.origin));
    }

    #[test]
    fn test_rays_hit_their_box() {
        let bounds = unit_box();
        for ray in rays_around(&bounds, 64, 9).iter().chain(&rays_from_above(&bounds, 64, 9)) {
            assert!(!bounds.contains(&ray.origin));
            assert!(bounds.test_intersect(ray));
        }
    }

    #[test]
    fn test_compare_counts_mismatches() {
        let scene = Scene::new();
        let ball = Sphere::new(Point3::origin(), 0.5);
        let rays = rays_around(&unit_box(), 200, 1);

        let same = compare(&rays, |r| ball.intersect(r, &scene), |r| ball.intersect(r, &scene));
        assert_eq!(same.mismatches, 0);
        assert!(same.hits > 0);

        let shifted = Sphere::new(Point3::new(0.0, 0.0, 0.1), 0.5);
        let differ = compare(&rays, |r| ball.intersect(r, &scene), |r| shifted.intersect(r, &scene));
        assert!(differ.mismatches > 0);

        let never = compare(&rays, |_| None, |r| ball.intersect(r, &scene));
        assert_eq!(never.mismatches, never.hits);
    }
}
