//! Fast ray-triangle intersection (Cramer's rule).

use lumen_math::{Point3, Tolerance};

use crate::Ray;

/// Raw result of [`intersect_triangle`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriangleHit {
    /// Ray parameter of the hit.
    pub distance: f64,
    /// Barycentric weight of the second vertex.
    pub lambda2: f64,
    /// Barycentric weight of the third vertex.
    pub lambda3: f64,
}

impl TriangleHit {
    /// Barycentric weight of the first vertex.
    #[inline]
    pub fn lambda1(&self) -> f64 {
        1.0 - self.lambda2 - self.lambda3
    }
}

/// Intersect a ray with triangle `(a, b, c)`.
///
/// Solves `λ2·(b-a) + λ3·(c-a) - γ·dir = origin - a` with three determinants
/// that share the cross product `(b-a)×(c-a)`. Hits farther than
/// `max_distance` are rejected so callers can pass their current best.
pub fn intersect_triangle(
    ray: &Ray,
    a: &Point3,
    b: &Point3,
    c: &Point3,
    max_distance: f64,
) -> Option<TriangleHit> {
    let ab = b - a;
    let ac = c - a;
    let h = ray.origin - a;
    let d = ray.direction;

    let ab_x_ac = ab.cross(&ac);
    let det = -d.dot(&ab_x_ac);
    if det.abs() < Tolerance::PARALLEL {
        return None;
    }
    let inv = 1.0 / det;

    let gamma = h.dot(&ab_x_ac) * inv;
    if gamma < 0.0 || gamma > max_distance {
        return None;
    }

    let d_x_h = d.cross(&h);
    let lambda2 = -d_x_h.dot(&ac) * inv;
    let lambda3 = d_x_h.dot(&ab) * inv;
    if !(0.0..=1.0).contains(&lambda2)
        || !(0.0..=1.0).contains(&lambda3)
        || lambda2 + lambda3 > 1.0
    {
        return None;
    }

    Some(TriangleHit {
        distance: gamma,
        lambda2,
        lambda3,
    })
}
