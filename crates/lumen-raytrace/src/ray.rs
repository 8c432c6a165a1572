//! Ray representation and the intersection record every geometry returns.

use lumen_math::{Point2, Point3, Vec3};

use crate::scene::GeometryId;

/// A ray in 3D space defined by origin and direction.
///
/// Distances reported by intersection routines are in units of the ray
/// parameter, so they are true lengths only for unit directions.
#[derive(Debug, Clone, Copy)]
pub struct Ray {
    /// Origin point of the ray.
    pub origin: Point3,
    /// Direction of the ray (unit length when built with [`Ray::new`]).
    pub direction: Vec3,
}

impl Ray {
    /// Create a new ray from origin and direction.
    ///
    /// The direction will be normalized.
    pub fn new(origin: Point3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize(),
        }
    }

    /// Ray from `from` towards `to` with an un-normalized direction,
    /// so that parameter `1.0` lands exactly on `to`.
    pub fn segment(from: Point3, to: Point3) -> Self {
        Self {
            origin: from,
            direction: to - from,
        }
    }

    /// Evaluate the ray at parameter `t`: `origin + t * direction`.
    #[inline]
    pub fn at(&self, t: f64) -> Point3 {
        self.origin + t * self.direction
    }

    /// The same ray with its origin moved forward to parameter `t`.
    #[inline]
    pub fn advanced(&self, t: f64) -> Self {
        Self {
            origin: self.at(t),
            direction: self.direction,
        }
    }
}

/// UV-space partial derivatives of the surface, used for bump mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceDerivatives {
    /// Surface direction along increasing u.
    pub dndx: Vec3,
    /// Surface direction along increasing v.
    pub dndy: Vec3,
}

/// Result of a ray-geometry intersection.
#[derive(Debug, Clone, Copy)]
pub struct Intersection {
    /// Parameter along the ray where the intersection occurs.
    pub distance: f64,
    /// 3D intersection point.
    pub point: Point3,
    /// Unit surface normal at the intersection.
    pub normal: Vec3,
    /// Surface parameter coordinates (u, v).
    pub uv: Point2,
    /// Arena key of the geometry that was hit.
    ///
    /// Identity only: it never keeps the geometry alive and is meaningful
    /// only against the [`Scene`](crate::Scene) that answered the query.
    pub geometry: Option<GeometryId>,
    /// Partial derivatives for bump mapping, when the surface defines them.
    pub derivatives: Option<SurfaceDerivatives>,
}

impl Intersection {
    /// Create a new intersection record with no geometry back-reference.
    pub fn new(distance: f64, point: Point3, normal: Vec3, uv: Point2) -> Self {
        Self {
            distance,
            point,
            normal,
            uv,
            geometry: None,
            derivatives: None,
        }
    }

    /// Attach bump-mapping derivatives.
    pub fn with_derivatives(mut self, dndx: Vec3, dndy: Vec3) -> Self {
        self.derivatives = Some(SurfaceDerivatives { dndx, dndy });
        self
    }
}
