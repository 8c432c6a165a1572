//! Constructive solid geometry.
//!
//! A CSG node combines two operands from the same [`Scene`] with a boolean
//! operator. Ray queries walk the boundary crossings of both operands in
//! distance order, tracking whether the ray is inside each one, and stop at
//! the first crossing where the combined inside state changes.

use lumen_math::Point3;
use serde::{Deserialize, Serialize};

use crate::scene::GeometryId;
use crate::{Geometry, Intersection, Ray, Scene};

/// Upper bound on boundary crossings examined per ray.
pub const MAX_CSG_EVENTS: usize = 30;

/// Offset past a crossing before looking for the next one.
const REQUERY_EPSILON: f64 = 1e-6;

/// CSG boolean operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CsgOp {
    /// Union: inside either operand.
    Union,
    /// Intersection: inside both operands.
    Intersection,
    /// Difference: inside the left operand but not the right.
    Difference,
}

impl CsgOp {
    /// Combine the inside states of the two operands.
    #[inline]
    pub fn apply(self, left: bool, right: bool) -> bool {
        match self {
            CsgOp::Union => left || right,
            CsgOp::Intersection => left && right,
            CsgOp::Difference => left && !right,
        }
    }
}

/// Boolean combination of two geometries.
///
/// Operands are arena keys; the scene owns them. A missing operand is never
/// inside and never hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Csg {
    /// Left operand.
    pub left: Option<GeometryId>,
    /// Right operand.
    pub right: Option<GeometryId>,
    /// Operator.
    pub op: CsgOp,
}

/// Next boundary crossing of one operand, in parameters of the incoming ray.
fn next_crossing(scene: &Scene, id: Option<GeometryId>, ray: &Ray, from: f64) -> Option<Intersection> {
    let id = id?;
    let mut hit = scene.intersect(id, &ray.advanced(from))?;
    hit.distance += from;
    Some(hit)
}

impl Csg {
    /// Create a CSG node.
    pub fn new(left: Option<GeometryId>, right: Option<GeometryId>, op: CsgOp) -> Self {
        Self { left, right, op }
    }

    /// Union of `left` and `right`.
    pub fn plus(left: GeometryId, right: GeometryId) -> Self {
        Self::new(Some(left), Some(right), CsgOp::Union)
    }

    /// Intersection of `left` and `right`.
    pub fn and(left: GeometryId, right: GeometryId) -> Self {
        Self::new(Some(left), Some(right), CsgOp::Intersection)
    }

    /// `left` with `right` removed.
    pub fn minus(left: GeometryId, right: GeometryId) -> Self {
        Self::new(Some(left), Some(right), CsgOp::Difference)
    }

    fn inside(&self, scene: &Scene, id: Option<GeometryId>, point: &Point3) -> bool {
        id.is_some_and(|id| scene.is_inside(id, point))
    }
}

impl Geometry for Csg {
    fn intersect(&self, ray: &Ray, scene: &Scene) -> Option<Intersection> {
        let mut inside = [
            self.inside(scene, self.left, &ray.origin),
            self.inside(scene, self.right, &ray.origin),
        ];
        let mut state = self.op.apply(inside[0], inside[1]);
        let operands = [self.left, self.right];
        let mut next = [
            next_crossing(scene, self.left, ray, 0.0),
            next_crossing(scene, self.right, ray, 0.0),
        ];

        for _ in 0..MAX_CSG_EVENTS {
            let side = match (&next[0], &next[1]) {
                (None, None) => return None,
                (Some(_), None) => 0,
                (None, Some(_)) => 1,
                (Some(l), Some(r)) => usize::from(r.distance < l.distance),
            };
            let Some(mut hit) = next[side].take() else {
                return None;
            };

            inside[side] = !inside[side];
            let combined = self.op.apply(inside[0], inside[1]);
            if combined != state {
                // Difference exposes the right operand from its inside, so
                // normals are reported facing the incoming ray.
                if hit.normal.dot(&ray.direction) > 0.0 {
                    hit.normal = -hit.normal;
                }
                return Some(hit);
            }
            state = combined;

            next[side] = next_crossing(scene, operands[side], ray, hit.distance + REQUERY_EPSILON);
        }
        None
    }

    fn is_inside(&self, point: &Point3, scene: &Scene) -> bool {
        self.op.apply(
            self.inside(scene, self.left, point),
            self.inside(scene, self.right, point),
        )
    }
}
