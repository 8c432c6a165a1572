//! Axis-aligned bounding box.
//!
//! Used for cheap ray rejection in front of every mesh and heightfield
//! query, and as the cell volume during KD-tree construction and traversal.
//! Boxes are small `Copy` values; traversal passes them down by value.

use lumen_math::{sign_of, Axis, Point3, Tolerance, Vec3};

use crate::intersect::intersect_triangle;
use crate::Ray;

/// Axis-aligned bounding box in 3D.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    /// Minimum corner.
    pub min: Point3,
    /// Maximum corner.
    pub max: Point3,
}

impl Default for Aabb {
    fn default() -> Self {
        Self::empty()
    }
}

impl Aabb {
    /// Create an AABB from min and max corners.
    pub fn new(min: Point3, max: Point3) -> Self {
        Self { min, max }
    }

    /// Create an empty (inverted) AABB suitable for expansion.
    pub fn empty() -> Self {
        Self {
            min: Point3::new(f64::INFINITY, f64::INFINITY, f64::INFINITY),
            max: Point3::new(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY),
        }
    }

    /// Reset to the canonical empty box.
    pub fn make_empty(&mut self) {
        *self = Self::empty();
    }

    /// True if no point has been added since the box was emptied.
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    /// Expand this AABB to include a point.
    pub fn add(&mut self, p: &Point3) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    /// Smallest box containing both `self` and `other`.
    pub fn merged(&self, other: &Aabb) -> Aabb {
        let mut out = *self;
        out.add(&other.min);
        out.add(&other.max);
        out
    }

    /// Size of the box along `axis`.
    #[inline]
    pub fn extent(&self, axis: Axis) -> f64 {
        self.max[axis.index()] - self.min[axis.index()]
    }

    /// Axis with the largest extent (ties prefer X, then Y).
    pub fn longest_axis(&self) -> Axis {
        let (dx, dy, dz) = (
            self.extent(Axis::X),
            self.extent(Axis::Y),
            self.extent(Axis::Z),
        );
        if dx >= dy && dx >= dz {
            Axis::X
        } else if dy >= dz {
            Axis::Y
        } else {
            Axis::Z
        }
    }

    /// Per-axis inclusive containment test.
    pub fn contains(&self, p: &Point3) -> bool {
        self.contains_eps(p, 0.0)
    }

    /// Containment test with every face pushed outward by `eps`.
    pub fn contains_eps(&self, p: &Point3, eps: f64) -> bool {
        Tolerance::is_between(p.x, self.min.x, self.max.x, eps)
            && Tolerance::is_between(p.y, self.min.y, self.max.y, eps)
            && Tolerance::is_between(p.z, self.min.z, self.max.z, eps)
    }

    /// Distances along `ray` at which it crosses the walls it can enter through.
    ///
    /// Axes along which the ray moves away from a box it is already past are
    /// skipped entirely: the ray cannot enter through either wall of that pair,
    /// and any crossing is found on another axis first. This is only valid
    /// because callers handle an origin inside the box before calling.
    fn wall_hits(&self, ray: &Ray) -> impl Iterator<Item = f64> + '_ {
        let start = ray.origin;
        let dir = ray.direction;
        Axis::ALL.into_iter().flat_map(move |axis| {
            let dim = axis.index();
            let skip = (dir[dim] < 0.0 && start[dim] < self.min[dim])
                || (dir[dim] > 0.0 && start[dim] > self.max[dim])
                || Tolerance::is_zero(dir[dim], Tolerance::AXIS_ZERO);
            let walls = if skip { [None, None] } else { [Some(self.min[dim]), Some(self.max[dim])] };
            let (u, v) = axis.others();
            walls.into_iter().flatten().filter_map(move |wall| {
                let dist = (wall - start[dim]) / dir[dim];
                if dist < 0.0 {
                    return None;
                }
                let (iu, iv) = (u.index(), v.index());
                let x = start[iu] + dir[iu] * dist;
                let y = start[iv] + dir[iv] * dist;
                (Tolerance::is_between(x, self.min[iu], self.max[iu], Tolerance::EPSILON)
                    && Tolerance::is_between(y, self.min[iv], self.max[iv], Tolerance::EPSILON))
                .then_some(dist)
            })
        })
    }

    /// Slab test: does the ray (t ≥ 0) touch the box at all?
    pub fn test_intersect(&self, ray: &Ray) -> bool {
        if self.contains(&ray.origin) {
            return true;
        }
        self.wall_hits(ray).next().is_some()
    }

    /// Distance to the nearest point where the ray enters the box.
    ///
    /// Returns `Some(0.0)` when the origin is already inside.
    pub fn closest_intersection(&self, ray: &Ray) -> Option<f64> {
        if self.contains(&ray.origin) {
            return Some(0.0);
        }
        self.wall_hits(ray).min_by(f64::total_cmp)
    }

    /// Box/triangle overlap test, used while building KD-trees.
    ///
    /// Checks vertices inside the box, then the triangle's edges against the
    /// box, then the box's twelve edges against the triangle. The last test
    /// uses a slightly generous distance so near-boundary cases report overlap.
    pub fn intersect_triangle(&self, a: &Point3, b: &Point3, c: &Point3) -> bool {
        if self.contains(a) || self.contains(b) || self.contains(c) {
            return true;
        }

        let corners = [a, b, c];
        for i in 0..3 {
            for j in (i + 1)..3 {
                let forward = Ray::segment(*corners[i], *corners[j]);
                if self.test_intersect(&forward) {
                    let backward = Ray::segment(*corners[j], *corners[i]);
                    if self.test_intersect(&backward) {
                        return true;
                    }
                }
            }
        }

        let plane_normal: Vec3 = (b - a).cross(&(c - a));
        let d = a.coords.dot(&plane_normal);
        // Corners are encoded as 3-bit masks; an edge joins a corner to the one
        // with bit `j` set, so each of the 12 edges is visited exactly once.
        for mask in 0..7u32 {
            for j in 0..3 {
                if mask & (1 << j) != 0 {
                    continue;
                }
                let start = self.corner(mask);
                let end = self.corner(mask | (1 << j));
                let side_start = sign_of(start.coords.dot(&plane_normal) - d);
                let side_end = sign_of(end.coords.dot(&plane_normal) - d);
                if side_start != side_end {
                    let edge = Ray::segment(start, end);
                    if intersect_triangle(&edge, a, b, c, 1.000_000_1).is_some() {
                        return true;
                    }
                }
            }
        }

        false
    }

    /// Corner selected by a 3-bit mask (bit set = max on that axis).
    pub fn corner(&self, mask: u32) -> Point3 {
        Point3::new(
            if mask & 1 != 0 { self.max.x } else { self.min.x },
            if mask & 2 != 0 { self.max.y } else { self.min.y },
            if mask & 4 != 0 { self.max.z } else { self.min.z },
        )
    }

    /// Split into two boxes at `position` along `axis`.
    ///
    /// `position` is not checked against the box bounds.
    pub fn split(&self, axis: Axis, position: f64) -> (Aabb, Aabb) {
        let mut left = *self;
        left.max[axis.index()] = position;
        let mut right = *self;
        right.min[axis.index()] = position;
        (left, right)
    }

    /// Surface area of the box.
    pub fn area(&self) -> f64 {
        let d = self.max - self.min;
        2.0 * (d.x * d.y + d.y * d.z + d.z * d.x)
    }
}
