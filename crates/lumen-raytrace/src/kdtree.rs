//! KD-tree over triangle soups.
//!
//! Supports two build strategies: median split (axis cycles with depth,
//! split at the cell midpoint) and the surface-area heuristic (longest axis,
//! best of a fixed number of sampled positions). Triangles straddling a
//! split plane are referenced from both children.
//!
//! The tree stores triangle indices only. Traversal calls back into the
//! owner to test an individual triangle, so culling and shading stay with
//! the mesh.

use log::{debug, info};
use lumen_math::{Axis, Point3};
use serde::Serialize;

use crate::intersect::TriangleHit;
use crate::settings::{KdSettings, SplitStrategy};
use crate::{Aabb, Ray};

/// A KD-tree node.
#[derive(Debug, Clone)]
pub enum KdNode {
    /// Leaf holding triangle indices.
    Leaf {
        /// Indices into the owner's triangle array.
        triangles: Vec<u32>,
    },
    /// Internal node splitting its cell in two.
    Internal {
        /// Split axis.
        axis: Axis,
        /// Split position along `axis`.
        position: f64,
        /// Children below and above the split plane.
        children: Box<[KdNode; 2]>,
    },
}

/// Shape statistics of a built tree.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct KdStats {
    /// Triangles the tree was built over.
    pub triangles: usize,
    /// Number of leaves.
    pub leaves: usize,
    /// Number of internal nodes.
    pub internal_nodes: usize,
    /// Leaves without any triangle.
    pub empty_leaves: usize,
    /// Deepest leaf.
    pub max_depth: u32,
    /// Mean leaf depth.
    pub average_leaf_depth: f64,
    /// Mean triangle count over all leaves.
    pub average_leaf_size: f64,
    /// Total triangle references across leaves (duplicates included).
    pub triangle_refs: usize,
}

/// Which children a triangle belongs to for a given split plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
    Both,
}

/// Vertex-side rule: a triangle goes left when it has a vertex strictly
/// before the plane and none strictly after (and vice versa). Triangles
/// with vertices on both sides, or lying in the plane, go to both.
fn classify(corners: &[Point3; 3], axis: Axis, position: f64) -> Side {
    let dim = axis.index();
    let before = corners.iter().filter(|p| p[dim] < position).count();
    let after = corners.iter().filter(|p| p[dim] > position).count();
    match (before, after) {
        (b, 0) if b > 0 => Side::Left,
        (0, a) if a > 0 => Side::Right,
        _ => Side::Both,
    }
}

/// A KD-tree over an indexed triangle array.
#[derive(Debug, Clone)]
pub struct KdTree {
    root: KdNode,
    bounds: Aabb,
    stats: KdStats,
}

struct Builder<'a> {
    triangles: &'a [[Point3; 3]],
    settings: &'a KdSettings,
}

impl KdTree {
    /// Build a tree over `triangles`, whose union is enclosed by `bounds`.
    ///
    /// Settings are assumed validated.
    pub fn build(triangles: &[[Point3; 3]], bounds: Aabb, settings: &KdSettings) -> Self {
        debug!(
            "building {:?} KD-tree over {} triangles",
            settings.strategy,
            triangles.len()
        );
        let builder = Builder {
            triangles,
            settings,
        };
        let all = (0..triangles.len() as u32).collect();
        let root = builder.build_node(all, bounds, 0);

        let mut tree = Self {
            root,
            bounds,
            stats: KdStats::default(),
        };
        tree.stats = tree.compute_stats(triangles.len());
        info!(
            "KD-tree built: {} leaves, {} internal, depth {}, {:.1} triangles/leaf",
            tree.stats.leaves,
            tree.stats.internal_nodes,
            tree.stats.max_depth,
            tree.stats.average_leaf_size
        );
        tree
    }

    /// The root node.
    pub fn root(&self) -> &KdNode {
        &self.root
    }

    /// The box the tree partitions.
    pub fn bounds(&self) -> &Aabb {
        &self.bounds
    }

    /// Build statistics.
    pub fn stats(&self) -> &KdStats {
        &self.stats
    }

    /// Call `visit(depth, triangles)` for every leaf, depth-first.
    pub fn for_each_leaf(&self, mut visit: impl FnMut(u32, &[u32])) {
        let mut stack = vec![(&self.root, 0u32)];
        while let Some((node, depth)) = stack.pop() {
            match node {
                KdNode::Leaf { triangles } => visit(depth, triangles),
                KdNode::Internal { children, .. } => {
                    stack.push((&children[1], depth + 1));
                    stack.push((&children[0], depth + 1));
                }
            }
        }
    }

    fn compute_stats(&self, triangles: usize) -> KdStats {
        let mut stats = KdStats {
            triangles,
            ..KdStats::default()
        };
        let mut depth_sum = 0u64;
        self.for_each_leaf(|depth, tris| {
            stats.leaves += 1;
            stats.triangle_refs += tris.len();
            stats.max_depth = stats.max_depth.max(depth);
            if tris.is_empty() {
                stats.empty_leaves += 1;
            }
            depth_sum += depth as u64;
        });
        stats.internal_nodes = stats.leaves.saturating_sub(1);
        if stats.leaves > 0 {
            stats.average_leaf_depth = depth_sum as f64 / stats.leaves as f64;
            stats.average_leaf_size = stats.triangle_refs as f64 / stats.leaves as f64;
        }
        stats
    }

    /// Find the nearest triangle hit along `ray`.
    ///
    /// `test(index, max_distance)` intersects one triangle and must reject
    /// hits beyond `max_distance`.
    pub fn intersect<F>(&self, ray: &Ray, test: F) -> Option<(u32, TriangleHit)>
    where
        F: Fn(u32, f64) -> Option<TriangleHit>,
    {
        if !self.bounds.test_intersect(ray) {
            return None;
        }
        let mut closest: Option<(u32, TriangleHit)> = None;
        let mut closest_t = f64::INFINITY;
        self.trace_node(ray, &self.root, self.bounds, &test, &mut closest, &mut closest_t);
        closest
    }

    /// Walk near child first; returns true once a hit inside `cell` is found,
    /// which makes every farther cell irrelevant.
    fn trace_node<F>(
        &self,
        ray: &Ray,
        node: &KdNode,
        cell: Aabb,
        test: &F,
        closest: &mut Option<(u32, TriangleHit)>,
        closest_t: &mut f64,
    ) -> bool
    where
        F: Fn(u32, f64) -> Option<TriangleHit>,
    {
        match node {
            KdNode::Leaf { triangles } => {
                let mut found = false;
                for &index in triangles {
                    if let Some(hit) = test(index, *closest_t) {
                        if hit.distance < *closest_t {
                            *closest_t = hit.distance;
                            *closest = Some((index, hit));
                            found = true;
                        }
                    }
                }
                // A hit outside this cell stays recorded but cannot end the walk:
                // a nearer one may still sit in the next cell along the ray.
                found && cell.contains(&ray.at(*closest_t))
            }
            KdNode::Internal {
                axis,
                position,
                children,
            } => {
                let (left_cell, right_cell) = cell.split(*axis, *position);
                let order = if ray.origin[axis.index()] > *position {
                    [(&children[1], right_cell), (&children[0], left_cell)]
                } else {
                    [(&children[0], left_cell), (&children[1], right_cell)]
                };
                for (child, child_cell) in order {
                    if child_cell.test_intersect(ray)
                        && self.trace_node(ray, child, child_cell, test, closest, closest_t)
                    {
                        return true;
                    }
                }
                false
            }
        }
    }
}

impl Builder<'_> {
    fn leaf(triangles: Vec<u32>) -> KdNode {
        KdNode::Leaf { triangles }
    }

    fn build_node(&self, triangles: Vec<u32>, cell: Aabb, depth: u32) -> KdNode {
        if depth >= self.settings.max_depth || triangles.len() < self.settings.leaf_size {
            return Self::leaf(triangles);
        }

        let split = match self.settings.strategy {
            SplitStrategy::Median => median_split(&cell, depth),
            SplitStrategy::Sah => self.sah_split(&triangles, &cell),
        };
        let Some((axis, position)) = split else {
            return Self::leaf(triangles);
        };

        let mut left = Vec::new();
        let mut right = Vec::new();
        for &index in &triangles {
            match classify(&self.triangles[index as usize], axis, position) {
                Side::Left => left.push(index),
                Side::Right => right.push(index),
                Side::Both => {
                    left.push(index);
                    right.push(index);
                }
            }
        }

        // Every triangle straddles the plane: splitting further only copies lists.
        if left.len() == triangles.len() && right.len() == triangles.len() {
            return Self::leaf(triangles);
        }
        drop(triangles);

        let (left_cell, right_cell) = cell.split(axis, position);
        KdNode::Internal {
            axis,
            position,
            children: Box::new([
                self.build_node(left, left_cell, depth + 1),
                self.build_node(right, right_cell, depth + 1),
            ]),
        }
    }

    /// Best sampled split on the longest axis, or `None` when no candidate
    /// beats leaving the cell unsplit.
    fn sah_split(&self, triangles: &[u32], cell: &Aabb) -> Option<(Axis, f64)> {
        let axis = cell.longest_axis();
        let extent = cell.extent(axis);
        if extent <= 0.0 {
            return None;
        }

        let ci = self.settings.cost_intersect;
        let no_split = cell.area() * triangles.len() as f64 * ci;
        let samples = self.settings.sah_samples;

        let mut best: Option<(f64, f64)> = None;
        for i in 1..samples {
            let position = cell.min[axis.index()] + extent * i as f64 / samples as f64;
            let (mut n_left, mut n_right) = (0usize, 0usize);
            for &index in triangles {
                match classify(&self.triangles[index as usize], axis, position) {
                    Side::Left => n_left += 1,
                    Side::Right => n_right += 1,
                    Side::Both => {
                        n_left += 1;
                        n_right += 1;
                    }
                }
            }
            let (left_cell, right_cell) = cell.split(axis, position);
            let cost = self.settings.cost_traversal
                + left_cell.area() * n_left as f64 * ci
                + right_cell.area() * n_right as f64 * ci;
            if cost < no_split && best.map_or(true, |(c, _)| cost < c) {
                best = Some((cost, position));
            }
        }
        best.map(|(_, position)| (axis, position))
    }
}

/// Midpoint split on `depth % 3`, moving on to the next axis when the cell
/// is flat along it.
fn median_split(cell: &Aabb, depth: u32) -> Option<(Axis, f64)> {
    (0..3)
        .map(|offset| Axis::from_index(depth as usize + offset))
        .find(|&axis| cell.extent(axis) > 0.0)
        .map(|axis| {
            let dim = axis.index();
            (axis, (cell.min[dim] + cell.max[dim]) / 2.0)
        })
}
