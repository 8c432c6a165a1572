//! Indexed triangle meshes.
//!
//! Vertex, normal and UV arrays are 1-indexed: slot 0 of each holds a
//! sentinel so that index 0 means "unset", matching OBJ conventions.
//! Triangles themselves are stored 0-based.

use log::{debug, warn};
use lumen_math::{Point2, Point3, Tolerance, Vec3};

use crate::error::{Result, TraceError};
use crate::intersect::{intersect_triangle, TriangleHit};
use crate::kdtree::KdTree;
use crate::ray::SurfaceDerivatives;
use crate::settings::MeshSettings;
use crate::{Aabb, Geometry, Intersection, Ray, Scene};

/// Direction used for inside tests: slightly tilted off +X so the ray
/// does not run exactly along edges of axis-aligned geometry.
const INSIDE_PROBE: [f64; 3] = [1.0, 1e-7, 1.3e-7];

/// One triangle of a [`Mesh`].
#[derive(Debug, Clone, PartialEq)]
pub struct MeshTriangle {
    /// 1-based vertex indices.
    pub vertices: [u32; 3],
    /// 1-based normal indices; 0 means "use the geometric normal".
    pub normals: [u32; 3],
    /// 1-based UV indices; 0 means "unset".
    pub uvs: [u32; 3],
    /// Unit normal of the triangle's plane (winding order).
    pub geometry_normal: Vec3,
    /// Surface directions along increasing u and v, when the UV mapping
    /// of the triangle is not degenerate.
    pub derivatives: Option<SurfaceDerivatives>,
}

/// A triangle mesh with an optional KD-tree.
#[derive(Debug, Clone)]
pub struct Mesh {
    vertices: Vec<Point3>,
    normals: Vec<Vec3>,
    uvs: Vec<Point2>,
    triangles: Vec<MeshTriangle>,
    /// Shading and acceleration flags; changes take effect on the next
    /// [`Geometry::prepare`].
    pub settings: MeshSettings,
    bbox: Aabb,
    tree: Option<KdTree>,
}

impl Default for Mesh {
    fn default() -> Self {
        Self::new()
    }
}

/// Solve `x * a + y * b = c` in 2D.
fn solve_2d(a: &Point2, b: &Point2, c: (f64, f64)) -> Option<(f64, f64)> {
    let det = a.x * b.y - b.x * a.y;
    if det.abs() < Tolerance::PARALLEL {
        return None;
    }
    Some(((c.0 * b.y - c.1 * b.x) / det, (a.x * c.1 - a.y * c.0) / det))
}

impl Mesh {
    /// Create an empty mesh with default settings.
    pub fn new() -> Self {
        Self::with_settings(MeshSettings::default())
    }

    /// Create an empty mesh.
    pub fn with_settings(settings: MeshSettings) -> Self {
        Self {
            vertices: vec![Point3::origin()],
            normals: vec![Vec3::zeros()],
            uvs: vec![Point2::origin()],
            triangles: Vec::new(),
            settings,
            bbox: Aabb::empty(),
            tree: None,
        }
    }

    /// Build a mesh from positions and 0-based index triples.
    pub fn from_triangles(
        positions: &[Point3],
        indices: &[[u32; 3]],
        settings: MeshSettings,
    ) -> Result<Self> {
        let mut mesh = Self::with_settings(settings);
        for p in positions {
            mesh.add_vertex(*p);
        }
        for tri in indices {
            mesh.add_triangle(tri.map(|i| i + 1), [0; 3], [0; 3])?;
        }
        Ok(mesh)
    }

    /// Append a vertex, returning its 1-based index.
    pub fn add_vertex(&mut self, p: Point3) -> u32 {
        self.vertices.push(p);
        (self.vertices.len() - 1) as u32
    }

    /// Append a vertex normal, returning its 1-based index.
    pub fn add_normal(&mut self, n: Vec3) -> u32 {
        self.normals.push(n);
        (self.normals.len() - 1) as u32
    }

    /// Append a texture coordinate, returning its 1-based index.
    pub fn add_uv(&mut self, uv: Point2) -> u32 {
        self.uvs.push(uv);
        (self.uvs.len() - 1) as u32
    }

    /// Append a triangle, returning its 0-based index.
    ///
    /// Vertex indices must refer to existing vertices. Normal and UV indices
    /// may be 0 (unset) or refer to existing entries.
    pub fn add_triangle(
        &mut self,
        vertices: [u32; 3],
        normals: [u32; 3],
        uvs: [u32; 3],
    ) -> Result<usize> {
        let triangle = self.triangles.len();
        let check = |kind: &'static str, index: u32, len: usize, allow_unset: bool| {
            let valid = if index == 0 { allow_unset } else { (index as usize) < len };
            if valid {
                Ok(())
            } else {
                Err(TraceError::InvalidIndex {
                    triangle,
                    kind,
                    index,
                    len: len - 1,
                })
            }
        };
        for i in 0..3 {
            check("vertex", vertices[i], self.vertices.len(), false)?;
            check("normal", normals[i], self.normals.len(), true)?;
            check("uv", uvs[i], self.uvs.len(), true)?;
        }

        let [a, b, c] = vertices.map(|i| self.vertices[i as usize]);
        let (ab, ac) = (b - a, c - a);
        let geometry_normal = ab.cross(&ac).try_normalize(0.0).unwrap_or_else(|| {
            warn!("triangle {} is degenerate", triangle);
            Vec3::zeros()
        });

        let derivatives = if uvs.contains(&0) {
            None
        } else {
            self.uv_derivatives(&ab, &ac, uvs)
        };

        self.triangles.push(MeshTriangle {
            vertices,
            normals,
            uvs,
            geometry_normal,
            derivatives,
        });
        Ok(triangle)
    }

    /// Express the unit UV directions in terms of the triangle edges.
    fn uv_derivatives(&self, ab: &Vec3, ac: &Vec3, uvs: [u32; 3]) -> Option<SurfaceDerivatives> {
        let [ta, tb, tc] = uvs.map(|i| self.uvs[i as usize]);
        let tab = Point2::from(tb - ta);
        let tac = Point2::from(tc - ta);
        let (px, qx) = solve_2d(&tab, &tac, (1.0, 0.0))?;
        let (py, qy) = solve_2d(&tab, &tac, (0.0, 1.0))?;
        let dndx = (px * ab + qx * ac).try_normalize(0.0)?;
        let dndy = (py * ab + qy * ac).try_normalize(0.0)?;
        Some(SurfaceDerivatives { dndx, dndy })
    }

    /// Vertices, excluding the sentinel.
    pub fn vertices(&self) -> &[Point3] {
        &self.vertices[1..]
    }

    /// All triangles.
    pub fn triangles(&self) -> &[MeshTriangle] {
        &self.triangles
    }

    /// Corner positions of triangle `index`.
    pub fn triangle_corners(&self, index: usize) -> [Point3; 3] {
        self.triangles[index]
            .vertices
            .map(|i| self.vertices[i as usize])
    }

    /// Bounding box of the vertices; empty until prepared.
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// The KD-tree, if one was built.
    pub fn kd_tree(&self) -> Option<&KdTree> {
        self.tree.as_ref()
    }

    fn test_triangle(&self, ray: &Ray, index: u32, max_distance: f64) -> Option<TriangleHit> {
        let triangle = &self.triangles[index as usize];
        if self.settings.back_culling && ray.direction.dot(&triangle.geometry_normal) > 0.0 {
            return None;
        }
        let [a, b, c] = self.triangle_corners(index as usize);
        intersect_triangle(ray, &a, &b, &c, max_distance)
    }

    fn shade(&self, ray: &Ray, index: u32, hit: &TriangleHit) -> Intersection {
        let triangle = &self.triangles[index as usize];
        let (l2, l3) = (hit.lambda2, hit.lambda3);

        let normal = if self.settings.faceted || triangle.normals.contains(&0) {
            triangle.geometry_normal
        } else {
            let [na, nb, nc] = triangle.normals.map(|i| self.normals[i as usize]);
            (na + l2 * (nb - na) + l3 * (nc - na))
                .try_normalize(0.0)
                .unwrap_or(triangle.geometry_normal)
        };

        let [ta, tb, tc] = triangle.uvs.map(|i| self.uvs[i as usize]);
        let uv = ta + l2 * (tb - ta) + l3 * (tc - ta);

        let mut info = Intersection::new(hit.distance, ray.at(hit.distance), normal, uv);
        info.derivatives = triangle.derivatives;
        info
    }

    /// Nearest hit by scanning every triangle, ignoring the KD-tree.
    pub fn intersect_brute_force(&self, ray: &Ray) -> Option<Intersection> {
        if !self.bbox.test_intersect(ray) {
            return None;
        }
        let mut closest: Option<(u32, TriangleHit)> = None;
        let mut closest_t = f64::INFINITY;
        for index in 0..self.triangles.len() as u32 {
            if let Some(hit) = self.test_triangle(ray, index, closest_t) {
                closest_t = hit.distance;
                closest = Some((index, hit));
            }
        }
        closest.map(|(index, hit)| self.shade(ray, index, &hit))
    }

    /// Nearest hit through the KD-tree, falling back to a linear scan.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<Intersection> {
        match &self.tree {
            Some(tree) => {
                let (index, hit) =
                    tree.intersect(ray, |index, max| self.test_triangle(ray, index, max))?;
                Some(self.shade(ray, index, &hit))
            }
            None => self.intersect_brute_force(ray),
        }
    }
}

impl Geometry for Mesh {
    fn intersect(&self, ray: &Ray, _scene: &Scene) -> Option<Intersection> {
        self.intersect_ray(ray)
    }

    /// Crossing parity along a fixed probe ray; meaningful for closed meshes.
    fn is_inside(&self, point: &Point3, _scene: &Scene) -> bool {
        if !self.bbox.is_empty() && !self.bbox.contains(point) {
            return false;
        }
        let probe = Ray::new(*point, Vec3::from(INSIDE_PROBE));
        let crossings = (0..self.triangles.len())
            .filter(|&i| {
                let [a, b, c] = self.triangle_corners(i);
                intersect_triangle(&probe, &a, &b, &c, f64::INFINITY)
                    .is_some_and(|hit| hit.distance > 0.0)
            })
            .count();
        crossings % 2 == 1
    }

    fn bounds(&self) -> Option<Aabb> {
        (!self.bbox.is_empty()).then_some(self.bbox)
    }

    fn prepare(&mut self) -> Result<()> {
        if self.triangles.is_empty() {
            return Err(TraceError::EmptyMesh);
        }
        self.settings.kd.validate()?;

        self.bbox.make_empty();
        for v in &self.vertices[1..] {
            self.bbox.add(v);
        }
        debug!(
            "mesh: {} vertices, {} triangles, bbox {:?}..{:?}",
            self.vertices.len() - 1,
            self.triangles.len(),
            self.bbox.min,
            self.bbox.max
        );

        self.tree = None;
        if self.settings.use_kd_tree && self.triangles.len() >= self.settings.kd.min_triangles {
            let corners: Vec<[Point3; 3]> = (0..self.triangles.len())
                .map(|i| self.triangle_corners(i))
                .collect();
            self.tree = Some(KdTree::build(&corners, self.bbox, &self.settings.kd));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::settings::KdSettings;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};
    use std::f64::consts::PI;

    /// Closed UV sphere with outward winding.
    pub(crate) fn uv_sphere(
        center: Point3,
        radius: f64,
        stacks: u32,
        slices: u32,
        settings: MeshSettings,
    ) -> Mesh {
        let mut positions = vec![center + Vec3::new(0.0, radius, 0.0)];
        for i in 1..stacks {
            let theta = PI * i as f64 / stacks as f64;
            for j in 0..slices {
                let phi = 2.0 * PI * j as f64 / slices as f64;
                positions.push(
                    center
                        + radius
                            * Vec3::new(theta.sin() * phi.cos(), theta.cos(), theta.sin() * phi.sin()),
                );
            }
        }
        positions.push(center - Vec3::new(0.0, radius, 0.0));
        let bottom = positions.len() as u32 - 1;
        let ring = |i: u32, j: u32| 1 + (i - 1) * slices + j % slices;

        let mut indices = Vec::new();
        for j in 0..slices {
            indices.push([0, ring(1, j + 1), ring(1, j)]);
            indices.push([bottom, ring(stacks - 1, j), ring(stacks - 1, j + 1)]);
        }
        for i in 1..stacks - 1 {
            for j in 0..slices {
                let (a, b) = (ring(i, j), ring(i, j + 1));
                let (c, d) = (ring(i + 1, j), ring(i + 1, j + 1));
                indices.push([a, b, d]);
                indices.push([a, d, c]);
            }
        }
        Mesh::from_triangles(&positions, &indices, settings).unwrap()
    }

    fn unit_cube(settings: MeshSettings) -> Mesh {
        let positions: Vec<Point3> = (0..8)
            .map(|m| {
                Point3::new(
                    (m & 1) as f64,
                    ((m >> 1) & 1) as f64,
                    ((m >> 2) & 1) as f64,
                )
            })
            .collect();
        let faces = [
            [0, 2, 3, 1],
            [4, 5, 7, 6],
            [0, 1, 5, 4],
            [2, 6, 7, 3],
            [0, 4, 6, 2],
            [1, 3, 7, 5],
        ];
        let indices: Vec<[u32; 3]> = faces
            .iter()
            .flat_map(|[a, b, c, d]| [[*a, *b, *c], [*a, *c, *d]])
            .collect();
        Mesh::from_triangles(&positions, &indices, settings).unwrap()
    }

    fn single_triangle() -> Mesh {
        let mut mesh = Mesh::new();
        let a = mesh.add_vertex(Point3::new(0.0, 0.0, 0.0));
        let b = mesh.add_vertex(Point3::new(2.0, 0.0, 0.0));
        let c = mesh.add_vertex(Point3::new(0.0, 2.0, 0.0));
        let na = mesh.add_normal(Vec3::new(0.0, 0.0, 1.0));
        let nb = mesh.add_normal(Vec3::new(1.0, 0.0, 1.0).normalize());
        let ta = mesh.add_uv(Point2::new(0.0, 0.0));
        let tb = mesh.add_uv(Point2::new(1.0, 0.0));
        let tc = mesh.add_uv(Point2::new(0.0, 1.0));
        mesh.add_triangle([a, b, c], [na, nb, na], [ta, tb, tc]).unwrap();
        mesh.prepare().unwrap();
        mesh
    }

    #[test]
    fn test_single_triangle_hit() {
        let mesh = single_triangle();
        let ray = Ray::new(Point3::new(0.5, 0.5, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = mesh.intersect_ray(&ray).unwrap();
        assert!((hit.distance - 3.0).abs() < 1e-12);
        assert!((hit.uv.x - 0.25).abs() < 1e-12);
        assert!((hit.uv.y - 0.25).abs() < 1e-12);
        // Smooth normal leans towards +X.
        assert!(hit.normal.x > 0.0);
        assert!((hit.normal.norm() - 1.0).abs() < 1e-12);

        let d = hit.derivatives.unwrap();
        assert!((d.dndx - Vec3::new(1.0, 0.0, 0.0)).norm() < 1e-12);
        assert!((d.dndy - Vec3::new(0.0, 1.0, 0.0)).norm() < 1e-12);
    }

    #[test]
    fn test_faceted_and_back_culling() {
        let mut mesh = single_triangle();
        mesh.settings.faceted = true;
        let down = Ray::new(Point3::new(0.5, 0.5, 3.0), Vec3::new(0.0, 0.0, -1.0));
        let hit = mesh.intersect_ray(&down).unwrap();
        assert!((hit.normal - Vec3::new(0.0, 0.0, 1.0)).norm() < 1e-12);

        mesh.settings.back_culling = true;
        assert!(mesh.intersect_ray(&down).is_some());
        let up = Ray::new(Point3::new(0.5, 0.5, -3.0), Vec3::new(0.0, 0.0, 1.0));
        assert!(mesh.intersect_ray(&up).is_none());
    }

    #[test]
    fn test_invalid_indices() {
        let mut mesh = Mesh::new();
        mesh.add_vertex(Point3::origin());
        mesh.add_vertex(Point3::new(1.0, 0.0, 0.0));
        let err = mesh.add_triangle([1, 2, 3], [0; 3], [0; 3]).unwrap_err();
        assert!(matches!(
            err,
            TraceError::InvalidIndex {
                kind: "vertex",
                index: 3,
                len: 2,
                ..
            }
        ));
        assert!(mesh.add_triangle([1, 2, 0], [0; 3], [0; 3]).is_err());
        assert!(mesh.add_triangle([1, 2, 2], [1, 0, 0], [0; 3]).is_err());
        assert!(mesh.add_triangle([1, 2, 2], [0; 3], [0; 3]).is_ok());
    }

    #[test]
    fn test_empty_mesh_fails_to_prepare() {
        let mut mesh = Mesh::new();
        assert!(matches!(mesh.prepare(), Err(TraceError::EmptyMesh)));
    }

    #[test]
    fn test_small_mesh_skips_tree() {
        let mut cube = unit_cube(MeshSettings::default());
        cube.prepare().unwrap();
        assert!(cube.kd_tree().is_none());
        assert_eq!(cube.bbox().max, Point3::new(1.0, 1.0, 1.0));
        assert_eq!(cube.bbox().min, Point3::origin());
    }

    #[test]
    fn test_cube_inside_parity() {
        let mut cube = unit_cube(MeshSettings::default());
        cube.prepare().unwrap();
        let scene = Scene::new();
        assert!(cube.is_inside(&Point3::new(0.3, 0.6, 0.2), &scene));
        assert!(cube.is_inside(&Point3::new(0.9, 0.15, 0.55), &scene));
        assert!(!cube.is_inside(&Point3::new(1.3, 0.6, 0.2), &scene));
        assert!(!cube.is_inside(&Point3::new(-0.3, 0.6, 0.2), &scene));
    }

    #[test]
    fn test_sphere_mesh_outward_winding() {
        let mut sphere = uv_sphere(Point3::origin(), 1.0, 8, 12, MeshSettings::default());
        sphere.settings.faceted = true;
        sphere.prepare().unwrap();
        let ray = Ray::new(Point3::new(0.05, 0.1, -5.0), Vec3::new(0.0, 0.0, 1.0));
        let hit = sphere.intersect_ray(&ray).unwrap();
        assert!(hit.normal.z < 0.0);
        assert!(hit.distance > 3.9 && hit.distance < 4.1);
        let scene = Scene::new();
        assert!(sphere.is_inside(&Point3::new(0.1, 0.2, 0.05), &scene));
        assert!(!sphere.is_inside(&Point3::new(0.1, 2.0, 0.05), &scene));
    }

    fn check_tree_matches_brute_force(kd: KdSettings, seed: u64) {
        let settings = MeshSettings {
            kd,
            ..MeshSettings::default()
        };
        let mut mesh = uv_sphere(Point3::new(1.0, -2.0, 0.5), 3.0, 24, 32, settings);
        mesh.prepare().unwrap();
        assert!(mesh.kd_tree().is_some());

        let mut rng = StdRng::seed_from_u64(seed);
        let mut hits = 0;
        for _ in 0..500 {
            let origin = Point3::new(
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
                rng.gen_range(-8.0..8.0),
            );
            let target = Point3::new(
                rng.gen_range(-3.0..5.0),
                rng.gen_range(-6.0..2.0),
                rng.gen_range(-3.5..4.5),
            );
            let ray = Ray::new(origin, target - origin);
            let tree_hit = mesh.intersect_ray(&ray);
            let brute = mesh.intersect_brute_force(&ray);
            match (tree_hit, brute) {
                (None, None) => {}
                (Some(t), Some(b)) => {
                    hits += 1;
                    assert!((t.distance - b.distance).abs() < 1e-9, "{:?}", ray);
                    assert!((t.point - b.point).norm() < 1e-9);
                }
                (t, b) => panic!("tree {:?} vs brute force {:?} for {:?}", t, b, ray),
            }
        }
        assert!(hits > 50);
    }

    #[test]
    fn test_median_tree_matches_brute_force() {
        check_tree_matches_brute_force(KdSettings::default(), 17);
    }

    #[test]
    fn test_sah_tree_matches_brute_force() {
        check_tree_matches_brute_force(KdSettings::sah(), 23);
    }

    #[test]
    fn test_invalid_kd_settings_fail_prepare() {
        let settings = MeshSettings {
            kd: KdSettings {
                sah_samples: 1,
                ..KdSettings::default()
            },
            ..MeshSettings::default()
        };
        let mut mesh = unit_cube(settings);
        assert!(matches!(mesh.prepare(), Err(TraceError::InvalidSettings(_))));
    }
}
