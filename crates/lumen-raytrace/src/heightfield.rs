//! Regular-grid elevation maps.
//!
//! Sample `(x, z)` of a `width × height` grid sits at world position
//! `(x, h, z)`. Each unit cell is split into triangles ABD and BCD along
//! its B–D diagonal. Rays are marched cell by cell in ray order, testing a
//! cell's triangles only when the ray dips below the cell's highest corner.
//!
//! With acceleration enabled, a pyramid of dilated max-height maps lets the
//! march skip `2^k` horizontal units at once while the ray stays above
//! everything within that reach.

use log::debug;
use lumen_math::{Point2, Point3, Tolerance, Vec3};

use crate::error::{Result, TraceError};
use crate::intersect::intersect_triangle;
use crate::settings::HeightfieldSettings;
use crate::{Aabb, Geometry, Intersection, Ray, Scene};

/// Largest Gaussian kernel radius in samples.
const MAX_BLUR_RADIUS: usize = 128;

/// Most pyramid levels ever built.
const MAX_LEVELS: usize = 16;

/// Push past a cell boundary so the next cell lookup is unambiguous.
const STEP_EPSILON: f64 = 1e-6;

/// A heightfield.
#[derive(Debug, Clone)]
pub struct Heightfield {
    width: usize,
    height: usize,
    heights: Vec<f64>,
    /// Highest of the four corners of each cell.
    max_heights: Vec<f64>,
    normals: Vec<Vec3>,
    /// Level `k` bounds the surface within Chebyshev distance `2^k` cells.
    pyramid: Vec<Vec<f64>>,
    bbox: Aabb,
}

/// Separable Gaussian blur with clamped edges and a normalized kernel.
fn blur(samples: &[f64], width: usize, height: usize, sigma: f64) -> Vec<f64> {
    let radius = ((3.0 * sigma).round() as usize).min(MAX_BLUR_RADIUS);
    if radius <= 1 {
        return samples.to_vec();
    }
    let taps: Vec<f64> = (0..radius)
        .map(|d| (-((d * d) as f64) / (2.0 * sigma * sigma)).exp())
        .collect();
    let total: f64 = taps[0] + 2.0 * taps[1..].iter().sum::<f64>();
    let weights: Vec<f64> = taps.iter().map(|w| w / total).collect();

    let pass = |src: &[f64], horizontal: bool| -> Vec<f64> {
        let mut out = vec![0.0; src.len()];
        for z in 0..height {
            for x in 0..width {
                let mut sum = 0.0;
                for d in -(radius as i64 - 1)..radius as i64 {
                    let (sx, sz) = if horizontal {
                        ((x as i64 + d).clamp(0, width as i64 - 1) as usize, z)
                    } else {
                        (x, (z as i64 + d).clamp(0, height as i64 - 1) as usize)
                    };
                    sum += weights[d.unsigned_abs() as usize] * src[sz * width + sx];
                }
                out[z * width + x] = sum;
            }
        }
        out
    };
    let rows = pass(samples, true);
    pass(&rows, false)
}

/// Distance along `dir` from `p` to the next gridline on one axis.
fn gridline_distance(p: f64, dir: f64) -> f64 {
    if Tolerance::is_zero(dir, Tolerance::AXIS_ZERO) {
        f64::INFINITY
    } else if dir > 0.0 {
        (p.floor() + 1.0 - p) / dir
    } else {
        (p.floor() - p) / dir
    }
}

impl Heightfield {
    /// Build a heightfield from row-major samples (`z * width + x`).
    pub fn from_samples(
        width: usize,
        height: usize,
        samples: &[f64],
        settings: &HeightfieldSettings,
    ) -> Result<Self> {
        settings.validate()?;
        if width < 2 || height < 2 {
            return Err(TraceError::Heightfield(format!(
                "grid must be at least 2x2, got {width}x{height}"
            )));
        }
        if samples.len() != width * height {
            return Err(TraceError::Heightfield(format!(
                "expected {} samples for {width}x{height}, got {}",
                width * height,
                samples.len()
            )));
        }
        if let Some(bad) = samples.iter().position(|h| !h.is_finite()) {
            return Err(TraceError::Heightfield(format!(
                "sample {bad} is not a finite number"
            )));
        }

        let heights = if settings.blur > 0.0 {
            blur(samples, width, height, settings.blur)
        } else {
            samples.to_vec()
        };
        let (min_y, max_y) = heights
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &h| {
                (lo.min(h), hi.max(h))
            });

        let mut field = Self {
            width,
            height,
            heights,
            max_heights: Vec::new(),
            normals: Vec::new(),
            pyramid: Vec::new(),
            bbox: Aabb::new(
                Point3::new(0.0, min_y, 0.0),
                Point3::new(width as f64, max_y, height as f64),
            ),
        };
        field.populate_max_heights();
        field.populate_normals();
        if settings.accelerate {
            field.build_pyramid();
        }
        debug!(
            "heightfield {}x{}: heights {:.3}..{:.3}, {} pyramid levels",
            width,
            height,
            min_y,
            max_y,
            field.pyramid.len()
        );
        Ok(field)
    }

    /// Grid width in samples (X).
    pub fn width(&self) -> usize {
        self.width
    }

    /// Grid height in samples (Z).
    pub fn height(&self) -> usize {
        self.height
    }

    /// Number of skip levels built.
    pub fn levels(&self) -> usize {
        self.pyramid.len()
    }

    /// Bounding box `[0, width] × [min, max] × [0, height]`.
    pub fn bbox(&self) -> &Aabb {
        &self.bbox
    }

    /// Sample height, with coordinates clamped to the grid.
    pub fn height_at(&self, x: usize, z: usize) -> f64 {
        let x = x.min(self.width - 1);
        let z = z.min(self.height - 1);
        self.heights[z * self.width + x]
    }

    fn populate_max_heights(&mut self) {
        let (w, h) = (self.width, self.height);
        self.max_heights = (0..h)
            .flat_map(|z| (0..w).map(move |x| (x, z)))
            .map(|(x, z)| {
                self.height_at(x, z)
                    .max(self.height_at(x + 1, z))
                    .max(self.height_at(x, z + 1))
                    .max(self.height_at(x + 1, z + 1))
            })
            .collect();
    }

    fn populate_normals(&mut self) {
        let (w, h) = (self.width, self.height);
        let mut normals = vec![Vec3::y(); w * h];
        for z in 0..h - 1 {
            for x in 0..w - 1 {
                let h0 = self.heights[z * w + x];
                let vdx = Vec3::new(1.0, self.heights[z * w + x + 1] - h0, 0.0);
                let vdy = Vec3::new(0.0, self.heights[(z + 1) * w + x] - h0, 1.0);
                normals[z * w + x] = vdy.cross(&vdx).normalize();
            }
        }
        for z in 0..h {
            normals[z * w + w - 1] = normals[z * w + w - 2];
        }
        for x in 0..w {
            normals[(h - 1) * w + x] = normals[(h - 2) * w + x];
        }
        self.normals = normals;
    }

    /// Dilate `source` by `reach` cells in every direction (3×3 taps).
    fn dilate(&self, source: &[f64], reach: usize) -> Vec<f64> {
        let (w, h) = (self.width as i64, self.height as i64);
        let r = reach as i64;
        let mut out = Vec::with_capacity(source.len());
        for z in 0..h {
            for x in 0..w {
                let mut m = f64::NEG_INFINITY;
                for dz in [-r, 0, r] {
                    for dx in [-r, 0, r] {
                        let (sx, sz) = (x + dx, z + dz);
                        if (0..w).contains(&sx) && (0..h).contains(&sz) {
                            m = m.max(source[(sz * w + sx) as usize]);
                        }
                    }
                }
                out.push(m);
            }
        }
        out
    }

    fn build_pyramid(&mut self) {
        let longest = self.width.max(self.height) as f64;
        let levels = (longest.log2().ceil() as usize).clamp(1, MAX_LEVELS);
        let mut pyramid = Vec::with_capacity(levels);
        pyramid.push(self.dilate(&self.max_heights, 1));
        for k in 1..levels {
            let next = self.dilate(&pyramid[k - 1], 1 << (k - 1));
            pyramid.push(next);
        }
        self.pyramid = pyramid;
    }

    /// Cell containing `p`, if inside the grid footprint.
    fn cell_of(&self, p: &Point3) -> Option<(usize, usize)> {
        let (x, z) = (p.x.floor(), p.z.floor());
        if x < 0.0 || z < 0.0 || x >= self.width as f64 || z >= self.height as f64 {
            return None;
        }
        Some((x as usize, z as usize))
    }

    fn corner(&self, x: usize, z: usize) -> Point3 {
        Point3::new(x as f64, self.height_at(x, z), z as f64)
    }

    /// Bilinear blend of the four corner normals around `(x, z)`.
    fn normal_at(&self, x: f64, z: f64) -> Vec3 {
        let x0 = (x.floor().max(0.0) as usize).min(self.width - 1);
        let z0 = (z.floor().max(0.0) as usize).min(self.height - 1);
        let p = x - x0 as f64;
        let q = z - z0 as f64;
        let x1 = (x0 + 1).min(self.width - 1);
        let z1 = (z0 + 1).min(self.height - 1);
        let w = self.width;
        let n = self.normals[z0 * w + x0] * ((1.0 - p) * (1.0 - q))
            + self.normals[z0 * w + x1] * (p * (1.0 - q))
            + self.normals[z1 * w + x0] * ((1.0 - p) * q)
            + self.normals[z1 * w + x1] * (p * q);
        n.try_normalize(0.0).unwrap_or_else(Vec3::y)
    }

    /// Nearest hit on the two triangles of cell `(x, z)`.
    fn intersect_cell(&self, ray: &Ray, x: usize, z: usize) -> Option<Intersection> {
        let a = self.corner(x, z);
        let b = self.corner(x + 1, z);
        let c = self.corner(x + 1, z + 1);
        let d = self.corner(x, z + 1);
        let first = intersect_triangle(ray, &a, &b, &d, f64::INFINITY);
        let max = first.map_or(f64::INFINITY, |hit| hit.distance);
        let hit = intersect_triangle(ray, &b, &c, &d, max).or(first)?;

        let point = ray.at(hit.distance);
        let uv = Point2::new(point.x / self.width as f64, point.z / self.height as f64);
        Some(
            Intersection::new(hit.distance, point, self.normal_at(point.x, point.z), uv)
                .with_derivatives(Vec3::x(), Vec3::z()),
        )
    }

    /// Largest power-of-two jump the pyramid proves free of surface.
    fn skip(&self, p: &Point3, step: &Vec3, cell: usize) -> Option<Point3> {
        self.pyramid.iter().enumerate().rev().find_map(|(k, level)| {
            let far = *p + *step * (1u64 << k) as f64;
            (p.y.min(far.y) > level[cell]).then_some(far)
        })
    }

    fn march(&self, ray: &Ray, accelerate: bool) -> Option<Intersection> {
        let entry = self.bbox.closest_intersection(ray)?;
        let dir = ray.direction;
        let horizontal = dir.x.hypot(dir.z);

        if horizontal < Tolerance::AXIS_ZERO * dir.norm() {
            let (x, z) = self.cell_of(&ray.at(entry))?;
            return self.intersect_cell(ray, x, z);
        }

        let step = dir / horizontal;
        let slack = 2.0 * STEP_EPSILON * dir.norm();
        let mut p = ray.at(entry + STEP_EPSILON);
        while let Some((x, z)) = self.cell_of(&p) {
            let above = p.y > self.bbox.max.y + slack && dir.y >= 0.0;
            let below = p.y < self.bbox.min.y - slack && dir.y <= 0.0;
            if above || below {
                break;
            }
            let cell = z * self.width + x;

            if accelerate {
                if let Some(far) = self.skip(&p, &step, cell) {
                    p = far;
                    continue;
                }
            }

            let lx = gridline_distance(p.x, dir.x);
            let lz = gridline_distance(p.z, dir.z);
            let p_next = p + dir * (lx.min(lz) + STEP_EPSILON);
            if p.y.min(p_next.y) < self.max_heights[cell] {
                if let Some(hit) = self.intersect_cell(ray, x, z) {
                    return Some(hit);
                }
            }
            p = p_next;
        }
        None
    }

    /// Nearest hit, using the skip pyramid when it was built.
    pub fn intersect_ray(&self, ray: &Ray) -> Option<Intersection> {
        self.march(ray, !self.pyramid.is_empty())
    }

    /// Nearest hit by plain cell-by-cell marching.
    pub fn intersect_unaccelerated(&self, ray: &Ray) -> Option<Intersection> {
        self.march(ray, false)
    }

    /// Height of the triangulated surface at `(x, z)`, if over the grid.
    pub fn surface_height(&self, x: f64, z: f64) -> Option<f64> {
        let (cx, cz) = self.cell_of(&Point3::new(x, 0.0, z))?;
        let (p, q) = (x - cx as f64, z - cz as f64);
        let ha = self.height_at(cx, cz);
        let hb = self.height_at(cx + 1, cz);
        let hc = self.height_at(cx + 1, cz + 1);
        let hd = self.height_at(cx, cz + 1);
        Some(if p + q <= 1.0 {
            ha + p * (hb - ha) + q * (hd - ha)
        } else {
            hc + (1.0 - p) * (hd - hc) + (1.0 - q) * (hb - hc)
        })
    }
}

impl Geometry for Heightfield {
    fn intersect(&self, ray: &Ray, _scene: &Scene) -> Option<Intersection> {
        self.intersect_ray(ray)
    }

    /// Below the surface and over the grid footprint.
    fn is_inside(&self, point: &Point3, _scene: &Scene) -> bool {
        self.surface_height(point.x, point.z)
            .is_some_and(|h| point.y < h)
    }

    fn bounds(&self) -> Option<Aabb> {
        Some(self.bbox)
    }
}
