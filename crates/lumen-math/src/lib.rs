#![warn(missing_docs)]

//! Math types for the lumen ray tracer.
//!
//! Thin wrappers around nalgebra providing the vector, matrix and
//! transform types shared by every intersection routine, plus the
//! tolerance constants used to turn numeric degeneracies into misses.

use nalgebra::{Matrix3, Vector2, Vector3};
use serde::{Deserialize, Serialize};

/// A point in 3D space.
pub type Point3 = nalgebra::Point3<f64>;

/// A vector in 3D space.
pub type Vec3 = Vector3<f64>;

/// A point in 2D surface-parameter space.
pub type Point2 = nalgebra::Point2<f64>;

/// A vector in 2D space.
pub type Vec2 = Vector2<f64>;

/// A 3x3 matrix (rotation, scale, and their inverses).
pub type Mat3 = Matrix3<f64>;

/// One of the three coordinate axes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    /// The X axis.
    X,
    /// The Y axis.
    Y,
    /// The Z axis.
    Z,
}

impl Axis {
    /// All three axes in index order.
    pub const ALL: [Axis; 3] = [Axis::X, Axis::Y, Axis::Z];

    /// Component index of this axis (0, 1 or 2).
    #[inline]
    pub fn index(self) -> usize {
        match self {
            Axis::X => 0,
            Axis::Y => 1,
            Axis::Z => 2,
        }
    }

    /// Axis for a component index, wrapping modulo 3.
    #[inline]
    pub fn from_index(index: usize) -> Self {
        Self::ALL[index % 3]
    }

    /// The next axis in X → Y → Z → X order.
    #[inline]
    pub fn next(self) -> Self {
        Self::from_index(self.index() + 1)
    }

    /// The two axes orthogonal to this one, in increasing index order.
    #[inline]
    pub fn others(self) -> (Axis, Axis) {
        match self {
            Axis::X => (Axis::Y, Axis::Z),
            Axis::Y => (Axis::X, Axis::Z),
            Axis::Z => (Axis::X, Axis::Y),
        }
    }
}

/// Tolerance constants for geometric comparisons.
#[derive(Debug, Clone, Copy)]
pub struct Tolerance;

impl Tolerance {
    /// Generic linear tolerance: face containment, sign dead zones, re-query offsets.
    pub const EPSILON: f64 = 1e-6;
    /// Determinant threshold below which a linear system is treated as singular.
    pub const PARALLEL: f64 = 1e-12;
    /// Ray direction components smaller than this are treated as zero.
    pub const AXIS_ZERO: f64 = 1e-9;

    /// Check if a scalar is effectively zero.
    #[inline]
    pub fn is_zero(value: f64, eps: f64) -> bool {
        -eps <= value && value <= eps
    }

    /// Check if `value` lies in `[lo - eps, hi + eps]`.
    #[inline]
    pub fn is_between(value: f64, lo: f64, hi: f64, eps: f64) -> bool {
        lo - eps <= value && value <= hi + eps
    }

    /// Check if two points are coincident within [`Tolerance::EPSILON`].
    pub fn points_equal(a: &Point3, b: &Point3) -> bool {
        (a - b).norm() < Self::EPSILON
    }
}

/// Sign of `x` with a dead zone of ±1e-6 around zero.
#[inline]
pub fn sign_of(x: f64) -> i32 {
    if x > Tolerance::EPSILON {
        1
    } else if x < -Tolerance::EPSILON {
        -1
    } else {
        0
    }
}

/// Convert degrees to radians.
#[inline]
pub fn to_radians(degrees: f64) -> f64 {
    degrees.to_radians()
}

/// Convert radians to degrees.
#[inline]
pub fn to_degrees(radians: f64) -> f64 {
    radians.to_degrees()
}

/// Rotation about the X axis by `angle` radians.
pub fn rotation_x(angle: f64) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(
        1.0, 0.0, 0.0, //
        0.0, c, -s, //
        0.0, s, c,
    )
}

/// Rotation about the Y axis by `angle` radians.
pub fn rotation_y(angle: f64) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(
        c, 0.0, s, //
        0.0, 1.0, 0.0, //
        -s, 0.0, c,
    )
}

/// Rotation about the Z axis by `angle` radians.
pub fn rotation_z(angle: f64) -> Mat3 {
    let (s, c) = angle.sin_cos();
    Mat3::new(
        c, -s, 0.0, //
        s, c, 0.0, //
        0.0, 0.0, 1.0,
    )
}

/// A model transform: scale and rotation (linear part) followed by a translation.
///
/// The inverse and the transposed inverse of the linear part are cached, so
/// undoing points/directions and transforming normals costs one matrix product.
#[derive(Debug, Clone, PartialEq)]
pub struct Transform {
    linear: Mat3,
    inverse: Mat3,
    normal_matrix: Mat3,
    offset: Vec3,
}

impl Transform {
    /// Identity transform.
    pub fn identity() -> Self {
        Self {
            linear: Mat3::identity(),
            inverse: Mat3::identity(),
            normal_matrix: Mat3::identity(),
            offset: Vec3::zeros(),
        }
    }

    fn with_linear(mut self, linear: Mat3) -> Self {
        // Degenerate (zero-scale) transforms keep an identity inverse.
        let inverse = linear.try_inverse().unwrap_or_else(Mat3::identity);
        self.linear = linear;
        self.inverse = inverse;
        self.normal_matrix = inverse.transpose();
        self
    }

    /// Append a non-uniform scale by `(x, y, z)`.
    pub fn scaled(self, x: f64, y: f64, z: f64) -> Self {
        let linear = self.linear * Mat3::from_diagonal(&Vec3::new(x, y, z));
        self.with_linear(linear)
    }

    /// Append a rotation given as yaw (about Y), pitch (about X) and roll (about Z), in degrees.
    pub fn rotated(self, yaw: f64, pitch: f64, roll: f64) -> Self {
        let linear = self.linear
            * rotation_x(to_radians(pitch))
            * rotation_y(to_radians(yaw))
            * rotation_z(to_radians(roll));
        self.with_linear(linear)
    }

    /// Set the translation offset.
    pub fn translated(mut self, offset: Vec3) -> Self {
        self.offset = offset;
        self
    }

    /// The linear (scale/rotation) part.
    pub fn linear(&self) -> &Mat3 {
        &self.linear
    }

    /// The translation offset.
    pub fn offset(&self) -> &Vec3 {
        &self.offset
    }

    /// Transform a point from object space to world space.
    pub fn point(&self, p: &Point3) -> Point3 {
        Point3::from(self.linear * p.coords + self.offset)
    }

    /// Transform a point from world space back to object space.
    pub fn undo_point(&self, p: &Point3) -> Point3 {
        Point3::from(self.inverse * (p.coords - self.offset))
    }

    /// Transform a direction (no translation).
    pub fn direction(&self, v: &Vec3) -> Vec3 {
        self.linear * v
    }

    /// Transform a world-space direction back to object space.
    pub fn undo_direction(&self, v: &Vec3) -> Vec3 {
        self.inverse * v
    }

    /// Transform a surface normal (inverse transpose of the linear part).
    pub fn normal(&self, n: &Vec3) -> Vec3 {
        self.normal_matrix * n
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
