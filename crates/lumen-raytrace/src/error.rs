//! Error types for geometry construction.
//!
//! Intersection queries never fail: degenerate numeric cases resolve to a
//! miss. Only building geometry from external data can go wrong.

use thiserror::Error;

/// Errors that can occur while building geometry.
#[derive(Error, Debug)]
pub enum TraceError {
    /// Mesh has no triangles.
    #[error("mesh is empty")]
    EmptyMesh,

    /// A triangle refers to a vertex, normal or UV that does not exist.
    #[error("triangle {triangle} references {kind} index {index}, but only {len} are defined")]
    InvalidIndex {
        /// Triangle number (0-based).
        triangle: usize,
        /// Which array the index points into.
        kind: &'static str,
        /// The offending 1-based index.
        index: u32,
        /// Number of defined entries (excluding the sentinel).
        len: usize,
    },

    /// Invalid acceleration or geometry settings.
    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    /// Heightfield samples do not describe a usable grid.
    #[error("invalid heightfield: {0}")]
    Heightfield(String),

    /// OBJ text could not be parsed.
    #[error("OBJ parse error at line {line}: {message}")]
    Obj {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// IO error while reading an input file.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for geometry construction.
pub type Result<T> = std::result::Result<T, TraceError>;
