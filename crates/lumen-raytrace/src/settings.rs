//! Build parameters for acceleration structures.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TraceError};

/// How the KD-tree builder chooses split planes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitStrategy {
    /// Cycle the axis with depth and split at the cell midpoint.
    #[default]
    Median,
    /// Longest axis, position chosen by the surface-area heuristic.
    Sah,
}

/// KD-tree build parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KdSettings {
    /// Split strategy.
    pub strategy: SplitStrategy,
    /// Depth at which recursion stops unconditionally.
    pub max_depth: u32,
    /// Triangle lists shorter than this become leaves.
    pub leaf_size: usize,
    /// SAH cost of visiting an internal node.
    pub cost_traversal: f64,
    /// SAH cost of one ray-triangle test.
    pub cost_intersect: f64,
    /// SAH samples along the split axis; `sah_samples - 1` interior
    /// positions are evaluated.
    pub sah_samples: u32,
    /// Meshes with fewer triangles are scanned linearly.
    pub min_triangles: usize,
}

impl Default for KdSettings {
    fn default() -> Self {
        Self {
            strategy: SplitStrategy::Median,
            max_depth: 64,
            leaf_size: 20,
            cost_traversal: 0.3,
            cost_intersect: 1.0,
            sah_samples: 10,
            min_triangles: 50,
        }
    }
}

impl KdSettings {
    /// Default settings with the SAH strategy.
    pub fn sah() -> Self {
        Self {
            strategy: SplitStrategy::Sah,
            ..Self::default()
        }
    }

    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(TraceError::InvalidSettings(
                "max_depth must be at least 1".into(),
            ));
        }
        if self.leaf_size == 0 {
            return Err(TraceError::InvalidSettings(
                "leaf_size must be at least 1".into(),
            ));
        }
        if self.sah_samples < 2 {
            return Err(TraceError::InvalidSettings(
                "sah_samples must be at least 2".into(),
            ));
        }
        if self.cost_traversal < 0.0 || self.cost_intersect <= 0.0 {
            return Err(TraceError::InvalidSettings(
                "SAH costs must be non-negative and cost_intersect positive".into(),
            ));
        }
        Ok(())
    }
}

/// Mesh shading and acceleration flags.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeshSettings {
    /// Report the flat geometric normal instead of interpolated vertex normals.
    pub faceted: bool,
    /// Ignore triangles whose geometric normal faces along the ray.
    pub back_culling: bool,
    /// Build a KD-tree when the mesh is large enough.
    pub use_kd_tree: bool,
    /// KD-tree build parameters.
    pub kd: KdSettings,
}

impl Default for MeshSettings {
    fn default() -> Self {
        Self {
            faceted: false,
            back_culling: false,
            use_kd_tree: true,
            kd: KdSettings::default(),
        }
    }
}

/// Heightfield preprocessing parameters.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeightfieldSettings {
    /// Gaussian blur sigma in samples; `0` disables blurring.
    pub blur: f64,
    /// Build the max-height pyramid used to skip cells while marching.
    pub accelerate: bool,
}

impl HeightfieldSettings {
    /// Validate settings.
    pub fn validate(&self) -> Result<()> {
        if !(self.blur >= 0.0 && self.blur.is_finite()) {
            return Err(TraceError::InvalidSettings(
                "blur must be a finite non-negative number".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let kd = KdSettings::default();
        assert_eq!(kd.max_depth, 64);
        assert_eq!(kd.leaf_size, 20);
        assert!((kd.cost_traversal - 0.3).abs() < 1e-12);
        assert!(kd.validate().is_ok());
        assert!(KdSettings::sah().validate().is_ok());
        assert!(HeightfieldSettings::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_settings() {
        let kd = KdSettings {
            leaf_size: 0,
            ..KdSettings::default()
        };
        assert!(matches!(kd.validate(), Err(TraceError::InvalidSettings(_))));
        let kd = KdSettings {
            cost_intersect: 0.0,
            ..KdSettings::default()
        };
        assert!(kd.validate().is_err());
        let hf = HeightfieldSettings {
            blur: f64::NAN,
            accelerate: false,
        };
        assert!(hf.validate().is_err());
    }

    #[test]
    fn test_mesh_settings_from_toml() {
        let mesh: MeshSettings = toml::from_str(
            r#"
            faceted = true

            [kd]
            strategy = "sah"
            max_depth = 32
            "#,
        )
        .unwrap();
        assert!(mesh.faceted);
        assert!(mesh.use_kd_tree);
        assert_eq!(mesh.kd.strategy, SplitStrategy::Sah);
        assert_eq!(mesh.kd.max_depth, 32);
        assert_eq!(mesh.kd.leaf_size, 20);
    }

    #[test]
    fn test_partial_json() {
        let kd: KdSettings = serde_json::from_str(r#"{"strategy":"sah","leaf_size":8}"#).unwrap();
        assert_eq!(kd.strategy, SplitStrategy::Sah);
        assert_eq!(kd.leaf_size, 8);
        assert_eq!(kd.max_depth, 64);
    }
}
