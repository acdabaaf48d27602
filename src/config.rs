//! Map configuration.

use serde::{Deserialize, Serialize};

use crate::mesh_error::MeshTransferError;
use crate::search::DEFAULT_LEAF_CAPACITY;

/// How the reduced integral of a target geometry is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Normalization {
    /// Sum of element integrals divided by the sum of contributing element
    /// measures (a measure-weighted average).
    #[default]
    ElementMeasure,
    /// Sum of element integrals divided by the geometry's own measure.
    GeometryMeasure,
    /// Raw sum of element integrals.
    None,
}

/// Parameters shared by the mapping operators.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MapConfig {
    pub dimension: usize,
    /// Absolute containment tolerance for boxes and geometries; reference
    /// coordinate tolerance for element containment.
    pub tolerance: f64,
    /// Require every vertex of an element to lie in a geometry, instead of
    /// any one of them.
    pub all_vertices_for_inclusion: bool,
    pub leaf_capacity: usize,
    pub normalization: Normalization,
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            dimension: 3,
            tolerance: 1.0e-6,
            all_vertices_for_inclusion: false,
            leaf_capacity: DEFAULT_LEAF_CAPACITY,
            normalization: Normalization::ElementMeasure,
        }
    }
}

impl MapConfig {
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn with_all_vertices_for_inclusion(mut self, all: bool) -> Self {
        self.all_vertices_for_inclusion = all;
        self
    }

    pub fn with_leaf_capacity(mut self, leaf_capacity: usize) -> Self {
        self.leaf_capacity = leaf_capacity;
        self
    }

    pub fn with_normalization(mut self, normalization: Normalization) -> Self {
        self.normalization = normalization;
        self
    }

    pub fn validate(&self) -> Result<(), MeshTransferError> {
        if !(2..=3).contains(&self.dimension) {
            return Err(MeshTransferError::InvalidDimension(self.dimension));
        }
        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(MeshTransferError::InvalidConfig(format!(
                "tolerance must be finite and non-negative, got {}",
                self.tolerance
            )));
        }
        if self.leaf_capacity == 0 {
            return Err(MeshTransferError::InvalidConfig(
                "leaf_capacity must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let c = MapConfig::default();
        assert!(c.validate().is_ok());
        assert_eq!(c.tolerance, 1.0e-6);
        assert!(!c.all_vertices_for_inclusion);
        assert_eq!(c.normalization, Normalization::ElementMeasure);
    }

    #[test]
    fn validate_rejects_bad_values() {
        assert_eq!(
            MapConfig::default().with_dimension(1).validate(),
            Err(MeshTransferError::InvalidDimension(1))
        );
        assert!(matches!(
            MapConfig::default().with_tolerance(-1.0).validate(),
            Err(MeshTransferError::InvalidConfig(_))
        ));
        assert!(matches!(
            MapConfig::default().with_tolerance(f64::NAN).validate(),
            Err(MeshTransferError::InvalidConfig(_))
        ));
        assert!(matches!(
            MapConfig::default().with_leaf_capacity(0).validate(),
            Err(MeshTransferError::InvalidConfig(_))
        ));
    }

    #[test]
    fn serde_fills_missing_fields_with_defaults() {
        let c: MapConfig =
            serde_json::from_str(r#"{"dimension":2,"normalization":"GeometryMeasure"}"#).unwrap();
        assert_eq!(c.dimension, 2);
        assert_eq!(c.tolerance, 1.0e-6);
        assert_eq!(c.normalization, Normalization::GeometryMeasure);

        let back: MapConfig = serde_json::from_str(&serde_json::to_string(&c).unwrap()).unwrap();
        assert_eq!(back, c);
    }
}
