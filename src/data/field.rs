//! `FieldContainer`: owned, component-major field storage.

use crate::adapter::field::{FieldTraits, FieldTraitsMut};
use crate::mesh_error::MeshTransferError;
use serde::{Deserialize, Serialize};

/// `dim` components for each of `size` entities, stored component-major.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FieldContainer {
    dim: usize,
    data: Vec<f64>,
}

impl FieldContainer {
    /// Zero-filled field of `size` entities. Arguments follow
    /// [`FieldContainer::from_data`]: dimension first.
    pub fn new(dim: usize, size: usize) -> Self {
        Self {
            dim,
            data: vec![0.0; size * dim],
        }
    }

    /// Wrap an existing component-major array.
    pub fn from_data(dim: usize, data: Vec<f64>) -> Result<Self, MeshTransferError> {
        if dim == 0 {
            return Err(MeshTransferError::InvalidDimension(0));
        }
        if data.len() % dim != 0 {
            return Err(MeshTransferError::FieldSizeMismatch {
                expected: dim * (data.len() / dim),
                found: data.len(),
            });
        }
        Ok(Self { dim, data })
    }

    /// Build from per-component columns of equal length.
    pub fn from_components(components: &[Vec<f64>]) -> Result<Self, MeshTransferError> {
        let size = components.first().map_or(0, Vec::len);
        if let Some(bad) = components.iter().find(|c| c.len() != size) {
            return Err(MeshTransferError::FieldSizeMismatch {
                expected: size,
                found: bad.len(),
            });
        }
        Ok(Self {
            dim: components.len(),
            data: components.concat(),
        })
    }

    pub fn into_data(self) -> Vec<f64> {
        self.data
    }
}

impl FieldTraits for FieldContainer {
    fn dim(&self) -> usize {
        self.dim
    }
    fn values(&self) -> &[f64] {
        &self.data
    }
}

impl FieldTraitsMut for FieldContainer {
    fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }
}
