//! Thin owner of a caller-supplied field used as a map source or target.

use crate::adapter::field::FieldTraits;

#[derive(Clone, Debug, Default)]
pub struct FieldManager<F> {
    field: F,
}

impl<F: FieldTraits> FieldManager<F> {
    pub fn new(field: F) -> Self {
        Self { field }
    }
    pub fn field(&self) -> &F {
        &self.field
    }
    pub fn field_mut(&mut self) -> &mut F {
        &mut self.field
    }
    pub fn into_inner(self) -> F {
        self.field
    }
    pub fn dim(&self) -> usize {
        self.field.dim()
    }
    /// Entity count of the wrapped field.
    pub fn size(&self) -> usize {
        self.field.size()
    }
}
