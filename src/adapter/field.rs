//! Field capability and the component-major layout helpers.
//!
//! A field is a flat array of `dim * size` scalars stored component-major:
//! all entities' component 0, then all entities' component 1, and so on.
//! Integral assembly writes its results assuming exactly this layout.

/// Read access to a component-major field.
pub trait FieldTraits {
    /// Number of components per entity.
    fn dim(&self) -> usize;
    /// The whole blocked array.
    fn values(&self) -> &[f64];

    /// Number of scalars (`dim * size`).
    fn len(&self) -> usize {
        self.values().len()
    }
    /// Number of entities.
    fn size(&self) -> usize {
        match self.dim() {
            0 => 0,
            d => self.len() / d,
        }
    }
    fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
    /// All values of component `d`.
    fn component(&self, d: usize) -> &[f64] {
        let n = self.size();
        &self.values()[d * n..(d + 1) * n]
    }
    /// Component `d` of entity `i`.
    fn value(&self, i: usize, d: usize) -> f64 {
        self.values()[d * self.size() + i]
    }
}

/// Write access for target fields.
pub trait FieldTraitsMut: FieldTraits {
    fn values_mut(&mut self) -> &mut [f64];

    fn component_mut(&mut self, d: usize) -> &mut [f64] {
        let n = self.size();
        &mut self.values_mut()[d * n..(d + 1) * n]
    }
    fn set_value(&mut self, i: usize, d: usize, v: f64) {
        let n = self.size();
        self.values_mut()[d * n + i] = v;
    }
}
