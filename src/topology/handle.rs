//! `Handle`: an opaque, process-global identifier for mesh entities.
//!
//! Vertices and elements live in distinct handle spaces; the type is shared
//! and only equality and ordering are meaningful. Zero is a valid handle.

use std::fmt;

/// Opaque entity identifier.
///
/// # Memory layout
/// `repr(transparent)` over `u64`, so slices of handles can be handed to FFI
/// or wire code exactly like `&[u64]`.
#[derive(Copy, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(serde::Serialize, serde::Deserialize)]
#[repr(transparent)]
pub struct Handle(u64);

impl Handle {
    #[inline]
    pub const fn new(raw: u64) -> Self {
        Handle(raw)
    }

    /// Raw ordinal.
    #[inline]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl From<u64> for Handle {
    #[inline]
    fn from(raw: u64) -> Self {
        Handle(raw)
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Handle").field(&self.0).finish()
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
