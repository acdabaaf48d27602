//! MeshTransferError: unified error type for mesh-rendezvous public APIs
//!
//! Every fallible operation in the crate (view construction, point location,
//! rendezvous exchange, map setup/apply) reports through this enum so callers
//! can branch on the variant instead of matching strings.
//!
//! [`MeshTransferError::PointNotFound`] is an *expected* outcome of point
//! location and is returned for legitimate out-of-domain queries. All other
//! variants abort the current operation without partial results.

use crate::topology::cell_type::CellType;
use crate::topology::handle::Handle;
use thiserror::Error;

/// Unified error type for mesh-rendezvous operations.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshTransferError {
    /// No element contains the query point within tolerance.
    #[error("point {point:?} is not contained in any element")]
    PointNotFound { point: Vec<f64> },

    /// Spatial dimensions of two collaborators disagree.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },
    /// Only 2D and 3D problems are supported.
    #[error("unsupported spatial dimension {0} (expected 2 or 3)")]
    InvalidDimension(usize),
    /// A field that must carry data was empty.
    #[error("empty field: {0}")]
    EmptyField(&'static str),
    /// A field's entity count does not match what the operation expects.
    #[error("field size mismatch: expected {expected} entities, found {found}")]
    FieldSizeMismatch { expected: usize, found: usize },
    /// Node permutation list is not a permutation of `0..nodes_per_element`.
    #[error("invalid permutation list: {0}")]
    InvalidPermutation(String),
    /// Blocked coordinate array has the wrong length.
    #[error("coordinate array length mismatch: expected {expected}, found {found}")]
    CoordinateLengthMismatch { expected: usize, found: usize },
    /// Blocked connectivity array has the wrong length.
    #[error("connectivity array length mismatch: expected {expected}, found {found}")]
    ConnectivityLengthMismatch { expected: usize, found: usize },
    /// Connectivity references a vertex handle that the view does not own.
    #[error("connectivity references unknown vertex {0}")]
    UnknownVertex(Handle),
    /// The same vertex or element handle appears twice in one block.
    #[error("duplicate {kind} handle {handle}")]
    DuplicateHandle { kind: &'static str, handle: Handle },
    /// A block's topology tag disagrees with its node count or with a peer.
    #[error("block {block}: expected topology {expected:?}, found {found:?}")]
    TopologyMismatch {
        block: usize,
        expected: CellType,
        found: CellType,
    },
    /// Ranks disagree on the number of mesh blocks.
    #[error("block count mismatch: expected {expected}, found {found}")]
    BlockCountMismatch { expected: usize, found: usize },
    /// Degenerate or unsupported geometry.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),
    /// Configuration rejected by validation.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// `apply` was called before `setup`.
    #[error("map has not been set up; call `setup` before `apply`")]
    NotSetUp,

    /// Exchange with a peer rank failed.
    #[error("communication error with rank {neighbor}: {reason}")]
    CommError { neighbor: usize, reason: String },
    /// Received payload does not decode as the expected records.
    #[error("wire format error: {0}")]
    WireFormat(String),
}

impl MeshTransferError {
    /// `true` for the expected "no containing element" outcome.
    pub fn is_point_not_found(&self) -> bool {
        matches!(self, MeshTransferError::PointNotFound { .. })
    }
}
