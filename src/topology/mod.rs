//! Topology vocabulary shared by every other module.
//!
//! - [`handle::Handle`]: opaque, process-global identifier for vertices and elements
//! - [`cell_type::CellType`]: element topology tags with their fixed node counts

pub mod cell_type;
pub mod handle;
