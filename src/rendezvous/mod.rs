//! Rendezvous decomposition over a communicator.

pub mod decomposition;
pub mod partition;

pub use decomposition::{PointLocation, Rendezvous, RendezvousBlock, RendezvousGeometry};
pub use partition::RendezvousPartition;
