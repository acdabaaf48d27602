//! Communication plumbing: wire records, communicators and collectives.

pub mod collective;
pub mod communicator;
pub mod wire;

pub use communicator::{CommTag, Communicator, NoComm, RayonComm, ReduceOp, Wait};
#[cfg(feature = "mpi-support")]
pub use communicator::MpiComm;
