//! Message passing between ranks: intra-process (threads) or inter-process (MPI).
//!
//! Messages are contiguous byte slices. Send and receive handles are
//! non-blocking; callers must `.wait()` a receive before trusting its data.
//! The collectives provided on [`Communicator`] are blocking synchronization
//! points: every rank must call them in the same order with the same tag.
//! Desynchronized collectives are not detected.

use std::collections::VecDeque;
use std::sync::Arc;

use bytes::Bytes;
use dashmap::DashMap;
use once_cell::sync::Lazy;

use crate::algs::collective;
use crate::mesh_error::MeshTransferError;

/// Reserved for the point-to-point [`Communicator::barrier`].
pub const TAG_BARRIER: CommTag = CommTag::new(0x5FF0);

/// Typed message tag. Collectives use `tag` and `tag.offset(1)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommTag(u16);

impl CommTag {
    pub const fn new(tag: u16) -> Self {
        Self(tag)
    }
    pub const fn as_u16(self) -> u16 {
        self.0
    }
    pub const fn offset(self, by: u16) -> Self {
        Self(self.0.wrapping_add(by))
    }
}

/// Element-wise reduction for [`Communicator::all_reduce`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ReduceOp {
    Sum,
    Min,
    Max,
}

impl ReduceOp {
    pub fn apply(self, acc: f64, x: f64) -> f64 {
        match self {
            ReduceOp::Sum => acc + x,
            ReduceOp::Min => acc.min(x),
            ReduceOp::Max => acc.max(x),
        }
    }
}

/// Anything that can be waited on.
pub trait Wait {
    /// Wait for completion and return the received data (if any).
    fn wait(self) -> Option<Vec<u8>>;
}

impl Wait for () {
    fn wait(self) -> Option<Vec<u8>> {
        None
    }
}

/// Non-blocking point-to-point interface plus blocking collectives.
pub trait Communicator {
    /// Handle returned by `isend`.
    type SendHandle: Wait;
    /// Handle returned by `irecv`; may borrow the communicator.
    type RecvHandle<'a>: Wait
    where
        Self: 'a;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) -> Self::SendHandle;
    /// Post a receive of `buf.len()` bytes. The data is returned by `wait`.
    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> Self::RecvHandle<'_>;

    fn rank(&self) -> usize;
    fn size(&self) -> usize;

    /// True for the single-rank no-op communicator.
    fn is_no_comm(&self) -> bool {
        false
    }

    /// Collective. Returns once every rank has entered the barrier.
    fn barrier(&self) -> Result<(), MeshTransferError> {
        collective::barrier_p2p(self, TAG_BARRIER)
    }

    /// Personalized exchange: `sends[p]` goes to rank `p`, the result holds
    /// what every rank sent to this one, indexed by source rank. Empty
    /// buffers are exchanged like any other.
    fn all_to_allv(
        &self,
        tag: CommTag,
        sends: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, MeshTransferError> {
        collective::all_to_allv_p2p(self, tag, sends)
    }

    /// In-place element-wise reduction over all ranks. Every rank ends with
    /// the same values; contributions are folded in rank order.
    fn all_reduce(
        &self,
        tag: CommTag,
        values: &mut [f64],
        op: ReduceOp,
    ) -> Result<(), MeshTransferError> {
        collective::all_reduce_p2p(self, tag, values, op)
    }
}

/// Single-rank communicator; every collective is local.
#[derive(Clone, Debug, Default)]
pub struct NoComm;

impl Communicator for NoComm {
    type SendHandle = ();
    type RecvHandle<'a> = ();

    fn isend(&self, _peer: usize, _tag: u16, _buf: &[u8]) {}
    fn irecv(&self, _peer: usize, _tag: u16, _buf: &mut [u8]) {}

    fn rank(&self) -> usize {
        0
    }
    fn size(&self) -> usize {
        1
    }
    fn is_no_comm(&self) -> bool {
        true
    }

    fn barrier(&self) -> Result<(), MeshTransferError> {
        Ok(())
    }

    fn all_to_allv(
        &self,
        _tag: CommTag,
        mut sends: Vec<Vec<u8>>,
    ) -> Result<Vec<Vec<u8>>, MeshTransferError> {
        match sends.len() {
            1 => Ok(vec![std::mem::take(&mut sends[0])]),
            n => Err(MeshTransferError::CommError {
                neighbor: 0,
                reason: format!("single-rank exchange given {n} send buffers"),
            }),
        }
    }

    fn all_reduce(
        &self,
        _tag: CommTag,
        _values: &mut [f64],
        _op: ReduceOp,
    ) -> Result<(), MeshTransferError> {
        Ok(())
    }
}

// --- RayonComm: intra-process, one thread per rank ---
type Key = (usize, usize, u16); // (src, dst, tag)
type Mailbox = DashMap<Key, VecDeque<Bytes>>;

static MAILBOX: Lazy<Arc<Mailbox>> = Lazy::new(|| Arc::new(DashMap::new()));

/// Pending receive on a [`RayonComm`] mailbox.
pub struct LocalHandle {
    mailbox: Arc<Mailbox>,
    key: Key,
    len: usize,
}

impl Wait for LocalHandle {
    fn wait(self) -> Option<Vec<u8>> {
        loop {
            let msg = self
                .mailbox
                .get_mut(&self.key)
                .and_then(|mut queue| queue.pop_front());
            if let Some(bytes) = msg {
                let n = self.len.min(bytes.len());
                return Some(bytes[..n].to_vec());
            }
            std::thread::yield_now();
        }
    }
}

/// In-process communicator: ranks are threads sharing a mailbox.
///
/// Messages between the same (source, destination, tag) triple are
/// delivered in send order.
#[derive(Clone)]
pub struct RayonComm {
    rank: usize,
    size: usize,
    mailbox: Arc<Mailbox>,
}

impl std::fmt::Debug for RayonComm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RayonComm")
            .field("rank", &self.rank)
            .field("size", &self.size)
            .finish()
    }
}

impl RayonComm {
    /// Rank `rank` of a `size`-rank world on the process-global mailbox.
    /// Tests using it concurrently must not share tags.
    pub fn new(rank: usize, size: usize) -> Self {
        Self {
            rank,
            size,
            mailbox: Arc::clone(&MAILBOX),
        }
    }

    /// All ranks of a fresh world with its own mailbox.
    pub fn world(size: usize) -> Vec<Self> {
        let mailbox = Arc::new(Mailbox::new());
        (0..size)
            .map(|rank| Self {
                rank,
                size,
                mailbox: Arc::clone(&mailbox),
            })
            .collect()
    }
}

impl Communicator for RayonComm {
    type SendHandle = ();
    type RecvHandle<'a> = LocalHandle;

    fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
        self.mailbox
            .entry((self.rank, peer, tag))
            .or_default()
            .push_back(Bytes::copy_from_slice(buf));
    }

    fn irecv(&self, peer: usize, tag: u16, buf: &mut [u8]) -> LocalHandle {
        LocalHandle {
            mailbox: Arc::clone(&self.mailbox),
            key: (peer, self.rank, tag),
            len: buf.len(),
        }
    }

    fn rank(&self) -> usize {
        self.rank
    }
    fn size(&self) -> usize {
        self.size
    }
}

// --- MPI backend (feature = "mpi-support") ---
#[cfg(feature = "mpi-support")]
mod mpi_backend {
    use super::*;
    use mpi::collective::SystemOperation;
    use mpi::datatype::{Partition, PartitionMut};
    use mpi::environment::Universe;
    use mpi::topology::SimpleCommunicator;
    use mpi::traits::*;

    /// Communicator over an MPI world.
    ///
    /// Point-to-point sends complete before `isend` returns and receives
    /// happen in `wait`; bulk traffic should go through the collectives,
    /// which map onto native MPI calls.
    pub struct MpiComm {
        world: SimpleCommunicator,
        _universe: Option<Universe>,
    }

    impl MpiComm {
        /// Initialize MPI and wrap `MPI_COMM_WORLD`. MPI is finalized when
        /// the returned value is dropped.
        pub fn init() -> Result<Self, MeshTransferError> {
            let universe = mpi::initialize().ok_or_else(|| MeshTransferError::CommError {
                neighbor: 0,
                reason: "MPI already initialized".into(),
            })?;
            Ok(Self {
                world: universe.world(),
                _universe: Some(universe),
            })
        }

        /// Wrap a communicator whose environment the caller manages.
        pub fn from_world(world: SimpleCommunicator) -> Self {
            Self {
                world,
                _universe: None,
            }
        }

        pub fn world(&self) -> &SimpleCommunicator {
            &self.world
        }
    }

    pub struct MpiRecv<'a> {
        world: &'a SimpleCommunicator,
        peer: i32,
        tag: i32,
    }

    impl Wait for MpiRecv<'_> {
        fn wait(self) -> Option<Vec<u8>> {
            let (data, _status) = self
                .world
                .process_at_rank(self.peer)
                .receive_vec_with_tag::<u8>(self.tag);
            Some(data)
        }
    }

    fn displacements(counts: &[i32]) -> Vec<i32> {
        counts
            .iter()
            .scan(0, |acc, &x| {
                let old = *acc;
                *acc += x;
                Some(old)
            })
            .collect()
    }

    fn count(n: usize, peer: usize) -> Result<i32, MeshTransferError> {
        i32::try_from(n).map_err(|_| MeshTransferError::CommError {
            neighbor: peer,
            reason: format!("message of {n} bytes exceeds the MPI count range"),
        })
    }

    impl Communicator for MpiComm {
        type SendHandle = ();
        type RecvHandle<'a> = MpiRecv<'a>;

        fn isend(&self, peer: usize, tag: u16, buf: &[u8]) {
            self.world
                .process_at_rank(peer as i32)
                .send_with_tag(buf, tag as i32);
        }

        fn irecv(&self, peer: usize, tag: u16, _buf: &mut [u8]) -> MpiRecv<'_> {
            MpiRecv {
                world: &self.world,
                peer: peer as i32,
                tag: tag as i32,
            }
        }

        fn rank(&self) -> usize {
            self.world.rank() as usize
        }
        fn size(&self) -> usize {
            self.world.size() as usize
        }

        fn barrier(&self) -> Result<(), MeshTransferError> {
            self.world.barrier();
            Ok(())
        }

        fn all_to_allv(
            &self,
            _tag: CommTag,
            sends: Vec<Vec<u8>>,
        ) -> Result<Vec<Vec<u8>>, MeshTransferError> {
            let size = self.size();
            if sends.len() != size {
                return Err(MeshTransferError::CommError {
                    neighbor: self.rank(),
                    reason: format!("expected {size} send buffers, got {}", sends.len()),
                });
            }
            let counts = sends
                .iter()
                .enumerate()
                .map(|(p, s)| count(s.len(), p))
                .collect::<Result<Vec<_>, _>>()?;
            let mut recv_counts = vec![0i32; size];
            self.world.all_to_all_into(&counts[..], &mut recv_counts[..]);

            let flat: Vec<u8> = sends.concat();
            let total: usize = recv_counts.iter().map(|&c| c as usize).sum();
            let mut recv = vec![0u8; total];
            {
                let send_partition = Partition::new(&flat[..], &counts[..], displacements(&counts));
                let recv_displs = displacements(&recv_counts);
                let mut recv_partition =
                    PartitionMut::new(&mut recv[..], &recv_counts[..], recv_displs);
                self.world
                    .all_to_all_varcount_into(&send_partition, &mut recv_partition);
            }
            let mut out = Vec::with_capacity(size);
            let mut at = 0usize;
            for &c in &recv_counts {
                let c = c as usize;
                out.push(recv[at..at + c].to_vec());
                at += c;
            }
            Ok(out)
        }

        fn all_reduce(
            &self,
            _tag: CommTag,
            values: &mut [f64],
            op: ReduceOp,
        ) -> Result<(), MeshTransferError> {
            let send = values.to_vec();
            match op {
                ReduceOp::Sum => {
                    self.world
                        .all_reduce_into(&send[..], values, SystemOperation::sum())
                }
                ReduceOp::Min => {
                    self.world
                        .all_reduce_into(&send[..], values, SystemOperation::min())
                }
                ReduceOp::Max => {
                    self.world
                        .all_reduce_into(&send[..], values, SystemOperation::max())
                }
            }
            Ok(())
        }
    }
}

#[cfg(feature = "mpi-support")]
pub use mpi_backend::MpiComm;

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn rayon_roundtrip_two_ranks() {
        let comm0 = RayonComm::new(0, 2);
        let comm1 = RayonComm::new(1, 2);

        let mut recv_buf = [0u8; 4];
        let recv_handle = comm1.irecv(0, 7, &mut recv_buf);
        comm0.isend(1, 7, &[1, 2, 3, 4]).wait();

        let data = recv_handle.wait().expect("rank 0 sent data");
        recv_buf.copy_from_slice(&data);
        assert_eq!(&recv_buf, &[1, 2, 3, 4]);
    }

    #[test]
    fn same_key_messages_arrive_in_order() {
        let world = RayonComm::world(2);
        world[0].isend(1, 3, &[1]);
        world[0].isend(1, 3, &[2, 2]);
        let first = world[1].irecv(0, 3, &mut [0u8; 1]).wait().unwrap();
        let second = world[1].irecv(0, 3, &mut [0u8; 2]).wait().unwrap();
        assert_eq!(first, vec![1]);
        assert_eq!(second, vec![2, 2]);
    }

    #[test]
    fn no_comm_collectives_are_local() {
        let comm = NoComm;
        let out = comm.all_to_allv(CommTag::new(1), vec![vec![9, 8]]).unwrap();
        assert_eq!(out, vec![vec![9, 8]]);
        let mut v = [1.0, -2.0];
        comm.all_reduce(CommTag::new(1), &mut v, ReduceOp::Sum).unwrap();
        assert_eq!(v, [1.0, -2.0]);
        assert!(comm.all_to_allv(CommTag::new(1), vec![]).is_err());
    }

    #[test]
    fn barrier_waits_for_every_rank() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::time::Duration;

        let world = RayonComm::world(2);
        let late_rank_arrived = AtomicBool::new(false);
        std::thread::scope(|s| {
            let flag = &late_rank_arrived;
            let early = &world[0];
            let late = &world[1];
            let waiter = s.spawn(move || {
                early.barrier().unwrap();
                flag.load(Ordering::SeqCst)
            });
            s.spawn(move || {
                std::thread::sleep(Duration::from_millis(200));
                flag.store(true, Ordering::SeqCst);
                late.barrier().unwrap();
            });
            assert!(waiter.join().unwrap(), "barrier returned before rank 1 entered");
        });
    }

    #[test]
    fn no_comm_barrier_is_immediate() {
        assert!(NoComm.barrier().is_ok());
    }

    #[test]
    fn comm_tag_offsets_wrap() {
        let t = CommTag::new(u16::MAX);
        assert_eq!(t.offset(1).as_u16(), 0);
        assert_eq!(CommTag::new(40).offset(2), CommTag::new(42));
    }
}
