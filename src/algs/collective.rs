//! Collectives built from point-to-point messages.
//!
//! These back the provided methods of [`Communicator`]; backends with native
//! collectives override them. Each exchange posts every receive, then every
//! send, waits on the receives in rank order and finally drains the sends.

use crate::algs::communicator::{CommTag, Communicator, ReduceOp, Wait};
use crate::mesh_error::MeshTransferError;

fn comm_err(neighbor: usize, reason: impl Into<String>) -> MeshTransferError {
    MeshTransferError::CommError {
        neighbor,
        reason: reason.into(),
    }
}

/// Size exchange on `tag`, payload exchange on `tag.offset(1)`.
pub(crate) fn all_to_allv_p2p<C: Communicator + ?Sized>(
    comm: &C,
    tag: CommTag,
    mut sends: Vec<Vec<u8>>,
) -> Result<Vec<Vec<u8>>, MeshTransferError> {
    let size = comm.size();
    let me = comm.rank();
    if sends.len() != size {
        return Err(comm_err(
            me,
            format!("expected {size} send buffers, got {}", sends.len()),
        ));
    }
    let count_tag = tag.as_u16();
    let data_tag = tag.offset(1).as_u16();
    let peers = || (0..size).filter(move |&p| p != me);

    let mut pending = Vec::with_capacity(2 * size);

    // phase 1: byte counts
    let mut count_recvs = Vec::with_capacity(size);
    for peer in peers() {
        let mut buf = [0u8; 8];
        count_recvs.push((peer, comm.irecv(peer, count_tag, &mut buf)));
    }
    for peer in peers() {
        let n = sends[peer].len() as u64;
        pending.push(comm.isend(peer, count_tag, &n.to_le_bytes()));
    }
    let mut counts = vec![0usize; size];
    for (peer, h) in count_recvs {
        let raw = h
            .wait()
            .ok_or_else(|| comm_err(peer, "size message missing"))?;
        let bytes: [u8; 8] = raw
            .as_slice()
            .try_into()
            .map_err(|_| comm_err(peer, format!("size message has {} bytes", raw.len())))?;
        counts[peer] = u64::from_le_bytes(bytes) as usize;
    }

    // phase 2: payloads, empty ones included
    let mut data_recvs = Vec::with_capacity(size);
    for peer in peers() {
        let mut buf = vec![0u8; counts[peer]];
        data_recvs.push((peer, comm.irecv(peer, data_tag, &mut buf)));
    }
    for peer in peers() {
        pending.push(comm.isend(peer, data_tag, &sends[peer]));
    }
    let mut recvs = vec![Vec::new(); size];
    for (peer, h) in data_recvs {
        let raw = h.wait().unwrap_or_default();
        if raw.len() != counts[peer] {
            return Err(comm_err(
                peer,
                format!("expected {} payload bytes, got {}", counts[peer], raw.len()),
            ));
        }
        recvs[peer] = raw;
    }
    for s in pending {
        let _ = s.wait();
    }
    recvs[me] = std::mem::take(&mut sends[me]);
    Ok(recvs)
}

/// Every rank sends its values to every rank and folds all of them in rank
/// order, so all ranks compute bitwise identical results.
pub(crate) fn all_reduce_p2p<C: Communicator + ?Sized>(
    comm: &C,
    tag: CommTag,
    values: &mut [f64],
    op: ReduceOp,
) -> Result<(), MeshTransferError> {
    let size = comm.size();
    if size <= 1 {
        return Ok(());
    }
    let mine: Vec<u8> = values.iter().flat_map(|v| v.to_le_bytes()).collect();
    let recvs = all_to_allv_p2p(comm, tag, vec![mine; size])?;

    let mut acc: Option<Vec<f64>> = None;
    for (peer, raw) in recvs.iter().enumerate() {
        if raw.len() != 8 * values.len() {
            return Err(comm_err(
                peer,
                format!("reduction of {} values got {} bytes", values.len(), raw.len()),
            ));
        }
        let theirs = raw
            .chunks_exact(8)
            .map(|c| f64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]));
        match acc.as_mut() {
            None => acc = Some(theirs.collect()),
            Some(a) => a
                .iter_mut()
                .zip(theirs)
                .for_each(|(x, y)| *x = op.apply(*x, y)),
        }
    }
    if let Some(a) = acc {
        values.copy_from_slice(&a);
    }
    Ok(())
}

/// Empty exchange with every peer; no rank leaves before all have entered.
pub(crate) fn barrier_p2p<C: Communicator + ?Sized>(
    comm: &C,
    tag: CommTag,
) -> Result<(), MeshTransferError> {
    all_to_allv_p2p(comm, tag, vec![Vec::new(); comm.size()]).map(|_| ())
}

/// Collective. Share whether `local` failed on any rank so that all ranks
/// leave together. A failing rank keeps its own error; the others get a
/// `CommError` naming the lowest failing rank.
pub(crate) fn agree<C: Communicator + ?Sized, T>(
    comm: &C,
    tag: CommTag,
    local: Result<T, MeshTransferError>,
) -> Result<T, MeshTransferError> {
    let mine = if local.is_err() {
        comm.rank() as f64
    } else {
        f64::INFINITY
    };
    let mut failed = [mine];
    comm.all_reduce(tag, &mut failed, ReduceOp::Min)?;
    if failed[0].is_infinite() {
        return local;
    }
    let rank = failed[0] as usize;
    local.and_then(|_| Err(comm_err(rank, format!("rank {rank} failed before the exchange"))))
}
