//! Fixed, versioned, little-endian wire records for rendezvous exchanges.
//!
//! Every payload is a byte buffer that starts with one [`WireHdr`] and then
//! carries a sequence of `Pod` records. Multi-byte integers are stored
//! pre-LE with `.to_le()` and decoded with `.from_le()`; `f64` values travel
//! as their IEEE bit pattern in a little-endian `u64`.

use crate::mesh_error::MeshTransferError;
use bytemuck::{Pod, Zeroable};
use bytes::{BufMut, BytesMut};
use std::mem::{align_of, size_of};

/// Bump when the layout or semantics change in incompatible ways.
pub const WIRE_VERSION: u16 = 1;

/// Payload kinds carried in [`WireHdr::kind`].
pub mod kind {
    pub const ELEMENTS: u16 = 1;
    pub const GEOMETRIES: u16 = 2;
    pub const PAIRS: u16 = 3;
    pub const CONTRIBUTIONS: u16 = 4;
    pub const POINT_QUERIES: u16 = 5;
    pub const POINT_HITS: u16 = 6;
    pub const EVALUATIONS: u16 = 7;
    pub const EVAL_REQUESTS: u16 = 8;
}

#[inline]
pub fn f64_to_le(x: f64) -> u64 {
    x.to_bits().to_le()
}

#[inline]
pub fn f64_from_le(bits: u64) -> f64 {
    f64::from_bits(u64::from_le(bits))
}

#[inline]
fn xyz_to_le(p: [f64; 3]) -> [u64; 3] {
    [f64_to_le(p[0]), f64_to_le(p[1]), f64_to_le(p[2])]
}

#[inline]
fn xyz_from_le(p: [u64; 3]) -> [f64; 3] {
    [f64_from_le(p[0]), f64_from_le(p[1]), f64_from_le(p[2])]
}

// ===== Common records ======================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireHdr {
    pub version_le: u16,
    pub kind_le: u16,
    pub reserved_le: u32, // keep zero
}

impl WireHdr {
    pub fn new(kind: u16) -> Self {
        Self {
            version_le: WIRE_VERSION.to_le(),
            kind_le: kind.to_le(),
            reserved_le: 0,
        }
    }
    pub fn kind(&self) -> u16 {
        u16::from_le(self.kind_le)
    }
    pub fn version(&self) -> u16 {
        u16::from_le(self.version_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCount {
    pub n_le: u32,
}

impl WireCount {
    pub fn new(n: usize) -> Self {
        Self {
            n_le: (n as u32).to_le(),
        }
    }
    pub fn get(&self) -> usize {
        u32::from_le(self.n_le) as usize
    }
}

/// One `f64` value.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireScalar {
    pub bits_le: u64,
}

impl WireScalar {
    pub fn new(x: f64) -> Self {
        Self { bits_le: f64_to_le(x) }
    }
    pub fn get(&self) -> f64 {
        f64_from_le(self.bits_le)
    }
}

// ===== Rendezvous: elements ================================================

/// Element header; followed by `nodes_per_element` [`WireVertex`] records in
/// canonical reference order.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireElement {
    pub handle_le: u64,
    pub source_rank_le: u32,
    pub block_le: u32,
}

impl WireElement {
    pub fn new(handle: u64, source_rank: usize, block: usize) -> Self {
        Self {
            handle_le: handle.to_le(),
            source_rank_le: (source_rank as u32).to_le(),
            block_le: (block as u32).to_le(),
        }
    }
    pub fn handle(&self) -> u64 {
        u64::from_le(self.handle_le)
    }
    pub fn source_rank(&self) -> usize {
        u32::from_le(self.source_rank_le) as usize
    }
    pub fn block(&self) -> usize {
        u32::from_le(self.block_le) as usize
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireVertex {
    pub handle_le: u64,
    pub xyz_le: [u64; 3],
}

impl WireVertex {
    pub fn new(handle: u64, xyz: [f64; 3]) -> Self {
        Self {
            handle_le: handle.to_le(),
            xyz_le: xyz_to_le(xyz),
        }
    }
    pub fn handle(&self) -> u64 {
        u64::from_le(self.handle_le)
    }
    pub fn xyz(&self) -> [f64; 3] {
        xyz_from_le(self.xyz_le)
    }
}

// ===== Rendezvous: geometries ==============================================

/// Geometry header; followed by one geometry-specific record.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireGeometryHdr {
    pub gid_le: u64,
    pub owner_rank_le: u32,
    pub _pad: u32,
}

impl WireGeometryHdr {
    pub fn new(gid: u64, owner_rank: usize) -> Self {
        Self {
            gid_le: gid.to_le(),
            owner_rank_le: (owner_rank as u32).to_le(),
            _pad: 0,
        }
    }
    pub fn gid(&self) -> u64 {
        u64::from_le(self.gid_le)
    }
    pub fn owner_rank(&self) -> usize {
        u32::from_le(self.owner_rank_le) as usize
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WirePointGeometry {
    pub xyz_le: [u64; 3],
}

impl WirePointGeometry {
    pub fn new(xyz: [f64; 3]) -> Self {
        Self { xyz_le: xyz_to_le(xyz) }
    }
    pub fn xyz(&self) -> [f64; 3] {
        xyz_from_le(self.xyz_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCuboid {
    pub min_le: [u64; 3],
    pub max_le: [u64; 3],
}

impl WireCuboid {
    pub fn new(min: [f64; 3], max: [f64; 3]) -> Self {
        Self {
            min_le: xyz_to_le(min),
            max_le: xyz_to_le(max),
        }
    }
    pub fn min(&self) -> [f64; 3] {
        xyz_from_le(self.min_le)
    }
    pub fn max(&self) -> [f64; 3] {
        xyz_from_le(self.max_le)
    }
}

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireCylinder {
    pub length_le: u64,
    pub radius_le: u64,
    pub center_le: [u64; 3],
}

impl WireCylinder {
    pub fn new(length: f64, radius: f64, center: [f64; 3]) -> Self {
        Self {
            length_le: f64_to_le(length),
            radius_le: f64_to_le(radius),
            center_le: xyz_to_le(center),
        }
    }
    pub fn length(&self) -> f64 {
        f64_from_le(self.length_le)
    }
    pub fn radius(&self) -> f64 {
        f64_from_le(self.radius_le)
    }
    pub fn center(&self) -> [f64; 3] {
        xyz_from_le(self.center_le)
    }
}

// ===== Integral assembly ===================================================

/// A resolved (geometry, element) pair routed back to the element's rank.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WirePair {
    pub gid_le: u64,
    pub element_le: u64,
    pub geometry_owner_le: u32,
    pub block_le: u32,
}

impl WirePair {
    pub fn new(gid: u64, element: u64, geometry_owner: usize, block: usize) -> Self {
        Self {
            gid_le: gid.to_le(),
            element_le: element.to_le(),
            geometry_owner_le: (geometry_owner as u32).to_le(),
            block_le: (block as u32).to_le(),
        }
    }
    pub fn gid(&self) -> u64 {
        u64::from_le(self.gid_le)
    }
    pub fn element(&self) -> u64 {
        u64::from_le(self.element_le)
    }
    pub fn geometry_owner(&self) -> usize {
        u32::from_le(self.geometry_owner_le) as usize
    }
    pub fn block(&self) -> usize {
        u32::from_le(self.block_le) as usize
    }
}

/// One element's contribution to one geometry; followed by `dim`
/// [`WireScalar`] integral components.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireContribution {
    pub gid_le: u64,
    pub element_le: u64,
    pub measure_le: u64,
}

impl WireContribution {
    pub fn new(gid: u64, element: u64, measure: f64) -> Self {
        Self {
            gid_le: gid.to_le(),
            element_le: element.to_le(),
            measure_le: f64_to_le(measure),
        }
    }
    pub fn gid(&self) -> u64 {
        u64::from_le(self.gid_le)
    }
    pub fn element(&self) -> u64 {
        u64::from_le(self.element_le)
    }
    pub fn measure(&self) -> f64 {
        f64_from_le(self.measure_le)
    }
}

// ===== Point location ======================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WirePointQuery {
    pub index_le: u64,
    pub xyz_le: [u64; 3],
}

impl WirePointQuery {
    pub fn new(index: usize, xyz: [f64; 3]) -> Self {
        Self {
            index_le: (index as u64).to_le(),
            xyz_le: xyz_to_le(xyz),
        }
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
    pub fn xyz(&self) -> [f64; 3] {
        xyz_from_le(self.xyz_le)
    }
}

/// Reply to a [`WirePointQuery`] that hit an element.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WirePointHit {
    pub index_le: u64,
    pub element_le: u64,
    pub block_le: u32,
    pub source_rank_le: u32,
}

impl WirePointHit {
    pub fn new(index: usize, element: u64, block: usize, source_rank: usize) -> Self {
        Self {
            index_le: (index as u64).to_le(),
            element_le: element.to_le(),
            block_le: (block as u32).to_le(),
            source_rank_le: (source_rank as u32).to_le(),
        }
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
    pub fn element(&self) -> u64 {
        u64::from_le(self.element_le)
    }
    pub fn block(&self) -> usize {
        u32::from_le(self.block_le) as usize
    }
    pub fn source_rank(&self) -> usize {
        u32::from_le(self.source_rank_le) as usize
    }
}

/// A located target point forwarded to the rank that owns its element.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEvalRequest {
    pub index_le: u64,
    pub element_le: u64,
    pub xyz_le: [u64; 3],
    pub block_le: u32,
    pub requester_le: u32,
}

impl WireEvalRequest {
    pub fn new(index: usize, element: u64, xyz: [f64; 3], block: usize, requester: usize) -> Self {
        Self {
            index_le: (index as u64).to_le(),
            element_le: element.to_le(),
            xyz_le: xyz_to_le(xyz),
            block_le: (block as u32).to_le(),
            requester_le: (requester as u32).to_le(),
        }
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
    pub fn element(&self) -> u64 {
        u64::from_le(self.element_le)
    }
    pub fn xyz(&self) -> [f64; 3] {
        xyz_from_le(self.xyz_le)
    }
    pub fn block(&self) -> usize {
        u32::from_le(self.block_le) as usize
    }
    pub fn requester(&self) -> usize {
        u32::from_le(self.requester_le) as usize
    }
}

/// Evaluated value header; followed by `dim` [`WireScalar`] components.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct WireEvaluation {
    pub index_le: u64,
}

impl WireEvaluation {
    pub fn new(index: usize) -> Self {
        Self {
            index_le: (index as u64).to_le(),
        }
    }
    pub fn index(&self) -> usize {
        u64::from_le(self.index_le) as usize
    }
}

// ===== Compile-time sanity checks =========================================

const _: () = {
    assert!(size_of::<WireHdr>() == 8);
    assert!(size_of::<WireCount>() == 4);
    assert!(size_of::<WireScalar>() == 8);
    assert!(size_of::<WireElement>() == 16);
    assert!(size_of::<WireVertex>() == 32);
    assert!(size_of::<WireGeometryHdr>() == 16);
    assert!(size_of::<WirePointGeometry>() == 24);
    assert!(size_of::<WireCuboid>() == 48);
    assert!(size_of::<WireCylinder>() == 40);
    assert!(size_of::<WirePair>() == 24);
    assert!(size_of::<WireContribution>() == 24);
    assert!(size_of::<WirePointQuery>() == 32);
    assert!(size_of::<WirePointHit>() == 24);
    assert!(size_of::<WireEvalRequest>() == 48);
    assert!(size_of::<WireEvaluation>() == 8);
    assert!(align_of::<WireVertex>() == 8);
};

// ===== Encoding helpers ====================================================

/// Appends records to an outgoing payload.
#[derive(Debug)]
pub struct WireWriter {
    buf: BytesMut,
}

impl WireWriter {
    /// Start a payload of the given kind.
    pub fn new(kind: u16) -> Self {
        let mut w = Self {
            buf: BytesMut::with_capacity(64),
        };
        w.push(&WireHdr::new(kind));
        w
    }

    pub fn push<T: Pod>(&mut self, rec: &T) {
        self.buf.put_slice(bytemuck::bytes_of(rec));
    }

    pub fn push_slice<T: Pod>(&mut self, recs: &[T]) {
        self.buf.put_slice(bytemuck::cast_slice(recs));
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf.to_vec()
    }
}

/// Reads records back out of a received payload.
///
/// Buffers coming off a communicator carry no alignment guarantee, so every
/// record is copied out with an unaligned read.
#[derive(Debug)]
pub struct WireReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> WireReader<'a> {
    /// Open a payload and check its header. An empty buffer is rejected;
    /// senders always write at least the header.
    pub fn open(buf: &'a [u8], expected_kind: u16) -> Result<Self, MeshTransferError> {
        let mut r = Self { buf, pos: 0 };
        let hdr: WireHdr = r.read()?;
        if hdr.version() != WIRE_VERSION {
            return Err(MeshTransferError::WireFormat(format!(
                "unsupported wire version {}",
                hdr.version()
            )));
        }
        if hdr.kind() != expected_kind {
            return Err(MeshTransferError::WireFormat(format!(
                "expected payload kind {expected_kind}, got {}",
                hdr.kind()
            )));
        }
        Ok(r)
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    pub fn read<T: Pod>(&mut self) -> Result<T, MeshTransferError> {
        let n = size_of::<T>();
        let end = self.pos + n;
        if end > self.buf.len() {
            return Err(MeshTransferError::WireFormat(format!(
                "truncated payload: need {n} bytes at offset {}, have {}",
                self.pos,
                self.buf.len() - self.pos
            )));
        }
        let rec = bytemuck::pod_read_unaligned(&self.buf[self.pos..end]);
        self.pos = end;
        Ok(rec)
    }
}
