use mesh_rendezvous::adapter::WireGeometry;
use mesh_rendezvous::algs::communicator::CommTag;
use mesh_rendezvous::algs::wire::{
    WireCount, WireReader, WireScalar, WireWriter, f64_from_le, f64_to_le, kind,
};
use mesh_rendezvous::geometry::{Cuboid, Cylinder};
use mesh_rendezvous::mesh_error::MeshTransferError;

#[test]
fn commtag_offset_wrap() {
    let t = CommTag::new(u16::MAX).offset(1);
    assert_eq!(t.as_u16(), 0);
}

#[test]
fn scalars_keep_their_bits() {
    for x in [0.0, -0.0, 1.0e-300, f64::INFINITY, 6789.443] {
        assert_eq!(f64_from_le(f64_to_le(x)).to_bits(), x.to_bits());
    }
    assert!(f64_from_le(f64_to_le(f64::NAN)).is_nan());
}

#[test]
fn geometries_cross_the_wire_unchanged() {
    let cyl = Cylinder::new(4.0, 4.5, [4.5, 4.5, 2.0]).unwrap();
    assert_eq!(Cylinder::from_wire(&cyl.to_wire()).unwrap(), cyl);
    let cube = Cuboid::new([0.0; 3], [9.0, 9.0, 4.0]).unwrap();
    assert_eq!(Cuboid::from_wire(&cube.to_wire()).unwrap(), cube);
}

#[test]
fn invalid_geometry_records_are_rejected() {
    let mut rec = Cylinder::new(4.0, 4.5, [0.0; 3]).unwrap().to_wire();
    rec.radius_le = f64_to_le(-1.0);
    assert!(matches!(
        Cylinder::from_wire(&rec),
        Err(MeshTransferError::InvalidGeometry(_))
    ));
}

#[test]
fn truncated_payload_is_an_error() {
    let mut w = WireWriter::new(kind::CONTRIBUTIONS);
    w.push(&WireCount::new(3));
    w.push(&WireScalar::new(1.0));
    let bytes = w.finish();
    let mut r = WireReader::open(&bytes[..bytes.len() - 1], kind::CONTRIBUTIONS).unwrap();
    assert_eq!(r.read::<WireCount>().unwrap().get(), 3);
    assert!(matches!(r.read::<WireScalar>(), Err(MeshTransferError::WireFormat(_))));
}
