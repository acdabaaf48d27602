use mesh_rendezvous::algs::communicator::{
    CommTag, Communicator, NoComm, RayonComm, ReduceOp, Wait,
};

#[test]
fn no_comm_is_nop() {
    let comm = NoComm;
    assert!(comm.is_no_comm());
    assert_eq!((comm.rank(), comm.size()), (0, 1));
    let mut buf = [0u8; 8];
    let h = comm.irecv(0, 123, &mut buf);
    assert!(h.wait().is_none());
    let s = comm.isend(0, 123, &[]);
    assert!(s.wait().is_none());
}

#[test]
fn single_rank_collectives_match_no_comm() {
    let tag = CommTag::new(0x3000);
    let rayon = RayonComm::world(1).remove(0);
    assert!(!rayon.is_no_comm());

    let payload = vec![vec![1u8, 2, 3]];
    assert_eq!(
        NoComm.all_to_allv(tag, payload.clone()).unwrap(),
        rayon.all_to_allv(tag, payload).unwrap()
    );

    let mut a = [1.5, -2.0];
    let mut b = a;
    NoComm.all_reduce(tag, &mut a, ReduceOp::Max).unwrap();
    rayon.all_reduce(tag, &mut b, ReduceOp::Max).unwrap();
    assert_eq!(a, b);
}

#[test]
fn no_comm_rejects_foreign_buffers() {
    let err = NoComm
        .all_to_allv(CommTag::new(0x3001), vec![Vec::new(), Vec::new()])
        .unwrap_err();
    assert!(matches!(
        err,
        mesh_rendezvous::mesh_error::MeshTransferError::CommError { .. }
    ));
}
