//! Communicator lifecycle scenarios over the in-process transport.

use std::sync::Arc;

use groupcomm::transport::local::{run_group, LocalTransport};
use groupcomm::{initialize, Communicator, Error, ANY_SOURCE, ANY_TAG};

#[test]
fn world_reports_size_and_rank() {
    run_group(3, |universe| {
        let world = universe.world().unwrap();
        assert!(!world.is_null());
        assert_eq!(world.size(), 3);
        assert!((0..3).contains(&world.rank()));
    });
}

#[test]
fn duplicates_share_membership_but_not_traffic() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        let dup = world.duplicate().unwrap();
        assert_eq!(world.size(), dup.size());
        assert_eq!(world.rank(), dup.rank());

        match world.rank() {
            0 => {
                world.send(b"on world", 1, 3).unwrap();
                world.recv(1, 0).unwrap();
            }
            _ => {
                // The message travels on `world` only; `dup` never sees it.
                let bytes = world.recv(0, 3).unwrap();
                assert_eq!(bytes, b"on world");
                assert!(dup.try_probe(ANY_SOURCE, ANY_TAG).unwrap().is_null());
                world.send(&[], 0, 0).unwrap();
            }
        }
    });
}

#[test]
fn closed_communicator_becomes_null() {
    run_group(2, |universe| {
        let mut world = universe.world().unwrap();
        world.close();
        assert!(world.is_null());
        assert_eq!(world.size(), 0);
        assert_eq!(world.rank(), -1);
        // Closing again is harmless.
        world.close();

        assert!(matches!(
            world.send(b"x", 0, 0),
            Err(Error::NullCommunicator)
        ));
        assert!(matches!(
            world.recv(ANY_SOURCE, ANY_TAG),
            Err(Error::NullCommunicator)
        ));
        assert!(matches!(
            world.probe(ANY_SOURCE, ANY_TAG),
            Err(Error::NullCommunicator)
        ));
        assert!(matches!(world.barrier(), Err(Error::NullCommunicator)));
    });
}

#[test]
fn overwriting_a_communicator_releases_its_channel() {
    run_group(2, |universe| {
        let mut comm = universe.world().unwrap();
        comm.barrier().unwrap();
        // Reassignment closes the previous channel on every rank.
        comm = universe.world().unwrap();
        comm.barrier().unwrap();
    });
}

#[test]
fn each_world_call_yields_an_independent_channel() {
    run_group(2, |universe| {
        let first = universe.world().unwrap();
        let second = universe.world().unwrap();

        match first.rank() {
            0 => {
                first.send(b"one", 1, 0).unwrap();
                second.send(b"two", 1, 0).unwrap();
            }
            _ => {
                assert_eq!(second.recv(0, 0).unwrap(), b"two");
                assert_eq!(first.recv(0, 0).unwrap(), b"one");
            }
        }
    });
}

#[test]
fn null_communicator_without_any_transport() {
    let comm = Communicator::null();
    assert_eq!(comm.size(), 0);
    assert_eq!(comm.rank(), -1);
    assert!(comm.duplicate().unwrap().is_null());
}

#[test]
fn single_rank_group_talks_to_itself() {
    let endpoint = LocalTransport::group(1).remove(0);
    let universe = initialize(Arc::new(endpoint));
    let world = universe.world().unwrap();
    assert_eq!(world.size(), 1);
    assert_eq!(world.rank(), 0);

    world.send(b"loopback", 0, 1).unwrap();
    let status = world.probe(0, 1).unwrap();
    assert_eq!(status.count(), 8);
    assert_eq!(world.recv(0, 1).unwrap(), b"loopback");

    let gathered = world.all_gather(&7u8).unwrap();
    assert_eq!(gathered, vec![7]);
}
