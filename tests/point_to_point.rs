//! Multi-rank point-to-point scenarios over the in-process transport.

use groupcomm::transport::local::run_group;
use groupcomm::{Error, ANY_SOURCE, ANY_TAG};

#[test]
fn probe_reports_length_before_receive() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => world.send(b"hello", 1, 1).unwrap(),
            _ => {
                let status = world.probe(ANY_SOURCE, 1).unwrap();
                assert!(!status.is_null());
                assert_eq!(status.source(), 0);
                assert_eq!(status.tag(), 1);
                assert_eq!(status.count(), 5);

                let bytes = world.recv(ANY_SOURCE, 1).unwrap();
                assert_eq!(bytes, b"hello");
            }
        }
    });
}

#[test]
fn delivery_is_fifo_per_source_and_tag() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                for i in 0..4u32 {
                    world.send_value(&i, 1, 5).unwrap();
                }
            }
            _ => {
                for i in 0..4u32 {
                    assert_eq!(world.recv_value::<u32>(0, 5).unwrap(), i);
                }
            }
        }
    });
}

#[test]
fn tag_filters_demultiplex_interleaved_streams() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                world.send(b"message", 1, 123).unwrap();
                world.send_value(&3.14f64, 1, 124).unwrap();
                world.send(b"the", 1, 125).unwrap();
                world.send_value(&20i32, 1, 126).unwrap();
            }
            _ => {
                // Receive out of tag order; matching is per tag.
                assert_eq!(world.recv_value::<i32>(ANY_SOURCE, 126).unwrap(), 20);
                assert_eq!(world.recv(ANY_SOURCE, 123).unwrap(), b"message");
                assert_eq!(world.recv_value::<f64>(ANY_SOURCE, 124).unwrap(), 3.14);
                assert_eq!(world.recv(ANY_SOURCE, 125).unwrap(), b"the");
            }
        }
    });
}

#[test]
fn try_probe_returns_null_status_when_nothing_pending() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                let status = world.try_probe(ANY_SOURCE, 77).unwrap();
                assert!(status.is_null());
                assert_eq!(status.count(), 0);
                // Tell rank 1 we are done probing.
                world.send(&[], 1, 0).unwrap();
            }
            _ => {
                world.recv(0, 0).unwrap();
            }
        }
    });
}

#[test]
fn typed_receive_rejects_wrong_size() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => world.send(b"abc", 1, 0).unwrap(),
            _ => {
                let err = world.recv_value::<u32>(0, 0).unwrap_err();
                assert!(matches!(
                    err,
                    Error::SizeMismatch {
                        expected: 4,
                        actual: 3
                    }
                ));
            }
        }
    });
}

#[test]
fn isend_resolves_to_the_sent_payload() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                let mut buffer = b"moving".to_vec();
                let request = world.isend(&buffer, 1, 2).unwrap();
                // The request owns a copy; mutating our buffer is safe.
                buffer[0] = b'X';
                assert!(!request.is_null());
                assert_eq!(request.get().unwrap(), b"moving");
            }
            _ => {
                assert_eq!(world.recv(0, 2).unwrap(), b"moving");
            }
        }
    });
}

#[test]
fn irecv_is_null_without_a_pending_message_and_resolves_with_one() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                world.send_value(&42i64, 1, 9).unwrap();
                world.recv(1, 0).unwrap();
            }
            _ => {
                // Nothing with tag 8 is pending; irecv never waits.
                assert!(world.irecv(ANY_SOURCE, 8).unwrap().is_null());

                // Poll until the tag-9 message is pending.
                let request = loop {
                    let request = world.irecv(ANY_SOURCE, 9).unwrap();
                    if !request.is_null() {
                        break request;
                    }
                };
                assert!(request.is_ready().unwrap());
                // Polling again must not change anything.
                assert!(request.is_ready().unwrap());
                assert_eq!(request.get_value::<i64>().unwrap(), 42);

                world.send(&[], 0, 0).unwrap();
            }
        }
    });
}

#[test]
fn get_value_rejects_wrong_size_on_requests() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                world.send(b"ab", 1, 4).unwrap();
                world.recv(1, 0).unwrap();
            }
            _ => {
                let request = loop {
                    let request = world.irecv(0, 4).unwrap();
                    if !request.is_null() {
                        break request;
                    }
                };
                let err = request.get_value::<u64>().unwrap_err();
                assert!(matches!(
                    err,
                    Error::SizeMismatch {
                        expected: 8,
                        actual: 2
                    }
                ));
                world.send(&[], 0, 0).unwrap();
            }
        }
    });
}

#[test]
fn dropping_a_request_cancels_the_receive() {
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                world.send(b"dropped on the floor", 1, 6).unwrap();
                world.recv(1, 0).unwrap();
            }
            _ => {
                let request = loop {
                    let request = world.irecv(0, 6).unwrap();
                    if !request.is_null() {
                        break request;
                    }
                };
                drop(request);
                // The claimed message is gone; nothing matches any more.
                assert!(world.try_probe(0, 6).unwrap().is_null());
                world.send(&[], 0, 0).unwrap();
            }
        }
    });
}

#[test]
fn probe_then_receive_consumes_the_probed_message() {
    // Two messages match the wildcard; recv must take the earlier one even
    // though both are eligible.
    run_group(2, |universe| {
        let world = universe.world().unwrap();
        match world.rank() {
            0 => {
                world.send(b"first", 1, 1).unwrap();
                world.send(b"second", 1, 2).unwrap();
            }
            _ => {
                let status = world.probe(ANY_SOURCE, ANY_TAG).unwrap();
                assert_eq!(status.tag(), 1);
                assert_eq!(world.recv(ANY_SOURCE, ANY_TAG).unwrap(), b"first");
                assert_eq!(world.recv(ANY_SOURCE, ANY_TAG).unwrap(), b"second");
            }
        }
    });
}
