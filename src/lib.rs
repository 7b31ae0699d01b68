//! Process-group communication with owned handles
//!
//! A fixed set of cooperating processes ("ranks") exchanges byte-string
//! messages and participates in group-wide collective operations. This crate
//! is the resource-lifecycle and protocol layer over an external
//! [transport](transport::Transport): it owns nothing about addressing or
//! wire delivery, and everything about handle lifecycles and call semantics.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use groupcomm::transport::local::LocalTransport;
//! use groupcomm::{initialize, ANY_SOURCE};
//!
//! std::thread::scope(|s| {
//!     for endpoint in LocalTransport::group(2) {
//!         s.spawn(move || {
//!             let universe = initialize(Arc::new(endpoint));
//!             let world = universe.world().unwrap();
//!             match world.rank() {
//!                 0 => world.send(b"hello", 1, 7).unwrap(),
//!                 _ => assert_eq!(world.recv(ANY_SOURCE, 7).unwrap(), b"hello"),
//!             }
//!         });
//!     }
//! });
//! ```
//!
//! # Features
//!
//! - **Communicators**: move-only owned handles over a process group's
//!   channel; duplication creates an independent channel with identical
//!   membership. See [`topology`].
//! - **Point to point communication**: blocking send/receive, probing with
//!   message-size discovery before receipt, and non-blocking variants
//!   returning [`Request`] handles. See [`point_to_point`].
//! - **Requests**: cancellable handles with exactly-once-effect resolution,
//!   resolved by value or cancelled on drop. See [`request`].
//! - **Collective operations**: barrier, all-to-all, all-gather, and
//!   variable-length all-gather with per-rank placement. See [`collective`].
//! - **Datatypes**: fixed-size trivially-copyable values carried as raw
//!   bytes with strict size validation. See [`datatype`].
//!
//! Not provided: process launch and bootstrap, transport implementation
//! (beyond the in-process [`transport::local`] reference), serialization of
//! structured types, timeouts, and retries.

pub mod collective;
pub mod datatype;
pub mod environment;
pub mod error;
pub mod point_to_point;
pub mod request;
pub mod topology;
pub mod traits;
pub mod transport;

pub use crate::environment::{initialize, Universe};
pub use crate::error::{Error, Result};
pub use crate::point_to_point::Status;
pub use crate::request::Request;
pub use crate::topology::{Communicator, Rank};

/// Can be used to tag messages on the sender side and match on the receiver
/// side.
pub type Tag = i32;

/// Encodes the number of bytes in a message or the number of ranks in a
/// group.
pub type Count = i32;

/// Source filter matching a message from any rank.
pub const ANY_SOURCE: Rank = -1;

/// Tag filter matching a message with any tag.
pub const ANY_TAG: Tag = -1;
