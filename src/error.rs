//! Error handling
//!
//! Two classes of failure surface from this crate. *Usage errors* are
//! programmer mistakes caught synchronously at the call site: querying a null
//! request, receiving a message into a value of the wrong size, or handing a
//! collective a malformed buffer. *Transport errors* originate below this
//! layer and are propagated unchanged through the transparent
//! [`Transport`](Error::Transport) variant.
//!
//! No operation in this crate retries. Every call is attempted exactly once
//! and any recovery is the caller's responsibility.

use thiserror::Error;

use crate::transport::TransportError;
use crate::Count;

/// Errors reported by communicator, request and collective operations.
#[derive(Debug, Error)]
pub enum Error {
    /// A completion query or resolution was attempted on a null request.
    #[error("method call on null request")]
    NullRequest,

    /// A communication operation was attempted on a null communicator.
    #[error("operation on null communicator")]
    NullCommunicator,

    /// A received message's byte length does not match the target value size.
    #[error("message of {actual} bytes does not match expected value size of {expected} bytes")]
    SizeMismatch {
        /// The byte size required by the value type.
        expected: usize,
        /// The byte length actually received.
        actual: usize,
    },

    /// An all-to-all send buffer cannot be split into equal per-rank shards.
    #[error("all_to_all buffer of {len} bytes is not divisible by group size {size}")]
    UnevenAllToAll {
        /// Length of the offending send buffer.
        len: usize,
        /// Number of ranks in the group.
        size: Count,
    },

    /// The element count contributed to a variable-length gather differs from
    /// the count announced in the preliminary size gather.
    #[error("variable-length gather contributed {actual} elements but announced {announced}")]
    VarcountMismatch {
        /// The count this rank announced during the size gather.
        announced: Count,
        /// The number of elements actually contributed.
        actual: usize,
    },

    /// A failure originating in the underlying transport.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;
