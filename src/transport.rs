//! The transport seam
//!
//! This crate does not move bytes between processes itself. Addressing,
//! matching and wire delivery are delegated to an external transport consumed
//! through the [`Transport`] trait: channel duplication and release,
//! point-to-point sends and receives in blocking and non-blocking variants,
//! probing, byte-length queries, and the group collective primitives.
//!
//! The transport is assumed to be process-group-aware with fixed membership,
//! and to deliver messages between any two ranks in FIFO order per
//! `(source, destination, tag)` triple. No ordering is assumed across
//! different tags or sources.
//!
//! Handles ([`ChannelId`], [`MessageId`], [`OpId`]) are opaque identifiers
//! minted by the transport; this layer only stores and returns them.
//!
//! An in-process reference implementation lives in [`local`].

use thiserror::Error;

use crate::topology::Rank;
use crate::{Count, Tag};

pub mod local;

/// Identifies one communication channel (a "communicator space") at the
/// transport. Every duplicate of a communicator owns a distinct channel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct ChannelId(pub u64);

/// Identifies one pending message within a channel, as discovered by a probe.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct MessageId(pub u64);

/// Identifies one outstanding non-blocking operation.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct OpId(pub u64);

/// Match descriptor for a pending incoming message.
///
/// Produced by probing. The descriptor names one specific message: receiving
/// through it consumes exactly that message, which is what makes the
/// probe-then-receive sequence race-free even under wildcard filters.
#[derive(Clone, Copy, Debug)]
pub struct Envelope {
    /// Rank the message was sent from.
    pub source: Rank,
    /// Tag the message was sent with.
    pub tag: Tag,
    /// Transport handle naming this exact message.
    pub id: MessageId,
}

/// Failures originating below the communicator layer.
///
/// These are propagated to callers unchanged; the core never wraps or
/// swallows them.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A rank outside `[0, size)` was used to address a message.
    #[error("rank {rank} is not a member of a group of size {size}")]
    InvalidRank {
        /// The offending rank.
        rank: Rank,
        /// Size of the group it was checked against.
        size: Count,
    },

    /// A negative tag was used outside of wildcard matching.
    #[error("tag {0} is invalid; negative tags are reserved for wildcard matching")]
    InvalidTag(Tag),

    /// The channel handle does not name a live channel.
    #[error("unknown channel handle {0:?}")]
    UnknownChannel(ChannelId),

    /// The message descriptor no longer names a pending message.
    #[error("no pending message with descriptor {0:?}")]
    UnknownMessage(MessageId),

    /// The operation handle does not name an outstanding operation.
    #[error("unknown operation handle {0:?}")]
    UnknownOp(OpId),

    /// Members of the group issued mismatched collective calls.
    #[error("collective call mismatch: {0}")]
    CollectiveMismatch(String),

    /// A blocking operation can never complete because a required peer has
    /// shut down its endpoint.
    #[error("peer rank {0} has disconnected")]
    Disconnected(Rank),
}

/// Result alias for transport-level operations.
pub type Result<T> = std::result::Result<T, TransportError>;

/// The external collaborator this layer is built on.
///
/// Implementations must be safe to drive from the thread owning the endpoint;
/// a single channel is never used concurrently by this layer without external
/// synchronization.
pub trait Transport: Send + Sync {
    /// The default channel containing every rank of the process group.
    ///
    /// This is the basis for the first duplication; it is owned by the
    /// transport itself and never released by this layer.
    fn world(&self) -> ChannelId;

    /// Creates a new channel with the same membership as `channel`.
    ///
    /// Duplication is logically collective: every member must duplicate a
    /// given channel in the same order, and call *i* on each rank yields the
    /// same new channel.
    fn duplicate(&self, channel: ChannelId) -> Result<ChannelId>;

    /// Releases one reference to `channel`. Unknown handles are ignored.
    fn release(&self, channel: ChannelId);

    /// Number of ranks in the channel's group.
    fn group_size(&self, channel: ChannelId) -> Result<Count>;

    /// This process's rank within the channel's group.
    fn group_rank(&self, channel: ChannelId) -> Result<Rank>;

    /// Blocking send. Returns once the payload has been handed off and the
    /// caller's buffer may be reused.
    fn send(&self, channel: ChannelId, dest: Rank, tag: Tag, bytes: &[u8]) -> Result<()>;

    /// Blocks until a message matching the filters is pending, without
    /// consuming it.
    fn probe(&self, channel: ChannelId, source: Rank, tag: Tag) -> Result<Envelope>;

    /// Non-blocking probe; `None` if no matching message is currently
    /// pending.
    fn try_probe(&self, channel: ChannelId, source: Rank, tag: Tag) -> Result<Option<Envelope>>;

    /// Exact byte length of a pending message.
    ///
    /// Fails with [`TransportError::UnknownMessage`] once the message has
    /// been consumed.
    fn message_len(&self, channel: ChannelId, message: MessageId) -> Result<usize>;

    /// Consumes exactly the message named by the descriptor and returns its
    /// payload.
    fn claim_recv(&self, channel: ChannelId, message: MessageId) -> Result<Vec<u8>>;

    /// Starts a non-blocking send and returns a handle to the outstanding
    /// operation.
    fn start_send(&self, channel: ChannelId, dest: Rank, tag: Tag, bytes: &[u8]) -> Result<OpId>;

    /// Starts non-blocking receipt of exactly the message named by the
    /// descriptor, consuming it from the pending set.
    fn start_claim_recv(&self, channel: ChannelId, message: MessageId) -> Result<OpId>;

    /// Polls an outstanding operation for completion without consuming it.
    fn op_test(&self, op: OpId) -> Result<bool>;

    /// Blocks until the operation completes and consumes it, yielding the
    /// received payload (empty for send operations).
    fn op_wait(&self, op: OpId) -> Result<Vec<u8>>;

    /// Cancels an outstanding operation and releases its resources. Unknown
    /// handles are ignored; cancelling is therefore idempotent.
    fn op_cancel(&self, op: OpId);

    /// Blocks until every member of the channel's group has entered the
    /// barrier.
    fn barrier(&self, channel: ChannelId) -> Result<()>;

    /// Exchanges equal shards of `send` with every rank; shard *i* of the
    /// result originates from rank *i*. Every member must pass a buffer of
    /// the same length, evenly divisible by the group size.
    fn all_to_all(&self, channel: ChannelId, send: &[u8]) -> Result<Vec<u8>>;

    /// Concatenates every member's equally-sized contribution in rank order.
    /// The result is byte-identical on every member.
    fn all_gather(&self, channel: ChannelId, send: &[u8]) -> Result<Vec<u8>>;

    /// Variable-length gather: places rank *i*'s contribution of
    /// `counts[i]` bytes at byte offset `displs[i]` of the result buffer.
    ///
    /// Every member must pass identical `counts` and `displs`, and its own
    /// contribution must be exactly `counts[rank]` bytes long.
    fn all_gather_varcount(
        &self,
        channel: ChannelId,
        send: &[u8],
        counts: &[usize],
        displs: &[usize],
    ) -> Result<Vec<u8>>;
}
