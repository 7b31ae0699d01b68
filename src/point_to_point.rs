//! Point to point communication
//!
//! Messages are byte strings exchanged between pairs of ranks, disambiguated
//! by an application-chosen [`Tag`]. Receives and probes filter on source and
//! tag, where either filter may be the wildcard [`ANY_SOURCE`](crate::ANY_SOURCE)
//! or [`ANY_TAG`](crate::ANY_TAG).
//!
//! A receiver discovers a pending message's exact byte length by probing
//! before receipt; [`Status`] describes what a probe found. The blocking
//! [`recv`](Communicator::recv) performs the probe internally and receives
//! exactly the probed message through its match descriptor, so a second
//! message that also matches a wildcard filter can never be swapped in
//! between the probe and the receive.
//!
//! Non-blocking variants return a [`Request`]. Note the asymmetry:
//! [`isend`](Communicator::isend) always starts an operation, while
//! [`irecv`](Communicator::irecv) only makes the data arrival of an
//! *already-pending* message asynchronous. If nothing matches at call time
//! it returns a null request immediately and never registers for a future
//! arrival.

use std::fmt;
use std::sync::Arc;

use conv::ConvUtil;

use crate::datatype::{self, FixedSizeValue};
use crate::error::Result;
use crate::request::{OpKind, Request};
use crate::topology::{Communicator, Rank};
use crate::transport::{ChannelId, Envelope, Transport};
use crate::{Count, Tag};

struct StatusInner {
    transport: Arc<dyn Transport>,
    channel: ChannelId,
    envelope: Envelope,
}

/// Describes a message that a probe found pending.
///
/// A status is either *null* (the probe matched nothing) or describes one
/// pending message. It is immutable, owns no transport resources, and must
/// only be interpreted against the communicator that produced it.
pub struct Status {
    inner: Option<StatusInner>,
}

impl Status {
    /// The null status, returned e.g. when
    /// [`try_probe`](Communicator::try_probe) finds no matching message.
    pub fn null() -> Status {
        Status { inner: None }
    }

    fn matched(transport: Arc<dyn Transport>, channel: ChannelId, envelope: Envelope) -> Status {
        Status {
            inner: Some(StatusInner {
                transport,
                channel,
                envelope,
            }),
        }
    }

    /// True if the probe matched nothing.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Rank of the message's source, or -1 for a null status.
    pub fn source(&self) -> Rank {
        self.inner.as_ref().map_or(-1, |s| s.envelope.source)
    }

    /// Tag of the message, or -1 for a null status.
    pub fn tag(&self) -> Tag {
        self.inner.as_ref().map_or(-1, |s| s.envelope.tag)
    }

    /// Exact byte length of the message, queried from the transport.
    ///
    /// Returns 0 for a null status, and 0 once the described message has been
    /// consumed by a receive.
    pub fn count(&self) -> Count {
        match &self.inner {
            None => 0,
            Some(s) => match s.transport.message_len(s.channel, s.envelope.id) {
                Ok(len) => len
                    .value_as::<Count>()
                    .expect("message length exceeds the range of Count"),
                Err(_) => 0,
            },
        }
    }
}

impl fmt::Debug for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            None => f.write_str("Status(null)"),
            Some(s) => write!(
                f,
                "Status(source: {}, tag: {})",
                s.envelope.source, s.envelope.tag
            ),
        }
    }
}

/// Point to point operations.
impl Communicator {
    /// Blocks until a message matching the filters is pending and returns a
    /// non-null status describing it, without consuming the message.
    ///
    /// Blocks indefinitely if no matching message ever arrives; there is no
    /// timeout.
    pub fn probe(&self, source: Rank, tag: Tag) -> Result<Status> {
        let h = self.handle()?;
        let envelope = h.transport.probe(h.channel, source, tag)?;
        Ok(Status::matched(h.transport.clone(), h.channel, envelope))
    }

    /// Non-blocking probe: returns a null status immediately if no matching
    /// message is currently pending.
    pub fn try_probe(&self, source: Rank, tag: Tag) -> Result<Status> {
        let h = self.handle()?;
        Ok(match h.transport.try_probe(h.channel, source, tag)? {
            None => Status::null(),
            Some(envelope) => Status::matched(h.transport.clone(), h.channel, envelope),
        })
    }

    /// Blocking send of a byte string to `dest`.
    ///
    /// Returns once the local buffer may be reused. Attempted exactly once;
    /// transport failures propagate unchanged.
    pub fn send(&self, bytes: &[u8], dest: Rank, tag: Tag) -> Result<()> {
        let h = self.handle()?;
        h.transport.send(h.channel, dest, tag, bytes)?;
        Ok(())
    }

    /// Blocking receive of the next message matching the filters.
    ///
    /// Probes to discover the exact byte length, then receives the probed
    /// message itself into an exactly-sized buffer.
    pub fn recv(&self, source: Rank, tag: Tag) -> Result<Vec<u8>> {
        let h = self.handle()?;
        let envelope = h.transport.probe(h.channel, source, tag)?;
        let bytes = h.transport.claim_recv(h.channel, envelope.id)?;
        Ok(bytes)
    }

    /// Non-blocking send. The returned request owns a copy of the payload, so
    /// the caller's buffer may be reused or dropped immediately.
    ///
    /// The request cancels the operation if dropped unresolved; keep it and
    /// resolve it with [`Request::wait`] or [`Request::get`].
    pub fn isend(&self, bytes: &[u8], dest: Rank, tag: Tag) -> Result<Request> {
        let h = self.handle()?;
        let op = h.transport.start_send(h.channel, dest, tag, bytes)?;
        Ok(Request::active(
            h.transport.clone(),
            op,
            OpKind::Send {
                payload: bytes.to_vec(),
            },
        ))
    }

    /// Non-blocking receive of an *already-pending* message.
    ///
    /// Probes without blocking; if no message matching the filters is
    /// currently pending, returns a null request immediately. The caller must
    /// re-poll; a future arrival is never registered.
    pub fn irecv(&self, source: Rank, tag: Tag) -> Result<Request> {
        let h = self.handle()?;
        let envelope = match h.transport.try_probe(h.channel, source, tag)? {
            None => return Ok(Request::null()),
            Some(envelope) => envelope,
        };
        let len = h.transport.message_len(h.channel, envelope.id)?;
        let op = h.transport.start_claim_recv(h.channel, envelope.id)?;
        Ok(Request::active(
            h.transport.clone(),
            op,
            OpKind::Recv { len },
        ))
    }

    /// Blocking send of a single fixed-size value.
    pub fn send_value<T: FixedSizeValue>(&self, value: &T, dest: Rank, tag: Tag) -> Result<()> {
        self.send(&datatype::encode(value), dest, tag)
    }

    /// Blocking receive of a single fixed-size value.
    ///
    /// Fails with a size-mismatch error if the received message's byte length
    /// differs from the value size.
    pub fn recv_value<T: FixedSizeValue>(&self, source: Rank, tag: Tag) -> Result<T> {
        let bytes = self.recv(source, tag)?;
        datatype::decode(&bytes)
    }

    /// Non-blocking send of a single fixed-size value.
    pub fn isend_value<T: FixedSizeValue>(
        &self,
        value: &T,
        dest: Rank,
        tag: Tag,
    ) -> Result<Request> {
        self.isend(&datatype::encode(value), dest, tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_status_reports_nothing() {
        let status = Status::null();
        assert!(status.is_null());
        assert_eq!(status.source(), -1);
        assert_eq!(status.tag(), -1);
        assert_eq!(status.count(), 0);
    }
}
