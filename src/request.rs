//! Request objects for non-blocking operations
//!
//! A [`Request`] is a move-only handle to exactly one outstanding
//! non-blocking send or receive, together with the owned byte buffer involved
//! in the operation. Exactly one of two things happens to every non-null
//! request: it is *resolved* by [`wait`](Request::wait) /
//! [`get`](Request::get), which consume it by value, or it is *cancelled* by
//! being dropped unresolved. Never both, never neither: resolution takes the
//! request apart so drop cannot run on it again, and move semantics rule out
//! a second owner.
//!
//! Dropping an unresolved request cancels the operation at the transport and
//! releases its resources, at the cost of silently discarding any in-flight
//! data. This guarantees no resource leak even when a caller abandons a
//! request.

use std::sync::Arc;

use log::trace;

use crate::datatype::{self, FixedSizeValue};
use crate::error::{Error, Result};
use crate::transport::{OpId, Transport};

pub(crate) enum OpKind {
    /// A non-blocking send; the request owns a copy of the outgoing payload.
    Send { payload: Vec<u8> },
    /// A non-blocking receive of a message of known, pre-probed length.
    Recv { len: usize },
}

struct ActiveRequest {
    transport: Arc<dyn Transport>,
    op: OpId,
    kind: OpKind,
}

impl ActiveRequest {
    /// Byte length of the buffer this operation resolves to.
    fn buffer_len(&self) -> usize {
        match &self.kind {
            OpKind::Send { payload } => payload.len(),
            OpKind::Recv { len } => *len,
        }
    }

    /// Blocks until completion and yields the resolved buffer: the owned
    /// payload copy for sends, the received bytes for receives.
    fn resolve(self) -> Result<Vec<u8>> {
        match self.kind {
            OpKind::Send { payload } => {
                self.transport.op_wait(self.op)?;
                Ok(payload)
            }
            OpKind::Recv { .. } => Ok(self.transport.op_wait(self.op)?),
        }
    }
}

/// A handle to one outstanding non-blocking operation.
///
/// Requests are issued by [`isend`](crate::Communicator::isend) and
/// [`irecv`](crate::Communicator::irecv) and must only be interpreted against
/// the communicator that produced them. A *null* request represents "nothing
/// outstanding": every query on it fails fast with
/// [`Error::NullRequest`] without touching the transport.
pub struct Request {
    inner: Option<ActiveRequest>,
}

impl Request {
    /// The null request. Returned by `irecv` when no matching message was
    /// pending.
    pub fn null() -> Request {
        Request { inner: None }
    }

    pub(crate) fn active(transport: Arc<dyn Transport>, op: OpId, kind: OpKind) -> Request {
        Request {
            inner: Some(ActiveRequest {
                transport,
                op,
                kind,
            }),
        }
    }

    /// True if there is no outstanding operation behind this handle.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Polls the outstanding operation for completion.
    ///
    /// Never blocks and never consumes the request; polling any number of
    /// times is observationally identical to polling once. Fails fast on a
    /// null request.
    pub fn is_ready(&self) -> Result<bool> {
        let active = self.inner.as_ref().ok_or(Error::NullRequest)?;
        Ok(active.transport.op_test(active.op)?)
    }

    /// Blocks until the operation completes, consuming the request.
    ///
    /// Fails fast on a null request.
    pub fn wait(self) -> Result<()> {
        self.take()?.resolve()?;
        Ok(())
    }

    /// Blocks until the operation completes and yields the resolved buffer,
    /// consuming the request.
    ///
    /// For a send this is the owned payload copy; for a receive, the message
    /// bytes. Fails fast on a null request.
    pub fn get(self) -> Result<Vec<u8>> {
        self.take()?.resolve()
    }

    /// Blocks until the operation completes and decodes the resolved buffer
    /// into a fixed-size value, consuming the request.
    ///
    /// The buffer length is validated against the value size *before*
    /// waiting; on mismatch the outstanding operation is cancelled and a
    /// size-mismatch error is returned. Fails fast on a null request.
    pub fn get_value<T: FixedSizeValue>(self) -> Result<T> {
        let active = self.take()?;
        let len = active.buffer_len();
        if len != T::SIZE {
            active.transport.op_cancel(active.op);
            return Err(Error::SizeMismatch {
                expected: T::SIZE,
                actual: len,
            });
        }
        let bytes = active.resolve()?;
        datatype::decode(&bytes)
    }

    /// Takes the active state out, leaving `self` null so its drop is a
    /// no-op.
    fn take(mut self) -> Result<ActiveRequest> {
        self.inner.take().ok_or(Error::NullRequest)
    }
}

impl Default for Request {
    fn default() -> Request {
        Request::null()
    }
}

impl Drop for Request {
    fn drop(&mut self) {
        if let Some(active) = self.inner.take() {
            trace!("cancelling outstanding operation {:?}", active.op);
            active.transport.op_cancel(active.op);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_request_fails_fast() {
        let request = Request::null();
        assert!(request.is_null());
        assert!(matches!(request.is_ready(), Err(Error::NullRequest)));
        assert!(matches!(request.wait(), Err(Error::NullRequest)));
        assert!(matches!(Request::null().get(), Err(Error::NullRequest)));
        assert!(matches!(
            Request::null().get_value::<i32>(),
            Err(Error::NullRequest)
        ));
    }

    #[test]
    fn default_is_null() {
        assert!(Request::default().is_null());
    }
}
