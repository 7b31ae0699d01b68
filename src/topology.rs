//! Organizing processes as groups and communicators
//!
//! All processes partaking in a computation are members of a process group
//! with fixed membership. A [`Communicator`] owns one channel over that group
//! and is the handle through which all point-to-point and collective
//! operations are issued. Processes are addressed by their [`Rank`] within
//! the group.
//!
//! Communicators are move-only owned handles. The only ways to obtain a
//! non-null communicator are [`Universe::world`](crate::Universe::world),
//! which duplicates the process-wide default group, and
//! [`Communicator::duplicate`]. A duplicate shares the group membership but
//! owns an independent channel: traffic sent on one is never matched on the
//! other.

use std::fmt;
use std::sync::Arc;

use log::trace;

use crate::error::{Error, Result};
use crate::transport::{ChannelId, Transport};
use crate::Count;

/// Identifies a process within a communicator's group, in `[0, size)`.
pub type Rank = i32;

pub(crate) struct CommHandle {
    pub(crate) transport: Arc<dyn Transport>,
    pub(crate) channel: ChannelId,
}

/// A process-group handle owning one communication channel.
///
/// A communicator is either *null* (owning nothing) or holds exclusive
/// ownership of one transport channel, which is released on
/// [`close`](Communicator::close), on drop, or when the communicator is
/// overwritten.
pub struct Communicator {
    inner: Option<CommHandle>,
}

impl Communicator {
    /// The null communicator. It owns no channel, has `size() == 0` and
    /// `rank() == -1`, and every communication operation on it fails with
    /// [`Error::NullCommunicator`].
    pub fn null() -> Communicator {
        Communicator { inner: None }
    }

    pub(crate) fn from_channel(transport: Arc<dyn Transport>, channel: ChannelId) -> Communicator {
        Communicator {
            inner: Some(CommHandle { transport, channel }),
        }
    }

    /// True if this communicator owns no channel.
    pub fn is_null(&self) -> bool {
        self.inner.is_none()
    }

    /// Number of ranks in the group, recomputed from the transport on every
    /// call. Returns 0 for a null communicator.
    pub fn size(&self) -> Count {
        match &self.inner {
            None => 0,
            Some(h) => h.transport.group_size(h.channel).unwrap_or(0),
        }
    }

    /// This process's rank within the group, recomputed from the transport on
    /// every call. Returns -1 for a null communicator.
    pub fn rank(&self) -> Rank {
        match &self.inner {
            None => -1,
            Some(h) => h.transport.group_rank(h.channel).unwrap_or(-1),
        }
    }

    /// Creates an independent communicator with identical group membership.
    ///
    /// Duplication is logically collective: every member of the group must
    /// duplicate a given communicator in the same order. Duplicating a null
    /// communicator yields another null communicator.
    pub fn duplicate(&self) -> Result<Communicator> {
        match &self.inner {
            None => Ok(Communicator::null()),
            Some(h) => {
                let channel = h.transport.duplicate(h.channel)?;
                trace!("duplicated channel {:?} into {:?}", h.channel, channel);
                Ok(Communicator::from_channel(h.transport.clone(), channel))
            }
        }
    }

    /// Releases the owned channel, leaving this communicator null. Closing a
    /// null communicator is a no-op.
    pub fn close(&mut self) {
        if let Some(h) = self.inner.take() {
            trace!("releasing channel {:?}", h.channel);
            h.transport.release(h.channel);
        }
    }

    pub(crate) fn handle(&self) -> Result<&CommHandle> {
        self.inner.as_ref().ok_or(Error::NullCommunicator)
    }
}

impl Default for Communicator {
    fn default() -> Communicator {
        Communicator::null()
    }
}

impl Drop for Communicator {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for Communicator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            None => f.write_str("Communicator(null)"),
            Some(h) => write!(
                f,
                "Communicator(channel: {:?}, rank: {}, size: {})",
                h.channel,
                self.rank(),
                self.size()
            ),
        }
    }
}
