//! Environmental management
//!
//! A [`Universe`] is the explicit process-wide state tying this layer to its
//! transport. It is created once at startup by [`initialize`], passed (by
//! reference) to whatever needs to construct communicators, and torn down
//! once when dropped. There are no hidden globals.

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::topology::Communicator;
use crate::transport::Transport;

/// Process-wide context owning the transport endpoint.
pub struct Universe {
    transport: Arc<dyn Transport>,
}

impl Universe {
    /// The 'world communicator': a fresh duplicate of the default group
    /// containing every rank of the process group.
    ///
    /// Each call yields an independent communicator, so this is itself a
    /// logically collective operation: every rank must call it the same
    /// number of times, in the same order relative to other duplications.
    pub fn world(&self) -> Result<Communicator> {
        let channel = self.transport.duplicate(self.transport.world())?;
        Ok(Communicator::from_channel(self.transport.clone(), channel))
    }
}

/// Creates the process-wide [`Universe`] over an already-bootstrapped
/// transport endpoint.
///
/// Call this once at startup; process launch and transport bootstrap are the
/// transport's business and happen before this point.
pub fn initialize(transport: Arc<dyn Transport>) -> Universe {
    debug!(
        "initialized universe over transport world channel {:?}",
        transport.world()
    );
    Universe { transport }
}
