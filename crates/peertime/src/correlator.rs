//! Request/reply correlation.
//!
//! Each outgoing request gets a fresh frame id from a per-peer counter and a
//! one-shot channel registered under that id. A reply names the request in
//! `replyTo`; delivering it removes the entry and completes the channel, so
//! every request is answered at most once.

use parking_lot::Mutex;
use peertime_proto::Frame;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::oneshot;

/// Tracks requests that are waiting for a reply.
#[derive(Debug, Default)]
pub struct Correlator {
    next_id: AtomicU64,
    pending: Mutex<HashMap<u64, oneshot::Sender<Frame>>>,
}

impl Correlator {
    /// Create a correlator whose first frame id is 0.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the next frame id.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Register a request and return the receiver its reply will arrive on.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelatorError::DuplicateRequest`] if `id` is already
    /// waiting for a reply.
    pub fn register(&self, id: u64) -> Result<oneshot::Receiver<Frame>, CorrelatorError> {
        let mut pending = self.pending.lock();
        if pending.contains_key(&id) {
            return Err(CorrelatorError::DuplicateRequest(id));
        }
        let (tx, rx) = oneshot::channel();
        pending.insert(id, tx);
        Ok(rx)
    }

    /// Hand a reply to the request it answers.
    ///
    /// # Errors
    ///
    /// Returns [`CorrelatorError::NotAReply`] if the frame has no `replyTo`,
    /// and [`CorrelatorError::UnknownReply`] if no request with that id is
    /// pending (late or duplicate delivery).
    pub fn deliver(&self, frame: Frame) -> Result<(), CorrelatorError> {
        let Some(id) = frame.reply_to else {
            return Err(CorrelatorError::NotAReply(frame.frame_id));
        };

        let waiter = self
            .pending
            .lock()
            .remove(&id)
            .ok_or(CorrelatorError::UnknownReply(id))?;

        if waiter.send(frame).is_err() {
            tracing::debug!(request_id = id, "reply arrived after the requester gave up");
        }
        Ok(())
    }

    /// Forget a pending request. Returns whether it was pending.
    pub fn cancel(&self, id: u64) -> bool {
        self.pending.lock().remove(&id).is_some()
    }

    /// Number of requests waiting for a reply.
    #[must_use]
    pub fn pending(&self) -> usize {
        self.pending.lock().len()
    }
}

/// Errors for request/reply correlation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CorrelatorError {
    /// A request with this id is already pending
    #[error("duplicate request id {0}")]
    DuplicateRequest(u64),
    /// No pending request matches the reply
    #[error("reply to unknown request {0}")]
    UnknownReply(u64),
    /// The frame does not answer any request
    #[error("frame {0} is not a reply")]
    NotAReply(u64),
}
