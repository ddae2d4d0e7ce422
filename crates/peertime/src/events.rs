//! Notifications about offset changes and protocol activity.
//!
//! Changes and debug traces travel on separate broadcast channels. Debug
//! traffic is lossy: a subscriber that falls behind silently skips the
//! oldest traces. Changes are rare and never evicted by debug traffic.

use tokio::sync::broadcast::{
    self,
    error::{RecvError, TryRecvError},
};

/// Default number of buffered events per subscriber and channel.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// An observable occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClockEvent {
    /// The effective offset moved to the contained value (ms)
    Change(i64),
    /// Diagnostic trace of a frame or protocol milestone
    Debug(String),
}

/// Fan-out of [`ClockEvent`]s to any number of subscribers.
///
/// Every event is also recorded through `tracing`.
#[derive(Debug, Clone)]
pub struct EventBus {
    changes: broadcast::Sender<i64>,
    debug: broadcast::Sender<String>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber on each
    /// channel.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (changes, _) = broadcast::channel(capacity);
        let (debug, _) = broadcast::channel(capacity);
        Self { changes, debug }
    }

    /// Register a new subscriber. Dropping it unsubscribes.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        Subscription {
            changes: self.changes.subscribe(),
            debug: self.debug.subscribe(),
        }
    }

    /// Announce a new offset.
    pub fn change(&self, offset_ms: i64) {
        tracing::info!(offset_ms, "clock offset changed");
        // Err only means nobody is subscribed.
        let _ = self.changes.send(offset_ms);
    }

    /// Emit a diagnostic message.
    pub fn debug(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::debug!(target: "peertime", "{message}");
        let _ = self.debug.send(message);
    }
}

/// Receiving end of an [`EventBus`].
///
/// Pending changes are handed out before pending debug traces. Missed debug
/// traces are skipped; only missed changes surface as `Lagged`.
#[derive(Debug)]
pub struct Subscription {
    changes: broadcast::Receiver<i64>,
    debug: broadcast::Receiver<String>,
}

impl Subscription {
    /// Wait for the next event.
    ///
    /// # Errors
    ///
    /// Returns [`RecvError::Lagged`] if changes were missed and
    /// [`RecvError::Closed`] once the peer is gone.
    pub async fn recv(&mut self) -> Result<ClockEvent, RecvError> {
        loop {
            tokio::select! {
                biased;
                change = self.changes.recv() => return change.map(ClockEvent::Change),
                message = self.debug.recv() => match message {
                    Ok(message) => return Ok(ClockEvent::Debug(message)),
                    Err(RecvError::Lagged(missed)) => {
                        tracing::trace!(missed, "debug events skipped");
                    }
                    Err(RecvError::Closed) => return Err(RecvError::Closed),
                },
            }
        }
    }

    /// Take the next event if one is ready.
    ///
    /// # Errors
    ///
    /// Returns [`TryRecvError::Empty`] if nothing is pending,
    /// [`TryRecvError::Lagged`] if changes were missed and
    /// [`TryRecvError::Closed`] once the peer is gone.
    pub fn try_recv(&mut self) -> Result<ClockEvent, TryRecvError> {
        match self.changes.try_recv() {
            Ok(offset_ms) => return Ok(ClockEvent::Change(offset_ms)),
            Err(TryRecvError::Lagged(missed)) => return Err(TryRecvError::Lagged(missed)),
            Err(TryRecvError::Empty | TryRecvError::Closed) => {}
        }
        loop {
            match self.debug.try_recv() {
                Ok(message) => return Ok(ClockEvent::Debug(message)),
                Err(TryRecvError::Lagged(_)) => {}
                Err(err) => return Err(err),
            }
        }
    }
}
