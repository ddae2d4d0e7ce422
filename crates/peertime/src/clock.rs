//! The peer clock: adjusted time, inbound frames and synchronization passes.

use crate::config::{PeerTimeBuilder, PeerTimeConfig};
use crate::correlator::{Correlator, CorrelatorError};
use crate::events::{EventBus, Subscription};
use crate::sampler::Sampler;
use crate::scheduler::{Scheduler, SchedulerError};
use crate::transport::Transport;
use parking_lot::Mutex;
use peertime_core::{estimate, PeerEstimate, Sample, TimeSource};
use peertime_proto::{Codec, Frame, FrameError, FrameKind};
use std::fmt;
use std::sync::Arc;
use tokio::task::JoinSet;

/// Result of one synchronization pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassOutcome {
    /// Another pass was in flight, nothing was done
    Skipped,
    /// No peer produced an estimate, the offset was left alone
    NoEstimate,
    /// The aggregated offset equals the stored one
    Unchanged(i64),
    /// The stored offset moved to the contained value
    Changed(i64),
}

#[derive(Debug)]
struct ClockState {
    offset_ms: i64,
    /// No sample has been applied yet
    first: bool,
}

impl ClockState {
    /// Store `offset_ms`, reporting whether the value moved.
    fn set(&mut self, offset_ms: i64) -> bool {
        let changed = self.offset_ms != offset_ms;
        self.offset_ms = offset_ms;
        changed
    }
}

struct Inner {
    config: PeerTimeConfig,
    time: Arc<dyn TimeSource>,
    transport: Arc<dyn Transport>,
    correlator: Arc<Correlator>,
    sampler: Sampler,
    scheduler: Scheduler,
    state: Mutex<ClockState>,
    events: EventBus,
}

/// A peer that keeps its clock aligned with its configured peers.
///
/// Cloning yields another handle to the same peer.
#[derive(Clone)]
pub struct PeerTime {
    inner: Arc<Inner>,
}

impl PeerTime {
    /// Start configuring a peer.
    pub fn builder() -> PeerTimeBuilder {
        PeerTimeBuilder::default()
    }

    pub(crate) fn from_parts(
        config: PeerTimeConfig,
        transport: Arc<dyn Transport>,
        time: Arc<dyn TimeSource>,
        event_capacity: usize,
    ) -> Self {
        let events = EventBus::new(event_capacity);
        let correlator = Arc::new(Correlator::new());
        let sampler = Sampler::new(
            config.id.clone(),
            Arc::clone(&correlator),
            Arc::clone(&transport),
            Arc::clone(&time),
            config.timeout,
            events.clone(),
        );
        let scheduler = Scheduler::new(config.interval);

        Self {
            inner: Arc::new(Inner {
                config,
                time,
                transport,
                correlator,
                sampler,
                scheduler,
                state: Mutex::new(ClockState {
                    offset_ms: 0,
                    first: true,
                }),
                events,
            }),
        }
    }

    /// Identifier of this peer.
    #[must_use]
    pub fn identify(&self) -> &str {
        &self.inner.config.id
    }

    /// Configuration this peer was built with.
    #[must_use]
    pub fn config(&self) -> &PeerTimeConfig {
        &self.inner.config
    }

    /// Peer-aligned time in milliseconds: local time plus the offset.
    #[must_use]
    pub fn now(&self) -> i64 {
        self.inner.now()
    }

    /// Currently applied offset in milliseconds.
    #[must_use]
    pub fn offset(&self) -> i64 {
        self.inner.state.lock().offset_ms
    }

    /// Number of own requests still waiting for a reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.correlator.pending()
    }

    /// Subscribe to offset changes and debug traces.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        self.inner.events.subscribe()
    }

    /// Feed a frame received from the transport.
    ///
    /// Replies complete the matching request; `TIME_REQUEST` frames are
    /// answered with the current peer-aligned time. Failing to send that
    /// answer is not an error, the requester will simply miss a sample.
    ///
    /// # Errors
    ///
    /// Returns [`DeliverError::Correlation`] for a reply to a request that is
    /// not pending, and [`DeliverError::UnexpectedKind`] for a non-reply frame
    /// that is not a time request.
    pub async fn deliver(&self, frame: Frame) -> Result<(), DeliverError> {
        let events = &self.inner.events;

        if frame.is_reply() {
            events.debug(format!("receive (response) frame: {frame}"));
            self.inner.correlator.deliver(frame)?;
            return Ok(());
        }

        if frame.kind != FrameKind::TimeRequest {
            return Err(DeliverError::UnexpectedKind(frame.kind.to_string()));
        }

        events.debug(format!("receive (request) frame: {frame}"));
        let response = Frame::time_response(
            self.inner.correlator.next_id(),
            self.identify(),
            &frame,
            self.now(),
        );
        events.debug(format!("send (response) frame: {response}"));

        if let Err(err) = self
            .inner
            .transport
            .send(response, self.inner.config.timeout)
            .await
        {
            tracing::debug!(peer = %frame.from, error = %err, "time response not delivered");
        }
        Ok(())
    }

    /// Validate an untyped frame and deliver it.
    ///
    /// # Errors
    ///
    /// Returns [`DeliverError::Malformed`] if the frame shape is invalid, or
    /// any error of [`PeerTime::deliver`].
    pub async fn deliver_value(&self, frame: serde_json::Value) -> Result<(), DeliverError> {
        let frame = Frame::from_value(frame)?;
        self.deliver(frame).await
    }

    /// Decode, validate and deliver a frame.
    ///
    /// # Errors
    ///
    /// Returns [`DeliverError::Malformed`] if the bytes do not hold a valid
    /// frame, or any error of [`PeerTime::deliver`].
    pub async fn deliver_bytes(&self, bytes: &[u8], codec: Codec) -> Result<(), DeliverError> {
        let frame = codec.decode(bytes)?;
        self.deliver(frame).await
    }

    /// Run one synchronization pass against all peers now.
    ///
    /// Returns [`PassOutcome::Skipped`] without doing anything if another
    /// pass, manual or automatic, is in flight.
    pub async fn sync(&self) -> PassOutcome {
        let Some(_guard) = self.inner.scheduler.try_begin() else {
            self.inner
                .events
                .debug("synchronization already in progress, skipping");
            return PassOutcome::Skipped;
        };
        Arc::clone(&self.inner).run_pass().await
    }

    /// Start automatic synchronization every configured interval.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyArmed`] if already started.
    pub fn start(&self) -> Result<(), SchedulerError> {
        let inner = Arc::downgrade(&self.inner);
        self.inner.scheduler.start(move || {
            let inner = inner.upgrade()?;
            Some(async move {
                inner.run_pass().await;
            })
        })?;
        self.inner.events.debug("start automatic synchronization");
        Ok(())
    }

    /// Stop automatic synchronization. A running pass is allowed to finish.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotArmed`] if not started.
    pub fn stop(&self) -> Result<(), SchedulerError> {
        self.inner.scheduler.stop()?;
        self.inner.events.debug("end automatic synchronization");
        Ok(())
    }

    /// Whether automatic synchronization is enabled.
    #[must_use]
    pub fn is_started(&self) -> bool {
        self.inner.scheduler.is_armed()
    }
}

impl fmt::Debug for PeerTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PeerTime")
            .field("id", &self.inner.config.id)
            .field("peers", &self.inner.config.peers)
            .field("offset_ms", &self.offset())
            .field("started", &self.is_started())
            .finish_non_exhaustive()
    }
}

impl Inner {
    fn now(&self) -> i64 {
        self.time
            .now_ms()
            .saturating_add(self.state.lock().offset_ms)
    }

    /// Sample every peer concurrently and apply the aggregated offset.
    ///
    /// The caller holds the pass slot.
    async fn run_pass(self: Arc<Self>) -> PassOutcome {
        self.events.debug("begin synchronization with all peers");

        let mut tasks = JoinSet::new();
        for peer in &self.config.peers {
            let inner = Arc::clone(&self);
            let peer = peer.clone();
            tasks.spawn(async move { inner.estimate_peer(peer).await });
        }

        let mut estimates = Vec::with_capacity(self.config.peers.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(peer_estimate) => estimates.push(peer_estimate),
                Err(err) => tracing::warn!(error = %err, "peer sampling task failed"),
            }
        }

        let outcome = match estimate::aggregate(&estimates) {
            None => PassOutcome::NoEstimate,
            Some(offset_ms) => {
                let changed = self.state.lock().set(offset_ms);
                if changed {
                    self.events.change(offset_ms);
                    self.events
                        .debug(format!("changed local time offset to {offset_ms}"));
                    PassOutcome::Changed(offset_ms)
                } else {
                    PassOutcome::Unchanged(offset_ms)
                }
            }
        };

        self.events.debug("end synchronization with all peers");
        outcome
    }

    async fn estimate_peer(&self, peer: String) -> PeerEstimate {
        let samples = self
            .sampler
            .sample_repeated(&peer, self.config.repeat, self.config.delay, |sample| {
                if let Sample::Measured(measurement) = sample {
                    self.apply_first(measurement.offset_ms);
                }
            })
            .await;
        estimate::estimate_peer(peer, &samples)
    }

    /// Apply the very first measured offset right away, ahead of aggregation.
    fn apply_first(&self, offset_ms: i64) {
        let changed = {
            let mut state = self.state.lock();
            if !state.first {
                return;
            }
            state.first = false;
            state.set(offset_ms)
        };
        if changed {
            self.events.change(offset_ms);
            self.events
                .debug(format!("changed local time offset to {offset_ms} (first time)"));
        }
    }
}

/// Errors for inbound frames.
#[derive(Debug, Clone, thiserror::Error)]
pub enum DeliverError {
    /// The frame does not have the protocol shape
    #[error(transparent)]
    Malformed(#[from] FrameError),
    /// The reply does not match a pending request
    #[error(transparent)]
    Correlation(#[from] CorrelatorError),
    /// A non-reply frame of a kind this peer does not answer
    #[error("received unexpected frame kind {0}")]
    UnexpectedKind(String),
}
