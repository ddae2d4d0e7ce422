//! Engine configuration.

use crate::clock::PeerTime;
use crate::events::DEFAULT_EVENT_CAPACITY;
use crate::transport::Transport;
use peertime_core::{SystemClock, TimeSource};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Tunables of a [`PeerTime`] instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerTimeConfig {
    /// Identifier of this peer
    pub id: String,

    /// Remote peers to synchronize with
    pub peers: Vec<String>,

    /// Time between automatic passes
    pub interval: Duration,

    /// Timeout hint handed to the transport with every frame
    pub timeout: Duration,

    /// Pause between consecutive samples against the same peer
    pub delay: Duration,

    /// Samples per peer per pass (0 behaves like 1)
    pub repeat: u32,
}

impl Default for PeerTimeConfig {
    fn default() -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            peers: Vec::new(),
            interval: Duration::from_secs(2),
            timeout: Duration::from_secs(10),
            delay: Duration::from_millis(100),
            repeat: 5,
        }
    }
}

impl PeerTimeConfig {
    /// Check the configuration for values the engine cannot work with.
    ///
    /// # Errors
    ///
    /// Returns error for an empty peer id or a zero interval.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.id.is_empty() {
            return Err(ConfigError::EmptyId);
        }
        if self.interval.is_zero() {
            return Err(ConfigError::ZeroInterval);
        }
        Ok(())
    }
}

/// Builder for [`PeerTime`].
///
/// Only the transport is mandatory; everything else falls back to
/// [`PeerTimeConfig::default`] and the wall clock.
#[must_use]
pub struct PeerTimeBuilder {
    config: PeerTimeConfig,
    transport: Option<Arc<dyn Transport>>,
    time: Arc<dyn TimeSource>,
    event_capacity: usize,
}

impl Default for PeerTimeBuilder {
    fn default() -> Self {
        Self {
            config: PeerTimeConfig::default(),
            transport: None,
            time: Arc::new(SystemClock),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl PeerTimeBuilder {
    /// Replace the whole configuration.
    pub fn config(mut self, config: PeerTimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the local peer id.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.config.id = id.into();
        self
    }

    /// Set the remote peers.
    pub fn peers<I, S>(mut self, peers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.peers = peers.into_iter().map(Into::into).collect();
        self
    }

    /// Set the interval between automatic passes.
    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Set the timeout hint passed to the transport.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set the pause between samples against one peer.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.config.delay = delay;
        self
    }

    /// Set the number of samples per peer per pass.
    pub fn repeat(mut self, repeat: u32) -> Self {
        self.config.repeat = repeat;
        self
    }

    /// Set the local time source.
    pub fn time_source(mut self, time: impl TimeSource + 'static) -> Self {
        self.time = Arc::new(time);
        self
    }

    /// Set the transport used to send frames.
    pub fn transport(mut self, transport: impl Transport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Set how many events each subscriber may fall behind.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.event_capacity = capacity;
        self
    }

    /// Build the engine.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingTransport`] if no transport was set, or
    /// the error of [`PeerTimeConfig::validate`].
    pub fn build(self) -> Result<PeerTime, ConfigError> {
        let transport = self.transport.ok_or(ConfigError::MissingTransport)?;
        self.config.validate()?;
        Ok(PeerTime::from_parts(
            self.config,
            transport,
            self.time,
            self.event_capacity,
        ))
    }
}

/// Errors for engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// No transport was configured
    #[error("mandatory send operation not configured")]
    MissingTransport,
    /// The peer id is empty
    #[error("peer id must not be empty")]
    EmptyId,
    /// The automatic interval is zero
    #[error("synchronization interval must be greater than zero")]
    ZeroInterval,
}
