//! # PeerTime
//!
//! Agreement on a common notion of "now" between peers that each have their
//! own local clock, using request/response frames over a caller-supplied
//! transport.
//!
//! ## Architecture
//!
//! - [`Correlator`] assigns frame ids and routes replies to waiting requests
//! - [`Sampler`] performs round-trip exchanges against one peer
//! - [`Scheduler`] runs periodic passes and keeps at most one pass in flight
//! - [`PeerTime`] ties everything together: it answers time requests, fans a
//!   pass out to all configured peers and keeps the aggregated offset
//!
//! Frames arrive through [`PeerTime::deliver`]; frames leave through the
//! [`Transport`] given at construction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod config;
pub mod correlator;
pub mod events;
pub mod sampler;
pub mod scheduler;
pub mod transport;

pub use clock::{DeliverError, PassOutcome, PeerTime};
pub use config::{ConfigError, PeerTimeBuilder, PeerTimeConfig};
pub use correlator::{Correlator, CorrelatorError};
pub use events::{ClockEvent, EventBus, Subscription};
pub use peertime_core::{Measurement, PeerEstimate, Sample, SystemClock, TimeSource};
pub use peertime_proto::{Codec, Frame, FrameError, FrameKind};
pub use sampler::Sampler;
pub use scheduler::{PassGuard, Scheduler, SchedulerError};
pub use transport::{SendError, SendFuture, Transport};
