//! # PeerTime Core
//!
//! Pure building blocks for peer-to-peer clock offset estimation.
//!
//! This crate provides:
//! - Statistics helpers (mean, sample variance, standard deviation, median)
//! - Round-trip samples and the Cristian-style offset formula
//! - Per-peer outlier rejection and cross-peer offset aggregation
//! - The local time source abstraction with a wall-clock default

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod estimate;
pub mod stats;
pub mod time;

pub use estimate::{aggregate, estimate_peer, Measurement, PeerEstimate, Sample};
pub use time::{SystemClock, TimeSource};
