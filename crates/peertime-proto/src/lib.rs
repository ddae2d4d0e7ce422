//! # PeerTime Protocol
//!
//! Wire frame definitions and MQTT topic scheme for peer time exchange.
//!
//! ## Frames
//!
//! - `TIME_REQUEST`: asks a peer for its current (offset-adjusted) time
//! - `TIME_RESPONSE`: answers a request, `replyTo` names the request's `frameId`
//!
//! Frames travel as JSON objects
//! `{ frameId, replyTo?, from, to, kind, payload? }` or, alternatively, as
//! the same structure encoded in CBOR.
//!
//! ## MQTT Topics
//!
//! Topic scheme: `peertime/v1/{tenant}/{peer}/frames`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod frame;
pub mod topics;

pub use frame::{Codec, Frame, FrameError, FrameKind};
pub use topics::TopicScheme;
