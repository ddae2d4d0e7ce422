//! The outbound side of the protocol.

use peertime_proto::Frame;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// Completion of a single send.
///
/// Failing immediately and failing later are the same thing to the caller:
/// the future resolves to an error either way.
pub type SendFuture = Pin<Box<dyn Future<Output = Result<(), SendError>> + Send + 'static>>;

/// Delivers frames to remote peers.
///
/// The returned future must eventually resolve. A transport that wants
/// requests to time out resolves with [`SendError::Timeout`] once `timeout`
/// has elapsed without the reply having arrived; the engine itself enforces
/// no deadline.
pub trait Transport: Send + Sync {
    /// Send `frame` to `frame.to`.
    fn send(&self, frame: Frame, timeout: Duration) -> SendFuture;
}

impl<F> Transport for F
where
    F: Fn(Frame, Duration) -> SendFuture + Send + Sync,
{
    fn send(&self, frame: Frame, timeout: Duration) -> SendFuture {
        self(frame, timeout)
    }
}

/// Errors reported by a transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SendError {
    /// The frame could not be handed to the peer
    #[error("peer unreachable: {0}")]
    Unreachable(String),
    /// No reply within the timeout hint
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    /// The transport or the reply channel has shut down
    #[error("transport closed")]
    Closed,
}
