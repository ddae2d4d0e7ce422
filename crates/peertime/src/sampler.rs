//! Round-trip sampling against a single peer.

use crate::correlator::Correlator;
use crate::events::EventBus;
use crate::transport::{SendError, SendFuture, Transport};
use peertime_core::{Measurement, Sample, TimeSource};
use peertime_proto::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;

/// Performs `TIME_REQUEST` exchanges and turns them into [`Sample`]s.
///
/// Failures never escape a sample: a send error or a reply without a
/// usable time reading produces [`Sample::Failed`].
pub struct Sampler {
    local_id: String,
    correlator: Arc<Correlator>,
    transport: Arc<dyn Transport>,
    time: Arc<dyn TimeSource>,
    timeout: Duration,
    events: EventBus,
}

impl Sampler {
    /// Create a sampler sending as `local_id`.
    pub fn new(
        local_id: impl Into<String>,
        correlator: Arc<Correlator>,
        transport: Arc<dyn Transport>,
        time: Arc<dyn TimeSource>,
        timeout: Duration,
        events: EventBus,
    ) -> Self {
        Self {
            local_id: local_id.into(),
            correlator,
            transport,
            time,
            timeout,
            events,
        }
    }

    /// Perform one round trip against `peer`.
    pub async fn sample(&self, peer: &str) -> Sample {
        let start = self.time.now_ms();

        let frame_id = self.correlator.next_id();
        let reply = match self.correlator.register(frame_id) {
            Ok(reply) => reply,
            Err(err) => {
                tracing::warn!(peer, error = %err, "cannot register request");
                return Sample::Failed;
            }
        };

        let request = Frame::time_request(frame_id, &self.local_id, peer);
        self.events.debug(format!("send (request) frame: {request}"));
        let send = self.transport.send(request, self.timeout);

        let response = match await_reply(reply, send).await {
            Ok(response) => response,
            Err(err) => {
                self.correlator.cancel(frame_id);
                self.events
                    .debug(format!("request {frame_id} to peer {peer} failed: {err}"));
                return Sample::Failed;
            }
        };

        let end = self.time.now_ms();
        let measurement = response
            .remote_time()
            .and_then(|remote| Measurement::from_exchange(peer, start, end, remote));

        match measurement {
            Some(measurement) => {
                self.events.debug(format!(
                    "determined offset {} against peer {peer} (round trip {}ms)",
                    measurement.offset_ms, measurement.round_trip_ms
                ));
                Sample::Measured(measurement)
            }
            None => {
                tracing::warn!(peer, frame_id, "reply carries no usable time");
                Sample::Failed
            }
        }
    }

    /// Perform `count` round trips against `peer`, one after another, with
    /// `delay` between them. At least one round trip is always made.
    ///
    /// `on_sample` sees each sample as soon as it is taken.
    pub async fn sample_repeated(
        &self,
        peer: &str,
        count: u32,
        delay: Duration,
        mut on_sample: impl FnMut(&Sample) + Send,
    ) -> Vec<Sample> {
        let attempts = count.max(1);
        let mut samples = Vec::with_capacity(attempts as usize);

        for attempt in 0..attempts {
            if attempt > 0 {
                tokio::time::sleep(delay).await;
            }
            let sample = self.sample(peer).await;
            on_sample(&sample);
            samples.push(sample);
        }

        samples
    }
}

/// Wait until the reply arrives or the send fails, whichever comes first.
async fn await_reply(
    mut reply: oneshot::Receiver<Frame>,
    send: SendFuture,
) -> Result<Frame, SendError> {
    tokio::select! {
        biased;
        frame = &mut reply => frame.map_err(|_| SendError::Closed),
        sent = send => match sent {
            Ok(()) => reply.await.map_err(|_| SendError::Closed),
            Err(err) => Err(err),
        },
    }
}
