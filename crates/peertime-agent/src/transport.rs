//! MQTT transport for time frames.

use peertime::{Codec, Frame, SendError, SendFuture, Transport};
use peertime_proto::TopicScheme;
use rumqttc::{AsyncClient, EventLoop, MqttOptions, QoS};
use std::time::Duration;
use url::Url;

/// Publishes frames to the inbox topic of their recipient.
///
/// MQTT has no notion of a reply, so the send future of a `TIME_REQUEST`
/// stays open for the timeout and then fails with [`SendError::Timeout`].
/// If the reply arrives earlier the engine drops the future.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
    topics: TopicScheme,
    codec: Codec,
}

impl MqttTransport {
    /// Create a transport and the event loop that drives it.
    ///
    /// # Errors
    ///
    /// Returns error if the broker URL is invalid.
    pub fn new(
        mqtt_broker: &str,
        client_id: &str,
        topics: TopicScheme,
        codec: Codec,
    ) -> Result<(Self, EventLoop), TransportError> {
        let (host, port) = parse_mqtt_url(mqtt_broker)?;

        let mut mqtt_options = MqttOptions::new(client_id, host, port);
        mqtt_options.set_keep_alive(Duration::from_secs(30));

        let (client, eventloop) = AsyncClient::new(mqtt_options, 100);

        Ok((
            Self {
                client,
                topics,
                codec,
            },
            eventloop,
        ))
    }

    /// Subscribe to the inbox of `peer`.
    ///
    /// # Errors
    ///
    /// Returns error if subscription fails.
    pub async fn subscribe_inbox(&self, peer: &str) -> Result<(), TransportError> {
        let topic = self.topics.inbox(peer);

        tracing::info!(topic, "Subscribing to inbox");

        self.client
            .subscribe(&topic, QoS::AtLeastOnce)
            .await
            .map_err(|e| TransportError::Subscribe(e.to_string()))
    }

    /// Disconnect from the broker.
    ///
    /// # Errors
    ///
    /// Returns error if the disconnect request cannot be queued.
    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Disconnect(e.to_string()))
    }
}

impl Transport for MqttTransport {
    fn send(&self, frame: Frame, timeout: Duration) -> SendFuture {
        let client = self.client.clone();
        let topic = self.topics.inbox(&frame.to);
        let awaits_reply = frame.expects_reply();
        let payload = self.codec.encode(&frame);

        Box::pin(async move {
            let payload = payload.map_err(|e| SendError::Unreachable(e.to_string()))?;

            tracing::trace!(topic, payload_len = payload.len(), "Publishing frame");

            client
                .publish(topic, QoS::AtLeastOnce, false, payload)
                .await
                .map_err(|_| SendError::Closed)?;

            if awaits_reply {
                tokio::time::sleep(timeout).await;
                return Err(SendError::Timeout(timeout));
            }
            Ok(())
        })
    }
}

/// Parse MQTT URL into host and port.
fn parse_mqtt_url(input: &str) -> Result<(String, u16), TransportError> {
    if input.contains("://") {
        let url = Url::parse(input)
            .map_err(|e| TransportError::InvalidBrokerUrl(format!("{input}: {e}")))?;

        match url.scheme() {
            "tcp" | "mqtt" => {}
            scheme => {
                return Err(TransportError::InvalidBrokerUrl(format!(
                    "{input}: unsupported scheme '{scheme}'"
                )));
            }
        }

        let host = url
            .host_str()
            .ok_or_else(|| TransportError::InvalidBrokerUrl(format!("{input}: missing host")))?;
        let port = url.port().unwrap_or(1883);

        return Ok((host.to_string(), port));
    }

    let (host, port) = match input.split_once(':') {
        None => (input, None),
        Some((host, port)) => (host, Some(port)),
    };
    if host.is_empty() {
        return Err(TransportError::InvalidBrokerUrl(format!(
            "{input}: missing host"
        )));
    }
    let port = match port {
        None => 1883,
        Some(port) => port.parse().map_err(|_| {
            TransportError::InvalidBrokerUrl(format!("{input}: invalid port '{port}'"))
        })?,
    };

    Ok((host.to_string(), port))
}

/// Errors for the MQTT transport.
#[derive(Debug, Clone, thiserror::Error)]
pub enum TransportError {
    /// Subscription failed
    #[error("subscription error: {0}")]
    Subscribe(String),
    /// Invalid MQTT broker URL
    #[error("invalid MQTT broker URL: {0}")]
    InvalidBrokerUrl(String),
    /// Disconnect request could not be queued
    #[error("disconnect error: {0}")]
    Disconnect(String),
}
