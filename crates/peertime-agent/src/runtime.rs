//! Agent runtime orchestration.

use crate::config::AgentConfig;
use crate::transport::MqttTransport;
use anyhow::{Context, Result};
use peertime::{ClockEvent, Codec, PeerTime};
use peertime_proto::TopicScheme;
use rumqttc::{Event, EventLoop, Packet};
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;

/// The main agent runtime.
pub struct Agent {
    peer: PeerTime,
    transport: MqttTransport,
    eventloop: EventLoop,
    topics: TopicScheme,
    codec: Codec,
}

impl Agent {
    /// Create a new agent.
    ///
    /// # Errors
    ///
    /// Returns error if initialization fails.
    pub fn new(config: AgentConfig) -> Result<Self> {
        let topics = TopicScheme::new(&config.tenant);

        let (transport, eventloop) = MqttTransport::new(
            &config.mqtt_broker,
            &format!("peertime-{}", config.engine.id),
            topics.clone(),
            config.codec,
        )
        .context("Failed to create MQTT transport")?;

        let peer = PeerTime::builder()
            .config(config.engine)
            .transport(transport.clone())
            .build()
            .context("Failed to create peer clock")?;

        Ok(Self {
            peer,
            transport,
            eventloop,
            topics,
            codec: config.codec,
        })
    }

    /// Run the agent's main loop.
    ///
    /// # Errors
    ///
    /// Returns error if any component fails.
    pub async fn run(mut self) -> Result<()> {
        tracing::info!(peer = self.peer.identify(), "Starting agent runtime");

        self.transport.subscribe_inbox(self.peer.identify()).await?;

        let mut events = self.peer.subscribe();
        self.peer
            .start()
            .context("Failed to start automatic synchronization")?;

        tracing::info!("Agent running, press Ctrl+C to stop");

        loop {
            tokio::select! {
                event = self.eventloop.poll() => {
                    match event {
                        Ok(Event::Incoming(Packet::Publish(publish))) => {
                            tracing::trace!(
                                topic = %publish.topic,
                                payload_len = publish.payload.len(),
                                "Received frame"
                            );
                            let Some(recipient) = self.topics.parse(&publish.topic) else {
                                continue;
                            };
                            if recipient != self.peer.identify() {
                                continue;
                            }

                            let peer = self.peer.clone();
                            let codec = self.codec;
                            tokio::spawn(async move {
                                if let Err(err) = peer.deliver_bytes(&publish.payload, codec).await {
                                    tracing::warn!(error = %err, "Rejected inbound frame");
                                }
                            });
                        }
                        Ok(_) => {}
                        Err(e) => {
                            tracing::error!(error = %e, "MQTT error");
                            tokio::time::sleep(Duration::from_secs(5)).await;
                        }
                    }
                }

                event = events.recv() => {
                    match event {
                        Ok(ClockEvent::Change(offset_ms)) => {
                            tracing::info!(offset_ms, now = self.peer.now(), "Peer time adjusted");
                        }
                        Ok(ClockEvent::Debug(_)) => {}
                        Err(RecvError::Lagged(missed)) => {
                            tracing::warn!(missed, "Offset change notifications missed");
                        }
                        Err(RecvError::Closed) => break,
                    }
                }

                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Shutdown signal received");
                    break;
                }
            }
        }

        if let Err(err) = self.peer.stop() {
            tracing::debug!(error = %err, "Automatic synchronization already stopped");
        }
        if let Err(err) = self.transport.disconnect().await {
            tracing::debug!(error = %err, "Disconnect failed");
        }

        tracing::info!("Agent stopped");
        Ok(())
    }
}
