//! Agent configuration.

use anyhow::{bail, Context, Result};
use peertime::{Codec, PeerTimeConfig};
use peertime_proto::topics::is_valid_peer_id;
use std::time::Duration;

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    /// Engine settings
    pub engine: PeerTimeConfig,

    /// MQTT broker URL
    pub mqtt_broker: String,

    /// Tenant identifier
    pub tenant: String,

    /// Wire encoding of frames
    pub codec: Codec,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            engine: PeerTimeConfig::default(),
            mqtt_broker: "tcp://localhost:1883".to_string(),
            tenant: "default".to_string(),
            codec: Codec::Json,
        }
    }
}

impl AgentConfig {
    /// Load configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `PEERTIME_ID`: Peer identifier (random UUID if unset)
    /// - `PEERTIME_PEERS`: Comma separated peer ids, or a JSON array
    /// - `PEERTIME_INTERVAL_MS`: Time between automatic passes
    /// - `PEERTIME_TIMEOUT_MS`: Request timeout
    /// - `PEERTIME_DELAY_MS`: Pause between samples against one peer
    /// - `PEERTIME_REPEAT`: Samples per peer per pass
    /// - `PEERTIME_MQTT_BROKER`: MQTT broker URL
    /// - `PEERTIME_TENANT`: Tenant identifier
    /// - `PEERTIME_CODEC`: "json" or "cbor"
    ///
    /// # Errors
    ///
    /// Returns error if a variable holds an invalid value.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(id) = lookup("PEERTIME_ID") {
            config.engine.id = id;
        }

        if let Some(peers) = lookup("PEERTIME_PEERS") {
            config.engine.peers = parse_peers(&peers)?;
        }

        if let Some(ms) = lookup("PEERTIME_INTERVAL_MS") {
            config.engine.interval = parse_millis("PEERTIME_INTERVAL_MS", &ms)?;
        }

        if let Some(ms) = lookup("PEERTIME_TIMEOUT_MS") {
            config.engine.timeout = parse_millis("PEERTIME_TIMEOUT_MS", &ms)?;
        }

        if let Some(ms) = lookup("PEERTIME_DELAY_MS") {
            config.engine.delay = parse_millis("PEERTIME_DELAY_MS", &ms)?;
        }

        if let Some(repeat) = lookup("PEERTIME_REPEAT") {
            config.engine.repeat = repeat
                .trim()
                .parse()
                .with_context(|| format!("Invalid PEERTIME_REPEAT '{repeat}'"))?;
        }

        if let Some(broker) = lookup("PEERTIME_MQTT_BROKER") {
            config.mqtt_broker = broker;
        }

        if let Some(tenant) = lookup("PEERTIME_TENANT") {
            config.tenant = tenant;
        }

        if let Some(codec) = lookup("PEERTIME_CODEC") {
            config.codec = codec.parse().context("Invalid PEERTIME_CODEC")?;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        self.engine.validate().context("Invalid engine settings")?;

        for peer in std::iter::once(&self.engine.id).chain(&self.engine.peers) {
            if !is_valid_peer_id(peer) {
                bail!("peer id '{peer}' cannot be used as an MQTT topic level");
            }
        }
        if !is_valid_peer_id(&self.tenant) {
            bail!("tenant '{}' cannot be used as an MQTT topic level", self.tenant);
        }
        Ok(())
    }
}

fn parse_peers(input: &str) -> Result<Vec<String>> {
    let input = input.trim();
    if input.starts_with('[') {
        return serde_json::from_str(input).context("Invalid PEERTIME_PEERS JSON");
    }
    Ok(input
        .split(',')
        .map(str::trim)
        .filter(|peer| !peer.is_empty())
        .map(ToString::to_string)
        .collect())
}

fn parse_millis(key: &str, value: &str) -> Result<Duration> {
    let ms = value
        .trim()
        .parse()
        .with_context(|| format!("Invalid {key} '{value}'"))?;
    Ok(Duration::from_millis(ms))
}
