//! MQTT topic scheme for frame exchange.
//!
//! Topic structure: `peertime/v1/{tenant}/{peer}/frames`
//!
//! Every peer subscribes to its own inbox and publishes a frame to the inbox
//! of the frame's `to` peer. Peer ids must not contain `/`, `+` or `#`.

use serde::{Deserialize, Serialize};

/// Protocol version for topic scheme.
pub const PROTOCOL_VERSION: &str = "v1";

/// Topic scheme configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicScheme {
    /// Tenant identifier
    pub tenant: String,
    /// Topic prefix (default: "peertime")
    pub prefix: String,
}

impl Default for TopicScheme {
    fn default() -> Self {
        Self::new("default")
    }
}

impl TopicScheme {
    /// Create a new topic scheme with the given tenant.
    #[must_use]
    pub fn new(tenant: impl Into<String>) -> Self {
        Self {
            tenant: tenant.into(),
            prefix: "peertime".to_string(),
        }
    }

    fn tenant_base(&self) -> String {
        format!("{}/{}/{}", self.prefix, PROTOCOL_VERSION, self.tenant)
    }

    /// Inbox topic of a peer.
    #[must_use]
    pub fn inbox(&self, peer: &str) -> String {
        format!("{}/{peer}/frames", self.tenant_base())
    }

    /// Extract the peer id from an inbox topic of this tenant.
    #[must_use]
    pub fn parse(&self, topic: &str) -> Option<String> {
        let remainder = topic.strip_prefix(&self.tenant_base())?.strip_prefix('/')?;
        let peer = remainder.strip_suffix("/frames")?;
        if peer.is_empty() || peer.contains('/') {
            return None;
        }
        Some(peer.to_string())
    }
}

/// Whether `peer` can be used as a topic level.
#[must_use]
pub fn is_valid_peer_id(peer: &str) -> bool {
    !peer.is_empty() && !peer.contains(['/', '+', '#'])
}
