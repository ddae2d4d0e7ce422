//! # PeerTime Agent
//!
//! Runs a single peer that keeps its clock aligned with its configured peers,
//! exchanging time frames over MQTT.
//!
//! ## Architecture
//!
//! The agent runs three concurrent activities:
//! 1. **Ingress**: Receives frames on its inbox topic and feeds them to the engine
//! 2. **Synchronization**: Samples all peers every interval and adjusts the offset
//! 3. **Reporting**: Logs every offset change

use anyhow::Result;
use tracing_subscriber::EnvFilter;

mod config;
mod runtime;
mod transport;

pub use config::AgentConfig;
pub use runtime::Agent;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting PeerTime Agent");

    let config = AgentConfig::from_env()?;

    tracing::info!(
        peer = %config.engine.id,
        peers = ?config.engine.peers,
        tenant = %config.tenant,
        "Agent initialized"
    );

    let agent = Agent::new(config)?;
    agent.run().await?;

    Ok(())
}
