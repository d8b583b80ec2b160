//! # Secure-Bus Node
//!
//! Runs the security middleware around the in-memory broker.
//!
//! ## Startup Sequence
//!
//! 1. Load configuration from `SB_*` environment variables
//! 2. Initialize logging
//! 3. Compose encryption and security decorators around the broker
//! 4. Publish a heartbeat and wait for it to come back, or for Ctrl+C
//! 5. Stop and dispose the stack

use anyhow::{Context, Result};
use tracing::{error, info};

use node_runtime::{NodeConfig, NodeRuntime};

#[tokio::main]
async fn main() -> Result<()> {
    let config = NodeConfig::from_env().context("Failed to load configuration")?;
    node_runtime::logging::init_logging(&config.logging)?;
    info!(?config, "Configuration loaded");

    let runtime = NodeRuntime::new(&config)?;
    runtime.start().await?;

    let outcome = tokio::select! {
        result = runtime.heartbeat(config.heartbeat_timeout) => result.map(Some),
        signal = tokio::signal::ctrl_c() => signal
            .map(|()| {
                info!("Interrupted");
                None
            })
            .context("Failed to listen for Ctrl+C"),
    };

    runtime.shutdown().await;

    match outcome {
        Ok(Some(beat)) => {
            info!(sequence = beat.sequence, node = %beat.node, "Round trip complete");
            Ok(())
        }
        Ok(None) => Ok(()),
        Err(e) => {
            error!(error = %e, "Heartbeat failed");
            Err(e)
        }
    }
}
