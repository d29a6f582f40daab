//! Home Assistant Rust Server
//!
//! Loads `configuration.yaml` (or the path given as the first argument),
//! starts the hub with its automations and runs until Ctrl-C or a
//! `homeassistant.stop` service call.

use std::sync::Arc;

use anyhow::{Context, Result};
use ha_config::HubConfig;
use ha_hub::HomeAssistant;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_CONFIG: &str = "configuration.yaml";

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();

    let path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = HubConfig::load(&path).with_context(|| format!("loading {path}"))?;

    info!(name = %config.core.name, "Starting Home Assistant (Rust)");

    let hass = HomeAssistant::new(config.core)?;
    let automations = ha_automation::setup(&hass, &config.automations);
    hass.start()?;

    info!(automations = automations.len(), "Home Assistant is running");

    let waiter = Arc::clone(&hass);
    tokio::select! {
        result = tokio::signal::ctrl_c() => {
            result.context("listening for Ctrl-C")?;
            info!("Interrupted");
        }
        _ = tokio::task::spawn_blocking(move || waiter.block_till_stopped()) => {
            info!("Stop requested");
        }
    }

    info!("Shutting down...");
    tokio::task::spawn_blocking(move || {
        for automation in &automations {
            automation.remove();
        }
        hass.stop();
    })
    .await
    .context("stopping hub")?;

    Ok(())
}
