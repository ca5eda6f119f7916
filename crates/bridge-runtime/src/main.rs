//! # Bridge Runtime
//!
//! Loads configuration from the environment, runs the selected scenario and
//! prints the resulting host and guest views as JSON.
//!
//! ```text
//! BRIDGE_SCENARIO=two_guests RUST_LOG=debug bridge-runtime
//! ```

use anyhow::{Context, Result};
use bridge_runtime::{run_scenario, RuntimeConfig};
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load configuration
    let config = RuntimeConfig::from_env().context("Invalid runtime configuration")?;
    info!(
        scenario = %config.scenario,
        host_origin = %config.host_origin,
        window_ms = config.bridge.status.observation_window.as_millis(),
        "Configuration loaded"
    );

    let report = run_scenario(&config)
        .await
        .with_context(|| format!("Scenario {} failed", config.scenario))?;

    let rendered = serde_json::to_string_pretty(&report).context("Failed to render report")?;
    println!("{rendered}");

    Ok(())
}
