//! Tracing setup for the feedbench CLI
//!
//! Usage:
//!   feedbench --debug ...                  # Debug logging to console
//!   RUST_LOG=feedbench_server=trace ...    # Fine-grained log control

use anyhow::{anyhow, Result};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Default)]
pub struct TracingConfig {
    /// Default to debug level unless RUST_LOG is set
    pub debug: bool,
}

/// Initialize console tracing. RUST_LOG always wins over `--debug`.
pub fn init_tracing(config: &TracingConfig) -> Result<()> {
    let default_level = if config.debug { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(config.debug)
        .compact()
        .try_init()
        .map_err(|err| anyhow!(err))
}
