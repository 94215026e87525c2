//! Tracing subscriber setup.
//!
//! Logs go to stderr so CLI output on stdout stays clean. `RUST_LOG`, when
//! set, overrides `[logging] level`.

use anyhow::{Context, Result};
use tracing::debug;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::LoggingConfig;

/// Install the global subscriber described by `config`.
///
/// Safe to call more than once; later calls leave the first subscriber in
/// place (common in tests).
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .with_context(|| format!("Invalid logging.level: '{}'", config.level))?,
    };

    let result = if config.format == "json" {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(false)
                    .flatten_event(true)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .with(filter)
            .try_init()
    };

    if result.is_err() {
        debug!("tracing already initialized, skipping");
    }
    Ok(())
}
