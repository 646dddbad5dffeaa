//! Diagnostic logging.
//!
//! Log lines go to stderr so they never mix with results on stdout.
use crate::config::LoggingConfig;
use crate::core::{Result, WhisperError};
use tracing::debug;

/// Installs the global subscriber at the configured level.
///
/// Fails if the level is unknown or a subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let level = config.level()?;
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .with_target(false)
        .try_init()
        .map_err(|e| WhisperError::Config(format!("cannot install logger: {}", e)))?;
    debug!(%level, "logging initialized");
    Ok(())
}
