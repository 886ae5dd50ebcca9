//! Shared logging setup for the Datawatch binaries.

use tracing_subscriber::EnvFilter;

use crate::error::{DataWatchError, Result};

/// Initializes structured logging based on verbosity level.
///
/// `RUST_LOG` takes precedence when set; otherwise the level is derived from
/// the flags (quiet=ERROR, 0=INFO, 1=DEBUG, 2+=TRACE).
///
/// # Errors
/// Returns a configuration error if a global subscriber is already set.
pub fn init_logging(verbose: u8, quiet: bool) -> Result<()> {
    let default_level = match (quiet, verbose) {
        (true, _) => "error",
        (false, 0) => "info",
        (false, 1) => "debug",
        (false, _) => "trace",
    };

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init()
        .map_err(|e| {
            DataWatchError::configuration(format!("Failed to initialize logging: {e}"))
        })?;

    Ok(())
}
