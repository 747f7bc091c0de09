//! Structured logging setup using tracing.
//!
//! Logs go to stderr so that commands printing results on stdout stay
//! pipeable. `RUST_LOG` takes precedence over the level passed in.

use crate::error::{BuildError, Result};
use tracing::Level;
use tracing_subscriber::EnvFilter;

pub fn init_logging(level: &str, json: bool) -> Result<()> {
    let level = parse_log_level(level)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("mango_build_native={}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);
    let installed = if json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    installed.map_err(|e| BuildError::Config(format!("failed to initialize logging: {}", e)))
}

fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => Err(BuildError::Config(format!(
            "invalid log level `{}` (expected trace, debug, info, warn or error)",
            level
        ))),
    }
}
