//! Log level selection

use anyhow::{Result, bail};
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Environment variable holding the log level
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";

/// Parse an optional `LOG_LEVEL` value
///
/// Unset or blank means `info`. Anything outside
/// `trace|debug|info|warn|error` (case-insensitive) is rejected.
pub fn parse_level(value: Option<&str>) -> Result<Level> {
    let Some(raw) = value.map(str::trim).filter(|v| !v.is_empty()) else {
        return Ok(Level::INFO);
    };

    match raw.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "{} '{}' is not valid. Valid levels: trace, debug, info, warn, error",
            ENV_LOG_LEVEL,
            raw
        ),
    }
}

/// Install the global fmt subscriber
pub fn init(level: Level) -> Result<()> {
    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow::anyhow!("Failed to set tracing subscriber: {}", e))
}
