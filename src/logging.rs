//! Leveled logging on top of `tracing-subscriber`, with a runtime-adjustable filter.

use crate::error::ConfigError;
use tracing_subscriber::{fmt, prelude::*, reload, EnvFilter, Registry};

/// Handle to the installed filter. Dropping it keeps the subscriber but loses the ability
/// to change the level.
#[derive(Clone)]
pub struct LogHandle {
    handle: reload::Handle<EnvFilter, Registry>,
}

impl std::fmt::Debug for LogHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogHandle").finish_non_exhaustive()
    }
}

fn parse_filter(level: &str) -> Result<EnvFilter, ConfigError> {
    EnvFilter::try_new(level).map_err(|e| ConfigError::InvalidLogLevel {
        level: level.to_string(),
        reason: e.to_string(),
    })
}

/// Installs the global subscriber. Fails if one is already installed.
pub fn init(level: &str) -> Result<LogHandle, ConfigError> {
    let (filter, handle) = reload::Layer::new(parse_filter(level)?);
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .try_init()
        .map_err(|e| ConfigError::Logger(e.to_string()))?;
    Ok(LogHandle { handle })
}

impl LogHandle {
    pub fn set_level(&self, level: &str) -> Result<(), ConfigError> {
        let filter = parse_filter(level)?;
        self.handle.reload(filter).map_err(|e| ConfigError::Logger(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_malformed_directives() {
        let err = parse_filter("trencher=loud").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidLogLevel { .. }));
    }

    #[test]
    fn accepts_plain_levels() {
        assert!(parse_filter("debug").is_ok());
        assert!(parse_filter("warn,trencher=trace").is_ok());
    }
}
