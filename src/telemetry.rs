//! Tracing bootstrap for hosts that embed the engine without their own
//! subscriber. An explicit `RUST_LOG` wins; otherwise the configured level
//! applies to this crate only, so a chatty host stays quiet.

use crate::config::{AnalyticsConfig, AppEnvironment};
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { directive: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { directive, .. } => {
                write!(f, "invalid log filter directive '{directive}'")
            }
            TelemetryError::Subscriber(err) => write!(f, "telemetry error: {err}"),
        }
    }
}

impl std::error::Error for TelemetryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            TelemetryError::EnvFilter { source, .. } => Some(source),
            TelemetryError::Subscriber(err) => Some(&**err),
        }
    }
}

fn engine_directive(level: &str) -> String {
    let level = level.trim();
    let level = if level.is_empty() { "info" } else { level };
    format!("dealer_analytics={level}")
}

pub fn init(config: &AnalyticsConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let directive = engine_directive(&config.telemetry.log_level);
            EnvFilter::try_new(&directive).map_err(|source| TelemetryError::EnvFilter {
                directive,
                source,
            })?
        }
    };

    let ansi = config.environment != AppEnvironment::Production;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_ansi(ansi)
        .compact()
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directive_scopes_level_to_the_engine_crate() {
        assert_eq!(engine_directive("debug"), "dealer_analytics=debug");
        assert_eq!(engine_directive("  warn "), "dealer_analytics=warn");
    }

    #[test]
    fn blank_level_falls_back_to_info() {
        assert_eq!(engine_directive(""), "dealer_analytics=info");
        assert_eq!(engine_directive("   "), "dealer_analytics=info");
    }
}
