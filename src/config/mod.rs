use std::env;
use std::fmt;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the analytics engine. Resolved once; never
/// mutated afterwards.
#[derive(Debug, Clone)]
pub struct AnalyticsConfig {
    pub environment: AppEnvironment,
    pub lookback: LookbackConfig,
    pub trends: TrendsConfig,
    pub telemetry: TelemetryConfig,
}

impl AnalyticsConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("ANALYTICS_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let booking_days = parse_days("ANALYTICS_BOOKING_LOOKBACK_DAYS", 120)?;
        let visitor_days = parse_days("ANALYTICS_VISITOR_LOOKBACK_DAYS", 30)?;

        let default_top_n = match env::var("ANALYTICS_TREND_TOP_N") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|n| *n > 0)
                .ok_or(ConfigError::InvalidTopN { value: raw })?,
            Err(_) => 8,
        };

        let log_level = env::var("ANALYTICS_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            lookback: LookbackConfig {
                booking_days,
                visitor_days,
            },
            trends: TrendsConfig { default_top_n },
            telemetry: TelemetryConfig { log_level },
        })
    }
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            environment: AppEnvironment::Development,
            lookback: LookbackConfig {
                booking_days: 120,
                visitor_days: 30,
            },
            trends: TrendsConfig { default_top_n: 8 },
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

fn parse_days(var: &str, default: i64) -> Result<i64, ConfigError> {
    match env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<i64>()
            .ok()
            .filter(|days| *days > 0)
            .ok_or_else(|| ConfigError::InvalidLookback {
                var: var.to_string(),
                value: raw,
            }),
        Err(_) => Ok(default),
    }
}

/// Asymmetric lookback windows for trend ranking: bookings are low-frequency
/// and keep a long window, behavioral signals are recency-weighted.
#[derive(Debug, Clone, Copy)]
pub struct LookbackConfig {
    pub booking_days: i64,
    pub visitor_days: i64,
}

#[derive(Debug, Clone, Copy)]
pub struct TrendsConfig {
    pub default_top_n: usize,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidLookback { var: String, value: String },
    InvalidTopN { value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidLookback { var, value } => {
                write!(f, "{var} must be a positive day count, got '{value}'")
            }
            ConfigError::InvalidTopN { value } => {
                write!(f, "ANALYTICS_TREND_TOP_N must be a positive integer, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {}
