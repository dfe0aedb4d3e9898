//! Tracing Initialization
//!
//! Sets up the tracing subscriber once at startup. Output is human-readable
//! by default and switches to JSON lines when `TOOLGATE_LOG_JSON=true`, so
//! log collectors can ingest it without a parser.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Telemetry configuration from environment variables.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Emit JSON log lines instead of the human-readable format.
    pub json_output: bool,
    /// Default filter when `RUST_LOG` is unset.
    pub default_filter: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            json_output: std::env::var("TOOLGATE_LOG_JSON")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            default_filter: "toolgate_api=debug,tower_http=debug,info".to_string(),
        }
    }
}

/// Initialize the tracing subscriber.
///
/// Call once at application startup before any tracing occurs. Respects
/// `RUST_LOG` and falls back to the configured default filter.
pub fn init_tracing(config: &TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.clone()));

    if config.json_output {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_filter_mentions_crate() {
        let config = TelemetryConfig::default();
        assert!(config.default_filter.contains("toolgate_api"));
    }
}
