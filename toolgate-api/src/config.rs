//! Gateway Configuration Module
//!
//! Runtime configuration for the gateway, loaded from environment variables
//! with development-friendly defaults. Contract variables (`DATABASE_URL`,
//! `POLLING_INTERVAL`, `DISABLE_POLLING`, `OPENAPI_BASE_URL`, credential
//! defaults) keep their published names; gateway-own knobs use the
//! `TOOLGATE_` prefix.

use std::time::Duration;

// ============================================================================
// GATEWAY CONFIGURATION
// ============================================================================

/// Gateway configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    // ========================================================================
    // Server
    // ========================================================================
    /// Bind host.
    pub bind_host: String,

    /// Bind port.
    pub bind_port: u16,

    // ========================================================================
    // Spec source
    // ========================================================================
    /// Postgres connection string; presence selects store-backed mode.
    pub database_url: Option<String>,

    /// Directory scanned in file mode.
    pub spec_dir: String,

    // ========================================================================
    // Reconciliation
    // ========================================================================
    /// Polling interval for the reconciler.
    pub polling_interval: Duration,

    /// Whether periodic polling is disabled.
    pub polling_disabled: bool,

    /// Upper bound on one reconcile's store I/O.
    pub reconcile_timeout: Duration,

    // ========================================================================
    // Invocation
    // ========================================================================
    /// Override for every document's `servers[0]`.
    pub base_url_override: Option<String>,

    /// Total per-upstream-request timeout.
    pub request_timeout: Duration,

    /// Upper bound on upstream response bodies; larger bodies are truncated.
    pub max_response_bytes: usize,

    /// Upper bound on inbound request bodies.
    pub max_body_bytes: usize,

    /// Whether dangerous operations require `__confirmed: true`.
    pub confirm_dangerous: bool,

    // ========================================================================
    // Ingest filters
    // ========================================================================
    /// Keep only operations carrying this tag.
    pub filter_tag: Option<String>,

    /// Keep only operations whose summary/description matches this regex.
    pub filter_include: Option<String>,

    /// Drop operations whose summary/description matches this regex.
    pub filter_exclude: Option<String>,

    /// Comma-separated allow-list of operation ids.
    pub filter_operations: Option<String>,

    // ========================================================================
    // Sessions
    // ========================================================================
    /// Idle timeout after which a transport session expires.
    pub session_idle: Duration,

    /// Per-mount session cap; LRU eviction beyond it.
    pub max_sessions_per_mount: usize,

    // ========================================================================
    // Shutdown
    // ========================================================================
    /// How long in-flight requests get to drain after SIGINT/SIGTERM.
    pub shutdown_grace: Duration,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_host: "0.0.0.0".to_string(),
            bind_port: 8080,
            database_url: None,
            spec_dir: "./specs".to_string(),
            polling_interval: Duration::from_secs(30),
            polling_disabled: false,
            reconcile_timeout: Duration::from_secs(10),
            base_url_override: None,
            request_timeout: Duration::from_secs(240),
            max_response_bytes: 8 * 1024 * 1024,
            max_body_bytes: 10 * 1024 * 1024,
            confirm_dangerous: true,
            filter_tag: None,
            filter_include: None,
            filter_exclude: None,
            filter_operations: None,
            session_idle: Duration::from_secs(300),
            max_sessions_per_mount: 128,
            shutdown_grace: Duration::from_secs(25),
        }
    }
}

impl GatewayConfig {
    /// Create GatewayConfig from environment variables.
    ///
    /// Environment variables:
    /// - `DATABASE_URL`: Postgres DSN; presence selects store-backed mode
    /// - `POLLING_INTERVAL`: reconcile interval in seconds (default: 30)
    /// - `DISABLE_POLLING`: "true" disables the periodic reconciler
    /// - `OPENAPI_BASE_URL`: overrides every document's servers[0]
    /// - `TOOLGATE_BIND`: bind host (default: 0.0.0.0)
    /// - `PORT` / `TOOLGATE_PORT`: bind port (default: 8080)
    /// - `TOOLGATE_SPEC_DIR`: directory for file mode (default: ./specs)
    /// - `TOOLGATE_REQUEST_TIMEOUT_SECS`: upstream timeout (default: 240)
    /// - `TOOLGATE_RECONCILE_TIMEOUT_SECS`: reconcile I/O bound (default: 10)
    /// - `TOOLGATE_MAX_BODY_BYTES`: inbound body cap (default: 10 MiB)
    /// - `TOOLGATE_MAX_RESPONSE_BYTES`: upstream body cap (default: 8 MiB)
    /// - `TOOLGATE_CONFIRM_DANGEROUS`: "false" disables confirmation prompts
    /// - `TOOLGATE_FILTER_TAG`: only mount operations carrying this tag
    /// - `TOOLGATE_FILTER_INCLUDE` / `TOOLGATE_FILTER_EXCLUDE`: description regexes
    /// - `TOOLGATE_FILTER_OPERATIONS`: comma-separated operation-id allow-list
    /// - `TOOLGATE_SESSION_IDLE_SECS`: session idle timeout (default: 300)
    /// - `TOOLGATE_MAX_SESSIONS_PER_MOUNT`: session cap (default: 128)
    /// - `TOOLGATE_SHUTDOWN_GRACE_SECS`: drain window (default: 25)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            bind_host: std::env::var("TOOLGATE_BIND").unwrap_or(defaults.bind_host),
            bind_port: std::env::var("PORT")
                .ok()
                .or_else(|| std::env::var("TOOLGATE_PORT").ok())
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.bind_port),
            database_url: std::env::var("DATABASE_URL").ok().filter(|s| !s.is_empty()),
            spec_dir: std::env::var("TOOLGATE_SPEC_DIR").unwrap_or(defaults.spec_dir),
            polling_interval: env_secs("POLLING_INTERVAL", defaults.polling_interval),
            polling_disabled: std::env::var("DISABLE_POLLING")
                .map(|s| s.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            reconcile_timeout: env_secs(
                "TOOLGATE_RECONCILE_TIMEOUT_SECS",
                defaults.reconcile_timeout,
            ),
            base_url_override: std::env::var("OPENAPI_BASE_URL").ok().filter(|s| !s.is_empty()),
            request_timeout: env_secs("TOOLGATE_REQUEST_TIMEOUT_SECS", defaults.request_timeout),
            max_response_bytes: env_usize(
                "TOOLGATE_MAX_RESPONSE_BYTES",
                defaults.max_response_bytes,
            ),
            max_body_bytes: env_usize("TOOLGATE_MAX_BODY_BYTES", defaults.max_body_bytes),
            confirm_dangerous: std::env::var("TOOLGATE_CONFIRM_DANGEROUS")
                .map(|s| !s.eq_ignore_ascii_case("false"))
                .unwrap_or(true),
            filter_tag: std::env::var("TOOLGATE_FILTER_TAG").ok().filter(|s| !s.is_empty()),
            filter_include: std::env::var("TOOLGATE_FILTER_INCLUDE").ok().filter(|s| !s.is_empty()),
            filter_exclude: std::env::var("TOOLGATE_FILTER_EXCLUDE").ok().filter(|s| !s.is_empty()),
            filter_operations: std::env::var("TOOLGATE_FILTER_OPERATIONS")
                .ok()
                .filter(|s| !s.is_empty()),
            session_idle: env_secs("TOOLGATE_SESSION_IDLE_SECS", defaults.session_idle),
            max_sessions_per_mount: env_usize(
                "TOOLGATE_MAX_SESSIONS_PER_MOUNT",
                defaults.max_sessions_per_mount,
            ),
            shutdown_grace: env_secs("TOOLGATE_SHUTDOWN_GRACE_SECS", defaults.shutdown_grace),
        }
    }

    /// Whether the gateway runs against the persistent store.
    pub fn store_mode(&self) -> bool {
        self.database_url.is_some()
    }
}

fn env_secs(name: &str, default: Duration) -> Duration {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

fn env_usize(name: &str, default: usize) -> usize {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = GatewayConfig::default();
        assert_eq!(config.bind_port, 8080);
        assert_eq!(config.polling_interval, Duration::from_secs(30));
        assert!(!config.polling_disabled);
        assert_eq!(config.request_timeout, Duration::from_secs(240));
        assert_eq!(config.max_body_bytes, 10 * 1024 * 1024);
        assert!(config.confirm_dangerous);
        assert_eq!(config.shutdown_grace, Duration::from_secs(25));
        assert!(!config.store_mode());
    }

    #[test]
    fn test_store_mode() {
        let mut config = GatewayConfig::default();
        config.database_url = Some("postgres://localhost/toolgate".to_string());
        assert!(config.store_mode());
    }
}
