//! Runtime configuration
//!
//! Layered via figment: built-in defaults, an optional `Config.toml`, then
//! `VERIFIER_`-prefixed environment variables (double underscore separates
//! nesting, e.g. `VERIFIER_SERVER__PORT=8080`).

use serde::{Deserialize, Serialize};
use verify_core::{EngineConfig, LimitsConfig};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub engine: EngineConfig,
    pub limits: LimitsConfig,
    pub observability: ObservabilityConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Emit JSON structured logs instead of the human-readable format
    pub json_logs: bool,
    pub log_level: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            json_logs: false,
            log_level: "info".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_operational_values() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.limits.max_batch_size, 500);
        assert_eq!(config.engine.dns_concurrency, 20);
        assert_eq!(config.engine.smtp_port, 25);
        assert!(!config.observability.json_logs);
    }
}
