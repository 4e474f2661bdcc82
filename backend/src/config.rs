//! Configuration management for the Poultry Lot Management Platform
//!
//! Supports hierarchical configuration loading:
//! 1. Default values in code
//! 2. Configuration files (development.toml, production.toml)
//! 3. Environment variable overrides with PLM__ prefix

use config::{ConfigError, Environment, File};
use serde::Deserialize;

/// Main application configuration
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    /// Current environment (development, production)
    pub environment: String,

    pub server: ServerConfig,

    pub database: DatabaseConfig,

    /// JWT verification configuration
    pub jwt: JwtConfig,

    pub logging: LoggingConfig,

    /// Financial rollup defaults
    pub finance: FinanceConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in the pool
    pub max_connections: u32,

    /// Minimum number of connections in the pool
    pub min_connections: u32,

    /// Seconds to wait for a pooled connection
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    /// Secret the issuing service signs tokens with
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    /// `pretty` or `json`
    pub format: String,

    /// Filter directives used when RUST_LOG is unset
    pub filter: String,
}

impl LoggingConfig {
    pub fn is_json(&self) -> bool {
        self.format.eq_ignore_ascii_case("json")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct FinanceConfig {
    /// Months in a monthly series when the caller gives none
    pub default_series_months: u32,

    /// Upper bound on requested series length
    pub max_series_months: u32,
}

impl FinanceConfig {
    /// Requested series length, defaulted and capped
    pub fn series_months(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_series_months)
            .clamp(1, self.max_series_months)
    }
}

impl Config {
    /// Load configuration from files and environment variables
    pub fn load() -> Result<Self, ConfigError> {
        let environment = std::env::var("PLM_ENVIRONMENT").unwrap_or_else(|_| "development".into());

        let config = config::Config::builder()
            // Start with default values
            .set_default("environment", environment.clone())?
            .set_default("server.port", 3000)?
            .set_default("server.host", "0.0.0.0")?
            .set_default("database.max_connections", 10)?
            .set_default("database.min_connections", 2)?
            .set_default("database.acquire_timeout_secs", 30)?
            .set_default("logging.format", "pretty")?
            .set_default("logging.filter", "plm_server=debug,tower_http=debug,sqlx=warn")?
            .set_default("finance.default_series_months", 12)?
            .set_default("finance.max_series_months", 24)?
            // Load environment-specific config file
            .add_source(File::with_name(&format!("config/{}", environment)).required(false))
            // Override with environment variables (PLM__SECTION__KEY)
            .add_source(
                Environment::with_prefix("PLM")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 3000,
            host: "0.0.0.0".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_months_defaults_and_caps() {
        let finance = FinanceConfig {
            default_series_months: 12,
            max_series_months: 24,
        };
        assert_eq!(finance.series_months(None), 12);
        assert_eq!(finance.series_months(Some(6)), 6);
        assert_eq!(finance.series_months(Some(60)), 24);
        assert_eq!(finance.series_months(Some(0)), 1);
    }
}
