use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::workflows::audit::{CatalogSettings, FiscalParameters};

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

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub audit: AuditConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            audit: AuditConfig::from_env()?,
        })
    }
}

/// Session storage and fiscal parameters of the audit engine.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditConfig {
    /// JSON-lines session file; sessions stay in memory when unset.
    pub store_path: Option<PathBuf>,
    pub store_capacity: usize,
    pub fiscal: FiscalParameters,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            store_path: None,
            store_capacity: 500,
            fiscal: FiscalParameters::default(),
        }
    }
}

impl AuditConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let store_path = env::var("AUDIT_STORE_PATH")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);

        let store_capacity = match env::var("AUDIT_STORE_CAPACITY") {
            Ok(value) => value
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|capacity| *capacity > 0)
                .ok_or(ConfigError::InvalidCapacity { value })?,
            Err(_) => defaults.store_capacity,
        };

        let mut fiscal = defaults.fiscal;
        fiscal.corporate_tax_rate =
            decimal_var("AUDIT_CORPORATE_TAX_RATE", fiscal.corporate_tax_rate)?;
        fiscal.minimum_tax_rate = decimal_var("AUDIT_MINIMUM_TAX_RATE", fiscal.minimum_tax_rate)?;
        fiscal.minimum_tax_floor =
            decimal_var("AUDIT_MINIMUM_TAX_FLOOR", fiscal.minimum_tax_floor)?;

        Ok(Self {
            store_path,
            store_capacity,
            fiscal,
        })
    }

    pub fn catalog_settings(&self) -> CatalogSettings {
        CatalogSettings {
            fiscal: self.fiscal.clone(),
        }
    }
}

fn decimal_var(name: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    match env::var(name) {
        Ok(value) => match Decimal::from_str(value.trim()) {
            Ok(parsed) if parsed >= Decimal::ZERO => Ok(parsed),
            _ => Err(ConfigError::InvalidDecimal { name, value }),
        },
        Err(_) => Ok(default),
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidCapacity { value: String },
    InvalidDecimal { name: &'static str, value: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidCapacity { value } => {
                write!(f, "AUDIT_STORE_CAPACITY must be a positive integer, got '{value}'")
            }
            ConfigError::InvalidDecimal { name, value } => {
                write!(f, "{name} must be a non-negative decimal, got '{value}'")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidCapacity { .. }
            | ConfigError::InvalidDecimal { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::{Mutex, OnceLock};

    fn env_guard() -> &'static Mutex<()> {
        static GUARD: OnceLock<Mutex<()>> = OnceLock::new();
        GUARD.get_or_init(|| Mutex::new(()))
    }

    fn reset_env() {
        env::remove_var("APP_ENV");
        env::remove_var("APP_HOST");
        env::remove_var("APP_PORT");
        env::remove_var("APP_LOG_LEVEL");
        env::remove_var("AUDIT_STORE_PATH");
        env::remove_var("AUDIT_STORE_CAPACITY");
        env::remove_var("AUDIT_CORPORATE_TAX_RATE");
        env::remove_var("AUDIT_MINIMUM_TAX_RATE");
        env::remove_var("AUDIT_MINIMUM_TAX_FLOOR");
    }

    #[test]
    fn load_uses_defaults_when_env_missing() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        let config = AppConfig::load().expect("config loads with defaults");
        assert_eq!(config.environment, AppEnvironment::Development);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 3000);
        assert_eq!(config.telemetry.log_level, "info");
        assert_eq!(config.audit, AuditConfig::default());
        assert_eq!(config.audit.store_capacity, 500);
    }

    #[test]
    fn accepts_localhost_host() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("APP_HOST", "localhost");
        let config = AppConfig::load().expect("config loads");
        let addr = config.server.socket_addr().expect("localhost resolves");
        assert_eq!(addr, SocketAddr::new(IpAddr::from([127, 0, 0, 1]), 3000));
    }

    #[test]
    fn reads_audit_store_and_tax_overrides() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("AUDIT_STORE_PATH", "/tmp/balance-audit/sessions.jsonl");
        env::set_var("AUDIT_STORE_CAPACITY", "50");
        env::set_var("AUDIT_CORPORATE_TAX_RATE", "0.30");
        env::set_var("AUDIT_MINIMUM_TAX_FLOOR", "1000000");
        let config = AppConfig::load().expect("config loads");
        reset_env();

        assert_eq!(
            config.audit.store_path,
            Some(PathBuf::from("/tmp/balance-audit/sessions.jsonl"))
        );
        assert_eq!(config.audit.store_capacity, 50);
        assert_eq!(
            config.audit.fiscal.corporate_tax_rate,
            rust_decimal_macros::dec!(0.30)
        );
        assert_eq!(
            config.audit.fiscal.minimum_tax_floor,
            rust_decimal_macros::dec!(1000000)
        );
        assert_eq!(
            config.audit.fiscal.minimum_tax_rate,
            rust_decimal_macros::dec!(0.005)
        );
        assert_eq!(
            config.audit.catalog_settings().fiscal,
            config.audit.fiscal
        );
    }

    #[test]
    fn rejects_invalid_audit_values() {
        let _lock = env_guard().lock().expect("env mutex poisoned");
        reset_env();
        env::set_var("AUDIT_STORE_CAPACITY", "0");
        let capacity = AppConfig::load();
        reset_env();
        env::set_var("AUDIT_MINIMUM_TAX_RATE", "half");
        let rate = AppConfig::load();
        reset_env();

        assert!(matches!(
            capacity,
            Err(ConfigError::InvalidCapacity { .. })
        ));
        match rate {
            Err(ConfigError::InvalidDecimal { name, value }) => {
                assert_eq!(name, "AUDIT_MINIMUM_TAX_RATE");
                assert_eq!(value, "half");
            }
            other => panic!("expected decimal error, got {other:?}"),
        }
    }
}
