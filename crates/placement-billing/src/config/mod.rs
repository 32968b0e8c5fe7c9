use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

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
    pub billing: BillingConfig,
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
            billing: BillingConfig::from_env()?,
        })
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

/// Month offsets from placement start at which a health check is due.
pub const HEALTH_CHECK_MILESTONES: [u32; 3] = [6, 18, 30];

/// Fee rates feeding the plan generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BillingConfig {
    /// Residence permit fee charged per year of required validity.
    pub arc_fee_per_year: Decimal,
    pub health_check_fee: Decimal,
    /// Placement length assumed when a deployment has no end date.
    pub default_placement_months: u32,
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            arc_fee_per_year: dec!(1000),
            health_check_fee: dec!(1500),
            default_placement_months: 36,
        }
    }
}

impl BillingConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let arc_fee_per_year =
            amount_from_env("BILLING_ARC_FEE_PER_YEAR", defaults.arc_fee_per_year)?;
        let health_check_fee =
            amount_from_env("BILLING_HEALTH_CHECK_FEE", defaults.health_check_fee)?;
        let default_placement_months = match env::var("BILLING_DEFAULT_PLACEMENT_MONTHS") {
            Ok(raw) => match raw.trim().parse::<u32>() {
                Ok(months) if months > 0 => months,
                _ => return Err(ConfigError::InvalidMonths),
            },
            Err(_) => defaults.default_placement_months,
        };

        Ok(Self {
            arc_fee_per_year,
            health_check_fee,
            default_placement_months,
        })
    }
}

fn amount_from_env(key: &'static str, default: Decimal) -> Result<Decimal, ConfigError> {
    match env::var(key) {
        Ok(raw) => match Decimal::from_str(raw.trim()) {
            Ok(amount) if amount >= Decimal::ZERO => Ok(amount),
            _ => Err(ConfigError::InvalidAmount { key }),
        },
        Err(_) => Ok(default),
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidAmount { key: &'static str },
    InvalidMonths,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidAmount { key } => {
                write!(f, "{key} must be a non-negative decimal amount")
            }
            ConfigError::InvalidMonths => {
                write!(f, "BILLING_DEFAULT_PLACEMENT_MONTHS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidAmount { .. }
            | ConfigError::InvalidMonths => None,
        }
    }
}
