use crate::config::TelemetryConfig;
use std::fmt;
use tracing_subscriber::filter::ParseError;
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
pub enum TelemetryError {
    EnvFilter { value: String, source: ParseError },
    Subscriber(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryError::EnvFilter { value, .. } => {
                write!(
                    f,
                    "invalid log level/filter '{}': unable to build EnvFilter",
                    value
                )
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

const BILLING_TARGETS: [&str; 2] = ["placement_billing", "placement_billing_api"];

/// A bare level applies to the billing crates only; dependencies stay at `warn`.
/// Anything that already names targets is passed through untouched.
pub fn filter_directives(log_level: &str) -> String {
    let level = log_level.trim();
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    let mut directives = vec!["warn".to_string()];
    directives.extend(BILLING_TARGETS.iter().map(|target| format!("{target}={level}")));
    directives.join(",")
}

/// Installs the global subscriber. `RUST_LOG` wins over the configured level.
pub fn init(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(filter_directives(&config.log_level)).map_err(|source| {
            TelemetryError::EnvFilter {
                value: config.log_level.clone(),
                source,
            }
        })?,
    };

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .compact()
        .with_ansi(false)
        .try_init()
        .map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_level_is_scoped_to_billing_crates() {
        assert_eq!(
            filter_directives(" debug "),
            "warn,placement_billing=debug,placement_billing_api=debug"
        );
        assert_eq!(filter_directives("info,tower_http=debug"), "info,tower_http=debug");
        assert!(EnvFilter::try_new(filter_directives("info")).is_ok());
    }

    #[test]
    fn malformed_filter_is_reported_with_value() {
        if std::env::var("RUST_LOG").is_ok() {
            return;
        }
        let config = TelemetryConfig {
            log_level: "placement_billing=verbose".to_string(),
        };
        match init(&config) {
            Err(TelemetryError::EnvFilter { value, .. }) => assert_eq!(value, config.log_level),
            other => panic!("expected env filter error, got {other:?}"),
        }
    }
}
