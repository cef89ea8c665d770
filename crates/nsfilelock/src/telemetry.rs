//! Structured telemetry initialisation for the command-line tools.

use std::io::{self, IsTerminal};

use once_cell::sync::OnceCell;
use strum::{Display, EnumString};
use tracing::{Subscriber, subscriber::SetGlobalDefaultError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;

static TELEMETRY_GUARD: OnceCell<()> = OnceCell::new();

/// Default filter expression applied when none is configured.
pub const DEFAULT_LOG_FILTER: &str = "info";

/// Supported logging output formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, EnumString, Display)]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum LogFormat {
    /// Structured JSON suitable for ingestion by logging stacks.
    Json,
    /// Human-readable single line output.
    #[default]
    Compact,
}

/// Handle returned when telemetry has been initialised.
#[derive(Debug, Default, Clone, Copy)]
pub struct TelemetryHandle;

/// Errors encountered while configuring telemetry.
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Failed to parse the configured log filter expression.
    #[error("invalid log filter: {0}")]
    Filter(String),
    /// Failed to install the tracing subscriber.
    #[error("failed to install telemetry subscriber: {0}")]
    Subscriber(SetGlobalDefaultError),
}

/// Installs a global subscriber writing to stderr the first time it is
/// called. Later calls return a handle without touching global state.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] for an unparsable filter expression
/// and [`TelemetryError::Subscriber`] when another subscriber is already
/// installed.
pub fn initialise(filter: &str, format: LogFormat) -> Result<TelemetryHandle, TelemetryError> {
    TELEMETRY_GUARD
        .get_or_try_init(|| install_subscriber(filter, format))
        .map(|_| TelemetryHandle)
}

fn install_subscriber(filter: &str, format: LogFormat) -> Result<(), TelemetryError> {
    let env_filter =
        EnvFilter::try_new(filter).map_err(|error| TelemetryError::Filter(error.to_string()))?;

    let builder = |selected: EnvFilter| {
        fmt::Subscriber::builder()
            .with_env_filter(selected)
            .with_target(true)
            .with_level(true)
            .with_writer(io::stderr)
            .with_ansi(io::stderr().is_terminal())
            .with_timer(fmt::time::UtcTime::rfc_3339())
    };

    let subscriber: Box<dyn Subscriber + Send + Sync> = match format {
        LogFormat::Json => Box::new(builder(env_filter).json().flatten_event(true).finish()),
        LogFormat::Compact => Box::new(builder(env_filter).compact().finish()),
    };

    tracing::subscriber::set_global_default(subscriber).map_err(TelemetryError::Subscriber)
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case("json", LogFormat::Json)]
    #[case("JSON", LogFormat::Json)]
    #[case("compact", LogFormat::Compact)]
    fn parses_log_formats(#[case] input: &str, #[case] expected: LogFormat) {
        assert_eq!(LogFormat::from_str(input).expect("known format"), expected);
    }

    #[test]
    fn rejects_unknown_format() {
        assert!(LogFormat::from_str("pretty").is_err());
    }

    #[test]
    fn default_format_is_compact() {
        assert_eq!(LogFormat::default(), LogFormat::Compact);
        assert_eq!(LogFormat::default().to_string(), "compact");
    }

    #[test]
    fn invalid_filter_is_reported() {
        let error = install_subscriber("nsfilelock=notalevel", LogFormat::Compact)
            .expect_err("filter should be rejected");
        assert!(matches!(error, TelemetryError::Filter(_)));
    }
}
