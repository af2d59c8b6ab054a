//! Structured logging initialization.

use crate::error::{TelemetryError, TelemetryResult};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize logging with the default filter (`info`, engine at `debug`).
///
/// JSON output when `RUST_ENV=production`, compact human-readable output
/// otherwise. `RUST_LOG` overrides the filter as usual.
pub fn init_logging() -> TelemetryResult<()> {
    init_logging_with("info,posboard=debug")
}

/// Initialize logging with an explicit fallback filter directive.
///
/// Fails if a global subscriber is already installed.
pub fn init_logging_with(default_filter: &str) -> TelemetryResult<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    let json_output = std::env::var("RUST_ENV")
        .map(|v| v == "production")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if json_output {
        registry
            .with(fmt::layer().json().with_current_span(true))
            .try_init()
    } else {
        registry
            .with(fmt::layer().compact().with_target(true))
            .try_init()
    };

    result.map_err(|e| TelemetryError::Init(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        assert!(init_logging().is_ok());

        let err = init_logging_with("debug").unwrap_err();
        assert!(matches!(err, crate::error::TelemetryError::Init(_)));
    }
}
