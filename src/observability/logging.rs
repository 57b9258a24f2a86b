//! Structured logging setup.
//!
//! `RUST_LOG` overrides the configured level. JSON output for production,
//! human-readable output for development.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::ObservabilityConfig;

/// Install the global tracing subscriber.
///
/// Returns false if a subscriber was already installed.
pub fn init_logging(config: &ObservabilityConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(&config.log_level)));

    let json = config.json_logs;
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| tracing_subscriber::fmt::layer().json().with_current_span(false)))
        .with((!json).then(tracing_subscriber::fmt::layer))
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(
            app = env!("CARGO_PKG_NAME"),
            version = env!("CARGO_PKG_VERSION"),
            json_output = json,
            log_level = %config.log_level,
            "logging_initialized"
        );
    }
    installed
}

fn default_directives(level: &str) -> String {
    format!("commons_http={level},tower_http={level},warn")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directives_parse() {
        let directives = default_directives("debug");
        assert!(directives.starts_with("commons_http=debug"));
        assert!(EnvFilter::try_new(&directives).is_ok());
    }
}
