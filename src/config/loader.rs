//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::CommonsConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<CommonsConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration from TOML text.
pub fn parse_config(content: &str) -> Result<CommonsConfig, ConfigError> {
    let config: CommonsConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid() {
        let config = parse_config("[cache]\nttl_secs = 5\n").unwrap();
        assert_eq!(config.cache.ttl_secs, 5);
    }

    #[test]
    fn test_huge_ttl_is_usable_by_the_cache() {
        use crate::cache::{CacheKey, ResponseCache};
        use std::time::Duration;

        let config = parse_config("[cache]\nttl_secs = 9223372036854775807\n").unwrap();
        let cache = ResponseCache::new(Duration::from_secs(config.cache.ttl_secs), 4);
        let key = CacheKey::new("GET", "https://api.example.ch/a", None::<(&str, &str)>);
        let entry = cache.entry(key.clone(), 200, Default::default(), bytes::Bytes::from_static(b"{}"));
        cache.put(key.clone(), entry);
        assert!(cache.get(&key).is_some());
    }

    #[test]
    fn test_parse_error() {
        let err = parse_config("[cache\n").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validation_error_display() {
        let err = parse_config("[retries]\nmax_attempts = 0\n").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation failed: retries.max_attempts: must be at least 1"
        );
    }

    #[test]
    fn test_missing_file() {
        let err = load_config(Path::new("/nonexistent/commons.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io(_)));
    }
}
