//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (semantic checks)
//!     → CommonsConfig (validated, immutable)
//!     → client / server / observability built from its sections
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    CacheConfig, ClientConfig, CommonsConfig, NegotiationConfig, ObservabilityConfig,
    RetryConfig, ServerConfig,
};
pub use validation::{validate_config, ValidationError};
