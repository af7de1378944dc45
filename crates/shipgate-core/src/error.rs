//! Error types for configuration loading.
//!
//! Each functional module defines its own error enum next to the code that
//! raises it (`remote`, `origin`, `github`, `contributors`, `store`,
//! `decision`).

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
