//! Error types for the Inkbase core library.

use thiserror::Error;

/// Result type alias using the Inkbase core Error.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for Inkbase configuration and setup.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error (missing file, bad value, unknown tenant)
    #[error("Configuration error: {0}")]
    Config(String),

    /// TOML parsing error
    #[error("Failed to parse config: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
