//! Errors shared by every Spectral crate.
//!
//! Browser, catalog and crawl failures have their own enums in their crates
//! and flatten into [`SpectralError`] at crate boundaries.

use thiserror::Error;

/// Error shared across crates: configuration, evidence validation and flattened subsystem errors.
#[derive(Error, Debug)]
pub enum SpectralError {
    /// Configuration errors (file loading, parsing, validation)
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Definitions catalog failure, converted from `spectral-catalog`
    #[error("catalog error: {0}")]
    Catalog(String),

    /// Browser driver failure, converted from `spectral-browser`
    #[error("browser error: {0}")]
    Browser(String),

    /// Crawl sequencing errors
    #[error("crawl error: {0}")]
    Crawl(String),

    /// Evidence that breaks the stage-order or banner placement rules
    #[error("validation error: {0}")]
    Validation(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to determine config directory path
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Failed to parse TOML
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize config
    #[error("failed to serialize config: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// I/O error reading/writing config
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid configuration value
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Field name
        field: String,
        /// Reason for invalidity
        reason: String,
    },
}

/// Result type alias using `SpectralError`.
pub type Result<T> = std::result::Result<T, SpectralError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
