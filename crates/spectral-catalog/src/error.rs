//! Error types for the catalog subsystem.

use thiserror::Error;

/// Errors that can occur while loading or querying the catalog.
#[derive(Error, Debug)]
pub enum CatalogError {
    /// Requested catalog entry does not exist
    #[error("catalog entry not found: {item}")]
    NotFound {
        /// Code or name that was looked up
        item: String,
    },

    /// Failed to read a definition file
    #[error("failed to load definitions from {path}: {source}")]
    LoadError {
        /// Path to the definition file
        path: String,
        /// Underlying error
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Failed to parse a definition file
    #[error("failed to parse definitions TOML in {path}: {source}")]
    ParseError {
        /// Path to the definition file
        path: String,
        /// TOML parse error
        #[source]
        source: toml::de::Error,
    },

    /// A definition failed validation
    #[error("invalid definition for {item}: {reason}")]
    ValidationError {
        /// Entry being validated
        item: String,
        /// Reason for validation failure
        reason: String,
    },

    /// Definitions directory not found
    #[error("consent definitions directory not found at {path}")]
    DirectoryNotFound {
        /// Expected directory path
        path: String,
    },

    /// I/O error while accessing definitions
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CatalogError {
    pub(crate) fn invalid(item: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ValidationError {
            item: item.into(),
            reason: reason.into(),
        }
    }
}

impl From<CatalogError> for spectral_core::SpectralError {
    fn from(err: CatalogError) -> Self {
        Self::Catalog(err.to_string())
    }
}

/// Result type for catalog operations.
pub type Result<T> = std::result::Result<T, CatalogError>;
