use thiserror::Error;

/// Error types for compliance assessment.
#[derive(Debug, Error)]
pub enum ComplianceError {
    /// The catalog lacks an entry a rule reports.
    #[error("Catalog error: {0}")]
    Catalog(#[from] spectral_catalog::CatalogError),

    /// Report serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for compliance operations.
pub type Result<T> = std::result::Result<T, ComplianceError>;
