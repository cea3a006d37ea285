//! Spectral Core - Foundation crate for the Spectral consent auditor.
//!
//! This crate provides shared types, error handling, configuration management,
//! and the evidence data model that all other Spectral crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`AuditId`, `ViolationCode`, `StageName`, `Severity`)
//! - [`evidence`] - Snapshots, banner analysis and the ordered evidence package
//!
//! # Example
//!
//! ```rust
//! use spectral_core::{AppConfig, EvidencePackage, StageName};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! assert_eq!(config.scanning.concurrent_sites, 1);
//!
//! let package = EvidencePackage::new("https://example.com", "example.com");
//! assert!(package.stage(StageName::PreConsent).is_none());
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod evidence;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, BrowserConfig, CatalogConfig, CrawlConfig, ScanningConfig};
pub use error::{ConfigError, ConfigResult, Result, SpectralError};
pub use evidence::{
    BannerAnalysis, BannerStyle, Classification, ClassificationCounts, CookieRecord,
    EvidencePackage, EvidenceSnapshot, EvidenceStage, ScriptHint, ScriptRef, StageMetrics,
};
pub use types::{AuditId, ConsentAction, Severity, StageName, Timestamp, ViolationCode};
