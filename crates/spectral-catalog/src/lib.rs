//! Spectral Catalog - immutable consent audit definitions.
//!
//! This crate owns the static data the crawler and the compliance engine
//! share: classification tables, per-language consent phrases, CMP vendor
//! definitions and the `EU-C-001`..`EU-C-017` violation catalog.
//!
//! # Architecture
//!
//! - **Definition Types** ([`definition`]): Strongly-typed TOML shapes and their validation
//! - **Loader** ([`loader`]): Embedded definitions and directory overrides
//! - **Registry** ([`registry`]): The validated, read-only [`Catalog`]
//! - **Errors** ([`error`]): Catalog-specific error types
//!
//! # Example
//!
//! ```rust
//! use spectral_catalog::Catalog;
//! use spectral_core::Severity;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let catalog = Catalog::builtin()?;
//!
//! let definition = catalog.violation("EU-C-004")?;
//! assert_eq!(definition.severity, Severity::Critical);
//! println!("{}: {}", definition.code, definition.title);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod loader;
pub mod registry;

// Re-export commonly used types
pub use definition::{
    ClassificationTables, CmpVendor, LanguagePack, NativeCall, ViolationDefinition,
};
pub use error::{CatalogError, Result};
pub use loader::{CatalogLoader, CatalogSources};
pub use registry::{Catalog, DEFAULT_LANGUAGE};
