//! Definition loading from TOML files.
//!
//! The embedded copies of `consent-definitions/` are always available. A
//! [`CatalogLoader`] reads an override directory; any of the four files it
//! lacks falls back to the embedded copy.

use crate::error::{CatalogError, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Classification tables file name.
pub const CLASSIFICATION_FILE: &str = "classification.toml";
/// Language packs file name.
pub const LANGUAGES_FILE: &str = "languages.toml";
/// CMP vendors file name.
pub const VENDORS_FILE: &str = "vendors.toml";
/// Violation catalog file name.
pub const VIOLATIONS_FILE: &str = "violations.toml";

const BUILTIN_CLASSIFICATION: &str =
    include_str!("../../../consent-definitions/classification.toml");
const BUILTIN_LANGUAGES: &str = include_str!("../../../consent-definitions/languages.toml");
const BUILTIN_VENDORS: &str = include_str!("../../../consent-definitions/vendors.toml");
const BUILTIN_VIOLATIONS: &str = include_str!("../../../consent-definitions/violations.toml");

/// Raw TOML text of the four definition files plus where it came from.
#[derive(Debug, Clone)]
pub struct CatalogSources {
    /// Label used in error messages (`builtin` or the directory path)
    pub origin: String,
    /// `classification.toml`
    pub classification: String,
    /// `languages.toml`
    pub languages: String,
    /// `vendors.toml`
    pub vendors: String,
    /// `violations.toml`
    pub violations: String,
}

impl CatalogSources {
    /// The definitions compiled into the binary.
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            origin: "builtin".to_string(),
            classification: BUILTIN_CLASSIFICATION.to_string(),
            languages: BUILTIN_LANGUAGES.to_string(),
            vendors: BUILTIN_VENDORS.to_string(),
            violations: BUILTIN_VIOLATIONS.to_string(),
        }
    }

    pub(crate) fn path_of(&self, file: &str) -> String {
        format!("{}/{file}", self.origin)
    }
}

/// Loader for definition files in a directory.
pub struct CatalogLoader {
    /// Directory containing the definition files
    definitions_dir: PathBuf,
}

impl CatalogLoader {
    /// Create a new loader with the given definitions directory.
    ///
    /// # Errors
    /// Returns error if the directory doesn't exist.
    pub fn new(definitions_dir: impl Into<PathBuf>) -> Result<Self> {
        let definitions_dir = definitions_dir.into();

        if !definitions_dir.is_dir() {
            return Err(CatalogError::DirectoryNotFound {
                path: definitions_dir.display().to_string(),
            });
        }

        Ok(Self { definitions_dir })
    }

    /// Create a loader using `consent-definitions/` at the workspace root.
    ///
    /// # Errors
    /// Returns error if the default directory doesn't exist.
    pub fn with_default_dir() -> Result<Self> {
        let mut current_dir = std::env::current_dir()?;

        loop {
            let cargo_toml = current_dir.join("Cargo.toml");
            if let Ok(contents) = std::fs::read_to_string(&cargo_toml) {
                if contents.contains("[workspace]") {
                    return Self::new(current_dir.join("consent-definitions"));
                }
            }

            match current_dir.parent() {
                Some(parent) => current_dir = parent.to_path_buf(),
                None => break,
            }
        }

        Self::new("consent-definitions")
    }

    /// Directory this loader reads from.
    #[must_use]
    pub fn definitions_dir(&self) -> &Path {
        &self.definitions_dir
    }

    /// Read the definition files, using embedded copies for missing ones.
    ///
    /// # Errors
    /// Returns error if a present file can't be read.
    pub fn load_sources(&self) -> Result<CatalogSources> {
        let builtin = CatalogSources::builtin();
        let sources = CatalogSources {
            origin: self.definitions_dir.display().to_string(),
            classification: self.read_or(CLASSIFICATION_FILE, builtin.classification)?,
            languages: self.read_or(LANGUAGES_FILE, builtin.languages)?,
            vendors: self.read_or(VENDORS_FILE, builtin.vendors)?,
            violations: self.read_or(VIOLATIONS_FILE, builtin.violations)?,
        };

        info!(dir = %self.definitions_dir.display(), "loaded consent definitions");
        Ok(sources)
    }

    fn read_or(&self, file: &str, fallback: String) -> Result<String> {
        let path = self.definitions_dir.join(file);
        if !path.is_file() {
            debug!(path = %path.display(), "definition file absent, using embedded copy");
            return Ok(fallback);
        }

        std::fs::read_to_string(&path).map_err(|e| CatalogError::LoadError {
            path: path.display().to_string(),
            source: Box::new(e),
        })
    }
}
