//! Immutable in-memory catalog shared by the crawler and compliance engine.

use crate::{
    definition::{
        ClassificationTables, CmpVendor, LanguageFile, LanguagePack, VendorFile,
        ViolationDefinition, ViolationFile,
    },
    error::{CatalogError, Result},
    loader::{
        CatalogLoader, CatalogSources, CLASSIFICATION_FILE, LANGUAGES_FILE, VENDORS_FILE,
        VIOLATIONS_FILE,
    },
};
use serde::de::DeserializeOwned;
use spectral_core::{CatalogConfig, ConsentAction};
use std::collections::{BTreeMap, HashSet};
use tracing::info;

/// Number of catalogued violation codes, `EU-C-001` through `EU-C-017`.
pub const VIOLATION_COUNT: u16 = 17;

/// Language used when detection finds no better match.
pub const DEFAULT_LANGUAGE: &str = "en";

/// Classification tables, language packs, CMP vendors and violation catalog.
///
/// Built once at startup and shared by reference (typically in an `Arc`);
/// there is no way to mutate it afterwards.
#[derive(Debug, Clone)]
pub struct Catalog {
    tables: ClassificationTables,
    languages: Vec<LanguagePack>,
    default_language: usize,
    vendors: Vec<CmpVendor>,
    violations: BTreeMap<String, ViolationDefinition>,
}

impl Catalog {
    /// The catalog compiled into the binary.
    ///
    /// # Errors
    /// Returns error if the embedded definitions are invalid.
    pub fn builtin() -> Result<Self> {
        Self::from_sources(&CatalogSources::builtin())
    }

    /// Build from configuration: the configured directory when set,
    /// otherwise the embedded definitions.
    ///
    /// # Errors
    /// Returns error if the directory is missing or a definition is invalid.
    pub fn from_config(config: &CatalogConfig) -> Result<Self> {
        match &config.definitions_dir {
            Some(dir) => Self::from_sources(&CatalogLoader::new(dir)?.load_sources()?),
            None => Self::builtin(),
        }
    }

    /// Parse and validate raw definition sources.
    ///
    /// # Errors
    /// Returns error if any file fails to parse or validate.
    pub fn from_sources(sources: &CatalogSources) -> Result<Self> {
        let tables: ClassificationTables =
            parse(sources, CLASSIFICATION_FILE, &sources.classification)?;
        let tables = tables.normalized();
        tables.validate()?;

        let languages = parse::<LanguageFile>(sources, LANGUAGES_FILE, &sources.languages)?
            .into_packs();
        let default_language = validate_languages(&languages)?;

        let vendors = parse::<VendorFile>(sources, VENDORS_FILE, &sources.vendors)?.vendor;
        for vendor in &vendors {
            vendor.validate()?;
        }

        let definitions =
            parse::<ViolationFile>(sources, VIOLATIONS_FILE, &sources.violations)?.violation;
        let violations = index_violations(definitions)?;

        info!(
            origin = %sources.origin,
            languages = languages.len(),
            vendors = vendors.len(),
            violations = violations.len(),
            "built consent catalog"
        );

        Ok(Self {
            tables,
            languages,
            default_language,
            vendors,
            violations,
        })
    }

    /// Classification tables.
    #[must_use]
    pub fn tables(&self) -> &ClassificationTables {
        &self.tables
    }

    /// All language packs in file order.
    #[must_use]
    pub fn languages(&self) -> &[LanguagePack] {
        &self.languages
    }

    /// Language pack for an ISO code.
    #[must_use]
    pub fn language(&self, code: &str) -> Option<&LanguagePack> {
        let code = code.to_lowercase();
        self.languages.iter().find(|pack| pack.code == code)
    }

    /// The English pack.
    #[must_use]
    pub fn default_language(&self) -> &LanguagePack {
        &self.languages[self.default_language]
    }

    /// CMP vendors in probing order.
    #[must_use]
    pub fn vendors(&self) -> &[CmpVendor] {
        &self.vendors
    }

    /// Button phrases for an action across every language.
    pub fn all_phrases(&self, action: ConsentAction) -> impl Iterator<Item = &str> {
        self.languages
            .iter()
            .flat_map(move |pack| pack.phrases(action))
            .map(String::as_str)
    }

    /// Negation markers across every language.
    pub fn negation_markers(&self) -> impl Iterator<Item = &str> {
        self.languages
            .iter()
            .flat_map(|pack| &pack.negations)
            .map(String::as_str)
    }

    /// Informational-link markers across every language.
    pub fn informational_markers(&self) -> impl Iterator<Item = &str> {
        self.languages
            .iter()
            .flat_map(|pack| &pack.informational)
            .map(String::as_str)
    }

    /// Look up a catalog entry by code.
    ///
    /// # Errors
    /// Returns error if the code is not catalogued.
    pub fn violation(&self, code: &str) -> Result<&ViolationDefinition> {
        self.violations
            .get(code)
            .ok_or_else(|| CatalogError::NotFound {
                item: code.to_string(),
            })
    }

    /// All catalog entries ordered by code.
    pub fn violations(&self) -> impl Iterator<Item = &ViolationDefinition> {
        self.violations.values()
    }
}

fn parse<T: DeserializeOwned>(sources: &CatalogSources, file: &str, text: &str) -> Result<T> {
    toml::from_str(text).map_err(|e| CatalogError::ParseError {
        path: sources.path_of(file),
        source: e,
    })
}

/// Validate the packs and return the index of the default language.
fn validate_languages(languages: &[LanguagePack]) -> Result<usize> {
    let mut seen = HashSet::new();
    for pack in languages {
        pack.validate()?;
        if !seen.insert(pack.code.as_str()) {
            return Err(CatalogError::invalid(&pack.code, "duplicate language code"));
        }
    }
    languages
        .iter()
        .position(|pack| pack.code == DEFAULT_LANGUAGE)
        .ok_or_else(|| {
            CatalogError::invalid(
                LANGUAGES_FILE,
                format!("the '{DEFAULT_LANGUAGE}' language pack is required"),
            )
        })
}

fn index_violations(
    definitions: Vec<ViolationDefinition>,
) -> Result<BTreeMap<String, ViolationDefinition>> {
    let expected: HashSet<String> = (1..=VIOLATION_COUNT)
        .map(|n| format!("EU-C-{n:03}"))
        .collect();

    let mut violations = BTreeMap::new();
    for definition in definitions {
        definition.validate()?;
        let code = definition.code.as_str().to_string();
        if !expected.contains(&code) {
            return Err(CatalogError::invalid(&code, "code is outside EU-C-001..017"));
        }
        if violations.insert(code.clone(), definition).is_some() {
            return Err(CatalogError::invalid(&code, "duplicate violation code"));
        }
    }

    if let Some(missing) = expected.iter().find(|code| !violations.contains_key(*code)) {
        return Err(CatalogError::invalid(missing, "violation code missing from catalog"));
    }

    Ok(violations)
}
