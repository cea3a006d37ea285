//! Definition types loaded from the `consent-definitions/` TOML files.
//!
//! Each file maps onto one wrapper struct ([`LanguageFile`], [`VendorFile`],
//! [`ViolationFile`]) or directly onto [`ClassificationTables`].

use crate::error::{CatalogError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use spectral_core::{ConsentAction, Severity, ViolationCode};
use std::sync::OnceLock;

/// Keyword tables used to classify scripts, cookies and storage.
///
/// Entries are lowercased by [`ClassificationTables::normalized`]; callers
/// lowercase the value being matched.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassificationTables {
    /// Script or cookie domains of analytics, advertising and replay vendors
    pub tracking_domains: Vec<String>,

    /// Domains of CMPs, CDNs, payment and bot-protection services
    pub necessary_domains: Vec<String>,

    /// Cookie name prefixes that always mean tracking
    #[serde(default)]
    pub tracking_cookie_prefixes: Vec<String>,

    /// Cookie name fragments of essential cookies
    #[serde(default)]
    pub essential_cookie_patterns: Vec<String>,

    /// Storage key fragments of tracking data
    #[serde(default)]
    pub tracking_storage_keywords: Vec<String>,

    /// Storage key fragments of essential data
    #[serde(default)]
    pub essential_storage_keywords: Vec<String>,

    /// Image source fragments of tracking pixels
    #[serde(default)]
    pub pixel_keywords: Vec<String>,

    /// Script source fragments that mark a script as third-party
    #[serde(default)]
    pub marketing_script_keywords: Vec<String>,
}

impl ClassificationTables {
    /// Lowercase and trim every entry, dropping empty ones.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        for list in [
            &mut self.tracking_domains,
            &mut self.necessary_domains,
            &mut self.tracking_cookie_prefixes,
            &mut self.essential_cookie_patterns,
            &mut self.tracking_storage_keywords,
            &mut self.essential_storage_keywords,
            &mut self.pixel_keywords,
            &mut self.marketing_script_keywords,
        ] {
            *list = list
                .iter()
                .map(|entry| entry.trim().to_lowercase())
                .filter(|entry| !entry.is_empty())
                .collect();
        }
        self
    }

    /// Validate that the domain tables are populated.
    pub fn validate(&self) -> Result<()> {
        if self.tracking_domains.is_empty() {
            return Err(CatalogError::invalid(
                "classification",
                "tracking_domains cannot be empty",
            ));
        }
        if self.necessary_domains.is_empty() {
            return Err(CatalogError::invalid(
                "classification",
                "necessary_domains cannot be empty",
            ));
        }
        Ok(())
    }
}

/// Phrases and detection hints for one page language.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguagePack {
    /// ISO 639-1 code, e.g. `de`
    pub code: String,

    /// English name of the language
    pub name: String,

    /// Privacy and cookie vocabulary, weight 3 during detection
    #[serde(default)]
    pub privacy_terms: Vec<String>,

    /// Consent action vocabulary, weight 2 during detection
    #[serde(default)]
    pub action_terms: Vec<String>,

    /// General site vocabulary, weight 1 during detection
    #[serde(default)]
    pub generic_terms: Vec<String>,

    /// Accept button labels
    pub accept: Vec<String>,

    /// Reject button labels
    pub reject: Vec<String>,

    /// Settings button labels
    #[serde(default)]
    pub settings: Vec<String>,

    /// Words that turn a label into its negation ("without", "sans", ...)
    #[serde(default)]
    pub negations: Vec<String>,

    /// Fragments of "more information" style links
    #[serde(default)]
    pub informational: Vec<String>,
}

impl LanguagePack {
    /// Button labels for an action.
    #[must_use]
    pub fn phrases(&self, action: ConsentAction) -> &[String] {
        match action {
            ConsentAction::Accept => &self.accept,
            ConsentAction::Reject => &self.reject,
            ConsentAction::Settings => &self.settings,
        }
    }

    /// Detection hints paired with their weight.
    pub fn weighted_hints(&self) -> impl Iterator<Item = (&str, usize)> {
        fn weighted(terms: &[String], weight: usize) -> impl Iterator<Item = (&str, usize)> {
            terms.iter().map(move |term| (term.as_str(), weight))
        }
        weighted(&self.privacy_terms, 3)
            .chain(weighted(&self.action_terms, 2))
            .chain(weighted(&self.generic_terms, 1))
    }

    fn lowercase(mut self) -> Self {
        for list in [
            &mut self.privacy_terms,
            &mut self.action_terms,
            &mut self.generic_terms,
            &mut self.accept,
            &mut self.reject,
            &mut self.settings,
            &mut self.negations,
            &mut self.informational,
        ] {
            *list = list.iter().map(|entry| entry.trim().to_lowercase()).collect();
        }
        self.code = self.code.trim().to_lowercase();
        self
    }

    /// Validate that the pack can drive accept and reject matching.
    pub fn validate(&self) -> Result<()> {
        if self.code.is_empty() {
            return Err(CatalogError::invalid(&self.name, "language code cannot be empty"));
        }
        if self.accept.is_empty() || self.reject.is_empty() {
            return Err(CatalogError::invalid(
                &self.code,
                "language needs accept and reject phrases",
            ));
        }
        if self
            .accept
            .iter()
            .chain(&self.reject)
            .chain(&self.settings)
            .any(String::is_empty)
        {
            return Err(CatalogError::invalid(&self.code, "empty button phrase"));
        }
        Ok(())
    }
}

/// A documented function on a CMP's global control object.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NativeCall {
    /// Action the call performs
    pub action: ConsentAction,

    /// Global object path, e.g. `OneTrust` or `UC_UI`
    pub object: String,

    /// Method path below the object, e.g. `RejectAll` or `preferences.show`
    pub method: String,

    /// JSON array of call arguments
    #[serde(default = "default_args")]
    pub args: String,
}

fn default_args() -> String {
    "[]".to_string()
}

fn identifier_path_regex() -> &'static Regex {
    static PATH_REGEX: OnceLock<Regex> = OnceLock::new();
    PATH_REGEX.get_or_init(|| {
        Regex::new(r"^[A-Za-z_$][A-Za-z0-9_$]*(\.[A-Za-z_$][A-Za-z0-9_$]*)*$")
            .expect("valid regex")
    })
}

impl NativeCall {
    /// Full dotted path of the function, `object.method`.
    #[must_use]
    pub fn path(&self) -> String {
        format!("{}.{}", self.object, self.method)
    }

    /// Parsed call arguments.
    pub fn arguments(&self) -> Result<Vec<serde_json::Value>> {
        serde_json::from_str(&self.args).map_err(|e| {
            CatalogError::invalid(self.path(), format!("args must be a JSON array: {e}"))
        })
    }

    fn validate(&self, vendor: &str) -> Result<()> {
        let regex = identifier_path_regex();
        if !regex.is_match(&self.object) || !regex.is_match(&self.method) {
            return Err(CatalogError::invalid(
                vendor,
                format!("native call '{}' is not an identifier path", self.path()),
            ));
        }
        self.arguments().map(|_| ())
    }
}

/// A consent management platform and how to drive it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CmpVendor {
    /// Display name, also reported as the banner provider
    pub name: String,

    /// Selectors identifying the vendor's banner
    pub banner_selectors: Vec<String>,

    /// Accept button selectors, in probing order
    #[serde(default)]
    pub accept_selectors: Vec<String>,

    /// Reject button selectors, in probing order
    #[serde(default)]
    pub reject_selectors: Vec<String>,

    /// Settings button selectors, in probing order
    #[serde(default)]
    pub settings_selectors: Vec<String>,

    /// Native API calls, in invocation order
    #[serde(default)]
    pub native: Vec<NativeCall>,
}

impl CmpVendor {
    /// Click selectors for an action.
    #[must_use]
    pub fn selectors(&self, action: ConsentAction) -> &[String] {
        match action {
            ConsentAction::Accept => &self.accept_selectors,
            ConsentAction::Reject => &self.reject_selectors,
            ConsentAction::Settings => &self.settings_selectors,
        }
    }

    /// Native calls performing an action.
    pub fn native_calls(&self, action: ConsentAction) -> impl Iterator<Item = &NativeCall> {
        self.native.iter().filter(move |call| call.action == action)
    }

    /// Validate the vendor definition.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CatalogError::invalid("vendor", "vendor name cannot be empty"));
        }
        if self.banner_selectors.is_empty() {
            return Err(CatalogError::invalid(
                &self.name,
                "at least one banner selector is required",
            ));
        }
        for call in &self.native {
            call.validate(&self.name)?;
        }
        Ok(())
    }
}

/// A catalogued compliance failure pattern.
///
/// The title, severity, legal reference and remediation are a published
/// contract keyed by [`ViolationDefinition::code`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViolationDefinition {
    /// Stable identifier
    pub code: ViolationCode,

    /// Short title
    pub title: String,

    /// Severity used for scoring
    pub severity: Severity,

    /// GDPR / ePrivacy article reference
    pub legal_reference: String,

    /// What was observed
    pub description: String,

    /// Consequence for the site operator
    pub business_impact: String,

    /// How to fix it
    pub remediation: String,
}

impl ViolationDefinition {
    /// Validate that every public text is present.
    pub fn validate(&self) -> Result<()> {
        let fields = [
            ("title", &self.title),
            ("legal_reference", &self.legal_reference),
            ("description", &self.description),
            ("business_impact", &self.business_impact),
            ("remediation", &self.remediation),
        ];
        for (field, value) in fields {
            if value.trim().is_empty() {
                return Err(CatalogError::invalid(
                    self.code.as_str(),
                    format!("{field} cannot be empty"),
                ));
            }
        }
        Ok(())
    }
}

/// `languages.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LanguageFile {
    /// Language packs
    #[serde(default)]
    pub language: Vec<LanguagePack>,
}

impl LanguageFile {
    pub(crate) fn into_packs(self) -> Vec<LanguagePack> {
        self.language.into_iter().map(LanguagePack::lowercase).collect()
    }
}

/// `vendors.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VendorFile {
    /// CMP vendors in probing order
    #[serde(default)]
    pub vendor: Vec<CmpVendor>,
}

/// `violations.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ViolationFile {
    /// Catalog entries
    #[serde(default)]
    pub violation: Vec<ViolationDefinition>,
}
