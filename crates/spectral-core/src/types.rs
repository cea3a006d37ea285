//! Shared types used across the Spectral application.
//!
//! This module defines the newtypes and small enums that every audit stage
//! speaks: audit identifiers, violation codes, severities, consent actions and
//! the canonical stage vocabulary.

use crate::error::SpectralError;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;

/// Newtype for audit identifiers.
///
/// Audit IDs must be valid UUIDs (v4 format).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AuditId(String);

impl AuditId {
    /// Create a new `AuditId` from a string.
    ///
    /// # Errors
    /// Returns error if the ID is not a valid UUID v4.
    pub fn new(id: impl Into<String>) -> Result<Self, SpectralError> {
        let id = id.into();
        static UUID_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = UUID_REGEX.get_or_init(|| {
            Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-4[0-9a-f]{3}-[89ab][0-9a-f]{3}-[0-9a-f]{12}$")
                .expect("valid regex")
        });

        if regex.is_match(&id) {
            Ok(Self(id))
        } else {
            Err(SpectralError::Validation(format!(
                "invalid audit ID: must be a valid UUID v4, got '{id}'"
            )))
        }
    }

    /// Create a new random `AuditId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuditId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Stable identifier of a catalogued compliance failure, e.g. `EU-C-004`.
///
/// Deserialization goes through the same validation as [`ViolationCode::new`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ViolationCode(String);

impl ViolationCode {
    /// Create a new `ViolationCode` from a string.
    ///
    /// # Errors
    /// Returns error if the code is not of the form `EU-C-NNN`.
    pub fn new(code: impl Into<String>) -> Result<Self, SpectralError> {
        let code = code.into();
        static CODE_REGEX: OnceLock<Regex> = OnceLock::new();
        let regex = CODE_REGEX.get_or_init(|| Regex::new(r"^EU-C-\d{3}$").expect("valid regex"));

        if regex.is_match(&code) {
            Ok(Self(code))
        } else {
            Err(SpectralError::Validation(format!(
                "invalid violation code: expected EU-C-NNN, got '{code}'"
            )))
        }
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ViolationCode {
    type Error = SpectralError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ViolationCode> for String {
    fn from(code: ViolationCode) -> Self {
        code.0
    }
}

impl fmt::Display for ViolationCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Severity of a catalogued violation.
///
/// Ordered from least to most severe so `max()` picks the worst finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    /// Minor gap
    Low,
    /// Transparency or usability gap
    Medium,
    /// Clear consent failure
    High,
    /// Consent framework invalid
    Critical,
}

impl Severity {
    /// Uppercase label used in reports.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A choice a visitor can make on a consent banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsentAction {
    /// Accept all tracking
    Accept,
    /// Reject all non-essential tracking
    Reject,
    /// Open the preference center
    Settings,
}

impl ConsentAction {
    /// Lowercase label, also used as the key in vendor definitions.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::Reject => "reject",
            Self::Settings => "settings",
        }
    }
}

impl fmt::Display for ConsentAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Canonical name of a stage in an evidence package.
///
/// The serialized names are a stable contract. Unknown names fail to parse
/// instead of being mapped to a nearby stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageName {
    /// Baseline load with no interaction, plus banner analysis
    #[serde(rename = "pre-consent")]
    PreConsent,
    /// Fresh load preceding the reject interaction
    #[serde(rename = "reject_pre")]
    RejectPre,
    /// State after a successful reject
    #[serde(rename = "post-reject")]
    PostReject,
    /// Reject could not be performed; carries the `reject_pre` evidence
    #[serde(rename = "reject_unavailable")]
    RejectUnavailable,
    /// Fresh load preceding the accept interaction
    #[serde(rename = "accept_pre")]
    AcceptPre,
    /// State after accepting
    #[serde(rename = "post-accept")]
    PostAccept,
}

impl StageName {
    /// Every stage name in canonical order.
    pub const ALL: [Self; 6] = [
        Self::PreConsent,
        Self::RejectPre,
        Self::PostReject,
        Self::RejectUnavailable,
        Self::AcceptPre,
        Self::PostAccept,
    ];

    /// The canonical wire name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreConsent => "pre-consent",
            Self::RejectPre => "reject_pre",
            Self::PostReject => "post-reject",
            Self::RejectUnavailable => "reject_unavailable",
            Self::AcceptPre => "accept_pre",
            Self::PostAccept => "post-accept",
        }
    }

    /// Slot in the package ordering. `post-reject` and `reject_unavailable`
    /// share a slot because exactly one of them may appear.
    #[must_use]
    pub fn position(&self) -> u8 {
        match self {
            Self::PreConsent => 0,
            Self::RejectPre => 1,
            Self::PostReject | Self::RejectUnavailable => 2,
            Self::AcceptPre => 3,
            Self::PostAccept => 4,
        }
    }
}

impl FromStr for StageName {
    type Err = SpectralError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|stage| stage.as_str() == s)
            .ok_or_else(|| SpectralError::Validation(format!("unknown stage name '{s}'")))
    }
}

impl fmt::Display for StageName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Wrapper around `chrono::DateTime<Utc>` for consistent timestamp handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Create a timestamp representing the current moment.
    #[must_use]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Get the inner `DateTime<Utc>`.
    #[must_use]
    pub fn as_datetime(&self) -> &DateTime<Utc> {
        &self.0
    }

    /// Milliseconds since Unix epoch.
    #[must_use]
    pub fn timestamp_millis(&self) -> i64 {
        self.0.timestamp_millis()
    }
}

impl Default for Timestamp {
    fn default() -> Self {
        Self::now()
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }
}
