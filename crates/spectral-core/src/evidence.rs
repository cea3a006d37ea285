//! Evidence data model shared by the crawler and the compliance engine.
//!
//! A crawl produces one [`EvidencePackage`] per site: an ordered list of
//! [`EvidenceStage`]s, each wrapping the [`EvidenceSnapshot`] captured at that
//! point of the consent flow.

use crate::error::SpectralError;
use crate::types::{AuditId, StageName, Timestamp};
use serde::{Deserialize, Serialize};

/// A script element found on the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptRef {
    /// Script `src`, empty for inline scripts
    pub src: String,
    /// Whether the script has no `src`
    pub inline: bool,
}

/// A cookie visible to the page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    /// Cookie name
    pub name: String,
    /// Cookie domain as reported by the browser (may start with `.`)
    pub domain: String,
    /// Session cookie (no expiry)
    #[serde(default)]
    pub session: bool,
}

/// Tracking / necessary / unknown tallies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassificationCounts {
    /// Items matched as tracking
    pub tracking: usize,
    /// Items matched as necessary
    pub necessary: usize,
    /// Items matching neither table
    pub unknown: usize,
}

impl ClassificationCounts {
    /// Sum of all three classes.
    #[must_use]
    pub fn total(&self) -> usize {
        self.tracking + self.necessary + self.unknown
    }
}

/// Classification of a set of items with the items kept per class.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Classification {
    /// Per-class counts
    pub counts: ClassificationCounts,
    /// Items classified as tracking
    pub tracking: Vec<String>,
    /// Items classified as necessary
    pub necessary: Vec<String>,
    /// Items matching neither table
    pub unknown: Vec<String>,
}

/// Informational guess about an unclassified script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptHint {
    /// Script source
    pub src: String,
    /// Whether the path looks like first-party application code
    pub likely_necessary: bool,
    /// Confidence of the guess in `0.0..=1.0`
    pub confidence: f32,
}

/// Scalar counts compared by the differential consent rules.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageMetrics {
    /// Total script count
    pub scripts: usize,
    /// Cookie count
    pub cookies: usize,
    /// Storage item count
    pub storage: usize,
}

/// Everything observed on the page at one point of the consent flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceSnapshot {
    /// Internal capture label (e.g. `baseline`, `accept`)
    pub stage: String,
    /// When sampling finished
    pub captured_at: Timestamp,
    /// Page URL at capture time
    pub url: String,
    /// Script elements, empty when only a bare count could be read
    pub scripts: Vec<ScriptRef>,
    /// Number of script elements on the page
    pub total_scripts: usize,
    /// Script classification
    pub script_classification: Classification,
    /// Heuristic hints for unknown scripts
    #[serde(default)]
    pub unknown_script_hints: Vec<ScriptHint>,
    /// Cookies visible to the page
    pub cookies: Vec<CookieRecord>,
    /// Cookie classification (by cookie name)
    pub cookie_classification: Classification,
    /// Number of `localStorage` items
    pub storage_items: usize,
    /// Storage classification by key
    pub storage_classification: ClassificationCounts,
    /// Storage could not be read
    #[serde(default)]
    pub storage_access_denied: bool,
    /// 1x1 or keyword-matched images
    pub tracking_pixels: usize,
    /// Scripts served from another host or matching marketing keywords
    pub third_party_scripts: usize,
    /// Reference returned by the driver's screenshot call
    pub screenshot: Option<String>,
    /// Result of the `tracking + necessary + unknown == total` check
    pub classification_consistent: bool,
    /// Set when capture failed and the counters are zeroed
    pub error: Option<String>,
}

impl EvidenceSnapshot {
    /// A zeroed snapshot recording why capture failed.
    #[must_use]
    pub fn failed(
        stage: impl Into<String>,
        url: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self {
            stage: stage.into(),
            captured_at: Timestamp::now(),
            url: url.into(),
            scripts: Vec::new(),
            total_scripts: 0,
            script_classification: Classification::default(),
            unknown_script_hints: Vec::new(),
            cookies: Vec::new(),
            cookie_classification: Classification::default(),
            storage_items: 0,
            storage_classification: ClassificationCounts::default(),
            storage_access_denied: false,
            tracking_pixels: 0,
            third_party_scripts: 0,
            screenshot: None,
            classification_consistent: true,
            error: Some(error.into()),
        }
    }

    /// Counts compared by the differential rules.
    #[must_use]
    pub fn metrics(&self) -> StageMetrics {
        StageMetrics {
            scripts: self.total_scripts,
            cookies: self.cookies.len(),
            storage: self.storage_items,
        }
    }

    /// Whether the script classification accounts for every script.
    #[must_use]
    pub fn classification_balances(&self) -> bool {
        self.script_classification.counts.total() == self.total_scripts
    }
}

/// Visual style of a detected consent banner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BannerStyle {
    /// Offers a reject path
    RejectCapable,
    /// Offers accept without a reject path
    AcceptOnly,
}

/// Result of inspecting the consent banner during the pre-consent phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct BannerAnalysis {
    /// A banner was found
    pub detected: bool,
    /// CMP vendor name, or `generic`
    pub provider: Option<String>,
    /// Banner style, absent when nothing was detected
    pub style: Option<BannerStyle>,
    /// An accept control is present
    pub has_accept_option: bool,
    /// A reject control is present
    pub has_reject_option: bool,
    /// A settings / preferences control is present
    pub has_settings_option: bool,
    /// Reject can be chosen on the first layer
    pub has_direct_reject: bool,
    /// Sample of button labels found
    pub button_texts: Vec<String>,
    /// Trimmed, truncated banner text
    pub text: Option<String>,
}

impl BannerAnalysis {
    /// Analysis for a page without a recognizable banner.
    #[must_use]
    pub fn not_detected() -> Self {
        Self {
            detected: false,
            provider: None,
            style: None,
            has_accept_option: false,
            has_reject_option: false,
            has_settings_option: false,
            has_direct_reject: false,
            button_texts: Vec::new(),
            text: None,
        }
    }
}

/// A snapshot labelled with its canonical stage name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceStage {
    /// Canonical stage name
    pub name: StageName,
    /// Captured evidence
    pub snapshot: EvidenceSnapshot,
    /// Banner analysis, only on `pre-consent`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub banner: Option<BannerAnalysis>,
    /// Explanation attached by the orchestrator (e.g. why reject was unavailable)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation: Option<String>,
}

impl EvidenceStage {
    /// Label a snapshot with a canonical name.
    #[must_use]
    pub fn new(name: StageName, snapshot: EvidenceSnapshot) -> Self {
        Self {
            name,
            snapshot,
            banner: None,
            annotation: None,
        }
    }

    /// Attach a banner analysis.
    #[must_use]
    pub fn with_banner(mut self, banner: BannerAnalysis) -> Self {
        self.banner = Some(banner);
        self
    }

    /// Attach an annotation.
    #[must_use]
    pub fn with_annotation(mut self, annotation: impl Into<String>) -> Self {
        self.annotation = Some(annotation.into());
        self
    }
}

/// Ordered evidence for one site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidencePackage {
    /// Identifier shared with the resulting report
    pub audit_id: AuditId,
    /// Target URL
    pub url: String,
    /// Target hostname
    pub domain: String,
    /// When the crawl started
    pub started_at: Timestamp,
    /// Stages in canonical order
    stages: Vec<EvidenceStage>,
    /// Why the crawl stopped early, if it did
    pub error: Option<String>,
}

impl EvidencePackage {
    /// Start an empty package for a target.
    #[must_use]
    pub fn new(url: impl Into<String>, domain: impl Into<String>) -> Self {
        Self {
            audit_id: AuditId::generate(),
            url: url.into(),
            domain: domain.into(),
            started_at: Timestamp::now(),
            stages: Vec::new(),
            error: None,
        }
    }

    /// Append a stage, enforcing canonical order.
    ///
    /// # Errors
    /// Returns a validation error if the stage would appear out of order, twice,
    /// alongside its alternative, or carries a banner outside `pre-consent`.
    pub fn push(&mut self, stage: EvidenceStage) -> Result<(), SpectralError> {
        if let Some(last) = self.stages.last() {
            if stage.name.position() <= last.name.position() {
                return Err(SpectralError::Validation(format!(
                    "stage '{}' cannot follow '{}'",
                    stage.name, last.name
                )));
            }
        }
        if stage.banner.is_some() && stage.name != StageName::PreConsent {
            return Err(SpectralError::Validation(format!(
                "banner analysis attached to '{}', only allowed on pre-consent",
                stage.name
            )));
        }
        self.stages.push(stage);
        Ok(())
    }

    /// Re-check ordering, e.g. after deserializing a package from elsewhere.
    pub fn validate(&self) -> Result<(), SpectralError> {
        let mut check = Self {
            stages: Vec::with_capacity(self.stages.len()),
            ..self.clone()
        };
        for stage in &self.stages {
            check.push(stage.clone())?;
        }
        Ok(())
    }

    /// Record why the crawl stopped.
    pub fn set_error(&mut self, error: impl Into<String>) {
        self.error = Some(error.into());
    }

    /// All stages in order.
    #[must_use]
    pub fn stages(&self) -> &[EvidenceStage] {
        &self.stages
    }

    /// Look up a stage by canonical name.
    #[must_use]
    pub fn stage(&self, name: StageName) -> Option<&EvidenceStage> {
        self.stages.iter().find(|s| s.name == name)
    }

    /// Look up a stage's snapshot by canonical name.
    #[must_use]
    pub fn snapshot(&self, name: StageName) -> Option<&EvidenceSnapshot> {
        self.stage(name).map(|s| &s.snapshot)
    }

    /// Banner analysis attached to `pre-consent`.
    #[must_use]
    pub fn banner(&self) -> Option<&BannerAnalysis> {
        self.stage(StageName::PreConsent).and_then(|s| s.banner.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(stage: &str) -> EvidenceSnapshot {
        EvidenceSnapshot::failed(stage, "https://example.com", "not captured")
    }

    #[test]
    fn test_failed_snapshot_is_zeroed() {
        let snap = snapshot("baseline");
        assert_eq!(snap.metrics(), StageMetrics::default());
        assert!(snap.classification_balances());
        assert_eq!(snap.error.as_deref(), Some("not captured"));
    }

    #[test]
    fn test_package_accepts_canonical_order() {
        let mut package = EvidencePackage::new("https://example.com", "example.com");
        package
            .push(
                EvidenceStage::new(StageName::PreConsent, snapshot("baseline"))
                    .with_banner(BannerAnalysis::not_detected()),
            )
            .expect("pre-consent");
        package
            .push(EvidenceStage::new(StageName::RejectPre, snapshot("reject_pre")))
            .expect("reject_pre");
        package
            .push(EvidenceStage::new(
                StageName::RejectUnavailable,
                snapshot("reject_pre"),
            ))
            .expect("reject_unavailable");
        package
            .push(EvidenceStage::new(StageName::AcceptPre, snapshot("accept_pre")))
            .expect("accept_pre");
        package
            .push(EvidenceStage::new(StageName::PostAccept, snapshot("accept")))
            .expect("post-accept");

        assert_eq!(package.stages().len(), 5);
        assert!(package.banner().is_some());
        assert!(package.validate().is_ok());
    }

    #[test]
    fn test_package_rejects_reordered_stage() {
        let mut package = EvidencePackage::new("https://example.com", "example.com");
        package
            .push(EvidenceStage::new(StageName::AcceptPre, snapshot("accept_pre")))
            .expect("accept_pre");
        let err = package
            .push(EvidenceStage::new(StageName::RejectPre, snapshot("reject_pre")))
            .expect_err("out of order");
        assert!(err.to_string().contains("cannot follow"));
    }

    #[test]
    fn test_package_rejects_both_reject_outcomes() {
        let mut package = EvidencePackage::new("https://example.com", "example.com");
        package
            .push(EvidenceStage::new(StageName::PostReject, snapshot("reject")))
            .expect("post-reject");
        assert!(package
            .push(EvidenceStage::new(
                StageName::RejectUnavailable,
                snapshot("reject_pre")
            ))
            .is_err());
    }

    #[test]
    fn test_banner_only_on_pre_consent() {
        let mut package = EvidencePackage::new("https://example.com", "example.com");
        let stage = EvidenceStage::new(StageName::RejectPre, snapshot("reject_pre"))
            .with_banner(BannerAnalysis::not_detected());
        assert!(package.push(stage).is_err());
    }

    #[test]
    fn test_deserialized_package_is_revalidated() {
        let mut package = EvidencePackage::new("https://example.com", "example.com");
        package
            .push(EvidenceStage::new(StageName::RejectPre, snapshot("reject_pre")))
            .expect("reject_pre");
        package
            .push(EvidenceStage::new(StageName::AcceptPre, snapshot("accept_pre")))
            .expect("accept_pre");

        let json = serde_json::to_string(&package).expect("serialize package");
        let swapped = json.replace("\"reject_pre\",\"snapshot\"", "\"post-accept\",\"snapshot\"");
        let parsed: EvidencePackage = serde_json::from_str(&swapped).expect("parse package");
        assert!(parsed.validate().is_err());
    }
}
