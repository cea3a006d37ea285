//! Violation rules over an evidence package.
//!
//! Rules run in a fixed category order: pre-consent exposure, banner design,
//! consent effectiveness, mechanism bypass. A rule whose stages are missing
//! is skipped; nothing here fails on incomplete evidence.

use crate::types::{MetricDelta, ViolationDetails};
use spectral_core::{BannerStyle, EvidencePackage, EvidenceSnapshot, StageName};
use tracing::debug;

/// Tracking scripts before consent.
pub const PRE_CONSENT_SCRIPTS: &str = "EU-C-001";
/// Tracking cookies before consent.
pub const PRE_CONSENT_COOKIES: &str = "EU-C-002";
/// Third-party tracking requests before consent.
pub const PRE_CONSENT_THIRD_PARTY: &str = "EU-C-003";
/// No reject path.
pub const MISSING_REJECT: &str = "EU-C-004";
/// Accept-only banner.
pub const ACCEPT_ONLY: &str = "EU-C-005";
/// Banner text too short.
pub const INSUFFICIENT_INFORMATION: &str = "EU-C-007";
/// Tracking continues after reject.
pub const CONSENT_BYPASS: &str = "EU-C-011";
/// Accepting has no effect.
pub const MECHANISM_NOT_FUNCTIONAL: &str = "EU-C-016";
/// Reject and accept end in the same state.
pub const IDENTICAL_TRACKING: &str = "EU-C-017";

/// Every code a rule can report, in evaluation order.
pub const RULE_CODES: [&str; 9] = [
    PRE_CONSENT_SCRIPTS,
    PRE_CONSENT_COOKIES,
    PRE_CONSENT_THIRD_PARTY,
    MISSING_REJECT,
    ACCEPT_ONLY,
    INSUFFICIENT_INFORMATION,
    MECHANISM_NOT_FUNCTIONAL,
    IDENTICAL_TRACKING,
    CONSENT_BYPASS,
];

/// Banner button labels kept as evidence.
const MAX_EVIDENCE_BUTTONS: usize = 10;

/// Thresholds used by the rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RuleSettings {
    /// Banner text shorter than this is insufficient information
    pub min_banner_text_chars: usize,
}

impl Default for RuleSettings {
    fn default() -> Self {
        Self {
            min_banner_text_chars: 50,
        }
    }
}

/// A fired rule before it is joined with the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    /// Catalog code
    pub code: &'static str,
    /// Extracted evidence
    pub details: ViolationDetails,
    /// Screenshot of the stage the evidence came from
    pub screenshot: Option<String>,
}

impl Finding {
    fn new(code: &'static str, details: ViolationDetails, stage: &EvidenceSnapshot) -> Self {
        Self {
            code,
            details,
            screenshot: stage.screenshot.clone(),
        }
    }
}

/// Run every rule against `package`.
#[must_use]
pub fn evaluate(package: &EvidencePackage, settings: &RuleSettings) -> Vec<Finding> {
    let mut findings = Vec::new();
    pre_consent_exposure(package, &mut findings);
    banner_design(package, settings, &mut findings);
    consent_effectiveness(package, &mut findings);
    mechanism_bypass(package, &mut findings);
    findings
}

fn tracking_scripts(stage: StageName, snapshot: &EvidenceSnapshot) -> ViolationDetails {
    let scripts = &snapshot.script_classification;
    ViolationDetails::TrackingScripts {
        stage,
        count: scripts.counts.tracking,
        scripts: scripts.tracking.clone(),
        total_scripts: snapshot.total_scripts,
        necessary_scripts: scripts.counts.necessary,
    }
}

fn pre_consent_exposure(package: &EvidencePackage, findings: &mut Vec<Finding>) {
    let Some(pre) = package.snapshot(StageName::PreConsent) else {
        debug!("no pre-consent stage, skipping exposure rules");
        return;
    };

    if pre.script_classification.counts.tracking > 0 {
        findings.push(Finding::new(
            PRE_CONSENT_SCRIPTS,
            tracking_scripts(StageName::PreConsent, pre),
            pre,
        ));
    }

    let cookies = &pre.cookie_classification;
    if cookies.counts.tracking > 0 {
        findings.push(Finding::new(
            PRE_CONSENT_COOKIES,
            ViolationDetails::TrackingCookies {
                count: cookies.counts.tracking,
                cookies: cookies.tracking.clone(),
                total_cookies: pre.cookies.len(),
            },
            pre,
        ));
    }

    if pre.third_party_scripts > 0 {
        // Only tracking scripts count, not every external host.
        let requests: Vec<String> = pre
            .script_classification
            .tracking
            .iter()
            .filter(|src| !src.is_empty())
            .cloned()
            .collect();
        if !requests.is_empty() {
            findings.push(Finding::new(
                PRE_CONSENT_THIRD_PARTY,
                ViolationDetails::ThirdPartyRequests {
                    count: requests.len(),
                    requests,
                    third_party_scripts: pre.third_party_scripts,
                },
                pre,
            ));
        }
    }
}

fn banner_design(package: &EvidencePackage, settings: &RuleSettings, findings: &mut Vec<Finding>) {
    let Some(stage) = package.stage(StageName::PreConsent) else {
        return;
    };
    let Some(banner) = stage.banner.as_ref() else {
        debug!("no banner analysis, skipping banner rules");
        return;
    };
    let buttons: Vec<String> = banner
        .button_texts
        .iter()
        .take(MAX_EVIDENCE_BUTTONS)
        .cloned()
        .collect();

    let unavailable = package.stage(StageName::RejectUnavailable);
    if !banner.has_direct_reject || unavailable.is_some() {
        findings.push(Finding::new(
            MISSING_REJECT,
            ViolationDetails::MissingReject {
                provider: banner.provider.clone(),
                buttons: buttons.clone(),
                annotation: unavailable.and_then(|s| s.annotation.clone()),
            },
            &stage.snapshot,
        ));
    }

    if banner.style == Some(BannerStyle::AcceptOnly) {
        findings.push(Finding::new(
            ACCEPT_ONLY,
            ViolationDetails::AcceptOnly {
                provider: banner.provider.clone(),
                buttons,
            },
            &stage.snapshot,
        ));
    }

    if let Some(text) = banner.text.as_deref().filter(|t| !t.is_empty()) {
        let text_length = text.chars().count();
        if text_length < settings.min_banner_text_chars {
            findings.push(Finding::new(
                INSUFFICIENT_INFORMATION,
                ViolationDetails::InsufficientInformation {
                    text_length,
                    minimum: settings.min_banner_text_chars,
                },
                &stage.snapshot,
            ));
        }
    }
}

fn consent_effectiveness(package: &EvidencePackage, findings: &mut Vec<Finding>) {
    // Differential: needs both choices observed.
    let (Some(post_reject), Some(post_accept)) = (
        package.snapshot(StageName::PostReject),
        package.snapshot(StageName::PostAccept),
    ) else {
        debug!("post-reject or post-accept missing, skipping effectiveness rules");
        return;
    };

    if let Some(accept_pre) = package.snapshot(StageName::AcceptPre) {
        let accept_increase = MetricDelta::between(accept_pre.metrics(), post_accept.metrics());
        debug!(?accept_increase, "accept effect");
        if accept_increase.is_zero() {
            findings.push(Finding::new(
                MECHANISM_NOT_FUNCTIONAL,
                ViolationDetails::NoConsentEffect { accept_increase },
                post_accept,
            ));
        }
    }

    let (reject, accept) = (post_reject.metrics(), post_accept.metrics());
    if reject == accept {
        findings.push(Finding::new(
            IDENTICAL_TRACKING,
            ViolationDetails::IdenticalOutcome { reject, accept },
            post_accept,
        ));
    }
}

fn mechanism_bypass(package: &EvidencePackage, findings: &mut Vec<Finding>) {
    let Some(post_reject) = package.snapshot(StageName::PostReject) else {
        return;
    };
    if post_reject.script_classification.counts.tracking > 0 {
        findings.push(Finding::new(
            CONSENT_BYPASS,
            tracking_scripts(StageName::PostReject, post_reject),
            post_reject,
        ));
    }
}
