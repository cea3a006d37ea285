//! Integration tests for the compliance engine
//!
//! Builds evidence packages the way the crawler leaves them and checks the
//! resulting reports end to end against the builtin catalog.

use spectral_catalog::Catalog;
use spectral_compliance::{scoring, ComplianceEngine, ComplianceReport, RiskTier, Violation};
use spectral_core::{
    BannerAnalysis, BannerStyle, CookieRecord, EvidencePackage, EvidenceSnapshot, EvidenceStage,
    Severity, StageName,
};
use std::sync::Arc;

const PRE_CONSENT_SCRIPTS: &str = "EU-C-001";
const PRE_CONSENT_COOKIES: &str = "EU-C-002";
const PRE_CONSENT_THIRD_PARTY: &str = "EU-C-003";
const MISSING_REJECT: &str = "EU-C-004";
const CONSENT_BYPASS: &str = "EU-C-011";
const MECHANISM_NOT_FUNCTIONAL: &str = "EU-C-016";
const IDENTICAL_TRACKING: &str = "EU-C-017";

fn engine() -> ComplianceEngine {
    let catalog = Catalog::builtin().expect("builtin catalog");
    ComplianceEngine::new(Arc::new(catalog)).expect("create engine")
}

fn snapshot(label: &str, scripts: usize, cookies: usize, storage: usize) -> EvidenceSnapshot {
    let mut snapshot = EvidenceSnapshot::failed(label, "https://shop.example", "");
    snapshot.error = None;
    snapshot.total_scripts = scripts;
    snapshot.script_classification.counts.unknown = scripts;
    snapshot.script_classification.unknown = (0..scripts)
        .map(|i| format!("https://shop.example/static/app-{i}.js"))
        .collect();
    snapshot.storage_items = storage;
    snapshot.storage_classification.unknown = storage;
    snapshot.cookies = (0..cookies)
        .map(|i| CookieRecord {
            name: format!("pref_{i}"),
            domain: "shop.example".to_string(),
            session: true,
        })
        .collect();
    snapshot.cookie_classification.counts.unknown = cookies;
    snapshot.screenshot = Some(format!("{label}.png"));
    snapshot
}

/// Reclassify `tracking` of the unknown scripts as tracking and `necessary` as necessary.
fn with_scripts(
    mut snapshot: EvidenceSnapshot,
    tracking: usize,
    necessary: usize,
) -> EvidenceSnapshot {
    let total = tracking + necessary + snapshot.script_classification.counts.unknown;
    snapshot.total_scripts = total;
    let classification = &mut snapshot.script_classification;
    classification.counts.tracking = tracking;
    classification.counts.necessary = necessary;
    classification.tracking = (0..tracking)
        .map(|i| format!("https://www.googletagmanager.com/gtm.js?id=GTM-{i}"))
        .collect();
    classification.necessary = (0..necessary)
        .map(|i| format!("https://shop.example/vendor/jquery-{i}.js"))
        .collect();
    snapshot
}

fn banner(direct_reject: bool) -> BannerAnalysis {
    BannerAnalysis {
        detected: true,
        provider: Some("Cookiebot".to_string()),
        style: Some(if direct_reject {
            BannerStyle::RejectCapable
        } else {
            BannerStyle::AcceptOnly
        }),
        has_accept_option: true,
        has_reject_option: direct_reject,
        has_settings_option: true,
        has_direct_reject: direct_reject,
        button_texts: vec!["Allow all".to_string(), "Customize".to_string()],
        text: Some(
            "This website uses cookies to personalise content and ads and to analyse our traffic."
                .to_string(),
        ),
    }
}

fn push(package: &mut EvidencePackage, name: StageName, snapshot: EvidenceSnapshot) {
    package
        .push(EvidenceStage::new(name, snapshot))
        .expect("stage in canonical order");
}

fn package_with_pre_consent(pre: EvidenceSnapshot, banner: BannerAnalysis) -> EvidencePackage {
    let mut package = EvidencePackage::new("https://shop.example", "shop.example");
    package
        .push(EvidenceStage::new(StageName::PreConsent, pre).with_banner(banner))
        .expect("pre-consent");
    package
}

/// A site whose reject and accept choices both work.
fn compliant_package() -> EvidencePackage {
    let mut package = package_with_pre_consent(snapshot("baseline", 4, 1, 0), banner(true));
    push(&mut package, StageName::RejectPre, snapshot("reject_pre", 4, 1, 0));
    push(&mut package, StageName::PostReject, snapshot("reject", 4, 1, 0));
    push(&mut package, StageName::AcceptPre, snapshot("accept_pre", 4, 1, 0));
    push(
        &mut package,
        StageName::PostAccept,
        with_scripts(snapshot("accept", 4, 3, 2), 3, 0),
    );
    package
}

fn normalized(mut report: ComplianceReport, reference: &ComplianceReport) -> ComplianceReport {
    report.generated_at = reference.generated_at;
    for (violation, other) in report.violations.iter_mut().zip(&reference.violations) {
        violation.detected_at = other.detected_at;
    }
    report
}

#[test]
fn test_pre_consent_tracking_without_reject() {
    let pre = with_scripts(snapshot("baseline", 0, 2, 1), 5, 3);
    assert!(pre.classification_balances());
    let package = package_with_pre_consent(pre, banner(false));

    let report = engine().assess(&package);

    assert!(report.has_violation(PRE_CONSENT_SCRIPTS));
    assert!(report.has_violation(MISSING_REJECT));
    assert!(report.risk >= RiskTier::High);
    let pre_consent = report
        .violations
        .iter()
        .find(|v| v.code.as_str() == PRE_CONSENT_SCRIPTS)
        .expect("pre-consent violation");
    assert_eq!(pre_consent.screenshot.as_deref(), Some("baseline.png"));
}

#[test]
fn test_pre_consent_cookies_and_third_party_requests() {
    let mut pre = with_scripts(snapshot("baseline", 1, 1, 0), 2, 0);
    pre.third_party_scripts = 2;
    pre.cookies.push(CookieRecord {
        name: "_ga".to_string(),
        domain: ".shop.example".to_string(),
        session: false,
    });
    pre.cookie_classification.counts.tracking = 1;
    pre.cookie_classification.tracking = vec!["_ga".to_string()];
    let package = package_with_pre_consent(pre, banner(true));

    let report = engine().assess(&package);

    assert_eq!(
        report.codes(),
        vec![PRE_CONSENT_SCRIPTS, PRE_CONSENT_COOKIES, PRE_CONSENT_THIRD_PARTY]
    );
    // HIGH x3
    assert_eq!(report.score, 40);
    assert_eq!(report.risk, RiskTier::High);
    let third_party = &report.violations[2];
    assert_eq!(third_party.legal_reference, "Article 5(3)");
    assert_eq!(third_party.screenshot.as_deref(), Some("baseline.png"));
    assert_eq!(report.recommendations[0].triggered_by.len(), 3);
}

#[test]
fn test_identical_outcome_regardless_of_choice() {
    let mut package = package_with_pre_consent(snapshot("baseline", 6, 1, 0), banner(true));
    push(&mut package, StageName::RejectPre, snapshot("reject_pre", 6, 1, 0));
    push(&mut package, StageName::PostReject, snapshot("reject", 10, 4, 2));
    push(&mut package, StageName::AcceptPre, snapshot("accept_pre", 6, 1, 0));
    push(&mut package, StageName::PostAccept, snapshot("accept", 10, 4, 2));

    let report = engine().assess(&package);

    assert!(report.has_violation(IDENTICAL_TRACKING));
    assert!(!report.has_violation(MECHANISM_NOT_FUNCTIONAL));
}

#[test]
fn test_accept_without_effect() {
    let mut package = package_with_pre_consent(snapshot("baseline", 8, 0, 0), banner(true));
    push(&mut package, StageName::RejectPre, snapshot("reject_pre", 8, 0, 0));
    push(&mut package, StageName::PostReject, snapshot("reject", 8, 1, 0));
    push(&mut package, StageName::AcceptPre, snapshot("accept_pre", 8, 0, 0));
    push(&mut package, StageName::PostAccept, snapshot("accept", 8, 0, 0));

    let report = engine().assess(&package);

    assert_eq!(report.codes(), vec![MECHANISM_NOT_FUNCTIONAL]);
    assert_eq!(report.risk, RiskTier::Critical);
    assert!(report
        .recommendations
        .iter()
        .any(|r| r.category == "CMP Configuration"));
}

#[test]
fn test_clean_site_scores_full_marks() {
    let report = engine().assess(&compliant_package());

    assert!(report.violations.is_empty(), "unexpected: {:?}", report.codes());
    assert_eq!(report.score, 100);
    assert_eq!(report.risk, RiskTier::Low);
    assert!(report.recommendations.is_empty());
    assert!(report.legal.affected_articles.is_empty());
}

#[test]
fn test_missing_reject_stages_narrow_rules() {
    let pre = with_scripts(snapshot("baseline", 1, 0, 0), 2, 0);
    let mut package = package_with_pre_consent(pre, banner(true));
    push(&mut package, StageName::AcceptPre, snapshot("accept_pre", 3, 0, 0));
    push(&mut package, StageName::PostAccept, snapshot("accept", 3, 0, 0));
    package.set_error("navigation to https://shop.example failed: net::ERR_CONNECTION_RESET");

    let report = engine().assess(&package);

    // Effectiveness and bypass rules need the reject outcome.
    assert_eq!(report.codes(), vec![PRE_CONSENT_SCRIPTS]);
    assert!(!report.has_violation(MECHANISM_NOT_FUNCTIONAL));
    assert!(!report.has_violation(IDENTICAL_TRACKING));
    assert!(!report.has_violation(CONSENT_BYPASS));
    assert_eq!(report.score, 80);
    assert_eq!(report.crawl_error, package.error);
}

#[test]
fn test_reject_unavailable_skips_effectiveness() {
    let mut package = package_with_pre_consent(snapshot("baseline", 8, 0, 0), banner(true));
    push(&mut package, StageName::RejectPre, snapshot("reject_pre", 8, 0, 0));
    package
        .push(
            EvidenceStage::new(StageName::RejectUnavailable, snapshot("reject_pre", 8, 0, 0))
                .with_annotation("Reject option shown but could not be activated"),
        )
        .expect("reject_unavailable");
    push(&mut package, StageName::AcceptPre, snapshot("accept_pre", 8, 0, 0));
    push(&mut package, StageName::PostAccept, snapshot("accept", 8, 0, 0));

    let report = engine().assess(&package);

    assert_eq!(report.codes(), vec![MISSING_REJECT]);
    assert_eq!(report.score, 70);
}

#[test]
fn test_tracking_after_reject_is_bypass() {
    let clean = compliant_package();
    let mut package = package_with_pre_consent(snapshot("baseline", 4, 1, 0), banner(true));
    for stage in clean.stages().iter().skip(1) {
        let snapshot = if stage.name == StageName::PostReject {
            with_scripts(stage.snapshot.clone(), 2, 0)
        } else {
            stage.snapshot.clone()
        };
        push(&mut package, stage.name, snapshot);
    }

    let report = engine().assess(&package);

    assert_eq!(report.codes(), vec![CONSENT_BYPASS]);
    assert_eq!(report.violations[0].severity, Severity::Critical);
    assert_eq!(report.violations[0].screenshot.as_deref(), Some("reject.png"));
    assert_eq!(report.score, 70);
}

#[test]
fn test_assessment_is_idempotent() {
    let pre = with_scripts(snapshot("baseline", 2, 1, 1), 3, 1);
    let mut package = package_with_pre_consent(pre, banner(false));
    push(&mut package, StageName::RejectPre, snapshot("reject_pre", 6, 1, 1));
    push(&mut package, StageName::AcceptPre, snapshot("accept_pre", 6, 1, 1));
    push(&mut package, StageName::PostAccept, snapshot("accept", 6, 1, 1));

    let engine = engine();
    let first = engine.assess(&package);
    let second = normalized(engine.assess(&package), &first);

    assert_eq!(first, second);
    assert_eq!(
        first.to_json().expect("serialize"),
        second.to_json().expect("serialize")
    );
}

#[test]
fn test_extra_critical_never_raises_score() {
    let catalog = Catalog::builtin().expect("builtin catalog");
    let engine = engine();
    let package = package_with_pre_consent(
        with_scripts(snapshot("baseline", 1, 0, 0), 1, 0),
        banner(true),
    );
    let violations = engine.evaluate(&package);
    let critical = catalog
        .violations()
        .find(|v| v.severity == Severity::Critical)
        .expect("critical catalog entry");

    let mut worse = violations.clone();
    worse.push(Violation::new(
        critical,
        spectral_compliance::ViolationDetails::AcceptOnly {
            provider: None,
            buttons: Vec::new(),
        },
        None,
    ));

    assert!(scoring::score(&worse) <= scoring::score(&violations));

    // Floor: stacking criticals bottoms out at zero.
    let floor: Vec<Violation> = std::iter::repeat(worse[worse.len() - 1].clone())
        .take(5)
        .collect();
    assert_eq!(scoring::score(&floor), 0);
}

#[test]
fn test_report_json_shape() {
    let package = package_with_pre_consent(
        with_scripts(snapshot("baseline", 0, 0, 0), 1, 0),
        banner(false),
    );
    let report = engine().assess(&package);

    let value: serde_json::Value =
        serde_json::from_str(&report.to_json().expect("serialize")).expect("parse");
    assert_eq!(value["risk"], "CRITICAL");
    assert_eq!(value["status"], "NON-COMPLIANT");
    assert_eq!(value["violations"][0]["code"], PRE_CONSENT_SCRIPTS);
    assert_eq!(value["violations"][0]["details"]["kind"], "tracking_scripts");
    assert_eq!(value["recommendations"][0]["priority"], "IMMEDIATE");
}
