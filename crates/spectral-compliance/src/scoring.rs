//! Score, risk tier, legal narrative and recommendations.
//!
//! All lookups are fixed tables; recommendations never affect the score.

use crate::rules::{
    ACCEPT_ONLY, CONSENT_BYPASS, IDENTICAL_TRACKING, INSUFFICIENT_INFORMATION,
    MECHANISM_NOT_FUNCTIONAL, MISSING_REJECT, PRE_CONSENT_COOKIES, PRE_CONSENT_SCRIPTS,
    PRE_CONSENT_THIRD_PARTY,
};
use crate::types::{
    Effort, ExecutiveStatus, LegalAnalysis, Priority, Recommendation, RiskTier, SeverityCounts,
    Violation,
};
use spectral_core::Severity;

/// Score of a package with no violations.
pub const MAX_SCORE: u32 = 100;

/// Codes whose presence signals regulatory investigation risk.
const REGULATORY_CODES: [&str; 5] = ["EU-C-001", "EU-C-002", "EU-C-004", "EU-C-006", "EU-C-016"];

/// Score deduction for one violation.
#[must_use]
pub fn penalty(severity: Severity) -> u32 {
    match severity {
        Severity::Critical => 30,
        Severity::High => 20,
        Severity::Medium => 10,
        Severity::Low => 5,
    }
}

/// `max(0, 100 - sum of penalties)`.
#[must_use]
pub fn score(violations: &[Violation]) -> u32 {
    violations
        .iter()
        .fold(MAX_SCORE, |score, v| score.saturating_sub(penalty(v.severity)))
}

/// Risk tier from severity counts.
#[must_use]
pub fn risk_tier(counts: &SeverityCounts) -> RiskTier {
    if counts.critical > 0 {
        RiskTier::Critical
    } else if counts.high >= 2 {
        RiskTier::High
    } else if counts.high > 0 {
        RiskTier::Medium
    } else {
        RiskTier::Low
    }
}

/// Verdict from the score.
#[must_use]
pub fn executive_status(score: u32) -> ExecutiveStatus {
    match score {
        80.. => ExecutiveStatus::Compliant,
        60..=79 => ExecutiveStatus::NeedsAttention,
        _ => ExecutiveStatus::NonCompliant,
    }
}

/// Legal exposure from the fired violations.
#[must_use]
pub fn legal_analysis(violations: &[Violation], counts: &SeverityCounts) -> LegalAnalysis {
    let mut affected_articles: Vec<String> = Vec::new();
    for violation in violations {
        if !affected_articles.contains(&violation.legal_reference) {
            affected_articles.push(violation.legal_reference.clone());
        }
    }

    let legal_risk = if counts.critical > 0 {
        "HIGH - Fundamental consent violations detected. Immediate remediation required."
    } else if counts.high >= 2 {
        "MEDIUM - Multiple compliance issues. Address within 30 days."
    } else {
        "LOW - Minor compliance gaps. Monitor and improve."
    };

    let regulatory_action = if violations
        .iter()
        .any(|v| REGULATORY_CODES.contains(&v.code.as_str()))
    {
        "Regulatory investigation risk if user complaints filed. Priority remediation advised."
    } else {
        "Low regulatory risk. Proactive compliance improvements recommended."
    };

    let fine_exposure = if counts.critical > 0 {
        "Up to €20M or 4% of annual turnover for systematic consent violations"
    } else if counts.high >= 2 {
        "Up to €10M or 2% of annual turnover for multiple compliance failures"
    } else {
        "Administrative fines up to €10,000 for minor violations"
    };

    LegalAnalysis {
        affected_articles,
        legal_risk: legal_risk.to_string(),
        regulatory_action: regulatory_action.to_string(),
        fine_exposure: fine_exposure.to_string(),
    }
}

struct RecommendationRule {
    triggers: &'static [&'static str],
    priority: Priority,
    category: &'static str,
    action: &'static str,
    timeline: &'static str,
    effort: Effort,
    impact: &'static str,
}

/// Most urgent first.
const RECOMMENDATION_RULES: [RecommendationRule; 6] = [
    RecommendationRule {
        triggers: &[PRE_CONSENT_SCRIPTS, PRE_CONSENT_COOKIES, PRE_CONSENT_THIRD_PARTY],
        priority: Priority::Immediate,
        category: "Technical Implementation",
        action: "Implement consent-gated loading for all tracking technologies",
        timeline: "1-2 weeks",
        effort: Effort::Medium,
        impact: "Eliminates high-risk pre-consent violations",
    },
    RecommendationRule {
        triggers: &[MISSING_REJECT],
        priority: Priority::Immediate,
        category: "UI/UX Design",
        action: "Add prominent \"Reject All\" button to consent banner",
        timeline: "1-3 days",
        effort: Effort::Low,
        impact: "Ensures freely given consent, critical for GDPR compliance",
    },
    RecommendationRule {
        triggers: &[MECHANISM_NOT_FUNCTIONAL, IDENTICAL_TRACKING],
        priority: Priority::Critical,
        category: "CMP Configuration",
        action: "Debug and fix consent mechanism functionality",
        timeline: "1 week",
        effort: Effort::High,
        impact: "Makes consent choices meaningful and legally valid",
    },
    RecommendationRule {
        triggers: &[CONSENT_BYPASS],
        priority: Priority::Critical,
        category: "Technical Implementation",
        action: "Enforce server-side consent validation for all tag firing",
        timeline: "1-2 weeks",
        effort: Effort::High,
        impact: "Stops tracking for visitors who declined consent",
    },
    RecommendationRule {
        triggers: &[ACCEPT_ONLY],
        priority: Priority::High,
        category: "UI/UX Design",
        action: "Give accept and reject choices equal prominence",
        timeline: "1 week",
        effort: Effort::Low,
        impact: "Removes the accept-only pattern that invalidates consent",
    },
    RecommendationRule {
        triggers: &[INSUFFICIENT_INFORMATION],
        priority: Priority::Medium,
        category: "Content",
        action: "Publish complete cookie purpose and controller information",
        timeline: "1 week",
        effort: Effort::Low,
        impact: "Makes consent informed and specific",
    },
];

/// Recommendations triggered by the fired codes, most urgent first.
#[must_use]
pub fn recommendations(violations: &[Violation]) -> Vec<Recommendation> {
    RECOMMENDATION_RULES
        .iter()
        .filter_map(|rule| {
            let mut triggered_by: Vec<_> = violations
                .iter()
                .filter(|v| rule.triggers.contains(&v.code.as_str()))
                .map(|v| v.code.clone())
                .collect();
            triggered_by.dedup();
            (!triggered_by.is_empty()).then(|| Recommendation {
                priority: rule.priority,
                category: rule.category.to_string(),
                action: rule.action.to_string(),
                timeline: rule.timeline.to_string(),
                effort: rule.effort,
                impact: rule.impact.to_string(),
                triggered_by,
            })
        })
        .collect()
}
