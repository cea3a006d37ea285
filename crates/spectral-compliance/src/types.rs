use serde::{Deserialize, Serialize};
use spectral_catalog::ViolationDefinition;
use spectral_core::{AuditId, Severity, StageMetrics, StageName, Timestamp, ViolationCode};
use std::fmt;

/// Signed per-metric change between two stages.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricDelta {
    /// Change in script count
    pub scripts: i64,
    /// Change in cookie count
    pub cookies: i64,
    /// Change in storage item count
    pub storage: i64,
}

impl MetricDelta {
    /// `after - before` for each metric.
    #[must_use]
    #[allow(clippy::cast_possible_wrap)]
    pub fn between(before: StageMetrics, after: StageMetrics) -> Self {
        Self {
            scripts: after.scripts as i64 - before.scripts as i64,
            cookies: after.cookies as i64 - before.cookies as i64,
            storage: after.storage as i64 - before.storage as i64,
        }
    }

    /// Whether nothing changed.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        *self == Self::default()
    }
}

/// Concrete evidence extracted for a fired rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ViolationDetails {
    /// Tracking scripts present in a stage
    TrackingScripts {
        /// Stage the scripts were seen in
        stage: StageName,
        /// Tracking script count
        count: usize,
        /// Offending sources
        scripts: Vec<String>,
        /// All scripts on the page
        total_scripts: usize,
        /// Scripts classified necessary
        necessary_scripts: usize,
    },
    /// Tracking cookies set before consent
    TrackingCookies {
        /// Tracking cookie count
        count: usize,
        /// Offending cookie names
        cookies: Vec<String>,
        /// All cookies in the jar
        total_cookies: usize,
    },
    /// Tracking requests to third-party hosts before consent
    ThirdPartyRequests {
        /// Offending request count
        count: usize,
        /// Offending sources
        requests: Vec<String>,
        /// Third-party scripts of any kind
        third_party_scripts: usize,
    },
    /// No usable reject path
    MissingReject {
        /// Detected CMP, if any
        provider: Option<String>,
        /// Button labels found on the banner
        buttons: Vec<String>,
        /// Crawler note on the `reject_unavailable` stage
        annotation: Option<String>,
    },
    /// Banner offers accept without reject
    AcceptOnly {
        /// Detected CMP, if any
        provider: Option<String>,
        /// Button labels found on the banner
        buttons: Vec<String>,
    },
    /// Banner text too short to inform
    InsufficientInformation {
        /// Banner text length in characters
        text_length: usize,
        /// Required minimum
        minimum: usize,
    },
    /// Accepting changed nothing observable
    NoConsentEffect {
        /// `post-accept - accept_pre`
        accept_increase: MetricDelta,
    },
    /// Rejecting and accepting ended in the same state
    IdenticalOutcome {
        /// Metrics after reject
        reject: StageMetrics,
        /// Metrics after accept
        accept: StageMetrics,
    },
}

/// A fired rule, combined with its catalog entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Stable identifier
    pub code: ViolationCode,
    /// Catalog title
    pub title: String,
    /// Catalog severity
    pub severity: Severity,
    /// Catalog legal reference
    pub legal_reference: String,
    /// Catalog description
    pub description: String,
    /// Catalog business impact
    pub business_impact: String,
    /// Catalog remediation
    pub remediation: String,
    /// Evidence extracted from the package
    pub details: ViolationDetails,
    /// Screenshot reference of the stage the evidence came from
    pub screenshot: Option<String>,
    /// When the rule fired
    pub detected_at: Timestamp,
}

impl Violation {
    /// Build a violation from its catalog entry.
    #[must_use]
    pub fn new(
        definition: &ViolationDefinition,
        details: ViolationDetails,
        screenshot: Option<String>,
    ) -> Self {
        Self {
            code: definition.code.clone(),
            title: definition.title.clone(),
            severity: definition.severity,
            legal_reference: definition.legal_reference.clone(),
            description: definition.description.clone(),
            business_impact: definition.business_impact.clone(),
            remediation: definition.remediation.clone(),
            details,
            screenshot,
            detected_at: Timestamp::now(),
        }
    }
}

/// Violation counts by severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    /// All violations
    pub total: usize,
    /// CRITICAL violations
    pub critical: usize,
    /// HIGH violations
    pub high: usize,
    /// MEDIUM violations
    pub medium: usize,
    /// LOW violations
    pub low: usize,
}

impl SeverityCounts {
    /// Tally a violation list.
    #[must_use]
    pub fn from_violations(violations: &[Violation]) -> Self {
        violations
            .iter()
            .fold(Self::default(), |mut counts, violation| {
                counts.total += 1;
                match violation.severity {
                    Severity::Critical => counts.critical += 1,
                    Severity::High => counts.high += 1,
                    Severity::Medium => counts.medium += 1,
                    Severity::Low => counts.low += 1,
                }
                counts
            })
    }
}

/// Overall risk tier of a site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    /// No HIGH or CRITICAL findings
    Low,
    /// One HIGH finding
    Medium,
    /// Two or more HIGH findings
    High,
    /// At least one CRITICAL finding
    Critical,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Critical => "CRITICAL",
        })
    }
}

/// One-line verdict derived from the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutiveStatus {
    /// Score of 80 or more
    #[serde(rename = "COMPLIANT")]
    Compliant,
    /// Score of 60 to 79
    #[serde(rename = "NEEDS ATTENTION")]
    NeedsAttention,
    /// Score below 60
    #[serde(rename = "NON-COMPLIANT")]
    NonCompliant,
}

impl fmt::Display for ExecutiveStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Compliant => "COMPLIANT",
            Self::NeedsAttention => "NEEDS ATTENTION",
            Self::NonCompliant => "NON-COMPLIANT",
        })
    }
}

/// Recommendation urgency, most urgent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Priority {
    /// Fix now
    Immediate,
    /// Fix before anything else is shipped
    Critical,
    /// Fix this cycle
    High,
    /// Schedule
    Medium,
}

/// Rough implementation effort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Effort {
    /// Configuration or copy change
    Low,
    /// Some engineering work
    Medium,
    /// Investigation and engineering work
    High,
}

/// A remediation step triggered by fired violation codes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recommendation {
    /// Urgency
    pub priority: Priority,
    /// Area of work
    pub category: String,
    /// What to do
    pub action: String,
    /// Expected duration
    pub timeline: String,
    /// Expected effort
    pub effort: Effort,
    /// What fixing it achieves
    pub impact: String,
    /// Fired codes that triggered this recommendation
    pub triggered_by: Vec<ViolationCode>,
}

/// Legal exposure summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegalAnalysis {
    /// Distinct legal references touched, in first-seen order
    pub affected_articles: Vec<String>,
    /// Overall legal risk narrative
    pub legal_risk: String,
    /// Likelihood of regulatory action
    pub regulatory_action: String,
    /// Fine exposure narrative
    pub fine_exposure: String,
}

/// Scored, explainable assessment of one evidence package.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplianceReport {
    /// Audit the evidence came from
    pub audit_id: AuditId,
    /// Audited URL
    pub url: String,
    /// Audited host
    pub domain: String,
    /// When the report was produced
    pub generated_at: Timestamp,
    /// `0..=100`, higher is better
    pub score: u32,
    /// Risk tier
    pub risk: RiskTier,
    /// Verdict derived from the score
    pub status: ExecutiveStatus,
    /// Counts by severity
    pub summary: SeverityCounts,
    /// Fired violations in rule order
    pub violations: Vec<Violation>,
    /// Remediation steps, most urgent first
    pub recommendations: Vec<Recommendation>,
    /// Legal exposure
    pub legal: LegalAnalysis,
    /// Why the crawl stopped early, if it did
    pub crawl_error: Option<String>,
}

impl ComplianceReport {
    /// Whether a violation with `code` fired.
    #[must_use]
    pub fn has_violation(&self, code: &str) -> bool {
        self.violations.iter().any(|v| v.code.as_str() == code)
    }

    /// Fired codes in rule order.
    #[must_use]
    pub fn codes(&self) -> Vec<&str> {
        self.violations.iter().map(|v| v.code.as_str()).collect()
    }

    /// Serialize the report as pretty JSON.
    pub fn to_json(&self) -> crate::Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_delta() {
        let before = StageMetrics {
            scripts: 8,
            cookies: 2,
            storage: 1,
        };
        let after = StageMetrics {
            scripts: 12,
            cookies: 2,
            storage: 0,
        };
        let delta = MetricDelta::between(before, after);
        assert_eq!(
            delta,
            MetricDelta {
                scripts: 4,
                cookies: 0,
                storage: -1
            }
        );
        assert!(!delta.is_zero());
        assert!(MetricDelta::between(before, before).is_zero());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&ExecutiveStatus::NeedsAttention).expect("serialize");
        assert_eq!(json, r#""NEEDS ATTENTION""#);
        assert_eq!(
            serde_json::to_string(&RiskTier::Critical).expect("serialize"),
            r#""CRITICAL""#
        );
    }

    #[test]
    fn test_priority_order() {
        let mut priorities = vec![
            Priority::Medium,
            Priority::Immediate,
            Priority::High,
            Priority::Critical,
        ];
        priorities.sort();
        assert_eq!(
            priorities,
            vec![Priority::Immediate, Priority::Critical, Priority::High, Priority::Medium]
        );
    }

    #[test]
    fn test_details_are_tagged() {
        let details = ViolationDetails::InsufficientInformation {
            text_length: 12,
            minimum: 50,
        };
        let value = serde_json::to_value(&details).expect("serialize");
        assert_eq!(value["kind"], "insufficient_information");
        assert_eq!(value["text_length"], 12);
    }
}
