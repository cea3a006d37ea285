use crate::error::Result;
use crate::rules::{self, RuleSettings, RULE_CODES};
use crate::scoring;
use crate::types::{ComplianceReport, SeverityCounts, Violation};
use spectral_catalog::Catalog;
use spectral_core::{CrawlConfig, EvidencePackage, Timestamp};
use std::sync::Arc;
use tracing::{info, warn};

/// Turns evidence packages into scored compliance reports.
///
/// Evaluation is pure: the same package always yields the same violations,
/// score and recommendations. Only timestamps differ between runs.
#[derive(Debug, Clone)]
pub struct ComplianceEngine {
    catalog: Arc<Catalog>,
    settings: RuleSettings,
}

impl ComplianceEngine {
    /// Create an engine over the catalog.
    ///
    /// # Errors
    /// Returns an error if the catalog lacks an entry for any rule.
    pub fn new(catalog: Arc<Catalog>) -> Result<Self> {
        for code in RULE_CODES {
            catalog.violation(code)?;
        }
        Ok(Self {
            catalog,
            settings: RuleSettings::default(),
        })
    }

    /// Take rule thresholds from the crawl configuration.
    #[must_use]
    pub fn with_crawl_config(mut self, config: &CrawlConfig) -> Self {
        self.settings.min_banner_text_chars = config.min_banner_text_chars;
        self
    }

    /// Run every rule against `package`, in rule order.
    ///
    /// A package whose stages are out of canonical order yields no violations;
    /// every rule is keyed by stage name.
    #[must_use]
    pub fn evaluate(&self, package: &EvidencePackage) -> Vec<Violation> {
        if let Err(e) = package.validate() {
            warn!(url = %package.url, error = %e, "invalid evidence package, rules skipped");
            return Vec::new();
        }
        rules::evaluate(package, &self.settings)
            .into_iter()
            .filter_map(|finding| match self.catalog.violation(finding.code) {
                Ok(definition) => {
                    info!(
                        url = %package.url,
                        code = finding.code,
                        severity = %definition.severity,
                        "violation detected"
                    );
                    Some(Violation::new(definition, finding.details, finding.screenshot))
                }
                Err(e) => {
                    warn!(code = finding.code, error = %e, "dropping uncatalogued finding");
                    None
                }
            })
            .collect()
    }

    /// Evaluate `package` and build the full report.
    ///
    /// Stage-order violations are reported through `crawl_error`, after the
    /// crawl's own error if there is one.
    #[must_use]
    pub fn assess(&self, package: &EvidencePackage) -> ComplianceReport {
        let invalid = package
            .validate()
            .err()
            .map(|e| format!("invalid evidence package: {e}"));
        let crawl_error = match (package.error.clone(), invalid) {
            (Some(crawl), Some(invalid)) => Some(format!("{crawl}; {invalid}")),
            (crawl, invalid) => crawl.or(invalid),
        };
        let violations = self.evaluate(package);
        let summary = SeverityCounts::from_violations(&violations);
        let score = scoring::score(&violations);
        let risk = scoring::risk_tier(&summary);

        info!(
            url = %package.url,
            score,
            risk = %risk,
            violations = summary.total,
            "compliance assessed"
        );

        ComplianceReport {
            audit_id: package.audit_id.clone(),
            url: package.url.clone(),
            domain: package.domain.clone(),
            generated_at: Timestamp::now(),
            score,
            risk,
            status: scoring::executive_status(score),
            summary,
            recommendations: scoring::recommendations(&violations),
            legal: scoring::legal_analysis(&violations, &summary),
            violations,
            crawl_error,
        }
    }
}
