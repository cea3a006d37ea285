//! Spectral Compliance - Consent violation rules and compliance reports
//!
//! This crate turns an [`EvidencePackage`](spectral_core::EvidencePackage) from
//! the crawler into a [`ComplianceReport`]: catalogued violations with the
//! evidence that triggered them, a 0-100 score, a risk tier, a legal exposure
//! summary and prioritized remediation steps.
//!
//! ## Architecture
//!
//! - **Rules**: a fixed, ordered set of checks keyed by canonical stage names.
//!   Missing stages narrow which rules run; they never cause an error.
//! - **Catalog**: every fired rule is joined with its `EU-C-0xx` entry from
//!   `spectral-catalog` for title, severity, legal reference and remediation.
//! - **Scoring**: severity-weighted penalties, a risk ladder and lookup-table
//!   narratives. Recommendations never influence the score.
//!
//! ## Example
//!
//! ```rust,ignore
//! use spectral_catalog::Catalog;
//! use spectral_compliance::ComplianceEngine;
//! use std::sync::Arc;
//!
//! let engine = ComplianceEngine::new(Arc::new(Catalog::builtin()?))?;
//! let report = engine.assess(&package);
//!
//! println!("{} {}/100 ({})", report.domain, report.score, report.risk);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

/// Compliance engine.
pub mod engine;
/// Error types for compliance assessment.
pub mod error;
pub mod rules;
pub mod scoring;
/// Report and violation types.
pub mod types;

pub use engine::ComplianceEngine;
pub use error::{ComplianceError, Result};
pub use rules::{Finding, RuleSettings, RULE_CODES};
pub use types::{
    ComplianceReport, Effort, ExecutiveStatus, LegalAnalysis, MetricDelta, Priority,
    Recommendation, RiskTier, SeverityCounts, Violation, ViolationDetails,
};
