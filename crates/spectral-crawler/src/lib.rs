//! Spectral Crawler - Differential consent crawling.
//!
//! This crate drives a site through three browsing states (no interaction,
//! reject all, accept all) and captures a classified evidence snapshot at
//! each one. The resulting [`EvidencePackage`](spectral_core::EvidencePackage)
//! is what the compliance engine scores.
//!
//! # Features
//!
//! - Script, cookie, storage and pixel classification against the shared catalog
//! - Banner detection across known CMP vendors with a generic fallback
//! - Consent interaction through an ordered strategy chain: CMP APIs, vendor
//!   selectors, language-aware text matching, then iframes
//! - Partial evidence on failure instead of aborting
//! - Concurrent batches with a configurable number of sites in flight
//!
//! # Example
//!
//! ```rust,ignore
//! use spectral_browser::ChromiumSessionFactory;
//! use spectral_catalog::Catalog;
//! use spectral_core::AppConfig;
//! use spectral_crawler::CrawlOrchestrator;
//! use std::sync::Arc;
//!
//! let config = AppConfig::load()?;
//! let catalog = Arc::new(Catalog::builtin()?);
//! let orchestrator = CrawlOrchestrator::new(catalog, &config);
//!
//! let factory = ChromiumSessionFactory::new(config.browser.clone());
//! let audits = orchestrator
//!     .audit_batch(vec!["https://example.com".to_string()], &factory)
//!     .await;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod banner;
pub mod classify;
pub mod collector;
pub mod consent;
pub mod error;
pub mod orchestrator;
#[allow(missing_docs)]
pub mod probe;
pub mod wait;

// Re-export commonly used types
pub use banner::BannerAnalyzer;
pub use classify::{script_hint, Classifier, ItemClass};
pub use collector::EvidenceCollector;
pub use consent::{ConsentResolver, ConsentStrategy, StrategyOutcome};
pub use error::{CrawlError, Result};
pub use orchestrator::{CrawlOrchestrator, SiteAudit};
