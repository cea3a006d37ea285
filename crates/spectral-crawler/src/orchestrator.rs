//! Crawl orchestrator for the differential consent audit.
//!
//! A single site walks a fixed sequence of phases on one session:
//!
//! ```text
//! baseline -> (reset) -> reject_pre -> [post-reject | reject_unavailable]
//!          -> (reset) -> accept_pre -> post-accept
//! ```
//!
//! A reset clears cookies and storage before navigating fresh, so no phase
//! sees tracking state left behind by the previous one. Navigation failures
//! end the crawl early but never lose the evidence gathered so far.
//!
//! Batches run one session per site, with a bounded number of sites in flight.

use crate::banner::BannerAnalyzer;
use crate::collector::EvidenceCollector;
use crate::consent::ConsentResolver;
use crate::error::{CrawlError, Result};
use crate::wait::{settle, wait_for_page_complete};
use futures::stream::{FuturesUnordered, StreamExt};
use spectral_browser::{extract_domain, BrowserSession, SessionFactory, WaitPolicy};
use spectral_catalog::Catalog;
use spectral_core::{
    AppConfig, BannerAnalysis, ConsentAction, CrawlConfig, EvidencePackage, EvidenceSnapshot,
    EvidenceStage, StageName,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Annotation on `reject_unavailable` when the banner offers no reject path.
pub const NO_REJECT_OPTION: &str = "No reject option provided (GDPR violation)";

/// Annotation on `reject_unavailable` when a reject option was seen but
/// no strategy could activate it.
pub const REJECT_NOT_ACTIONABLE: &str = "Reject option shown but could not be activated";

/// Result of auditing a single site in a batch.
#[derive(Debug, Clone)]
pub struct SiteAudit {
    /// Target URL
    pub url: String,
    /// Evidence gathered, possibly partial
    pub package: EvidencePackage,
    /// Why the audit stopped early, if it did
    pub error: Option<String>,
}

/// Evidence for one site, kept outside the phase sequence so an aborted
/// crawl still returns what was captured.
struct SiteCrawl {
    package: EvidencePackage,
    baseline: Option<EvidenceSnapshot>,
}

impl SiteCrawl {
    fn push(&mut self, stage: EvidenceStage) -> Result<()> {
        self.package.push(stage).map_err(CrawlError::from)
    }

    /// Label the baseline capture `pre-consent`, with the banner analysis.
    fn push_pre_consent(&mut self, banner: BannerAnalysis) -> Result<()> {
        match self.baseline.take() {
            Some(baseline) => {
                self.push(EvidenceStage::new(StageName::PreConsent, baseline).with_banner(banner))
            }
            None => Err(CrawlError::Evidence(spectral_core::SpectralError::Crawl(
                "baseline was not captured".to_string(),
            ))),
        }
    }

    /// Close out an aborted crawl.
    ///
    /// A baseline captured before the banner analysis is still kept, as a
    /// `pre-consent` stage without banner.
    fn abort(&mut self, err: &CrawlError) {
        if self.package.stages().is_empty() {
            if let Some(baseline) = self.baseline.take() {
                if let Err(e) = self
                    .package
                    .push(EvidenceStage::new(StageName::PreConsent, baseline))
                {
                    debug!(error = %e, "could not keep baseline evidence");
                }
            }
        }
        self.package.set_error(err.to_string());
    }
}

/// Runs the consent flow on sites and assembles their evidence packages.
pub struct CrawlOrchestrator {
    collector: EvidenceCollector,
    banner: BannerAnalyzer,
    resolver: ConsentResolver,
    config: CrawlConfig,
    navigation_timeout: Duration,
    max_concurrent_sites: usize,
}

impl CrawlOrchestrator {
    /// Create an orchestrator sharing the catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: &AppConfig) -> Self {
        let crawl = config.crawl.clone();
        Self {
            collector: EvidenceCollector::new(catalog.clone(), crawl.clone()),
            banner: BannerAnalyzer::new(catalog.clone(), crawl.banner_excerpt_chars),
            resolver: ConsentResolver::new(catalog, crawl.clone()),
            config: crawl,
            navigation_timeout: config.browser.navigation_timeout(),
            max_concurrent_sites: config.scanning.concurrent_sites.max(1),
        }
    }

    /// Set the maximum number of sites audited at once.
    #[must_use]
    pub fn with_max_concurrent_sites(mut self, max: usize) -> Self {
        self.max_concurrent_sites = max.max(1);
        self
    }

    /// Replace the consent strategy chain.
    #[must_use]
    pub fn with_resolver(mut self, resolver: ConsentResolver) -> Self {
        self.resolver = resolver;
        self
    }

    /// Audit one site on an open session.
    ///
    /// Always returns a package. If the crawl stopped early the package holds
    /// the stages completed so far and a top-level error.
    pub async fn audit<S: BrowserSession>(&self, session: &S, url: &str) -> EvidencePackage {
        let domain = match extract_domain(url) {
            Ok(domain) => domain,
            Err(e) => {
                let err = CrawlError::InvalidTarget {
                    url: url.to_string(),
                    reason: e.to_string(),
                };
                warn!(url, error = %err, "refusing to crawl target");
                let mut package = EvidencePackage::new(url, String::new());
                package.set_error(err.to_string());
                return package;
            }
        };

        info!(url, domain = %domain, "starting consent audit");
        let mut crawl = SiteCrawl {
            package: EvidencePackage::new(url, domain),
            baseline: None,
        };

        if let Err(e) = self.run_phases(session, url, &mut crawl).await {
            warn!(url, error = %e, "crawl aborted, keeping partial evidence");
            crawl.abort(&e);
        }

        let package = crawl.package;
        info!(
            url,
            audit_id = %package.audit_id,
            stages = package.stages().len(),
            complete = package.error.is_none(),
            "consent audit finished"
        );
        package
    }

    async fn run_phases<S: BrowserSession>(
        &self,
        session: &S,
        url: &str,
        crawl: &mut SiteCrawl,
    ) -> Result<()> {
        // Baseline: first load, no interaction.
        self.load(session, url, WaitPolicy::DomContentLoaded).await?;
        crawl.baseline = Some(self.collector.capture(session, "baseline", url).await);

        self.reject_phase(session, url, crawl).await?;
        self.accept_phase(session, url, crawl).await
    }

    async fn reject_phase<S: BrowserSession>(
        &self,
        session: &S,
        url: &str,
        crawl: &mut SiteCrawl,
    ) -> Result<()> {
        self.reset(session, url).await?;

        let banner = self.banner.analyze(session).await;
        let direct_reject = banner.has_direct_reject;
        info!(
            url,
            detected = banner.detected,
            provider = banner.provider.as_deref().unwrap_or("none"),
            direct_reject,
            "banner analyzed"
        );

        let reject_pre = self.collector.capture(session, "reject_pre", url).await;
        crawl.push_pre_consent(banner)?;
        crawl.push(EvidenceStage::new(StageName::RejectPre, reject_pre.clone()))?;

        let rejected = direct_reject && self.resolver.act(session, ConsentAction::Reject).await;
        if rejected {
            settle(self.config.post_reject_settle_ms).await;
            // Reload to observe what the page does with the stored choice.
            session
                .navigate(url, WaitPolicy::Load, self.navigation_timeout)
                .await?;
            settle(self.config.reload_settle_ms).await;
            let post_reject = self.collector.capture(session, "reject", url).await;
            crawl.push(EvidenceStage::new(StageName::PostReject, post_reject))
        } else {
            let annotation = if direct_reject {
                REJECT_NOT_ACTIONABLE
            } else {
                NO_REJECT_OPTION
            };
            info!(url, annotation, "reject unavailable");
            crawl.push(
                EvidenceStage::new(StageName::RejectUnavailable, reject_pre)
                    .with_annotation(annotation),
            )
        }
    }

    async fn accept_phase<S: BrowserSession>(
        &self,
        session: &S,
        url: &str,
        crawl: &mut SiteCrawl,
    ) -> Result<()> {
        self.reset(session, url).await?;

        let accept_pre = self.collector.capture(session, "accept_pre", url).await;
        crawl.push(EvidenceStage::new(StageName::AcceptPre, accept_pre))?;

        if self.resolver.act(session, ConsentAction::Accept).await {
            settle(self.config.post_accept_settle_ms).await;
            wait_for_page_complete(
                session,
                self.config.post_accept_complete_timeout_ms,
                self.config.ready_state_poll_ms,
            )
            .await;
            settle(self.config.post_accept_tail_ms).await;
        } else {
            warn!(url, "accept could not be performed, capturing page as is");
        }

        let post_accept = self.collector.capture(session, "accept", url).await;
        crawl.push(EvidenceStage::new(StageName::PostAccept, post_accept))
    }

    /// Clear cookies and storage, then load the page fresh.
    async fn reset<S: BrowserSession>(&self, session: &S, url: &str) -> Result<()> {
        if let Err(e) = session.clear_cookies().await {
            warn!(url, error = %e, "clearing cookies failed");
        }
        if let Err(e) = session.clear_storage().await {
            warn!(url, error = %e, "clearing storage failed");
        }
        self.load(session, url, WaitPolicy::DomContentLoaded).await
    }

    async fn load<S: BrowserSession>(
        &self,
        session: &S,
        url: &str,
        wait: WaitPolicy,
    ) -> Result<()> {
        debug!(url, ?wait, "navigating");
        session.navigate(url, wait, self.navigation_timeout).await?;
        settle(self.config.navigation_settle_ms).await;
        Ok(())
    }

    /// Audit many sites, one session each.
    ///
    /// At most `max_concurrent_sites` run at once. Results arrive in
    /// completion order; one failing site never stops the batch.
    pub async fn audit_batch<F: SessionFactory>(
        &self,
        targets: Vec<String>,
        factory: &F,
    ) -> Vec<SiteAudit> {
        info!(
            sites = targets.len(),
            concurrency = self.max_concurrent_sites,
            "starting audit batch"
        );
        let mut futures = FuturesUnordered::new();
        let mut results = Vec::with_capacity(targets.len());

        for url in targets {
            futures.push(self.audit_site(factory, url));

            // Respect concurrency limit
            while futures.len() >= self.max_concurrent_sites {
                if let Some(result) = futures.next().await {
                    results.push(result);
                }
            }
        }

        // Collect remaining results
        while let Some(result) = futures.next().await {
            results.push(result);
        }

        let failed = results.iter().filter(|r| r.error.is_some()).count();
        info!(sites = results.len(), failed, "audit batch finished");
        results
    }

    async fn audit_site<F: SessionFactory>(&self, factory: &F, url: String) -> SiteAudit {
        let session = match factory.open().await {
            Ok(session) => session,
            Err(e) => {
                let err = CrawlError::from(e).to_string();
                error!(url = %url, error = %err, "could not open browser session");
                let mut package =
                    EvidencePackage::new(url.as_str(), extract_domain(&url).unwrap_or_default());
                package.set_error(err.clone());
                return SiteAudit {
                    url,
                    package,
                    error: Some(err),
                };
            }
        };

        let package = self.audit(&session, &url).await;
        if let Err(e) = factory.close(session).await {
            debug!(url = %url, error = %e, "closing browser session failed");
        }

        SiteAudit {
            error: package.error.clone(),
            url,
            package,
        }
    }
}

impl std::fmt::Debug for CrawlOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrawlOrchestrator")
            .field("resolver", &self.resolver)
            .field("navigation_timeout", &self.navigation_timeout)
            .field("max_concurrent_sites", &self.max_concurrent_sites)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spectral_browser::testing::{ScriptedSession, ScriptedSessionFactory, SessionCall};
    use spectral_browser::BoundingBox;
    use spectral_core::BannerStyle;

    const URL: &str = "https://www.example.com/";

    const VISIBLE: BoundingBox = BoundingBox {
        x: 20.0,
        y: 640.0,
        width: 160.0,
        height: 44.0,
    };

    fn orchestrator() -> CrawlOrchestrator {
        let mut config = AppConfig::default();
        config.crawl = CrawlConfig::without_delays();
        CrawlOrchestrator::new(Arc::new(Catalog::builtin().expect("builtin catalog")), &config)
    }

    /// A page with a OneTrust banner and one tracking script.
    fn onetrust_page(buttons: &str) -> ScriptedSession {
        ScriptedSession::new()
            .on_evaluate(
                "spectral:page-scripts",
                json!({
                    "hostname": "www.example.com",
                    "scripts": [
                        { "src": "https://www.googletagmanager.com/gtm.js", "inline": false },
                        { "src": "", "inline": true }
                    ]
                }),
            )
            .on_evaluate("spectral:storage", json!({ "keys": [] }))
            .on_evaluate("spectral:images", json!([]))
            .on_evaluate(
                "spectral:banner-dom",
                json!({
                    "html": format!(
                        "<html><body><div id=\"onetrust-banner-sdk\">\
                         <p>We use cookies to personalise ads.</p>{buttons}</div></body></html>"
                    )
                }),
            )
            .on_evaluate("spectral:ready-state", json!("complete"))
    }

    fn stage_names(package: &EvidencePackage) -> Vec<StageName> {
        package.stages().iter().map(|s| s.name).collect()
    }

    #[tokio::test]
    async fn test_full_flow_with_reject() {
        let session = onetrust_page(
            "<button id=\"onetrust-reject-all-handler\">Reject all</button>\
             <button id=\"onetrust-accept-btn-handler\">Accept all</button>",
        )
        .with_element("#onetrust-reject-all-handler", Some(VISIBLE))
        .with_element("#onetrust-accept-btn-handler", Some(VISIBLE));

        let package = orchestrator().audit(&session, URL).await;

        assert!(package.error.is_none());
        assert_eq!(package.domain, "example.com");
        assert_eq!(
            stage_names(&package),
            vec![
                StageName::PreConsent,
                StageName::RejectPre,
                StageName::PostReject,
                StageName::AcceptPre,
                StageName::PostAccept,
            ]
        );
        let banner = package.banner().expect("banner on pre-consent");
        assert!(banner.has_direct_reject);
        assert_eq!(banner.provider.as_deref(), Some("OneTrust"));
        assert_eq!(
            package
                .snapshot(StageName::PreConsent)
                .expect("pre-consent")
                .stage,
            "baseline"
        );
        assert_eq!(
            session.clicked(),
            vec![
                "#onetrust-reject-all-handler".to_string(),
                "#onetrust-accept-btn-handler".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_resets_before_reject_and_accept() {
        let session = onetrust_page("<button>Accept all</button>")
            .with_element("#onetrust-accept-btn-handler", Some(VISIBLE));

        orchestrator().audit(&session, URL).await;

        let calls = session.calls();
        let navigations: Vec<usize> = calls
            .iter()
            .enumerate()
            .filter(|(_, call)| matches!(call, SessionCall::Navigate(_)))
            .map(|(i, _)| i)
            .collect();
        // baseline, reject_pre, accept_pre
        assert_eq!(navigations.len(), 3);
        for &nav in &navigations[1..] {
            assert_eq!(calls[nav - 2], SessionCall::ClearCookies);
            assert_eq!(calls[nav - 1], SessionCall::ClearStorage);
        }
    }

    #[tokio::test]
    async fn test_accept_only_banner_records_reject_unavailable() {
        let session =
            onetrust_page("<button id=\"onetrust-accept-btn-handler\">Accept all</button>")
                .with_element("#onetrust-accept-btn-handler", Some(VISIBLE));

        let package = orchestrator().audit(&session, URL).await;

        assert!(package.error.is_none());
        assert_eq!(
            stage_names(&package),
            vec![
                StageName::PreConsent,
                StageName::RejectPre,
                StageName::RejectUnavailable,
                StageName::AcceptPre,
                StageName::PostAccept,
            ]
        );
        let unavailable = package
            .stage(StageName::RejectUnavailable)
            .expect("reject_unavailable");
        assert_eq!(unavailable.annotation.as_deref(), Some(NO_REJECT_OPTION));
        assert_eq!(unavailable.snapshot.stage, "reject_pre");
        assert_eq!(
            package.banner().and_then(|b| b.style),
            Some(BannerStyle::AcceptOnly)
        );
        // No reject attempt was made.
        assert_eq!(session.clicked(), vec!["#onetrust-accept-btn-handler".to_string()]);
    }

    #[tokio::test]
    async fn test_unclickable_reject_is_annotated_differently() {
        let session = onetrust_page("<button>Reject all</button><button>Accept all</button>");

        let package = orchestrator().audit(&session, URL).await;

        let unavailable = package
            .stage(StageName::RejectUnavailable)
            .expect("reject_unavailable");
        assert_eq!(unavailable.annotation.as_deref(), Some(REJECT_NOT_ACTIONABLE));
        assert!(package.stage(StageName::PostAccept).is_some());
    }

    #[tokio::test]
    async fn test_navigation_failure_keeps_partial_package() {
        // Second navigation is the reset before reject_pre.
        let session = onetrust_page("<button>Reject all</button>").fail_navigation(2);

        let package = orchestrator().audit(&session, URL).await;

        assert_eq!(stage_names(&package), vec![StageName::PreConsent]);
        assert!(package.banner().is_none());
        assert!(package
            .error
            .as_deref()
            .is_some_and(|e| e.contains("scripted failure")));
    }

    #[tokio::test]
    async fn test_failure_during_accept_phase() {
        let session = onetrust_page("<button>Accept all</button>").fail_navigation(3);

        let package = orchestrator().audit(&session, URL).await;

        assert_eq!(
            stage_names(&package),
            vec![
                StageName::PreConsent,
                StageName::RejectPre,
                StageName::RejectUnavailable
            ]
        );
        assert!(package.error.is_some());
        assert!(package.validate().is_ok());
    }

    #[tokio::test]
    async fn test_invalid_target() {
        let session = ScriptedSession::new();
        let package = orchestrator().audit(&session, "not a url").await;

        assert!(package.stages().is_empty());
        assert!(package
            .error
            .as_deref()
            .is_some_and(|e| e.starts_with("Invalid target")));
        assert!(session.calls().is_empty());
    }

    #[tokio::test]
    async fn test_batch_survives_failed_sessions() {
        let factory =
            ScriptedSessionFactory::new(vec![onetrust_page("<button>Accept all</button>")])
                .then_fail("chrome not found");
        let orchestrator = orchestrator().with_max_concurrent_sites(2);

        let results = orchestrator
            .audit_batch(
                vec![
                    "https://a.example.com".to_string(),
                    "https://b.example.com".to_string(),
                    "https://c.example.com".to_string(),
                ],
                &factory,
            )
            .await;

        assert_eq!(results.len(), 3);
        let failed: Vec<&SiteAudit> = results.iter().filter(|r| r.error.is_some()).collect();
        assert_eq!(failed.len(), 1);
        assert!(failed[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("chrome not found")));
        assert!(failed[0].package.stages().is_empty());
        assert_eq!(failed[0].package.error, failed[0].error);
    }
}
