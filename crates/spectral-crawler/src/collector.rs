//! Evidence capture for a single stage of the consent flow.
//!
//! [`EvidenceCollector::capture`] never fails: errors degrade the snapshot
//! (bare script count, denied storage, missing screenshot) or, when nothing
//! can be read, yield a zeroed snapshot carrying the error.

use crate::classify::{script_hint, Classifier};
use crate::error::Result;
use crate::probe::{self, ImageInfo, PageScripts, StorageKeys};
use crate::wait::settle;
use spectral_browser::{evaluate_as, extract_domain, BrowserSession};
use spectral_catalog::Catalog;
use spectral_core::{
    Classification, ClassificationCounts, CrawlConfig, EvidenceSnapshot, Timestamp,
};
use std::sync::Arc;
use tracing::{debug, warn};

/// Script list as read from the page.
#[derive(Debug)]
enum ScriptList {
    /// Full list with the page hostname
    Full(PageScripts),
    /// Only `document.scripts.length` could be read
    CountOnly(usize),
}

/// Captures [`EvidenceSnapshot`]s from a live session.
#[derive(Debug, Clone)]
pub struct EvidenceCollector {
    catalog: Arc<Catalog>,
    config: CrawlConfig,
}

impl EvidenceCollector {
    /// Create a collector sharing the catalog.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: CrawlConfig) -> Self {
        Self { catalog, config }
    }

    /// Capture the page state under an internal stage label.
    pub async fn capture<S>(&self, session: &S, stage: &str, url: &str) -> EvidenceSnapshot
    where
        S: BrowserSession + ?Sized,
    {
        match self.try_capture(session, stage, url).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(stage, url, error = %e, "capture failed, recording zeroed snapshot");
                EvidenceSnapshot::failed(stage, url, e.to_string())
            }
        }
    }

    async fn try_capture<S>(&self, session: &S, stage: &str, url: &str) -> Result<EvidenceSnapshot>
    where
        S: BrowserSession + ?Sized,
    {
        settle(self.config.capture_settle_ms).await;

        let classifier = Classifier::new(self.catalog.tables());
        let scripts = self.read_scripts(session, stage).await?;
        let cookies = session.cookies().await?;
        let storage = read_storage(session, stage).await;
        let images = evaluate_as::<Option<Vec<ImageInfo>>, _>(session, probe::IMAGES)
            .await?
            .unwrap_or_default();

        let (page_host, scripts, total_scripts) = match scripts {
            ScriptList::Full(page) => {
                let host = if page.hostname.is_empty() {
                    extract_domain(url).unwrap_or_default()
                } else {
                    page.hostname
                };
                let total = page.scripts.len();
                (host, page.scripts, total)
            }
            ScriptList::CountOnly(count) => {
                (extract_domain(url).unwrap_or_default(), Vec::new(), count)
            }
        };

        let script_classification = if scripts.is_empty() && total_scripts > 0 {
            Classification {
                counts: ClassificationCounts {
                    unknown: total_scripts,
                    ..ClassificationCounts::default()
                },
                ..Classification::default()
            }
        } else {
            classifier.classify_scripts(&scripts, &page_host)
        };
        let unknown_script_hints = script_classification
            .unknown
            .iter()
            .map(String::as_str)
            .map(script_hint)
            .collect();
        let third_party_scripts = scripts
            .iter()
            .filter(|script| classifier.is_third_party(&script.src, &page_host))
            .count();

        let cookie_classification = classifier.classify_cookies(&cookies, &page_host);

        let (storage_items, storage_classification, storage_access_denied) = match storage {
            Some(keys) => (keys.len(), classifier.classify_storage(&keys), false),
            None => (0, ClassificationCounts::default(), true),
        };

        let tracking_pixels = images
            .iter()
            .filter(|image| classifier.is_tracking_pixel(image))
            .count();

        let screenshot = match session.screenshot(stage).await {
            Ok(reference) => Some(reference),
            Err(e) => {
                warn!(stage, error = %e, "screenshot failed");
                None
            }
        };

        let mut snapshot = EvidenceSnapshot {
            stage: stage.to_string(),
            captured_at: Timestamp::now(),
            url: url.to_string(),
            scripts,
            total_scripts,
            script_classification,
            unknown_script_hints,
            cookies,
            cookie_classification,
            storage_items,
            storage_classification,
            storage_access_denied,
            tracking_pixels,
            third_party_scripts,
            screenshot,
            classification_consistent: true,
            error: None,
        };
        snapshot.classification_consistent = snapshot.classification_balances();
        if !snapshot.classification_consistent {
            warn!(
                stage,
                total = snapshot.total_scripts,
                classified = snapshot.script_classification.counts.total(),
                "script classification does not account for every script"
            );
        }

        debug!(
            stage,
            scripts = snapshot.total_scripts,
            tracking = snapshot.script_classification.counts.tracking,
            cookies = snapshot.cookies.len(),
            storage = snapshot.storage_items,
            pixels = snapshot.tracking_pixels,
            "captured evidence"
        );
        Ok(snapshot)
    }

    /// Read the script list, retrying once, then fall back to a bare count.
    async fn read_scripts<S>(&self, session: &S, stage: &str) -> Result<ScriptList>
    where
        S: BrowserSession + ?Sized,
    {
        match evaluate_as::<PageScripts, _>(session, probe::PAGE_SCRIPTS).await {
            Ok(page) => return Ok(ScriptList::Full(page)),
            Err(e) => warn!(stage, error = %e, "script query failed, retrying once"),
        }

        settle(self.config.capture_retry_delay_ms).await;

        match evaluate_as::<PageScripts, _>(session, probe::PAGE_SCRIPTS).await {
            Ok(page) => Ok(ScriptList::Full(page)),
            Err(e) => {
                warn!(stage, error = %e, "script list unavailable, using bare count");
                let count = evaluate_as::<usize, _>(session, probe::SCRIPT_COUNT).await?;
                Ok(ScriptList::CountOnly(count))
            }
        }
    }
}

/// Storage keys, `None` when access was denied.
async fn read_storage<S>(session: &S, stage: &str) -> Option<Vec<String>>
where
    S: BrowserSession + ?Sized,
{
    match evaluate_as::<Option<StorageKeys>, _>(session, probe::STORAGE).await {
        Ok(Some(storage)) => Some(storage.keys),
        Ok(None) => {
            warn!(stage, "storage access denied");
            None
        }
        Err(e) => {
            warn!(stage, error = %e, "storage read failed, treating as denied");
            None
        }
    }
}
