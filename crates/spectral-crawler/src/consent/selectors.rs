use super::{ConsentStrategy, StrategyOutcome};
use spectral_browser::BrowserSession;
use spectral_catalog::Catalog;
use spectral_core::ConsentAction;
use std::sync::Arc;
use tracing::debug;

/// Clicks the first visible element among the vendors' known button selectors.
#[derive(Debug, Clone)]
pub struct KnownSelectorStrategy {
    catalog: Arc<Catalog>,
}

impl KnownSelectorStrategy {
    /// Create the strategy over the catalog's vendors.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl ConsentStrategy for KnownSelectorStrategy {
    fn name(&self) -> &'static str {
        "known-selector"
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        action: ConsentAction,
    ) -> StrategyOutcome {
        let mut last_failure = None;

        for vendor in self.catalog.vendors() {
            for selector in vendor.selectors(action) {
                let element = match session.query_selector(selector).await {
                    Ok(Some(element)) => element,
                    Ok(None) => continue,
                    Err(e) => {
                        debug!(selector = %selector, error = %e, "selector query failed");
                        continue;
                    }
                };

                match session.bounding_box(&element).await {
                    Ok(Some(bounds)) if bounds.is_visible() => {}
                    Ok(_) => {
                        debug!(selector = %selector, "matched element is not visible");
                        continue;
                    }
                    Err(e) => {
                        debug!(selector = %selector, error = %e, "bounding box unavailable");
                        continue;
                    }
                }

                match session.click(&element).await {
                    Ok(()) => {
                        return StrategyOutcome::Performed {
                            detail: format!("{}: {selector}", vendor.name),
                        }
                    }
                    Err(e) => last_failure = Some(format!("click on {selector} failed: {e}")),
                }
            }
        }

        last_failure.map_or(StrategyOutcome::NotApplicable, StrategyOutcome::Failed)
    }
}
