use super::{ConsentStrategy, StrategyOutcome};
use crate::probe;
use spectral_browser::{evaluate_as, BrowserSession};
use spectral_catalog::Catalog;
use spectral_core::ConsentAction;
use std::sync::Arc;
use tracing::debug;

/// Calls the CMP's own JavaScript API (`OneTrust.RejectAll()`, ...).
#[derive(Debug, Clone)]
pub struct NativeApiStrategy {
    catalog: Arc<Catalog>,
}

impl NativeApiStrategy {
    /// Create the strategy over the catalog's vendors.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }
}

#[async_trait::async_trait]
impl ConsentStrategy for NativeApiStrategy {
    fn name(&self) -> &'static str {
        "native-api"
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        action: ConsentAction,
    ) -> StrategyOutcome {
        for vendor in self.catalog.vendors() {
            for call in vendor.native_calls(action) {
                let script = match probe::native_call(call) {
                    Ok(script) => script,
                    Err(e) => {
                        debug!(vendor = %vendor.name, error = %e, "skipping native call");
                        continue;
                    }
                };
                match evaluate_as::<bool, _>(session, &script).await {
                    Ok(true) => {
                        return StrategyOutcome::Performed {
                            detail: format!("{}: {}()", vendor.name, call.path()),
                        }
                    }
                    Ok(false) => {}
                    Err(e) => debug!(call = %call.path(), error = %e, "native call unavailable"),
                }
            }
        }
        StrategyOutcome::NotApplicable
    }
}
