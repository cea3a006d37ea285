//! Consent interaction: performing accept / reject / settings on a live page.
//!
//! [`ConsentResolver`] walks an ordered chain of [`ConsentStrategy`]s and
//! stops at the first one that clicks something. Failing every strategy is a
//! negative result, not an error.

mod iframe;
mod language;
mod native;
mod selectors;
mod text;

pub use iframe::IframeStrategy;
pub use language::detect_language;
pub use native::NativeApiStrategy;
pub use selectors::KnownSelectorStrategy;
pub use text::{PhraseMatcher, TextMatchStrategy};

use crate::wait::{settle, wait_for_page_complete};
use spectral_browser::BrowserSession;
use spectral_catalog::Catalog;
use spectral_core::{ConsentAction, CrawlConfig};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of one strategy attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StrategyOutcome {
    /// The action was performed; `detail` names what was clicked or called
    Performed {
        /// Selector, API path or element description
        detail: String,
    },
    /// Nothing on the page this strategy could use
    NotApplicable,
    /// A candidate was found but acting on it failed
    Failed(String),
}

impl StrategyOutcome {
    /// Whether the action was performed.
    #[must_use]
    pub fn is_performed(&self) -> bool {
        matches!(self, Self::Performed { .. })
    }
}

/// One way of performing a consent action.
#[async_trait::async_trait]
pub trait ConsentStrategy: Send + Sync {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Try the action once.
    async fn attempt(&self, session: &dyn BrowserSession, action: ConsentAction)
        -> StrategyOutcome;
}

/// Ordered strategy chain.
pub struct ConsentResolver {
    strategies: Vec<Box<dyn ConsentStrategy>>,
    config: CrawlConfig,
}

impl ConsentResolver {
    /// The standard chain: native API, known selectors, text, iframes.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, config: CrawlConfig) -> Self {
        let strategies: Vec<Box<dyn ConsentStrategy>> = vec![
            Box::new(NativeApiStrategy::new(catalog.clone())),
            Box::new(KnownSelectorStrategy::new(catalog.clone())),
            Box::new(TextMatchStrategy::new(catalog.clone())),
            Box::new(IframeStrategy::new(catalog, config.min_iframe_size)),
        ];
        Self::with_strategies(strategies, config)
    }

    /// A custom chain.
    #[must_use]
    pub fn with_strategies(strategies: Vec<Box<dyn ConsentStrategy>>, config: CrawlConfig) -> Self {
        Self { strategies, config }
    }

    /// Strategy names in chain order.
    #[must_use]
    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Perform `action`. Returns `false` only if every strategy failed.
    ///
    /// After a success, waits the consent settle interval and then, bounded,
    /// for the page to report complete.
    pub async fn act(&self, session: &dyn BrowserSession, action: ConsentAction) -> bool {
        for strategy in &self.strategies {
            match strategy.attempt(session, action).await {
                StrategyOutcome::Performed { detail } => {
                    info!(
                        action = %action,
                        strategy = strategy.name(),
                        detail = %detail,
                        "consent action performed"
                    );
                    settle(self.config.consent_settle_ms).await;
                    wait_for_page_complete(
                        session,
                        self.config.page_complete_timeout_ms,
                        self.config.ready_state_poll_ms,
                    )
                    .await;
                    return true;
                }
                StrategyOutcome::NotApplicable => {
                    debug!(action = %action, strategy = strategy.name(), "strategy not applicable");
                }
                StrategyOutcome::Failed(reason) => {
                    debug!(
                        action = %action,
                        strategy = strategy.name(),
                        reason = %reason,
                        "strategy failed"
                    );
                }
            }
        }

        info!(action = %action, "no strategy could perform consent action");
        false
    }
}

impl std::fmt::Debug for ConsentResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConsentResolver")
            .field("strategies", &self.strategy_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use spectral_browser::testing::ScriptedSession;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Fixed {
        name: &'static str,
        outcome: StrategyOutcome,
        attempts: Arc<AtomicUsize>,
    }

    #[async_trait::async_trait]
    impl ConsentStrategy for Fixed {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn attempt(
            &self,
            _session: &dyn BrowserSession,
            _action: ConsentAction,
        ) -> StrategyOutcome {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            self.outcome.clone()
        }
    }

    fn fixed(
        name: &'static str,
        outcome: StrategyOutcome,
    ) -> (Box<dyn ConsentStrategy>, Arc<AtomicUsize>) {
        let attempts = Arc::new(AtomicUsize::new(0));
        (
            Box::new(Fixed {
                name,
                outcome,
                attempts: attempts.clone(),
            }),
            attempts,
        )
    }

    #[test]
    fn test_standard_chain_order() {
        let resolver = ConsentResolver::new(
            Arc::new(Catalog::builtin().expect("builtin catalog")),
            CrawlConfig::without_delays(),
        );
        assert_eq!(
            resolver.strategy_names(),
            vec!["native-api", "known-selector", "text-match", "iframe"]
        );
    }

    #[tokio::test]
    async fn test_first_success_stops_chain() {
        let (failing, failing_attempts) =
            fixed("failing", StrategyOutcome::Failed("stale".to_string()));
        let (winning, winning_attempts) = fixed(
            "winning",
            StrategyOutcome::Performed {
                detail: "#reject".to_string(),
            },
        );
        let (unused, unused_attempts) = fixed("unused", StrategyOutcome::NotApplicable);

        let resolver = ConsentResolver::with_strategies(
            vec![failing, winning, unused],
            CrawlConfig::without_delays(),
        );
        let session = ScriptedSession::new();

        assert!(resolver.act(&session, ConsentAction::Reject).await);
        assert_eq!(failing_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(winning_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(unused_attempts.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_all_strategies_failing_is_negative_result() {
        let (a, a_attempts) = fixed("a", StrategyOutcome::NotApplicable);
        let (b, b_attempts) = fixed("b", StrategyOutcome::Failed("hidden".to_string()));

        let resolver = ConsentResolver::with_strategies(vec![a, b], CrawlConfig::without_delays());
        let session = ScriptedSession::new();

        assert!(!resolver.act(&session, ConsentAction::Accept).await);
        assert_eq!(a_attempts.load(Ordering::SeqCst), 1);
        assert_eq!(b_attempts.load(Ordering::SeqCst), 1);
    }
}
