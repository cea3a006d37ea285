use super::text::conflicting_action;
use super::{ConsentStrategy, PhraseMatcher, StrategyOutcome};
use crate::probe::{self, FrameInfo};
use spectral_browser::{evaluate_as, BrowserSession};
use spectral_catalog::Catalog;
use spectral_core::ConsentAction;
use std::sync::Arc;
use tracing::debug;

/// Horizontal position of the positional click, as a fraction of frame width.
const ACCEPT_X: f64 = 0.7;
const REJECT_X: f64 = 0.3;
/// Vertical position of the positional click; banner buttons sit low.
const BUTTON_ROW_Y: f64 = 0.8;

/// Searches consent iframes: text match when same-origin, positional click otherwise.
#[derive(Debug, Clone)]
pub struct IframeStrategy {
    catalog: Arc<Catalog>,
    min_size: f64,
}

impl IframeStrategy {
    /// Create the strategy; frames narrower or shorter than `min_size` are ignored.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, min_size: f64) -> Self {
        Self { catalog, min_size }
    }

    fn matcher(&self, action: ConsentAction) -> PhraseMatcher {
        let matcher = PhraseMatcher::new(
            self.catalog.all_phrases(action),
            self.catalog
                .negation_markers()
                .chain(self.catalog.informational_markers()),
        );
        match conflicting_action(action) {
            Some(other) => matcher.with_conflicts(self.catalog.all_phrases(other)),
            None => matcher,
        }
    }
}

/// Viewport point for a blind click inside a cross-origin frame.
fn click_point(frame: &FrameInfo, action: ConsentAction) -> Option<(f64, f64)> {
    let x = match action {
        ConsentAction::Accept => ACCEPT_X,
        ConsentAction::Reject => REJECT_X,
        ConsentAction::Settings => return None,
    };
    Some((
        frame.left + frame.width * x,
        frame.top + frame.height * BUTTON_ROW_Y,
    ))
}

#[async_trait::async_trait]
impl ConsentStrategy for IframeStrategy {
    fn name(&self) -> &'static str {
        "iframe"
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        action: ConsentAction,
    ) -> StrategyOutcome {
        let frames = match evaluate_as::<Option<Vec<FrameInfo>>, _>(session, probe::IFRAME_SCAN)
            .await
        {
            Ok(frames) => frames.unwrap_or_default(),
            Err(e) => return StrategyOutcome::Failed(format!("iframe scan failed: {e}")),
        };
        let matcher = self.matcher(action);

        for frame in frames
            .iter()
            .filter(|f| f.width >= self.min_size && f.height >= self.min_size)
        {
            let (script, detail) = if frame.accessible {
                let Some(button) = matcher.find(&frame.buttons) else {
                    continue;
                };
                (
                    probe::click_in_frame(frame.index, button.index),
                    format!("iframe {} \"{}\"", frame.index, button.combined_text()),
                )
            } else {
                let Some((x, y)) = click_point(frame, action) else {
                    continue;
                };
                (
                    probe::click_at_point(x, y),
                    format!("iframe {} at ({x:.0}, {y:.0})", frame.index),
                )
            };

            match evaluate_as::<bool, _>(session, &script).await {
                Ok(true) => return StrategyOutcome::Performed { detail },
                Ok(false) => debug!(frame = frame.index, "iframe click had no target"),
                Err(e) => debug!(frame = frame.index, error = %e, "iframe click failed"),
            }
        }

        StrategyOutcome::NotApplicable
    }
}
