use super::{detect_language, ConsentStrategy, StrategyOutcome};
use crate::probe::{self, InteractiveElement, PageLanguage};
use regex::Regex;
use spectral_browser::{evaluate_as, BrowserSession};
use spectral_catalog::Catalog;
use spectral_core::ConsentAction;
use std::sync::Arc;
use tracing::debug;

/// Longest combined label considered for a partial match.
const MAX_PARTIAL_LABEL_CHARS: usize = 200;

/// Matches button labels against consent phrases.
///
/// Exact matches win. Partial matches only count for real buttons whose
/// label, outside the matched phrase, carries no negation ("continue without
/// accepting") or informational ("learn more about cookies") marker as a
/// whole word, and contains none of the conflicting phrases.
#[derive(Debug, Clone)]
pub struct PhraseMatcher {
    phrases: Vec<String>,
    exclusions: Vec<Regex>,
    conflicts: Vec<String>,
}

fn normalize<'p>(phrases: impl IntoIterator<Item = &'p str>) -> Vec<String> {
    phrases
        .into_iter()
        .map(|phrase| phrase.trim().to_lowercase())
        .filter(|phrase| !phrase.is_empty())
        .collect()
}

impl PhraseMatcher {
    /// Build a matcher; markers are matched as whole words.
    pub fn new<'m>(
        phrases: impl IntoIterator<Item = &'m str>,
        markers: impl IntoIterator<Item = &'m str>,
    ) -> Self {
        let exclusions = markers
            .into_iter()
            .filter(|marker| !marker.trim().is_empty())
            .filter_map(|marker| {
                let marker = regex::escape(&marker.trim().to_lowercase());
                Regex::new(&format!(r"\b{marker}\b")).ok()
            })
            .collect();
        Self {
            phrases: normalize(phrases),
            exclusions,
            conflicts: Vec::new(),
        }
    }

    /// Phrases of the opposite choice; a partial label containing one is skipped
    /// unless the matched phrase itself contains it.
    #[must_use]
    pub fn with_conflicts<'c>(mut self, conflicts: impl IntoIterator<Item = &'c str>) -> Self {
        self.conflicts = normalize(conflicts);
        self
    }

    /// Whether `label` partially matches `phrase` without a marker or conflict.
    fn partial_match(&self, label: &str, phrase: &str) -> bool {
        if !label.contains(phrase) {
            return false;
        }
        let rest = label.replace(phrase, " ");
        !self.exclusions.iter().any(|marker| marker.is_match(&rest))
            && !self.conflicts.iter().any(|conflict| {
                label.contains(conflict.as_str()) && !phrase.contains(conflict.as_str())
            })
    }

    /// First element to click, if any.
    #[must_use]
    pub fn find<'e>(&self, elements: &'e [InteractiveElement]) -> Option<&'e InteractiveElement> {
        let exact = elements.iter().find(|element| {
            element.is_clickable()
                && [&element.text, &element.value]
                    .iter()
                    .map(|label| label.trim().to_lowercase())
                    .any(|label| !label.is_empty() && self.phrases.contains(&label))
        });
        if exact.is_some() {
            return exact;
        }

        elements.iter().find(|element| {
            if !element.is_button() {
                return false;
            }
            let label = element.combined_text();
            !label.is_empty()
                && label.chars().count() < MAX_PARTIAL_LABEL_CHARS
                && self
                    .phrases
                    .iter()
                    .any(|phrase| self.partial_match(&label, phrase))
        })
    }
}

/// The choice whose phrases must not appear in a partial `action` match.
pub(crate) fn conflicting_action(action: ConsentAction) -> Option<ConsentAction> {
    match action {
        ConsentAction::Accept => Some(ConsentAction::Reject),
        ConsentAction::Reject | ConsentAction::Settings => None,
    }
}

/// Clicks buttons whose label matches the page language's consent phrases.
#[derive(Debug, Clone)]
pub struct TextMatchStrategy {
    catalog: Arc<Catalog>,
}

impl TextMatchStrategy {
    /// Create the strategy over the catalog's language packs.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    fn matcher(&self, page: &PageLanguage, action: ConsentAction) -> PhraseMatcher {
        let pack = detect_language(&self.catalog, page);
        let conflicts = conflicting_action(action).map_or(&[][..], |other| pack.phrases(other));
        PhraseMatcher::new(
            pack.phrases(action).iter().map(String::as_str),
            self.catalog
                .negation_markers()
                .chain(self.catalog.informational_markers()),
        )
        .with_conflicts(conflicts.iter().map(String::as_str))
    }
}

#[async_trait::async_trait]
impl ConsentStrategy for TextMatchStrategy {
    fn name(&self) -> &'static str {
        "text-match"
    }

    async fn attempt(
        &self,
        session: &dyn BrowserSession,
        action: ConsentAction,
    ) -> StrategyOutcome {
        let page = evaluate_as::<Option<PageLanguage>, _>(session, probe::PAGE_LANGUAGE)
            .await
            .unwrap_or_else(|e| {
                debug!(error = %e, "language probe failed, using default language");
                None
            })
            .unwrap_or_default();
        let matcher = self.matcher(&page, action);

        let elements = match evaluate_as::<Option<Vec<InteractiveElement>>, _>(
            session,
            probe::INTERACTIVE_ELEMENTS,
        )
        .await
        {
            Ok(elements) => elements.unwrap_or_default(),
            Err(e) => return StrategyOutcome::Failed(format!("element scan failed: {e}")),
        };

        let Some(element) = matcher.find(&elements) else {
            return StrategyOutcome::NotApplicable;
        };
        let label = element.combined_text();

        match evaluate_as::<bool, _>(session, &probe::click_element(element.index)).await {
            Ok(true) => StrategyOutcome::Performed {
                detail: format!("{} \"{label}\"", element.tag.to_lowercase()),
            },
            Ok(false) => StrategyOutcome::Failed(format!("element \"{label}\" disappeared")),
            Err(e) => StrategyOutcome::Failed(format!("click on \"{label}\" failed: {e}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use spectral_browser::testing::ScriptedSession;

    fn element(index: usize, tag: &str, text: &str) -> InteractiveElement {
        InteractiveElement {
            index,
            tag: tag.to_string(),
            text: text.to_string(),
            ..InteractiveElement::default()
        }
    }

    fn matcher(phrases: &[&str]) -> PhraseMatcher {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let markers: Vec<String> = catalog
            .negation_markers()
            .chain(catalog.informational_markers())
            .map(str::to_string)
            .collect();
        PhraseMatcher::new(phrases.iter().copied(), markers.iter().map(String::as_str))
    }

    #[test]
    fn test_exact_match_preferred() {
        let elements = vec![
            element(0, "BUTTON", "Accept all cookies and continue"),
            element(1, "A", "Accept all"),
        ];
        let found = matcher(&["accept all"]).find(&elements).expect("match");
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_partial_match_only_on_buttons() {
        let elements = vec![
            element(0, "A", "Reject all cookies"),
            element(1, "BUTTON", "Reject all cookies"),
        ];
        let found = matcher(&["reject all"]).find(&elements).expect("match");
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_negated_labels_skipped() {
        let elements = vec![
            element(0, "BUTTON", "Continue without accepting"),
            element(1, "BUTTON", "Weiter ohne Zustimmung"),
            element(2, "BUTTON", "Learn more about how we accept cookies"),
        ];
        assert!(matcher(&["accept", "zustimmung"]).find(&elements).is_none());

        let elements = vec![
            element(0, "BUTTON", "Continuer sans accepter"),
            element(1, "BUTTON", "Accepter et fermer"),
        ];
        let found = matcher(&["accepter"]).find(&elements).expect("match");
        assert_eq!(found.index, 1);
    }

    #[test]
    fn test_negated_accept_not_clicked() {
        let catalog = Catalog::builtin().expect("builtin catalog");
        let markers: Vec<&str> = catalog
            .negation_markers()
            .chain(catalog.informational_markers())
            .collect();
        for (code, buttons, expected) in [
            ("de", ["Nicht einverstanden", "Einverstanden und weiter"], 1),
            ("es", ["No acepto las cookies", "Acepto las cookies"], 1),
        ] {
            let pack = catalog.language(code).expect("language pack");
            let accept = PhraseMatcher::new(
                pack.phrases(ConsentAction::Accept).iter().map(String::as_str),
                markers.iter().copied(),
            )
            .with_conflicts(pack.phrases(ConsentAction::Reject).iter().map(String::as_str));
            let elements: Vec<_> = buttons
                .iter()
                .enumerate()
                .map(|(i, text)| element(i, "BUTTON", text))
                .collect();

            let found = accept.find(&elements).expect("accept button");
            assert_eq!(found.index, expected, "{code}: {buttons:?}");

            let reject = PhraseMatcher::new(
                pack.phrases(ConsentAction::Reject).iter().map(String::as_str),
                markers.iter().copied(),
            );
            let found = reject.find(&elements).expect("reject button");
            assert_eq!(found.index, 0, "{code}: {buttons:?}");
        }
    }

    #[test]
    fn test_conflicting_phrase_blocks_partial_accept() {
        let elements = vec![
            element(0, "BUTTON", "Accept only necessary cookies"),
            element(1, "BUTTON", "Accept all cookies"),
        ];
        let found = matcher(&["accept"])
            .with_conflicts(["only necessary"])
            .find(&elements)
            .expect("match");
        assert_eq!(found.index, 1);
    }

    #[tokio::test]
    async fn test_accept_skips_negated_button_in_page_language() {
        let session = ScriptedSession::new()
            .on_evaluate(
                "spectral:page-language",
                json!({ "html_lang": "de", "meta_lang": null, "text": "" }),
            )
            .on_evaluate(
                "spectral:interactive-elements",
                json!([
                    { "index": 0, "tag": "BUTTON", "text": "Nicht einverstanden" },
                    { "index": 1, "tag": "BUTTON", "text": "Einverstanden und weiter" }
                ]),
            )
            .on_evaluate("spectral:click-element", json!(true));

        let strategy = TextMatchStrategy::new(Arc::new(Catalog::builtin().expect("catalog")));
        let outcome = strategy.attempt(&session, ConsentAction::Accept).await;

        assert_eq!(
            outcome,
            StrategyOutcome::Performed {
                detail: "button \"einverstanden und weiter\"".to_string()
            }
        );
    }

    #[test]
    fn test_overlong_labels_skipped() {
        let elements = vec![element(0, "BUTTON", &format!("accept {}", "x".repeat(250)))];
        assert!(matcher(&["accept"]).find(&elements).is_none());
    }

    #[tokio::test]
    async fn test_clicks_matching_element_in_page_language() {
        let session = ScriptedSession::new()
            .on_evaluate(
                "spectral:page-language",
                json!({ "html_lang": "de-DE", "meta_lang": null, "text": "" }),
            )
            .on_evaluate(
                "spectral:interactive-elements",
                json!([
                    { "index": 0, "tag": "A", "text": "Impressum" },
                    { "index": 1, "tag": "BUTTON", "text": "Einstellungen" },
                    { "index": 2, "tag": "BUTTON", "text": "Alle ablehnen" }
                ]),
            )
            .on_evaluate("spectral:click-element", json!(true));

        let strategy = TextMatchStrategy::new(Arc::new(Catalog::builtin().expect("catalog")));
        let outcome = strategy.attempt(&session, ConsentAction::Reject).await;

        assert!(outcome.is_performed());
        let clicks = session.evaluated_containing("spectral:click-element");
        assert_eq!(clicks.len(), 1);
        assert!(clicks[0].contains("[2]"));
    }

    #[tokio::test]
    async fn test_no_candidate_is_not_applicable() {
        let session = ScriptedSession::new().on_evaluate(
            "spectral:interactive-elements",
            json!([{ "index": 0, "tag": "A", "text": "Home" }]),
        );
        let strategy = TextMatchStrategy::new(Arc::new(Catalog::builtin().expect("catalog")));
        let outcome = strategy.attempt(&session, ConsentAction::Accept).await;
        assert_eq!(outcome, StrategyOutcome::NotApplicable);
    }
}
