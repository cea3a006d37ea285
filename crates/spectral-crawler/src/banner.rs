//! Consent banner detection and analysis.
//!
//! The page is probed once for its HTML (plus button labels from shadow roots
//! and same-origin frames); everything else happens here with `scraper`.

use crate::probe::{self, BannerDom};
use scraper::{ElementRef, Html, Selector};
use spectral_browser::{evaluate_as, BrowserSession};
use spectral_catalog::Catalog;
use spectral_core::{BannerAnalysis, BannerStyle, ConsentAction};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Provider reported when only the generic selectors matched.
pub const GENERIC_PROVIDER: &str = "generic";

/// Selectors tried when no vendor banner matched.
const GENERIC_BANNER_SELECTORS: [&str; 5] = [
    "[id*=cookie]",
    "[class*=cookie]",
    "[id*=consent]",
    "[class*=consent]",
    "[aria-label*=cookie]",
];

const BUTTON_SELECTOR: &str =
    r#"button, a, [role="button"], input[type="button"], input[type="submit"]"#;

/// Maximum number of button labels kept.
const MAX_BUTTON_TEXTS: usize = 20;

/// Analyzes the consent banner of the current page.
#[derive(Debug, Clone)]
pub struct BannerAnalyzer {
    catalog: Arc<Catalog>,
    excerpt_chars: usize,
}

impl BannerAnalyzer {
    /// Create an analyzer keeping `excerpt_chars` of banner text.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, excerpt_chars: usize) -> Self {
        Self {
            catalog,
            excerpt_chars,
        }
    }

    /// Probe the page and analyze its banner.
    ///
    /// An unreadable page is reported as "no banner detected".
    pub async fn analyze<S>(&self, session: &S) -> BannerAnalysis
    where
        S: BrowserSession + ?Sized,
    {
        match evaluate_as::<Option<BannerDom>, _>(session, probe::BANNER_DOM).await {
            Ok(Some(dom)) => self.analyze_dom(&dom),
            Ok(None) => {
                warn!("banner probe returned nothing");
                BannerAnalysis::not_detected()
            }
            Err(e) => {
                warn!(error = %e, "banner probe failed");
                BannerAnalysis::not_detected()
            }
        }
    }

    /// Analyze probed DOM content.
    #[must_use]
    pub fn analyze_dom(&self, dom: &BannerDom) -> BannerAnalysis {
        let document = Html::parse_document(&dom.html);
        let region = self.find_region(&document);

        let mut button_texts = Vec::new();
        if let Some((_, banner)) = &region {
            collect_buttons(*banner, &mut button_texts);
        }
        if button_texts.is_empty() {
            collect_buttons(document.root_element(), &mut button_texts);
        }
        for text in dom.shadow_buttons.iter().chain(&dom.iframe_buttons) {
            push_text(&mut button_texts, normalize(text));
        }
        button_texts.truncate(MAX_BUTTON_TEXTS);

        let lowered: Vec<String> = button_texts.iter().map(|t| t.to_lowercase()).collect();
        let offers = |action| {
            self.catalog
                .all_phrases(action)
                .any(|phrase| lowered.iter().any(|text| text.contains(phrase)))
        };
        let has_accept_option = offers(ConsentAction::Accept);
        let has_reject_option = offers(ConsentAction::Reject);
        let has_settings_option = offers(ConsentAction::Settings);

        let Some((provider, banner)) = region else {
            debug!(buttons = button_texts.len(), "no consent banner detected");
            return BannerAnalysis {
                has_accept_option,
                has_reject_option,
                has_settings_option,
                has_direct_reject: has_reject_option,
                button_texts,
                ..BannerAnalysis::not_detected()
            };
        };

        let text = normalize(&banner.text().collect::<Vec<_>>().join(" "));
        let text = (!text.is_empty()).then(|| text.chars().take(self.excerpt_chars).collect());
        let style = if has_reject_option {
            BannerStyle::RejectCapable
        } else {
            BannerStyle::AcceptOnly
        };

        info!(
            provider = %provider,
            accept = has_accept_option,
            reject = has_reject_option,
            settings = has_settings_option,
            "consent banner detected"
        );

        BannerAnalysis {
            detected: true,
            provider: Some(provider),
            style: Some(style),
            has_accept_option,
            has_reject_option,
            has_settings_option,
            has_direct_reject: has_reject_option,
            button_texts,
            text,
        }
    }

    /// First vendor banner, else the first generic cookie/consent element.
    fn find_region<'d>(&self, document: &'d Html) -> Option<(String, ElementRef<'d>)> {
        for vendor in self.catalog.vendors() {
            for selector in &vendor.banner_selectors {
                if let Some(element) = select_first(document, selector) {
                    return Some((vendor.name.clone(), element));
                }
            }
        }
        GENERIC_BANNER_SELECTORS
            .iter()
            .find_map(|selector| select_first(document, selector))
            .map(|element| (GENERIC_PROVIDER.to_string(), element))
    }
}

fn select_first<'d>(document: &'d Html, selector: &str) -> Option<ElementRef<'d>> {
    match Selector::parse(selector) {
        Ok(selector) => document.select(&selector).next(),
        Err(e) => {
            debug!(selector, error = %e, "skipping unparseable banner selector");
            None
        }
    }
}

fn collect_buttons(root: ElementRef<'_>, texts: &mut Vec<String>) {
    let Ok(selector) = Selector::parse(BUTTON_SELECTOR) else {
        return;
    };
    for element in root.select(&selector) {
        let label = normalize(&element.text().collect::<Vec<_>>().join(" "));
        let label = if label.is_empty() {
            element
                .value()
                .attr("value")
                .or_else(|| element.value().attr("aria-label"))
                .map(normalize)
                .unwrap_or_default()
        } else {
            label
        };
        push_text(texts, label);
    }
}

fn push_text(texts: &mut Vec<String>, text: String) {
    if !text.is_empty() && !texts.contains(&text) {
        texts.push(text);
    }
}

fn normalize(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
