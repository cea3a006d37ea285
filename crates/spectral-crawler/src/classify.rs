//! Tracking / necessary / unknown classification of page resources.
//!
//! All matching is against the catalog's [`ClassificationTables`]; the
//! table entries are already lowercased when the catalog loads.

use crate::probe::ImageInfo;
use regex::Regex;
use spectral_catalog::ClassificationTables;
use spectral_core::{Classification, ClassificationCounts, CookieRecord, ScriptHint, ScriptRef};
use std::sync::OnceLock;

/// Label recorded for inline scripts in the necessary list.
pub const INLINE_SCRIPT: &str = "inline";

/// Class assigned to a single item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemClass {
    /// Analytics, advertising or other tracking
    Tracking,
    /// First-party or known-necessary
    Necessary,
    /// Matches neither table
    Unknown,
}

/// Classifier over a set of classification tables.
#[derive(Debug, Clone, Copy)]
pub struct Classifier<'a> {
    tables: &'a ClassificationTables,
}

impl<'a> Classifier<'a> {
    /// Create a classifier borrowing the catalog's tables.
    #[must_use]
    pub fn new(tables: &'a ClassificationTables) -> Self {
        Self { tables }
    }

    /// Classify a script by its `src`. Empty means inline.
    #[must_use]
    pub fn classify_script(&self, src: &str, page_host: &str) -> ItemClass {
        if src.is_empty() || is_same_host(src, page_host) {
            return ItemClass::Necessary;
        }
        self.classify_by_domain(&src.to_lowercase())
    }

    /// Classify a cookie: name prefix, then essential pattern, then domain.
    #[must_use]
    pub fn classify_cookie(&self, cookie: &CookieRecord, page_host: &str) -> ItemClass {
        let name = cookie.name.to_lowercase();
        if contains_prefix(&name, &self.tables.tracking_cookie_prefixes) {
            return ItemClass::Tracking;
        }
        if contains_any(&name, &self.tables.essential_cookie_patterns) {
            return ItemClass::Necessary;
        }

        let domain = cookie.domain.trim_start_matches('.').to_lowercase();
        if !domain.is_empty() && hosts_related(&domain, page_host) {
            return ItemClass::Necessary;
        }
        self.classify_by_domain(&domain)
    }

    /// Classify a `localStorage` key.
    #[must_use]
    pub fn classify_storage_key(&self, key: &str) -> ItemClass {
        let key = key.to_lowercase();
        if contains_any(&key, &self.tables.tracking_storage_keywords) {
            ItemClass::Tracking
        } else if contains_any(&key, &self.tables.essential_storage_keywords) {
            ItemClass::Necessary
        } else {
            ItemClass::Unknown
        }
    }

    /// 1x1 images, rendered or natural, and images with a pixel keyword.
    #[must_use]
    pub fn is_tracking_pixel(&self, image: &ImageInfo) -> bool {
        let one_by_one =
            |w: f64, h: f64| (w - 1.0).abs() < f64::EPSILON && (h - 1.0).abs() < f64::EPSILON;
        one_by_one(image.width, image.height)
            || one_by_one(image.natural_width, image.natural_height)
            || contains_any(&image.src.to_lowercase(), &self.tables.pixel_keywords)
    }

    /// A script served from another host or carrying a marketing keyword.
    #[must_use]
    pub fn is_third_party(&self, src: &str, page_host: &str) -> bool {
        if src.is_empty() {
            return false;
        }
        contains_any(&src.to_lowercase(), &self.tables.marketing_script_keywords)
            || !is_same_host(src, page_host)
    }

    /// Classify every script, keeping the sources per class.
    #[must_use]
    pub fn classify_scripts(&self, scripts: &[ScriptRef], page_host: &str) -> Classification {
        tally(scripts.iter().map(|script| {
            let label = if script.src.is_empty() {
                INLINE_SCRIPT.to_string()
            } else {
                script.src.clone()
            };
            (label, self.classify_script(&script.src, page_host))
        }))
    }

    /// Classify every cookie, keeping the names per class.
    #[must_use]
    pub fn classify_cookies(&self, cookies: &[CookieRecord], page_host: &str) -> Classification {
        tally(
            cookies
                .iter()
                .map(|cookie| (cookie.name.clone(), self.classify_cookie(cookie, page_host))),
        )
    }

    /// Count storage keys per class.
    #[must_use]
    pub fn classify_storage(&self, keys: &[String]) -> ClassificationCounts {
        let mut counts = ClassificationCounts::default();
        for key in keys {
            match self.classify_storage_key(key) {
                ItemClass::Tracking => counts.tracking += 1,
                ItemClass::Necessary => counts.necessary += 1,
                ItemClass::Unknown => counts.unknown += 1,
            }
        }
        counts
    }

    fn classify_by_domain(&self, haystack: &str) -> ItemClass {
        if contains_any(haystack, &self.tables.tracking_domains) {
            ItemClass::Tracking
        } else if contains_any(haystack, &self.tables.necessary_domains) {
            ItemClass::Necessary
        } else {
            ItemClass::Unknown
        }
    }
}

fn tally(items: impl Iterator<Item = (String, ItemClass)>) -> Classification {
    let mut classification = Classification::default();
    for (item, class) in items {
        match class {
            ItemClass::Tracking => {
                classification.counts.tracking += 1;
                classification.tracking.push(item);
            }
            ItemClass::Necessary => {
                classification.counts.necessary += 1;
                classification.necessary.push(item);
            }
            ItemClass::Unknown => {
                classification.counts.unknown += 1;
                classification.unknown.push(item);
            }
        }
    }
    classification
}

fn contains_any(haystack: &str, needles: &[String]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle.as_str()))
}

fn contains_prefix(haystack: &str, prefixes: &[String]) -> bool {
    prefixes.iter().any(|prefix| haystack.starts_with(prefix.as_str()))
}

fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

/// Equal hosts, or one a subdomain of the other, ignoring `www.`.
fn hosts_related(a: &str, b: &str) -> bool {
    let a = strip_www(a);
    let b = strip_www(b);
    if a.is_empty() || b.is_empty() {
        return false;
    }
    a == b || a.ends_with(&format!(".{b}")) || b.ends_with(&format!(".{a}"))
}

/// Whether a script URL is served from the page host.
///
/// Unparseable sources fall back to a substring check.
fn is_same_host(src: &str, page_host: &str) -> bool {
    let page_host = page_host.to_lowercase();
    match url::Url::parse(src) {
        Ok(url) => url
            .host_str()
            .is_some_and(|host| hosts_related(&host.to_lowercase(), &page_host)),
        Err(_) => !page_host.is_empty() && src.to_lowercase().contains(strip_www(&page_host)),
    }
}

struct HintPattern {
    regex: Regex,
    likely_necessary: bool,
    confidence: f32,
}

fn hint_patterns() -> &'static [HintPattern] {
    static PATTERNS: OnceLock<Vec<HintPattern>> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            (r"api\.[^/]+/.*/(build|bundle|component)", true, 0.85),
            (r"/(build|dist|bundle)", true, 0.8),
            (r"/(static|public)/", true, 0.75),
            (r"/assets?/", true, 0.7),
            (r"\.(min\.)?js$", false, 0.3),
        ]
        .into_iter()
        .filter_map(|(pattern, likely_necessary, confidence)| {
            Regex::new(pattern).ok().map(|regex| HintPattern {
                regex,
                likely_necessary,
                confidence,
            })
        })
        .collect()
    })
}

/// Heuristic guess for an unclassified script. First matching pattern wins.
#[must_use]
pub fn script_hint(src: &str) -> ScriptHint {
    let lowered = src.to_lowercase();
    let (likely_necessary, confidence) = hint_patterns()
        .iter()
        .find(|pattern| pattern.regex.is_match(&lowered))
        .map_or((false, 0.2), |pattern| {
            (pattern.likely_necessary, pattern.confidence)
        });

    ScriptHint {
        src: src.to_string(),
        likely_necessary,
        confidence,
    }
}
