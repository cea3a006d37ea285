use crate::probe::PageLanguage;
use spectral_catalog::{Catalog, LanguagePack};
use tracing::debug;

/// Pick the language pack for a page.
///
/// Declared `<html lang>` first, then the content-language meta tag, then
/// weighted keyword scoring of the visible text. Falls back to English, which
/// also wins content-score ties.
#[must_use]
pub fn detect_language<'c>(catalog: &'c Catalog, page: &PageLanguage) -> &'c LanguagePack {
    let declared = [page.html_lang.as_deref(), page.meta_lang.as_deref()];
    for tag in declared.into_iter().flatten() {
        if let Some(pack) = primary_subtag(tag).and_then(|code| catalog.language(code)) {
            debug!(language = %pack.code, tag, "language from declaration");
            return pack;
        }
    }

    let text = page.text.to_lowercase();
    let fallback = catalog.default_language();
    let mut best: Option<(&LanguagePack, usize)> = None;
    for pack in catalog.languages() {
        let score: usize = pack
            .weighted_hints()
            .filter(|(term, _)| text.contains(*term))
            .map(|(_, weight)| weight)
            .sum();
        // Ties go to the fallback language.
        let wins = best.map_or(true, |(_, top)| {
            score > top || (score == top && pack.code == fallback.code)
        });
        if score > 0 && wins {
            best = Some((pack, score));
        }
    }

    match best {
        Some((pack, score)) => {
            debug!(language = %pack.code, score, "language from content");
            pack
        }
        None => fallback,
    }
}

/// `de-DE` -> `de`, `pt_BR` -> `pt`.
fn primary_subtag(tag: &str) -> Option<&str> {
    tag.split(['-', '_'])
        .next()
        .map(str::trim)
        .filter(|code| !code.is_empty())
}
