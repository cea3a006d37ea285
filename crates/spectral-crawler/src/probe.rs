//! In-page scripts evaluated through [`spectral_browser::BrowserSession::evaluate`]
//! and the shapes they return.
//!
//! Every script starts with a `/* spectral:<name> */` marker so recorded
//! sessions can tell them apart.

use serde::{Deserialize, Serialize};
use spectral_catalog::{NativeCall, Result as CatalogResult};
use spectral_core::ScriptRef;

macro_rules! interactive_selector {
    () => {
        r#"button, a, [role="button"], input[type="button"], input[type="submit"]"#
    };
}

macro_rules! describe_element {
    () => {
        r"(el, index) => ({
            index,
            tag: el.tagName,
            role: el.getAttribute('role'),
            type: el.getAttribute('type'),
            text: (el.innerText || el.textContent || '').trim(),
            value: el.value || '',
            aria: el.getAttribute('aria-label') || '',
            title: el.getAttribute('title') || ''
        })"
    };
}

/// Page hostname and every script element.
pub const PAGE_SCRIPTS: &str = r"/* spectral:page-scripts */ (() => ({
    hostname: location.hostname,
    scripts: Array.from(document.scripts).map(s => ({ src: s.src || '', inline: !s.src }))
}))()";

/// Bare script count, used when the full list cannot be read.
pub const SCRIPT_COUNT: &str = "/* spectral:script-count */ document.scripts.length";

/// Rendered and natural geometry of every image.
pub const IMAGES: &str = r"/* spectral:images */ Array.from(document.images).map(img => ({
    src: img.src || '',
    width: img.width,
    height: img.height,
    natural_width: img.naturalWidth,
    natural_height: img.naturalHeight
}))";

/// `localStorage` keys, `null` when access is denied.
pub const STORAGE: &str = r"/* spectral:storage */ (() => {
    try {
        const keys = [];
        for (let i = 0; i < localStorage.length; i++) keys.push(localStorage.key(i));
        return { keys };
    } catch (e) {
        return null;
    }
})()";

/// Document HTML plus button labels hidden in shadow roots and same-origin frames.
pub const BANNER_DOM: &str = concat!(
    r"/* spectral:banner-dom */ (() => {
    const label = el => (el.innerText || el.value || el.getAttribute('aria-label') || '').trim();
    const buttons = root => Array.from(root.querySelectorAll('",
    interactive_selector!(),
    r"')).map(label).filter(t => t.length > 0);
    const shadow_buttons = [];
    for (const el of document.querySelectorAll('*')) {
        if (el.shadowRoot) shadow_buttons.push(...buttons(el.shadowRoot));
    }
    const iframe_buttons = [];
    for (const frame of document.querySelectorAll('iframe')) {
        try {
            if (frame.contentDocument) iframe_buttons.push(...buttons(frame.contentDocument));
        } catch (e) {}
    }
    return { html: document.documentElement.outerHTML, shadow_buttons, iframe_buttons };
})()"
);

/// Declared languages and a sample of the visible text.
pub const PAGE_LANGUAGE: &str = r#"/* spectral:page-language */ (() => {
    const meta = document.querySelector('meta[http-equiv="content-language" i]')
        || document.querySelector('meta[name="language" i]');
    return {
        html_lang: document.documentElement.lang || null,
        meta_lang: meta ? meta.content : null,
        text: (document.body ? document.body.innerText : '').slice(0, 5000)
    };
})()"#;

/// Every clickable-looking element in the top document.
pub const INTERACTIVE_ELEMENTS: &str = concat!(
    "/* spectral:interactive-elements */ Array.from(document.querySelectorAll('",
    interactive_selector!(),
    "')).map(",
    describe_element!(),
    ")"
);

/// Geometry of every iframe, with its buttons when same-origin.
pub const IFRAME_SCAN: &str = concat!(
    r"/* spectral:iframe-scan */ Array.from(document.querySelectorAll('iframe')).map((frame, index) => {
    const rect = frame.getBoundingClientRect();
    let accessible = false;
    let buttons = [];
    try {
        const doc = frame.contentDocument;
        if (doc) {
            accessible = true;
            buttons = Array.from(doc.querySelectorAll('",
    interactive_selector!(),
    "')).map(",
    describe_element!(),
    r");
        }
    } catch (e) {}
    return { index, left: rect.left, top: rect.top, width: rect.width, height: rect.height, accessible, buttons };
})"
);

/// `document.readyState`.
pub const READY_STATE: &str = "/* spectral:ready-state */ document.readyState";

/// Click the `index`-th interactive element of the top document.
#[must_use]
pub fn click_element(index: usize) -> String {
    format!(
        "/* spectral:click-element */ (() => {{ \
         const el = document.querySelectorAll('{selector}')[{index}]; \
         if (!el) return false; el.click(); return true; }})()",
        selector = interactive_selector!(),
    )
}

/// Click the `element`-th interactive element inside the `frame`-th iframe.
#[must_use]
pub fn click_in_frame(frame: usize, element: usize) -> String {
    format!(
        "/* spectral:iframe-click */ (() => {{ try {{ \
         const doc = document.querySelectorAll('iframe')[{frame}].contentDocument; \
         const el = doc && doc.querySelectorAll('{selector}')[{element}]; \
         if (!el) return false; el.click(); return true; \
         }} catch (e) {{ return false; }} }})()",
        selector = interactive_selector!(),
    )
}

/// Click whatever is rendered at a viewport point.
#[must_use]
pub fn click_at_point(x: f64, y: f64) -> String {
    format!(
        "/* spectral:point-click */ (() => {{ \
         const el = document.elementFromPoint({x:.1}, {y:.1}); \
         if (!el) return false; el.click(); return true; }})()"
    )
}

/// Invoke a CMP's native function if the page exposes it.
///
/// Object and method are identifier paths (validated when the catalog
/// loads); arguments are re-serialized from parsed JSON.
pub fn native_call(call: &NativeCall) -> CatalogResult<String> {
    let args = serde_json::Value::Array(call.arguments()?).to_string();
    let path = call.path();
    let mut segments: Vec<&str> = path.split('.').collect();
    let method = segments.pop().unwrap_or_default();
    let receiver = segments
        .iter()
        .fold("window".to_string(), |expr, segment| format!("{expr}?.{segment}"));

    Ok(format!(
        "/* spectral:native-call */ (() => {{ try {{ \
         const receiver = {receiver}; \
         const fn = receiver?.{method}; \
         if (typeof fn !== 'function') return false; \
         fn.apply(receiver, {args}); return true; \
         }} catch (e) {{ return false; }} }})()"
    ))
}

/// Result of [`PAGE_SCRIPTS`].
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PageScripts {
    pub hostname: String,
    pub scripts: Vec<ScriptRef>,
}

/// One entry of [`IMAGES`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ImageInfo {
    pub src: String,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub natural_width: f64,
    #[serde(default)]
    pub natural_height: f64,
}

/// Result of [`STORAGE`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct StorageKeys {
    pub keys: Vec<String>,
}

/// Result of [`BANNER_DOM`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BannerDom {
    pub html: String,
    #[serde(default)]
    pub shadow_buttons: Vec<String>,
    #[serde(default)]
    pub iframe_buttons: Vec<String>,
}

/// Result of [`PAGE_LANGUAGE`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct PageLanguage {
    pub html_lang: Option<String>,
    pub meta_lang: Option<String>,
    #[serde(default)]
    pub text: String,
}

/// One entry of [`INTERACTIVE_ELEMENTS`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct InteractiveElement {
    pub index: usize,
    pub tag: String,
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default, rename = "type")]
    pub input_type: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub aria: String,
    #[serde(default)]
    pub title: String,
}

impl InteractiveElement {
    fn has_role_button(&self) -> bool {
        self.role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case("button"))
    }

    fn is_button_input(&self) -> bool {
        self.tag.eq_ignore_ascii_case("input")
            && self.input_type.as_deref().is_some_and(|t| {
                t.eq_ignore_ascii_case("button") || t.eq_ignore_ascii_case("submit")
            })
    }

    /// Button, link, ARIA button or button-like input.
    #[must_use]
    pub fn is_clickable(&self) -> bool {
        self.tag.eq_ignore_ascii_case("a") || self.is_button()
    }

    /// A real button: `<button>`, ARIA button or button-like input. Links excluded.
    #[must_use]
    pub fn is_button(&self) -> bool {
        self.tag.eq_ignore_ascii_case("button") || self.has_role_button() || self.is_button_input()
    }

    /// Text, value, ARIA label and title, lowercased and joined.
    #[must_use]
    pub fn combined_text(&self) -> String {
        [&self.text, &self.value, &self.aria, &self.title]
            .iter()
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .collect::<Vec<_>>()
            .join(" ")
            .to_lowercase()
    }
}

/// One entry of [`IFRAME_SCAN`].
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct FrameInfo {
    pub index: usize,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub accessible: bool,
    #[serde(default)]
    pub buttons: Vec<InteractiveElement>,
}
