use crate::error::{BrowserError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use spectral_core::CookieRecord;
use std::time::Duration;

/// How long `navigate` waits before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitPolicy {
    /// Return once the DOM is parsed
    DomContentLoaded,
    /// Return once the load event fired
    Load,
}

/// Opaque reference to an element found by [`BrowserSession::query_selector`].
///
/// Handles are only valid until the next navigation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementHandle {
    id: u64,
    selector: String,
}

impl ElementHandle {
    /// Create a handle. Drivers hand these out; callers never construct them.
    #[must_use]
    pub fn new(id: u64, selector: impl Into<String>) -> Self {
        Self {
            id,
            selector: selector.into(),
        }
    }

    /// Driver-specific identifier.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Selector the element was found with.
    #[must_use]
    pub fn selector(&self) -> &str {
        &self.selector
    }
}

/// Element geometry in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Left edge, relative to the viewport.
    pub x: f64,
    /// Top edge, relative to the viewport.
    pub y: f64,
    /// Width.
    pub width: f64,
    /// Height.
    pub height: f64,
}

impl BoundingBox {
    /// Whether the element occupies any area.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.width > 0.0 && self.height > 0.0
    }
}

/// Capability surface of a live browsing session.
///
/// The crawler depends on nothing beyond this trait.
#[async_trait::async_trait]
pub trait BrowserSession: Send + Sync {
    /// Navigate to a URL, bounded by `timeout`
    async fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<()>;

    /// Evaluate a JavaScript expression and return its JSON value
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value>;

    /// Cookies visible to the current page
    async fn cookies(&self) -> Result<Vec<CookieRecord>>;

    /// Delete every cookie visible to the current page
    async fn clear_cookies(&self) -> Result<()>;

    /// Clear local and session storage of the current origin
    async fn clear_storage(&self) -> Result<()>;

    /// Capture the viewport and return a reference to the stored image
    async fn screenshot(&self, label: &str) -> Result<String>;

    /// Find the first element matching a CSS selector
    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>>;

    /// Click an element
    async fn click(&self, element: &ElementHandle) -> Result<()>;

    /// Element geometry, `None` when it is not rendered
    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<BoundingBox>>;
}

/// Opens one session per audited site.
#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    /// Session type produced
    type Session: BrowserSession;

    /// Open a fresh, isolated session
    async fn open(&self) -> Result<Self::Session>;

    /// Release a session once its site is done
    async fn close(&self, session: Self::Session) -> Result<()> {
        drop(session);
        Ok(())
    }
}

/// Evaluate a script and deserialize the result.
pub async fn evaluate_as<T, S>(session: &S, script: &str) -> Result<T>
where
    T: DeserializeOwned,
    S: BrowserSession + ?Sized,
{
    let value = session.evaluate(script).await?;
    serde_json::from_value(value).map_err(|e| BrowserError::EvaluationError(e.to_string()))
}

/// Helper to extract the host from a URL
pub fn extract_domain(url: &str) -> Result<String> {
    let url = url::Url::parse(url).map_err(|e| BrowserError::InvalidUrl(format!("{url}: {e}")))?;

    url.host_str()
        .ok_or_else(|| BrowserError::InvalidUrl("No host in URL".to_string()))
        .map(|s| s.trim_start_matches("www.").to_string())
}
