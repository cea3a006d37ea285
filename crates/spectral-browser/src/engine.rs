use crate::error::{BrowserError, Result};
use crate::profile::NavigationProfile;
use crate::session::{BoundingBox, BrowserSession, ElementHandle, SessionFactory, WaitPolicy};
use chromiumoxide::browser::{Browser, BrowserConfig as ChromiumConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetGeolocationOverrideParams;
use chromiumoxide::cdp::browser_protocol::network::{
    DeleteCookiesParams, SetUserAgentOverrideParams,
};
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Element, Page};
use futures::stream::StreamExt;
use spectral_core::{BrowserConfig, CookieRecord};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

const CLEAR_STORAGE_SCRIPT: &str = r"(() => {
    try { localStorage.clear(); sessionStorage.clear(); return true; } catch (e) { return false; }
})()";

fn chromium(err: impl std::fmt::Display) -> BrowserError {
    BrowserError::ChromiumError(err.to_string())
}

/// Headless Chromium session for one audited site.
///
/// Owns its own browser process so cookie and storage resets never touch
/// another site's session.
pub struct BrowserEngine {
    browser: Mutex<Browser>,
    page: Page,
    handler: JoinHandle<()>,
    elements: Mutex<HashMap<u64, Element>>,
    next_element: AtomicU64,
    screenshot_dir: PathBuf,
}

impl BrowserEngine {
    /// Launch a browser configured with the fixed navigation profile.
    pub async fn launch(config: &BrowserConfig) -> Result<Self> {
        let profile = NavigationProfile::from_config(config);

        let mut builder = ChromiumConfig::builder()
            .no_sandbox()
            .window_size(profile.viewport_width, profile.viewport_height)
            .request_timeout(config.navigation_timeout());
        if !profile.headless {
            builder = builder.with_head();
        }
        for arg in profile.launch_args() {
            builder = builder.arg(arg);
        }
        let chromium_config = builder.build().map_err(chromium)?;

        let (browser, mut handler) = Browser::launch(chromium_config).await.map_err(chromium)?;

        // Spawn browser handler
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "browser handler event error");
                }
            }
        });

        let page = browser.new_page("about:blank").await.map_err(chromium)?;
        Self::apply_profile(&page, &profile).await?;

        let screenshot_dir = match &config.screenshot_dir {
            Some(dir) => dir.clone(),
            None => spectral_core::AppConfig::cache_dir()
                .map_err(chromium)?
                .join("screenshots"),
        };

        tracing::info!(
            headless = profile.headless,
            locale = %profile.locale,
            "launched browser session"
        );

        Ok(Self {
            browser: Mutex::new(browser),
            page,
            handler,
            elements: Mutex::new(HashMap::new()),
            next_element: AtomicU64::new(1),
            screenshot_dir,
        })
    }

    async fn apply_profile(page: &Page, profile: &NavigationProfile) -> Result<()> {
        let user_agent = SetUserAgentOverrideParams::builder()
            .user_agent(profile.user_agent.clone())
            .accept_language(profile.accept_language.clone())
            .build()
            .map_err(chromium)?;
        page.execute(user_agent).await.map_err(chromium)?;

        let geolocation = SetGeolocationOverrideParams::builder()
            .latitude(profile.latitude)
            .longitude(profile.longitude)
            .accuracy(100.0)
            .build();
        page.execute(geolocation).await.map_err(chromium)?;
        Ok(())
    }

    /// Close the browser process.
    pub async fn close(self) -> Result<()> {
        let mut browser = self.browser.into_inner();
        browser.close().await.map_err(chromium)?;
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "browser process wait failed");
        }
        self.handler.abort();
        Ok(())
    }

    async fn element(
        &self,
        handle: &ElementHandle,
    ) -> Result<tokio::sync::MutexGuard<'_, HashMap<u64, Element>>> {
        let elements = self.elements.lock().await;
        if elements.contains_key(&handle.id()) {
            Ok(elements)
        } else {
            Err(BrowserError::StaleElement(handle.selector().to_string()))
        }
    }
}

#[async_trait::async_trait]
impl BrowserSession for BrowserEngine {
    async fn navigate(&self, url: &str, wait: WaitPolicy, timeout: Duration) -> Result<()> {
        self.elements.lock().await.clear();

        let navigation = async {
            self.page.goto(url).await?;
            if wait == WaitPolicy::Load {
                self.page.wait_for_navigation().await?;
            }
            Ok::<_, chromiumoxide::error::CdpError>(())
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(Ok(())) => {
                tracing::debug!(url, ?wait, "navigation complete");
                Ok(())
            }
            Ok(Err(e)) => Err(BrowserError::NavigationError {
                url: url.to_string(),
                reason: e.to_string(),
            }),
            Err(_) => Err(BrowserError::Timeout(format!(
                "navigation to {url} exceeded {}s",
                timeout.as_secs()
            ))),
        }
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let result = self
            .page
            .evaluate(script)
            .await
            .map_err(|e| BrowserError::EvaluationError(e.to_string()))?;
        Ok(result.value().cloned().unwrap_or(serde_json::Value::Null))
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self.page.get_cookies().await.map_err(chromium)?;
        Ok(cookies
            .into_iter()
            .map(|c| CookieRecord {
                name: c.name,
                domain: c.domain,
                session: c.session,
            })
            .collect())
    }

    async fn clear_cookies(&self) -> Result<()> {
        let cookies = self.page.get_cookies().await.map_err(chromium)?;
        let count = cookies.len();
        for cookie in cookies {
            let params = DeleteCookiesParams::builder()
                .name(cookie.name)
                .domain(cookie.domain)
                .path(cookie.path)
                .build()
                .map_err(chromium)?;
            self.page.execute(params).await.map_err(chromium)?;
        }
        tracing::debug!(count, "cleared cookies");
        Ok(())
    }

    async fn clear_storage(&self) -> Result<()> {
        let cleared = self.evaluate(CLEAR_STORAGE_SCRIPT).await?;
        if cleared != serde_json::Value::Bool(true) {
            tracing::debug!("storage not accessible on current page");
        }
        Ok(())
    }

    async fn screenshot(&self, label: &str) -> Result<String> {
        let png = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(false).build())
            .await
            .map_err(chromium)?;

        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or_default();
        tokio::fs::create_dir_all(&self.screenshot_dir).await?;
        let path = self.screenshot_dir.join(format!("{millis}_{label}.png"));
        tokio::fs::write(&path, png).await?;
        Ok(path.display().to_string())
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        match self.page.find_element(selector).await {
            Ok(element) => {
                let id = self.next_element.fetch_add(1, Ordering::Relaxed);
                self.elements.lock().await.insert(id, element);
                Ok(Some(ElementHandle::new(id, selector)))
            }
            Err(e) => {
                tracing::trace!(selector, error = %e, "selector did not match");
                Ok(None)
            }
        }
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        let elements = self.element(element).await?;
        if let Some(el) = elements.get(&element.id()) {
            el.click().await.map_err(chromium)?;
        }
        Ok(())
    }

    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<BoundingBox>> {
        let elements = self.element(element).await?;
        let Some(el) = elements.get(&element.id()) else {
            return Ok(None);
        };
        match el.bounding_box().await {
            Ok(b) => Ok(Some(BoundingBox {
                x: b.x,
                y: b.y,
                width: b.width,
                height: b.height,
            })),
            Err(_) => Ok(None),
        }
    }
}

/// Launches one [`BrowserEngine`] per site.
#[derive(Debug, Clone)]
pub struct ChromiumSessionFactory {
    config: BrowserConfig,
}

impl ChromiumSessionFactory {
    /// Factory launching browsers with `config`.
    #[must_use]
    pub fn new(config: BrowserConfig) -> Self {
        Self { config }
    }
}

#[async_trait::async_trait]
impl SessionFactory for ChromiumSessionFactory {
    type Session = BrowserEngine;

    async fn open(&self) -> Result<BrowserEngine> {
        BrowserEngine::launch(&self.config).await
    }

    async fn close(&self, session: BrowserEngine) -> Result<()> {
        session.close().await
    }
}
