use spectral_core::BrowserConfig;

/// Fixed navigation profile applied to every session.
///
/// Audits emulate an EU visitor so that geo-targeted consent banners are shown.
/// The profile is deterministic; nothing is randomized between sessions.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationProfile {
    pub user_agent: String,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub locale: String,
    pub accept_language: String,
    pub latitude: f64,
    pub longitude: f64,
    pub headless: bool,
}

impl NavigationProfile {
    /// Build the profile from browser settings.
    #[must_use]
    pub fn from_config(config: &BrowserConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            viewport_width: config.window_width,
            viewport_height: config.window_height,
            locale: config.locale.clone(),
            accept_language: config.accept_language.clone(),
            latitude: config.latitude,
            longitude: config.longitude,
            headless: config.headless,
        }
    }

    /// Extra Chromium command-line arguments.
    #[must_use]
    pub fn launch_args(&self) -> Vec<String> {
        vec![
            format!("--lang={}", self.locale),
            "--disable-dev-shm-usage".to_string(),
        ]
    }
}

impl Default for NavigationProfile {
    fn default() -> Self {
        Self::from_config(&BrowserConfig::default())
    }
}
