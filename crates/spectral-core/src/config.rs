//! Configuration management for Spectral.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides.

use crate::error::{ConfigError, ConfigResult};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Main application configuration.
///
/// This is loaded from `~/.config/spectral/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Browser session settings
    pub browser: BrowserConfig,
    /// Phase timing and evidence thresholds
    pub crawl: CrawlConfig,
    /// Multi-site batch settings
    pub scanning: ScanningConfig,
    /// Classification table location
    pub catalog: CatalogConfig,
}

impl AppConfig {
    /// Load configuration from disk, falling back to defaults if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            tracing::debug!("Loading config from {}", config_path.display());
            let contents = fs::read_to_string(&config_path)?;
            let config: Self = toml::from_str(&contents)?;
            config.validate()?;
            Ok(config)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `SPECTRAL_HEADLESS`: Override browser headless mode (true/false)
    /// - `SPECTRAL_CONCURRENT_SITES`: Override the batch worker count
    /// - `SPECTRAL_DEFINITIONS_DIR`: Load classification tables from this directory
    /// - `SPECTRAL_SCREENSHOT_DIR`: Write screenshots to this directory
    pub fn load_with_env() -> ConfigResult<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup. Unparseable values are ignored.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(val) = lookup("SPECTRAL_HEADLESS") {
            if let Ok(headless) = val.parse() {
                self.browser.headless = headless;
                tracing::debug!("Override browser.headless from env: {}", headless);
            }
        }

        if let Some(val) = lookup("SPECTRAL_CONCURRENT_SITES") {
            if let Ok(sites) = val.parse() {
                self.scanning.concurrent_sites = sites;
                tracing::debug!("Override scanning.concurrent_sites from env: {}", sites);
            }
        }

        if let Some(val) = lookup("SPECTRAL_DEFINITIONS_DIR") {
            tracing::debug!("Override catalog.definitions_dir from env: {}", val);
            self.catalog.definitions_dir = Some(PathBuf::from(val));
        }

        if let Some(val) = lookup("SPECTRAL_SCREENSHOT_DIR") {
            tracing::debug!("Override browser.screenshot_dir from env: {}", val);
            self.browser.screenshot_dir = Some(PathBuf::from(val));
        }
    }

    /// Check values that would make a crawl impossible.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.scanning.concurrent_sites == 0 {
            return Err(ConfigError::InvalidValue {
                field: "scanning.concurrent_sites".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        if self.browser.window_width == 0 || self.browser.window_height == 0 {
            return Err(ConfigError::InvalidValue {
                field: "browser.window_width/window_height".to_string(),
                reason: "window dimensions must be non-zero".to_string(),
            });
        }
        if self.browser.navigation_timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "browser.navigation_timeout_secs".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Save configuration to disk.
    ///
    /// Creates the config directory if it doesn't exist.
    pub fn save(&self) -> ConfigResult<()> {
        let config_path = Self::config_path()?;
        let config_dir = config_path
            .parent()
            .ok_or_else(|| ConfigError::InvalidValue {
                field: "config_path".to_string(),
                reason: "no parent directory".to_string(),
            })?;

        fs::create_dir_all(config_dir)?;
        tracing::debug!("Saving config to {}", config_path.display());

        let contents = toml::to_string_pretty(self)?;
        fs::write(config_path, contents)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/spectral/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "spectral", "spectral").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the cache directory path, used as the default screenshot location.
    ///
    /// Uses XDG base directories: `~/.cache/spectral`
    pub fn cache_dir() -> ConfigResult<PathBuf> {
        let dirs =
            ProjectDirs::from("com", "spectral", "spectral").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.cache_dir().to_path_buf())
    }
}

/// Browser session settings and the fixed navigation profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Run browser in headless mode
    pub headless: bool,
    /// Browser window width
    pub window_width: u32,
    /// Browser window height
    pub window_height: u32,
    /// Navigation timeout in seconds
    pub navigation_timeout_secs: u64,
    /// Browser UI language (`--lang`)
    pub locale: String,
    /// `Accept-Language` header sent with every request
    pub accept_language: String,
    /// Reported geolocation latitude
    pub latitude: f64,
    /// Reported geolocation longitude
    pub longitude: f64,
    /// User agent string
    pub user_agent: String,
    /// Where screenshots are written; defaults to the cache directory
    pub screenshot_dir: Option<PathBuf>,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: 1366,
            window_height: 768,
            navigation_timeout_secs: 60,
            locale: "de-DE".to_string(),
            accept_language: "de-DE,de;q=0.9,en;q=0.8".to_string(),
            latitude: 52.52,
            longitude: 13.405,
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                         (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36"
                .to_string(),
            screenshot_dir: None,
        }
    }
}

impl BrowserConfig {
    /// Navigation timeout as a `Duration`.
    #[must_use]
    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }
}

/// Phase timing and evidence thresholds.
///
/// All intervals are in milliseconds. Every wait is bounded and a timeout
/// only degrades the current phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Wait after each navigation before interacting
    pub navigation_settle_ms: u64,
    /// Wait at the start of every capture
    pub capture_settle_ms: u64,
    /// Wait before retrying a failed script query
    pub capture_retry_delay_ms: u64,
    /// Wait after a successful consent click
    pub consent_settle_ms: u64,
    /// Bound on waiting for `document.readyState == "complete"` after a click
    pub page_complete_timeout_ms: u64,
    /// Interval between ready-state polls
    pub ready_state_poll_ms: u64,
    /// Wait after a successful reject before reloading
    pub post_reject_settle_ms: u64,
    /// Wait after the post-reject reload
    pub reload_settle_ms: u64,
    /// Wait after a successful accept
    pub post_accept_settle_ms: u64,
    /// Bound on the page-complete wait after accepting
    pub post_accept_complete_timeout_ms: u64,
    /// Final wait before the post-accept capture
    pub post_accept_tail_ms: u64,
    /// Minimum iframe width and height probed for consent buttons, in pixels
    pub min_iframe_size: f64,
    /// Banner text excerpt length in characters
    pub banner_excerpt_chars: usize,
    /// Banner text shorter than this is considered insufficient information
    pub min_banner_text_chars: usize,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            navigation_settle_ms: 5000,
            capture_settle_ms: 2000,
            capture_retry_delay_ms: 1000,
            consent_settle_ms: 5000,
            page_complete_timeout_ms: 10_000,
            ready_state_poll_ms: 250,
            post_reject_settle_ms: 8000,
            reload_settle_ms: 3000,
            post_accept_settle_ms: 10_000,
            post_accept_complete_timeout_ms: 15_000,
            post_accept_tail_ms: 5000,
            min_iframe_size: 100.0,
            banner_excerpt_chars: 200,
            min_banner_text_chars: 50,
        }
    }
}

impl CrawlConfig {
    /// Timings with every wait set to zero, for scripted sessions.
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            navigation_settle_ms: 0,
            capture_settle_ms: 0,
            capture_retry_delay_ms: 0,
            consent_settle_ms: 0,
            page_complete_timeout_ms: 0,
            ready_state_poll_ms: 0,
            post_reject_settle_ms: 0,
            reload_settle_ms: 0,
            post_accept_settle_ms: 0,
            post_accept_complete_timeout_ms: 0,
            post_accept_tail_ms: 0,
            ..Self::default()
        }
    }
}

/// Multi-site batch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanningConfig {
    /// Number of sites crawled at once, one browser session each
    pub concurrent_sites: usize,
}

impl Default for ScanningConfig {
    fn default() -> Self {
        Self {
            concurrent_sites: 1,
        }
    }
}

/// Classification table location.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    /// Directory with `classification.toml`, `languages.toml`, `vendors.toml`
    /// and `violations.toml`. The embedded tables are used when unset.
    pub definitions_dir: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(config.browser.headless);
        assert_eq!(config.browser.window_width, 1366);
        assert_eq!(config.browser.locale, "de-DE");
        assert_eq!(config.crawl.capture_settle_ms, 2000);
        assert_eq!(config.crawl.min_banner_text_chars, 50);
        assert_eq!(config.scanning.concurrent_sites, 1);
        assert!(config.catalog.definitions_dir.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml_str = toml::to_string_pretty(&config).expect("serialize default config");
        assert!(toml_str.contains("[browser]"));
        assert!(toml_str.contains("[crawl]"));
        assert!(toml_str.contains("[scanning]"));

        let parsed: AppConfig = toml::from_str(&toml_str).expect("parse serialized config");
        assert_eq!(parsed.browser.accept_language, config.browser.accept_language);
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().expect("create temp dir");
        let config_path = tmp.path().join("config.toml");

        let mut config = AppConfig::default();
        config.scanning.concurrent_sites = 4;
        config.crawl.consent_settle_ms = 1500;

        let contents = toml::to_string_pretty(&config).expect("serialize config");
        fs::write(&config_path, contents).expect("write config file");

        let loaded_contents = fs::read_to_string(&config_path).expect("read config file");
        let loaded: AppConfig = toml::from_str(&loaded_contents).expect("parse loaded config");

        assert_eq!(loaded.scanning.concurrent_sites, 4);
        assert_eq!(loaded.crawl.consent_settle_ms, 1500);
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SPECTRAL_HEADLESS", "false"),
            ("SPECTRAL_CONCURRENT_SITES", "6"),
            ("SPECTRAL_DEFINITIONS_DIR", "/opt/spectral/definitions"),
        ]
        .into_iter()
        .collect();

        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| vars.get(key).map(ToString::to_string));

        assert!(!config.browser.headless);
        assert_eq!(config.scanning.concurrent_sites, 6);
        assert_eq!(
            config.catalog.definitions_dir,
            Some(PathBuf::from("/opt/spectral/definitions"))
        );
        assert!(config.browser.screenshot_dir.is_none());
    }

    #[test]
    fn test_env_override_ignores_garbage() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(|key| {
            (key == "SPECTRAL_CONCURRENT_SITES").then(|| "lots".to_string())
        });
        assert_eq!(config.scanning.concurrent_sites, 1);
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let mut config = AppConfig::default();
        config.scanning.concurrent_sites = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn test_partial_config() {
        let toml_str = r#"
[crawl]
consent_settle_ms = 100

[scanning]
concurrent_sites = 2
"#;

        let config: AppConfig = toml::from_str(toml_str).expect("parse partial config");
        assert_eq!(config.crawl.consent_settle_ms, 100);
        assert_eq!(config.scanning.concurrent_sites, 2);
        assert_eq!(config.crawl.capture_settle_ms, 2000);
        assert!(config.browser.headless);
    }

    #[test]
    fn test_without_delays_keeps_thresholds() {
        let crawl = CrawlConfig::without_delays();
        assert_eq!(crawl.capture_settle_ms, 0);
        assert_eq!(crawl.post_accept_tail_ms, 0);
        assert_eq!(crawl.banner_excerpt_chars, 200);
        assert!((crawl.min_iframe_size - 100.0).abs() < f64::EPSILON);
    }
}
