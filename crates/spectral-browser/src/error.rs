use thiserror::Error;

pub type Result<T> = std::result::Result<T, BrowserError>;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("chromium error: {0}")]
    ChromiumError(String),

    #[error("navigation to {url} failed: {reason}")]
    NavigationError { url: String, reason: String },

    #[error("evaluation failed: {0}")]
    EvaluationError(String),

    #[error("stale element handle: {0}")]
    StaleElement(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<BrowserError> for spectral_core::SpectralError {
    fn from(err: BrowserError) -> Self {
        Self::Browser(err.to_string())
    }
}
