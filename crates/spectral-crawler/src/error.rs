use spectral_core::SpectralError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CrawlError {
    #[error("Invalid target {url}: {reason}")]
    InvalidTarget { url: String, reason: String },

    #[error("Browser error: {0}")]
    Browser(#[from] spectral_browser::BrowserError),

    #[error("Catalog error: {0}")]
    Catalog(#[from] spectral_catalog::CatalogError),

    #[error("Evidence error: {0}")]
    Evidence(#[from] SpectralError),
}

impl From<CrawlError> for SpectralError {
    fn from(err: CrawlError) -> Self {
        match err {
            CrawlError::Evidence(inner) => inner,
            other => Self::Crawl(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, CrawlError>;
