//! Browser session driver for consent audits.
//!
//! Exposes the capability surface the crawler depends on ([`BrowserSession`]),
//! a headless Chromium implementation with a fixed EU navigation profile,
//! and, behind the `test-support` feature, a scripted in-memory session.

pub mod engine;
pub mod error;
pub mod profile;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;

pub use engine::{BrowserEngine, ChromiumSessionFactory};
pub use error::{BrowserError, Result};
pub use profile::NavigationProfile;
pub use session::{
    evaluate_as, extract_domain, BoundingBox, BrowserSession, ElementHandle, SessionFactory,
    WaitPolicy,
};
