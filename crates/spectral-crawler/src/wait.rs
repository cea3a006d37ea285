//! Fixed settle intervals and bounded page-load waits.

use crate::probe;
use spectral_browser::{evaluate_as, BrowserSession};
use std::time::Duration;
use tracing::{debug, warn};

/// Sleep for a settle interval. Zero returns immediately.
pub async fn settle(ms: u64) {
    if ms > 0 {
        tokio::time::sleep(Duration::from_millis(ms)).await;
    }
}

/// Poll `document.readyState` until `complete`, at most `timeout_ms`.
///
/// Returns whether the page reported complete. A timeout or evaluation
/// failure is not an error; the caller continues as if settled.
pub async fn wait_for_page_complete<S>(session: &S, timeout_ms: u64, poll_ms: u64) -> bool
where
    S: BrowserSession + ?Sized,
{
    if timeout_ms == 0 {
        return false;
    }
    let poll = Duration::from_millis(poll_ms.max(1));

    let wait = async {
        loop {
            match evaluate_as::<Option<String>, _>(session, probe::READY_STATE).await {
                Ok(Some(state)) if state == "complete" => return,
                Ok(_) => {}
                Err(e) => debug!(error = %e, "ready-state poll failed"),
            }
            tokio::time::sleep(poll).await;
        }
    };

    if tokio::time::timeout(Duration::from_millis(timeout_ms), wait)
        .await
        .is_ok()
    {
        true
    } else {
        warn!(timeout_ms, "page did not report complete, continuing");
        false
    }
}
