//! Deterministic in-memory session for exercising crawl logic without a browser.
//!
//! Evaluate responses are keyed by a marker substring of the script. Each
//! marker owns a queue; the last queued response repeats once the queue is
//! drained, so a page that never changes only needs one entry.

use crate::error::{BrowserError, Result};
use crate::session::{BoundingBox, BrowserSession, ElementHandle, SessionFactory, WaitPolicy};
use spectral_core::CookieRecord;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

/// A recorded driver call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCall {
    Navigate(String),
    Evaluate(String),
    Cookies,
    ClearCookies,
    ClearStorage,
    Screenshot(String),
    QuerySelector(String),
    Click(String),
    BoundingBox(String),
}

type Response = std::result::Result<serde_json::Value, String>;

#[derive(Debug, Default)]
struct ResponseQueue {
    pending: VecDeque<Response>,
    last: Option<Response>,
}

impl ResponseQueue {
    fn next(&mut self) -> Option<Response> {
        if let Some(response) = self.pending.pop_front() {
            self.last = Some(response.clone());
            Some(response)
        } else {
            self.last.clone()
        }
    }
}

#[derive(Debug, Default)]
struct State {
    evaluate: Vec<(String, ResponseQueue)>,
    cookies: ResponseQueue,
    elements: HashMap<String, Option<BoundingBox>>,
    failing_navigations: Vec<usize>,
    navigations: usize,
    calls: Vec<SessionCall>,
}

/// Scripted [`BrowserSession`].
#[derive(Debug, Clone, Default)]
pub struct ScriptedSession {
    state: Arc<Mutex<State>>,
}

impl ScriptedSession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn queue_for(&self, marker: &str, response: Response) {
        let mut state = self.state();
        if let Some((_, queue)) = state.evaluate.iter_mut().find(|(m, _)| m == marker) {
            queue.pending.push_back(response);
        } else {
            let mut queue = ResponseQueue::default();
            queue.pending.push_back(response);
            state.evaluate.push((marker.to_string(), queue));
        }
    }

    /// Queue a value returned by scripts containing `marker`.
    #[must_use]
    pub fn on_evaluate(self, marker: &str, value: serde_json::Value) -> Self {
        self.queue_for(marker, Ok(value));
        self
    }

    /// Queue an evaluation failure for scripts containing `marker`.
    #[must_use]
    pub fn on_evaluate_error(self, marker: &str, message: &str) -> Self {
        self.queue_for(marker, Err(message.to_string()));
        self
    }

    /// Queue the cookie jar returned by the next `cookies()` call.
    #[must_use]
    pub fn on_cookies(self, cookies: Vec<CookieRecord>) -> Self {
        let value = serde_json::to_value(cookies).unwrap_or_default();
        self.state().cookies.pending.push_back(Ok(value));
        self
    }

    /// Make `selector` resolve to an element with the given geometry.
    #[must_use]
    pub fn with_element(self, selector: &str, bounding_box: Option<BoundingBox>) -> Self {
        self.state()
            .elements
            .insert(selector.to_string(), bounding_box);
        self
    }

    /// Fail the n-th navigation (1-based).
    #[must_use]
    pub fn fail_navigation(self, nth: usize) -> Self {
        self.state().failing_navigations.push(nth);
        self
    }

    /// Every call made so far.
    #[must_use]
    pub fn calls(&self) -> Vec<SessionCall> {
        self.state().calls.clone()
    }

    /// Selectors that were clicked, in order.
    #[must_use]
    pub fn clicked(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SessionCall::Click(selector) => Some(selector),
                _ => None,
            })
            .collect()
    }

    /// Scripts evaluated that contain `needle`.
    #[must_use]
    pub fn evaluated_containing(&self, needle: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                SessionCall::Evaluate(script) if script.contains(needle) => Some(script),
                _ => None,
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl BrowserSession for ScriptedSession {
    async fn navigate(&self, url: &str, _wait: WaitPolicy, _timeout: Duration) -> Result<()> {
        let mut state = self.state();
        state.calls.push(SessionCall::Navigate(url.to_string()));
        state.navigations += 1;
        if state.failing_navigations.contains(&state.navigations) {
            return Err(BrowserError::NavigationError {
                url: url.to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value> {
        let mut state = self.state();
        state.calls.push(SessionCall::Evaluate(script.to_string()));
        let response = state
            .evaluate
            .iter_mut()
            .find(|(marker, _)| script.contains(marker.as_str()))
            .and_then(|(_, queue)| queue.next());
        match response {
            Some(Ok(value)) => Ok(value),
            Some(Err(message)) => Err(BrowserError::EvaluationError(message)),
            None => Ok(serde_json::Value::Null),
        }
    }

    async fn cookies(&self) -> Result<Vec<CookieRecord>> {
        let mut state = self.state();
        state.calls.push(SessionCall::Cookies);
        match state.cookies.next() {
            Some(Ok(value)) => serde_json::from_value(value)
                .map_err(|e| BrowserError::EvaluationError(e.to_string())),
            Some(Err(message)) => Err(BrowserError::EvaluationError(message)),
            None => Ok(Vec::new()),
        }
    }

    async fn clear_cookies(&self) -> Result<()> {
        self.state().calls.push(SessionCall::ClearCookies);
        Ok(())
    }

    async fn clear_storage(&self) -> Result<()> {
        self.state().calls.push(SessionCall::ClearStorage);
        Ok(())
    }

    async fn screenshot(&self, label: &str) -> Result<String> {
        self.state()
            .calls
            .push(SessionCall::Screenshot(label.to_string()));
        Ok(format!("{label}.png"))
    }

    async fn query_selector(&self, selector: &str) -> Result<Option<ElementHandle>> {
        let mut state = self.state();
        state
            .calls
            .push(SessionCall::QuerySelector(selector.to_string()));
        Ok(state
            .elements
            .contains_key(selector)
            .then(|| ElementHandle::new(0, selector)))
    }

    async fn click(&self, element: &ElementHandle) -> Result<()> {
        self.state()
            .calls
            .push(SessionCall::Click(element.selector().to_string()));
        Ok(())
    }

    async fn bounding_box(&self, element: &ElementHandle) -> Result<Option<BoundingBox>> {
        let mut state = self.state();
        state
            .calls
            .push(SessionCall::BoundingBox(element.selector().to_string()));
        Ok(state.elements.get(element.selector()).copied().flatten())
    }
}

/// Hands out clones of prepared sessions, one per `open()` call, in order.
#[derive(Debug, Clone, Default)]
pub struct ScriptedSessionFactory {
    sessions: Arc<Mutex<VecDeque<Result<ScriptedSession>>>>,
}

impl ScriptedSessionFactory {
    #[must_use]
    pub fn new(sessions: Vec<ScriptedSession>) -> Self {
        Self {
            sessions: Arc::new(Mutex::new(sessions.into_iter().map(Ok).collect())),
        }
    }

    /// Make the next unclaimed `open()` fail.
    #[must_use]
    pub fn then_fail(self, reason: &str) -> Self {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push_back(Err(BrowserError::ChromiumError(reason.to_string())));
        self
    }
}

#[async_trait::async_trait]
impl SessionFactory for ScriptedSessionFactory {
    type Session = ScriptedSession;

    async fn open(&self) -> Result<ScriptedSession> {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .pop_front()
            .unwrap_or_else(|| Ok(ScriptedSession::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_queue_repeats_last_response() {
        let session = ScriptedSession::new()
            .on_evaluate("probe-a", json!(1))
            .on_evaluate("probe-a", json!(2));

        assert_eq!(session.evaluate("/* probe-a */").await.expect("first"), json!(1));
        assert_eq!(session.evaluate("/* probe-a */").await.expect("second"), json!(2));
        assert_eq!(session.evaluate("/* probe-a */").await.expect("repeat"), json!(2));
        assert_eq!(
            session.evaluate("/* other */").await.expect("unmatched"),
            serde_json::Value::Null
        );
    }

    #[tokio::test]
    async fn test_scripted_navigation_failure() {
        let session = ScriptedSession::new().fail_navigation(2);
        let timeout = Duration::from_secs(1);
        assert!(session
            .navigate("https://a.example", WaitPolicy::Load, timeout)
            .await
            .is_ok());
        assert!(session
            .navigate("https://a.example", WaitPolicy::Load, timeout)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_elements_and_clicks_are_recorded() {
        let visible = BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 80.0,
            height: 30.0,
        };
        let session = ScriptedSession::new().with_element("#accept", Some(visible));

        let handle = session
            .query_selector("#accept")
            .await
            .expect("query")
            .expect("element present");
        assert_eq!(
            session.bounding_box(&handle).await.expect("bbox"),
            Some(visible)
        );
        session.click(&handle).await.expect("click");

        assert!(session.query_selector("#missing").await.expect("query").is_none());
        assert_eq!(session.clicked(), vec!["#accept".to_string()]);
    }
}
