use std::fmt;
use std::future::Future;
use std::time::Duration;

use anyhow::{Result, anyhow};
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::browser::{Browser, ScrollTarget};
use crate::dom::{ElementKind, PageSnapshot, extract_page_state};
use crate::types::{Action, ActionKind, RawAction, SCROLL_INCREMENT_PX};

pub const FAILURE_PREFIX: &str = "Action failed: ";

/// What came of one action. `message` is what the planner reads next turn.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionOutcome {
    pub message: String,
    /// Data gathered by an `extract` action.
    pub extracted: Option<Map<String, Value>>,
}

impl ActionOutcome {
    fn done(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            extracted: None,
        }
    }

    fn failed(reason: impl fmt::Display) -> Self {
        Self::done(format!("{FAILURE_PREFIX}{reason}"))
    }

    pub fn is_failure(&self) -> bool {
        self.message.starts_with(FAILURE_PREFIX)
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Runs actions against a [`Browser`]. Failures come back as outcome text,
/// never as errors, so the planner can react to them.
#[derive(Debug, Clone)]
pub struct ActionExecutor {
    timeout: Duration,
}

impl ActionExecutor {
    /// `timeout` bounds each individual browser call.
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    /// Validates a loose action first; missing fields are reported as a
    /// failed outcome.
    pub async fn execute_raw(&self, browser: &dyn Browser, raw: RawAction) -> ActionOutcome {
        match Action::try_from(raw) {
            Ok(action) => self.execute(browser, &action).await,
            Err(err) => {
                warn!(target: "executor", error = %err, "rejected action");
                ActionOutcome::failed(err)
            }
        }
    }

    pub async fn execute(&self, browser: &dyn Browser, action: &Action) -> ActionOutcome {
        debug!(target: "executor", action = %action.kind, confidence = action.confidence, "executing");
        match self.dispatch(browser, &action.kind).await {
            Ok(outcome) => outcome,
            Err(err) => {
                let reason = format!("{err:#}");
                warn!(target: "executor", action = action.kind.name(), error = %reason, "action failed");
                ActionOutcome::failed(reason)
            }
        }
    }

    async fn dispatch(&self, browser: &dyn Browser, kind: &ActionKind) -> Result<ActionOutcome> {
        match kind {
            ActionKind::Navigate { url } => {
                self.bounded("navigate", browser.goto(url)).await?;
                Ok(ActionOutcome::done(format!("Navigated to {url}")))
            }
            ActionKind::Click { selector } => {
                self.bounded("click", browser.click(selector)).await?;
                Ok(ActionOutcome::done(format!("Clicked {selector}")))
            }
            ActionKind::Type { selector, text } => {
                self.bounded("type", browser.type_text(selector, text))
                    .await?;
                Ok(ActionOutcome::done(format!("Typed {text:?} into {selector}")))
            }
            ActionKind::Scroll {
                selector: Some(selector),
            } => {
                self.bounded("scroll", browser.scroll(ScrollTarget::Element(selector.clone())))
                    .await?;
                Ok(ActionOutcome::done(format!("Scrolled {selector} into view")))
            }
            ActionKind::Scroll { selector: None } => {
                self.bounded("scroll", browser.scroll(ScrollTarget::By(SCROLL_INCREMENT_PX)))
                    .await?;
                Ok(ActionOutcome::done(format!(
                    "Scrolled down by {SCROLL_INCREMENT_PX}px"
                )))
            }
            ActionKind::Wait { millis } => {
                // A wait is capped by the same budget as any other browser call.
                let cap = u64::try_from(self.timeout.as_millis()).unwrap_or(u64::MAX);
                let waited = (*millis).min(cap);
                tokio::time::sleep(Duration::from_millis(waited)).await;
                if waited < *millis {
                    warn!(target: "executor", requested = *millis, waited, "wait capped");
                    return Ok(ActionOutcome::done(format!(
                        "Waited {waited}ms (capped from {millis}ms)"
                    )));
                }
                Ok(ActionOutcome::done(format!("Waited {waited}ms")))
            }
            ActionKind::Extract { query } => {
                let html = self.bounded("extract", browser.content()).await?;
                let url = self.bounded("extract", browser.current_url()).await?;
                let data = extract_fields(&extract_page_state(&html, &url), query);
                Ok(ActionOutcome {
                    message: format!("Extracted data: {}", Value::Object(data.clone())),
                    extracted: Some(data),
                })
            }
            ActionKind::Complete => Ok(ActionOutcome::done("Task marked as complete")),
        }
    }

    async fn bounded<T>(&self, op: &str, call: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.timeout, call)
            .await
            .map_err(|_| anyhow!("{op} timed out after {}ms", self.timeout.as_millis()))?
    }
}

/// Picks fields out of a snapshot by keyword. Only `title`, `link`,
/// `content` and `heading` are understood; anything else yields an empty map.
pub fn extract_fields(snapshot: &PageSnapshot, query: &str) -> Map<String, Value> {
    let query = query.to_lowercase();
    let mut data = Map::new();

    if query.contains("title") {
        data.insert("title".into(), json!(snapshot.title));
    }
    if query.contains("link") {
        let links: Vec<Value> = snapshot
            .interactive_elements
            .iter()
            .filter(|el| el.kind == ElementKind::Link)
            .map(|el| json!({"text": el.text, "href": el.href}))
            .collect();
        data.insert("links".into(), Value::Array(links));
    }
    if query.contains("content") {
        data.insert("content".into(), json!(snapshot.main_content));
    }
    if query.contains("heading") {
        let headings: Vec<Value> = snapshot.headings.iter().map(|h| json!(h.text)).collect();
        data.insert("headings".into(), Value::Array(headings));
    }
    data
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;

    #[derive(Default)]
    struct FakeBrowser {
        calls: Mutex<Vec<String>>,
        fail: Option<&'static str>,
        hang: bool,
    }

    impl FakeBrowser {
        fn record(&self, call: String) -> Result<()> {
            self.calls.lock().unwrap().push(call);
            match self.fail {
                Some(msg) => Err(anyhow!(msg)),
                None => Ok(()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Browser for FakeBrowser {
        async fn launch(&mut self) -> Result<()> {
            Ok(())
        }
        async fn close(&mut self) -> Result<()> {
            Ok(())
        }
        async fn goto(&self, url: &str) -> Result<()> {
            self.record(format!("goto {url}"))
        }
        async fn click(&self, selector: &str) -> Result<()> {
            if self.hang {
                std::future::pending::<()>().await;
            }
            self.record(format!("click {selector}"))
        }
        async fn type_text(&self, selector: &str, text: &str) -> Result<()> {
            self.record(format!("type {selector} {text}"))
        }
        async fn scroll(&self, target: ScrollTarget) -> Result<()> {
            self.record(format!("scroll {target:?}"))
        }
        async fn content(&self) -> Result<String> {
            Ok("<html><head><title>Example Domain</title></head><body>\
                <h1>Example Domain</h1><p>This domain is for use in examples.</p>\
                <a href=\"https://www.iana.org/domains/example\">More information...</a>\
                </body></html>"
                .to_string())
        }
        async fn current_url(&self) -> Result<String> {
            Ok("https://example.com/".to_string())
        }
        async fn screenshot(&self, _path: &Path) -> Result<()> {
            Ok(())
        }
    }

    fn executor() -> ActionExecutor {
        ActionExecutor::new(Duration::from_secs(5))
    }

    fn raw(action_type: &str) -> RawAction {
        RawAction {
            action_type: action_type.into(),
            reasoning: "test".into(),
            confidence: 0.5,
            ..Default::default()
        }
    }

    fn action(kind: ActionKind) -> Action {
        Action::new(kind, "test", 0.5)
    }

    #[tokio::test]
    async fn navigates_clicks_and_types() {
        let browser = FakeBrowser::default();
        let exec = executor();

        let out = exec
            .execute(&browser, &action(ActionKind::Navigate { url: "https://example.com".into() }))
            .await;
        assert_eq!(out.message, "Navigated to https://example.com");

        let out = exec
            .execute(&browser, &action(ActionKind::Click { selector: "#go".into() }))
            .await;
        assert_eq!(out.message, "Clicked #go");

        let out = exec
            .execute(
                &browser,
                &action(ActionKind::Type {
                    selector: "#q".into(),
                    text: "rust".into(),
                }),
            )
            .await;
        assert_eq!(out.message, "Typed \"rust\" into #q");

        assert_eq!(
            browser.calls(),
            vec!["goto https://example.com", "click #go", "type #q rust"]
        );
    }

    #[tokio::test]
    async fn missing_fields_become_failure_messages() {
        let browser = FakeBrowser::default();
        let exec = executor();

        let out = exec.execute_raw(&browser, raw("navigate")).await;
        assert!(out.is_failure());
        assert_eq!(out.message, "Action failed: navigate requires `url`");

        let out = exec.execute_raw(&browser, raw("click")).await;
        assert_eq!(out.message, "Action failed: click requires `selector`");

        let mut typed = raw("type");
        typed.selector = Some("#q".into());
        let out = exec.execute_raw(&browser, typed).await;
        assert_eq!(out.message, "Action failed: type requires `text`");

        assert!(browser.calls().is_empty());
    }

    #[tokio::test]
    async fn scroll_works_with_or_without_selector() {
        let browser = FakeBrowser::default();
        let exec = executor();

        let with = action(ActionKind::Scroll { selector: Some("#footer".into()) });
        let without = action(ActionKind::Scroll { selector: None });
        for _ in 0..2 {
            assert_eq!(exec.execute(&browser, &with).await.message, "Scrolled #footer into view");
            assert_eq!(exec.execute(&browser, &without).await.message, "Scrolled down by 500px");
        }
        assert_eq!(browser.calls()[1], "scroll By(500)");
    }

    #[tokio::test(start_paused = true)]
    async fn wait_blocks_for_the_requested_time() {
        let browser = FakeBrowser::default();
        let start = tokio::time::Instant::now();
        let out = executor()
            .execute_raw(&browser, raw("wait"))
            .await;
        assert_eq!(out.message, "Waited 2000ms");
        assert!(start.elapsed() >= Duration::from_millis(2000));
    }

    #[tokio::test(start_paused = true)]
    async fn long_wait_is_capped_at_the_action_timeout() {
        let browser = FakeBrowser::default();
        let exec = ActionExecutor::new(Duration::from_secs(30));
        let start = tokio::time::Instant::now();
        let out = exec
            .execute_raw(
                &browser,
                RawAction {
                    text: Some("86400000".into()),
                    ..raw("wait")
                },
            )
            .await;
        assert_eq!(out.message, "Waited 30000ms (capped from 86400000ms)");
        assert!(!out.is_failure());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(30));
        assert!(elapsed < Duration::from_secs(31));
    }

    #[tokio::test]
    async fn extract_dispatches_on_keywords() {
        let browser = FakeBrowser::default();
        let exec = executor();

        let out = exec
            .execute(&browser, &action(ActionKind::Extract { query: "title".into() }))
            .await;
        assert_eq!(out.message, r#"Extracted data: {"title":"Example Domain"}"#);
        assert_eq!(out.extracted.unwrap()["title"], json!("Example Domain"));

        let out = exec
            .execute(
                &browser,
                &action(ActionKind::Extract {
                    query: "all Links and headings".into(),
                }),
            )
            .await;
        let data = out.extracted.unwrap();
        assert_eq!(
            data["links"][0]["href"],
            json!("https://www.iana.org/domains/example")
        );
        assert_eq!(data["headings"], json!(["Example Domain"]));
        assert!(data.get("title").is_none());

        let out = exec
            .execute(&browser, &action(ActionKind::Extract { query: "prices".into() }))
            .await;
        assert_eq!(out.message, "Extracted data: {}");
    }

    #[tokio::test]
    async fn browser_errors_are_caught() {
        let browser = FakeBrowser {
            fail: Some("no node found for selector #missing"),
            ..Default::default()
        };
        let out = executor()
            .execute(&browser, &action(ActionKind::Click { selector: "#missing".into() }))
            .await;
        assert_eq!(
            out.message,
            "Action failed: no node found for selector #missing"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn hung_browser_call_times_out() {
        let browser = FakeBrowser {
            hang: true,
            ..Default::default()
        };
        let out = ActionExecutor::new(Duration::from_millis(250))
            .execute(&browser, &action(ActionKind::Click { selector: "#b".into() }))
            .await;
        assert_eq!(out.message, "Action failed: click timed out after 250ms");
    }

    #[tokio::test]
    async fn complete_is_a_no_op() {
        let browser = FakeBrowser::default();
        let out = executor().execute(&browser, &action(ActionKind::Complete)).await;
        assert_eq!(out.message, "Task marked as complete");
        assert!(browser.calls().is_empty());
    }
}
