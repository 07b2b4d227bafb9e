use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::error::ActionError;

pub const DEFAULT_MAX_STEPS: usize = 20;
pub const DEFAULT_WAIT_MS: u64 = 2000;
pub const SCROLL_INCREMENT_PX: i64 = 500;
/// Number of most recent history entries shown to the model.
pub const HISTORY_WINDOW: usize = 3;
pub const MAX_INTERACTIVE_ELEMENTS: usize = 15;
pub const MAIN_CONTENT_MAX_CHARS: usize = 800;

/// What a single action does to the browser. The payload carries exactly the
/// fields that variant needs, so an executor never sees a half-specified action.
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    Navigate { url: String },
    Click { selector: String },
    Type { selector: String, text: String },
    /// Without a selector the viewport scrolls by a fixed increment.
    Scroll { selector: Option<String> },
    Wait { millis: u64 },
    Extract { query: String },
    Complete,
}

impl ActionKind {
    pub fn name(&self) -> &'static str {
        match self {
            ActionKind::Navigate { .. } => "navigate",
            ActionKind::Click { .. } => "click",
            ActionKind::Type { .. } => "type",
            ActionKind::Scroll { .. } => "scroll",
            ActionKind::Wait { .. } => "wait",
            ActionKind::Extract { .. } => "extract",
            ActionKind::Complete => "complete",
        }
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::Navigate { url } => write!(f, "navigate {url}"),
            ActionKind::Click { selector } => write!(f, "click {selector}"),
            ActionKind::Type { selector, text } => write!(f, "type {text:?} into {selector}"),
            ActionKind::Scroll { selector: Some(selector) } => write!(f, "scroll to {selector}"),
            ActionKind::Scroll { selector: None } => write!(f, "scroll down"),
            ActionKind::Wait { millis } => write!(f, "wait {millis}ms"),
            ActionKind::Extract { query } => write!(f, "extract {query:?}"),
            ActionKind::Complete => write!(f, "complete"),
        }
    }
}

/// A single browser operation proposed by the planner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAction", into = "RawAction")]
pub struct Action {
    pub kind: ActionKind,
    pub reasoning: String,
    pub confidence: f64,
    pub next_step: Option<String>,
}

impl Action {
    pub fn new(kind: ActionKind, reasoning: impl Into<String>, confidence: f64) -> Self {
        Self {
            kind,
            reasoning: reasoning.into(),
            confidence,
            next_step: None,
        }
    }
}

/// The loose JSON shape the model writes an action in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawAction {
    #[serde(rename = "type")]
    pub action_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    pub reasoning: String,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_step: Option<String>,
}

fn required(
    value: Option<String>,
    action: &'static str,
    field: &'static str,
) -> Result<String, ActionError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(ActionError::MissingField { action, field }),
    }
}

impl TryFrom<RawAction> for Action {
    type Error = ActionError;

    fn try_from(raw: RawAction) -> Result<Self, Self::Error> {
        let kind = match raw.action_type.trim().to_ascii_lowercase().as_str() {
            "navigate" => ActionKind::Navigate {
                url: required(raw.url, "navigate", "url")?,
            },
            "click" => ActionKind::Click {
                selector: required(raw.selector, "click", "selector")?,
            },
            "type" => ActionKind::Type {
                selector: required(raw.selector, "type", "selector")?,
                text: raw.text.ok_or(ActionError::MissingField {
                    action: "type",
                    field: "text",
                })?,
            },
            "scroll" => ActionKind::Scroll {
                selector: raw.selector.filter(|s| !s.trim().is_empty()),
            },
            "wait" => ActionKind::Wait {
                millis: raw
                    .text
                    .as_deref()
                    .and_then(|t| t.trim().parse::<u64>().ok())
                    .unwrap_or(DEFAULT_WAIT_MS),
            },
            "extract" => ActionKind::Extract {
                query: raw.text.unwrap_or_default(),
            },
            "complete" => ActionKind::Complete,
            other => return Err(ActionError::UnknownType(other.to_string())),
        };

        if raw.reasoning.trim().is_empty() {
            return Err(ActionError::EmptyReasoning);
        }
        if !(0.0..=1.0).contains(&raw.confidence) {
            return Err(ActionError::ConfidenceOutOfRange(raw.confidence));
        }

        Ok(Action {
            kind,
            reasoning: raw.reasoning,
            confidence: raw.confidence,
            next_step: raw.next_step,
        })
    }
}

impl From<Action> for RawAction {
    fn from(action: Action) -> Self {
        let mut raw = RawAction {
            action_type: action.kind.name().to_string(),
            reasoning: action.reasoning,
            confidence: action.confidence,
            next_step: action.next_step,
            ..Default::default()
        };
        match action.kind {
            ActionKind::Navigate { url } => raw.url = Some(url),
            ActionKind::Click { selector } => raw.selector = Some(selector),
            ActionKind::Type { selector, text } => {
                raw.selector = Some(selector);
                raw.text = Some(text);
            }
            ActionKind::Scroll { selector } => raw.selector = selector,
            ActionKind::Wait { millis } => raw.text = Some(millis.to_string()),
            ActionKind::Extract { query } => raw.text = Some(query),
            ActionKind::Complete => {}
        }
        raw
    }
}

fn unit_interval<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(D::Error::custom(format!("progress {value} is outside [0, 1]")))
    }
}

/// The planner's judgement of where the task stands.
///
/// `progress` is whatever the model reports. Nothing guarantees it increases
/// from one step to the next.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskProgress {
    pub completed: bool,
    #[serde(default, deserialize_with = "unit_interval")]
    pub progress: f64,
    #[serde(default)]
    pub current_step: String,
    /// Only the first action is executed; the rest are informational.
    #[serde(default)]
    pub next_actions: Vec<Action>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extracted_data: Option<Map<String, Value>>,
}

impl TaskProgress {
    /// Keeps the loop alive when the model's answer can't be used: one wait,
    /// then the next planning pass gets another chance.
    pub fn fallback(reason: impl fmt::Display) -> Self {
        Self {
            completed: false,
            progress: 0.0,
            current_step: format!("Planner fallback: {reason}"),
            next_actions: vec![Action::new(
                ActionKind::Wait {
                    millis: DEFAULT_WAIT_MS,
                },
                "Planner response was unusable; waiting before re-planning",
                0.0,
            )],
            extracted_data: None,
        }
    }
}

/// One executed step. Entries are appended and never changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    pub step: usize,
    pub action: Action,
    pub result: String,
    pub page_url: String,
}

/// Settings captured when an [`crate::Agent`] is built. Read-only afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Hard ceiling on executed actions per task.
    pub max_steps: usize,
    pub step_delay: Duration,
    pub debug_mode: bool,
    pub screenshot_on_error: bool,
    pub screenshot_path: PathBuf,
    pub llm_timeout: Duration,
    pub action_timeout: Duration,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: DEFAULT_MAX_STEPS,
            step_delay: Duration::ZERO,
            debug_mode: false,
            screenshot_on_error: false,
            screenshot_path: PathBuf::from("agent-error.png"),
            llm_timeout: Duration::from_secs(60),
            action_timeout: Duration::from_secs(30),
        }
    }
}

impl AgentConfig {
    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_step_delay(mut self, step_delay: Duration) -> Self {
        self.step_delay = step_delay;
        self
    }

    pub fn with_debug_mode(mut self, debug_mode: bool) -> Self {
        self.debug_mode = debug_mode;
        self
    }

    pub fn with_screenshot_on_error(mut self, path: Option<PathBuf>) -> Self {
        self.screenshot_on_error = true;
        if let Some(path) = path {
            self.screenshot_path = path;
        }
        self
    }

    pub fn with_llm_timeout(mut self, timeout: Duration) -> Self {
        self.llm_timeout = timeout;
        self
    }

    pub fn with_action_timeout(mut self, timeout: Duration) -> Self {
        self.action_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(action_type: &str) -> RawAction {
        RawAction {
            action_type: action_type.to_string(),
            reasoning: "because".to_string(),
            confidence: 0.8,
            ..Default::default()
        }
    }

    #[test]
    fn navigate_requires_url() {
        let err = Action::try_from(raw("navigate")).unwrap_err();
        assert_eq!(
            err,
            ActionError::MissingField {
                action: "navigate",
                field: "url"
            }
        );
    }

    #[test]
    fn type_requires_selector_and_text() {
        let mut r = raw("type");
        r.text = Some("hello".into());
        assert!(matches!(
            Action::try_from(r).unwrap_err(),
            ActionError::MissingField { field: "selector", .. }
        ));

        let mut r = raw("type");
        r.selector = Some("#q".into());
        assert!(matches!(
            Action::try_from(r).unwrap_err(),
            ActionError::MissingField { field: "text", .. }
        ));
    }

    #[test]
    fn wait_defaults_when_text_is_not_a_number() {
        let mut r = raw("wait");
        r.text = Some("soon".into());
        let action = Action::try_from(r).unwrap();
        assert_eq!(action.kind, ActionKind::Wait { millis: DEFAULT_WAIT_MS });

        let mut r = raw("wait");
        r.text = Some(" 350 ".into());
        let action = Action::try_from(r).unwrap();
        assert_eq!(action.kind, ActionKind::Wait { millis: 350 });
    }

    #[test]
    fn scroll_selector_is_optional() {
        let action = Action::try_from(raw("scroll")).unwrap();
        assert_eq!(action.kind, ActionKind::Scroll { selector: None });
    }

    #[test]
    fn rejects_unknown_type_and_bad_confidence() {
        assert_eq!(
            Action::try_from(raw("hover")).unwrap_err(),
            ActionError::UnknownType("hover".into())
        );

        let mut r = raw("complete");
        r.confidence = 1.5;
        assert_eq!(
            Action::try_from(r).unwrap_err(),
            ActionError::ConfidenceOutOfRange(1.5)
        );

        let mut r = raw("complete");
        r.reasoning = "  ".into();
        assert_eq!(Action::try_from(r).unwrap_err(), ActionError::EmptyReasoning);
    }

    #[test]
    fn action_json_uses_wire_field_names() {
        let action = Action {
            kind: ActionKind::Type {
                selector: "#q".into(),
                text: "rust".into(),
            },
            reasoning: "search".into(),
            confidence: 0.9,
            next_step: Some("submit".into()),
        };
        let json = serde_json::to_value(&action).unwrap();
        assert_eq!(json["type"], "type");
        assert_eq!(json["selector"], "#q");
        assert_eq!(json["text"], "rust");
        assert_eq!(json["nextStep"], "submit");
        assert!(json.get("url").is_none());
    }

    #[test]
    fn progress_must_be_in_unit_interval() {
        let err = serde_json::from_str::<TaskProgress>(r#"{"completed":false,"progress":2}"#);
        assert!(err.is_err());

        let ok: TaskProgress = serde_json::from_str(r#"{"completed":true}"#).unwrap();
        assert_eq!(ok.progress, 0.0);
        assert!(ok.next_actions.is_empty());
    }

    #[test]
    fn fallback_is_a_single_wait() {
        let progress = TaskProgress::fallback("bad json");
        assert!(!progress.completed);
        assert_eq!(progress.progress, 0.0);
        assert_eq!(progress.next_actions.len(), 1);
        assert_eq!(progress.next_actions[0].kind.name(), "wait");
    }
}
