use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::error::PlanError;
use crate::llm::LanguageModel;
use crate::types::{HISTORY_WINDOW, HistoryEntry, TaskProgress};

const INSTRUCTIONS: &str = r##"You are a browser automation agent. You control a real browser by proposing ONE action at a time.

Respond with a single JSON object and nothing else (no markdown, no explanation), shaped like:
{"completed": false, "progress": 0.4, "currentStep": "what is happening now", "nextActions": [{"type": "click", "selector": "#submit", "reasoning": "why", "confidence": 0.8}], "extractedData": {}}

Action types:
- {"type":"navigate","url":"https://..."}
- {"type":"click","selector":"<selector>"}
- {"type":"type","selector":"<selector>","text":"text to enter"}
- {"type":"scroll","selector":"<optional selector>"} (no selector scrolls the page down)
- {"type":"wait","text":"2000"} (milliseconds)
- {"type":"extract","text":"title | links | content | headings"}
- {"type":"complete"}
Every action also needs "reasoning" (non-empty) and "confidence" (0 to 1).

Rules:
1. Only the first entry of nextActions is executed.
2. Use the selectors shown in the page state.
3. When the task is done, answer with "completed": true, "progress": 1 and put any results in "extractedData".
4. If the last action failed, try a different approach instead of repeating it.
5. "progress" is your estimate between 0 and 1 of how much of the task is done."##;

/// Asks the model what to do next and turns the answer into a validated
/// [`TaskProgress`].
pub struct Planner {
    model: Arc<dyn LanguageModel>,
    timeout: Duration,
    debug: bool,
}

impl Planner {
    pub fn new(model: Arc<dyn LanguageModel>, timeout: Duration) -> Self {
        Self {
            model,
            timeout,
            debug: false,
        }
    }

    /// Logs full prompts and replies at info level.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Never fails. Anything that goes wrong while asking the model yields
    /// [`TaskProgress::fallback`], which costs one step but keeps the task alive.
    pub async fn plan(
        &self,
        task: &str,
        history: &[HistoryEntry],
        last_result: Option<&str>,
        page_state: &str,
    ) -> TaskProgress {
        match self.try_plan(task, history, last_result, page_state).await {
            Ok(progress) => progress,
            Err(err) => {
                warn!(target: "planner", error = %err, "falling back to wait");
                TaskProgress::fallback(&err)
            }
        }
    }

    async fn try_plan(
        &self,
        task: &str,
        history: &[HistoryEntry],
        last_result: Option<&str>,
        page_state: &str,
    ) -> Result<TaskProgress, PlanError> {
        let prompt = build_prompt(task, history, last_result, page_state);
        if self.debug {
            info!(target: "planner", %prompt, "prompt");
        } else {
            debug!(target: "planner", chars = prompt.len(), "prompt built");
        }

        let raw = match tokio::time::timeout(self.timeout, self.model.generate(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(err)) => return Err(PlanError::Model(err)),
            Err(_) => return Err(PlanError::Timeout(self.timeout)),
        };
        if self.debug {
            info!(target: "planner", response = %raw, "model replied");
        }

        parse_progress(&raw)
    }
}

/// Builds the planning prompt. Only the last [`HISTORY_WINDOW`] steps are
/// included; older ones are dropped.
pub fn build_prompt(
    task: &str,
    history: &[HistoryEntry],
    last_result: Option<&str>,
    page_state: &str,
) -> String {
    let mut prompt = String::with_capacity(INSTRUCTIONS.len() + page_state.len() + 512);
    prompt.push_str(INSTRUCTIONS);
    let _ = write!(prompt, "\n\nTask: {task}\n\nRecent steps:\n");

    let start = history.len().saturating_sub(HISTORY_WINDOW);
    if history.is_empty() {
        prompt.push_str("  (none yet)\n");
    }
    for entry in &history[start..] {
        let _ = writeln!(
            prompt,
            "  Step {}: {} -> {} (page: {})",
            entry.step, entry.action.kind, entry.result, entry.page_url
        );
    }

    let _ = write!(
        prompt,
        "\nLast action result: {}\n\nCurrent page:\n",
        last_result.unwrap_or("(none)")
    );
    if page_state.trim().is_empty() {
        prompt.push_str("(no page loaded yet)\n");
    } else {
        prompt.push_str(page_state);
        if !page_state.ends_with('\n') {
            prompt.push('\n');
        }
    }
    prompt.push_str("\nWhat is your next step? Reply with the JSON object only.");
    prompt
}

/// Strips markdown fences and any prose around the JSON object.
pub fn clean_response(raw: &str) -> &str {
    let trimmed = raw
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```JSON")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();

    match (trimmed.find('{'), trimmed.rfind('}')) {
        (Some(start), Some(end)) if start < end => &trimmed[start..=end],
        _ => trimmed,
    }
}

/// Parses and validates a model reply. A shape mismatch is an error, not
/// something to patch up.
pub fn parse_progress(raw: &str) -> Result<TaskProgress, PlanError> {
    serde_json::from_str(clean_response(raw)).map_err(PlanError::from_json)
}
