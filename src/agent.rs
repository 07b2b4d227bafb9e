//! The plan → act → observe loop.
//!
//! ```text
//! Idle → Launching → Planning → Executing → Observing → Planning ...
//!                                  ↘ Completed | StepBudgetExhausted | NoFurtherActions
//!                                  ↘ FatalError | Cancelled
//! ```

use std::future::Future;
use std::sync::{Arc, PoisonError, RwLock};

use anyhow::anyhow;
use serde::Serialize;
use serde_json::Map;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::browser::Browser;
use crate::dom::{PageSnapshot, extract_page_state};
use crate::error::{AgentError, Result};
use crate::executor::ActionExecutor;
use crate::llm::LanguageModel;
use crate::planner::Planner;
use crate::types::{AgentConfig, HistoryEntry, TaskProgress};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum AgentState {
    #[default]
    Idle,
    Launching,
    Planning,
    Executing,
    Observing,
    Completed,
    StepBudgetExhausted,
    NoFurtherActions,
    FatalError,
    Cancelled,
}

/// Why a task stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Termination {
    /// The planner reported `completed: true`.
    Completed,
    /// `max_steps` actions ran and the task is still not done.
    StepBudgetExhausted,
    /// The planner proposed no action but did not claim completion.
    NoFurtherActions,
}

impl From<Termination> for AgentState {
    fn from(t: Termination) -> Self {
        match t {
            Termination::Completed => AgentState::Completed,
            Termination::StepBudgetExhausted => AgentState::StepBudgetExhausted,
            Termination::NoFurtherActions => AgentState::NoFurtherActions,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TaskOutcome {
    pub progress: TaskProgress,
    pub termination: Termination,
    pub history: Vec<HistoryEntry>,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.termination == Termination::Completed
    }
}

/// Point-in-time view of the task an agent is working on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskStatus {
    pub task: Option<String>,
    pub step_count: usize,
    pub max_steps: usize,
    pub state: AgentState,
}

#[derive(Default)]
struct Shared {
    task: Option<String>,
    step_count: usize,
    state: AgentState,
    history: Vec<HistoryEntry>,
    cancel: Option<CancellationToken>,
}

/// Read access to a running agent plus the ability to cancel its task.
#[derive(Clone)]
pub struct AgentHandle {
    shared: Arc<RwLock<Shared>>,
    max_steps: usize,
}

impl AgentHandle {
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.read(|s| s.history.clone())
    }

    pub fn current_task(&self) -> TaskStatus {
        self.read(|s| TaskStatus {
            task: s.task.clone(),
            step_count: s.step_count,
            max_steps: self.max_steps,
            state: s.state,
        })
    }

    /// Signals the running task to stop at its next suspension point.
    /// Returns false when no task is running.
    pub fn cancel(&self) -> bool {
        self.read(|s| match &s.cancel {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        })
    }

    fn read<T>(&self, f: impl FnOnce(&Shared) -> T) -> T {
        let guard = self.shared.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }

    fn write(&self, f: impl FnOnce(&mut Shared)) {
        let mut guard = self.shared.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }
}

/// Drives one browser with one language model, one task at a time.
pub struct Agent {
    config: AgentConfig,
    browser: Box<dyn Browser>,
    planner: Planner,
    executor: ActionExecutor,
    handle: AgentHandle,
}

impl Agent {
    pub fn new(
        config: AgentConfig,
        browser: Box<dyn Browser>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        let planner = Planner::new(model, config.llm_timeout).with_debug(config.debug_mode);
        let executor = ActionExecutor::new(config.action_timeout);
        let handle = AgentHandle {
            shared: Arc::new(RwLock::new(Shared::default())),
            max_steps: config.max_steps,
        };
        Self {
            config,
            browser,
            planner,
            executor,
            handle,
        }
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn handle(&self) -> AgentHandle {
        self.handle.clone()
    }

    /// Step log of the current or most recent task.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.handle.history()
    }

    pub fn current_task(&self) -> TaskStatus {
        self.handle.current_task()
    }

    /// Runs `task` to completion, budget exhaustion, cancellation or a fatal
    /// browser failure. The browser is launched here and closed exactly once
    /// before this returns, on every path.
    pub async fn execute_task(&mut self, task: &str) -> Result<TaskOutcome> {
        let token = CancellationToken::new();
        self.handle.write(|s| {
            s.task = Some(task.to_string());
            s.step_count = 0;
            s.state = AgentState::Idle;
            s.history.clear();
            s.cancel = Some(token.clone());
        });
        info!(target: "agent", task, max_steps = self.config.max_steps, "starting task");

        let result = self.run(task, &token).await;

        if let Err(err) = &result {
            match err {
                AgentError::Cancelled { .. } => warn!(target: "agent", "{err}"),
                _ => {
                    error!(target: "agent", error = %err, "task failed");
                    if self.config.screenshot_on_error && !matches!(err, AgentError::Launch(_)) {
                        self.capture_error_screenshot().await;
                    }
                }
            }
        }

        if let Err(err) = self.browser.close().await {
            warn!(target: "agent", error = %format!("{err:#}"), "failed to close browser");
        }

        let final_state = match &result {
            Ok(outcome) => outcome.termination.into(),
            Err(AgentError::Cancelled { .. }) => AgentState::Cancelled,
            Err(_) => AgentState::FatalError,
        };
        self.handle.write(|s| {
            s.state = final_state;
            s.cancel = None;
        });

        if let Ok(outcome) = &result {
            info!(
                target: "agent",
                termination = ?outcome.termination,
                steps = outcome.history.len(),
                progress = outcome.progress.progress,
                "task finished"
            );
        }
        result
    }

    async fn run(&mut self, task: &str, token: &CancellationToken) -> Result<TaskOutcome> {
        self.set_state(AgentState::Launching);
        cancellable(token, 0, self.browser.launch())
            .await?
            .map_err(AgentError::Launch)?;

        let mut history: Vec<HistoryEntry> = Vec::new();
        let mut extracted = Map::new();
        let mut step = 0;

        self.set_state(AgentState::Planning);
        let blank = PageSnapshot::empty("about:blank").render();
        let mut progress =
            cancellable(token, step, self.planner.plan(task, &history, None, &blank)).await?;

        let termination = loop {
            if progress.completed {
                break Termination::Completed;
            }
            if step >= self.config.max_steps {
                info!(target: "agent", max_steps = self.config.max_steps, "step budget exhausted");
                break Termination::StepBudgetExhausted;
            }
            let Some(action) = progress.next_actions.first().cloned() else {
                info!(target: "agent", "planner proposed no further actions");
                break Termination::NoFurtherActions;
            };

            self.set_state(AgentState::Executing);
            info!(
                target: "agent",
                step,
                action = %action.kind,
                reasoning = %action.reasoning,
                "executing step"
            );
            let outcome = cancellable(
                token,
                step,
                self.executor.execute(self.browser.as_ref(), &action),
            )
            .await?;
            if let Some(data) = &outcome.extracted {
                extracted.extend(data.clone());
            }

            self.set_state(AgentState::Observing);
            let page_url =
                cancellable(token, step, self.observe(step, self.browser.current_url())).await??;
            let entry = HistoryEntry {
                step,
                action,
                result: outcome.message.clone(),
                page_url: page_url.clone(),
            };
            history.push(entry.clone());
            self.handle.write(|s| s.history.push(entry));

            let html = cancellable(token, step, self.observe(step, self.browser.content())).await??;
            let page_state = extract_page_state(&html, &page_url).render();
            if self.config.debug_mode {
                info!(target: "agent", step, result = %outcome, %page_state, "observed");
            } else {
                debug!(target: "agent", step, result = %outcome, url = %page_url, "observed");
            }

            if !self.config.step_delay.is_zero() {
                cancellable(token, step, tokio::time::sleep(self.config.step_delay)).await?;
            }
            step += 1;
            self.handle.write(|s| s.step_count = step);

            self.set_state(AgentState::Planning);
            let next = cancellable(
                token,
                step,
                self.planner
                    .plan(task, &history, Some(outcome.message.as_str()), &page_state),
            )
            .await?;
            if next.progress < progress.progress {
                warn!(
                    target: "agent",
                    from = progress.progress,
                    to = next.progress,
                    "reported progress went backwards"
                );
            }
            progress = next;
        };

        if !extracted.is_empty() {
            let data = progress.extracted_data.get_or_insert_with(Map::new);
            for (key, value) in extracted {
                data.entry(key).or_insert(value);
            }
        }

        Ok(TaskOutcome {
            progress,
            termination,
            history,
        })
    }

    /// Browser reads during observation. Unlike action failures these are
    /// fatal: without the page there is nothing to plan against.
    async fn observe<T>(
        &self,
        step: usize,
        call: impl Future<Output = anyhow::Result<T>>,
    ) -> Result<T> {
        match tokio::time::timeout(self.config.action_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(source)) => Err(AgentError::Observation { step, source }),
            Err(_) => Err(AgentError::Observation {
                step,
                source: anyhow!("timed out after {:?}", self.config.action_timeout),
            }),
        }
    }

    async fn capture_error_screenshot(&self) {
        let path = &self.config.screenshot_path;
        match self.browser.screenshot(path).await {
            Ok(()) => info!(target: "agent", path = %path.display(), "saved error screenshot"),
            Err(err) => warn!(target: "agent", error = %format!("{err:#}"), "error screenshot failed"),
        }
    }

    fn set_state(&self, state: AgentState) {
        debug!(target: "agent", ?state, "state");
        self.handle.write(|s| s.state = state);
    }
}

/// Races `fut` against the task's cancellation token.
async fn cancellable<F: Future>(
    token: &CancellationToken,
    steps: usize,
    fut: F,
) -> Result<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => Err(AgentError::Cancelled { steps }),
        out = fut => Ok(out),
    }
}
