//! An autonomous browser agent. Each step shows a language model the current
//! page and runs the single action it picks, until the task is done or the
//! step budget runs out.
//!
//! The browser and the model are injected through the [`Browser`] and
//! [`LanguageModel`] traits. [`ChromeBrowser`] and [`OpenAiModel`] are the
//! stock implementations.

pub mod agent;
pub mod browser;
pub mod dom;
pub mod error;
pub mod executor;
pub mod hands;
pub mod llm;
pub mod planner;
pub mod types;

pub use agent::{Agent, AgentHandle, AgentState, TaskOutcome, TaskStatus, Termination};
pub use browser::{Browser, ScrollTarget};
pub use dom::{PageSnapshot, extract_page_state};
pub use error::{ActionError, AgentError, PlanError};
pub use executor::{ActionExecutor, ActionOutcome};
pub use hands::{ChromeBrowser, ChromeOptions};
pub use llm::{LanguageModel, OpenAiModel};
pub use planner::Planner;
pub use types::{Action, ActionKind, AgentConfig, HistoryEntry, RawAction, TaskProgress};
