use std::time::Duration;

use thiserror::Error;

/// Why an action proposal can't be turned into something executable.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ActionError {
    #[error("unknown action type `{0}`")]
    UnknownType(String),

    #[error("{action} requires `{field}`")]
    MissingField {
        action: &'static str,
        field: &'static str,
    },

    #[error("action reasoning must not be empty")]
    EmptyReasoning,

    #[error("confidence {0} is outside [0, 1]")]
    ConfidenceOutOfRange(f64),
}

/// Planning failures. These never leave the planner; each one turns into a
/// fallback progress.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("language model call failed: {0:#}")]
    Model(anyhow::Error),

    #[error("language model did not answer within {0:?}")]
    Timeout(Duration),

    #[error("response is not valid JSON: {0}")]
    Malformed(serde_json::Error),

    #[error("response does not match the progress schema: {0}")]
    Schema(serde_json::Error),
}

impl PlanError {
    /// Splits serde failures into syntax problems and shape problems.
    pub fn from_json(err: serde_json::Error) -> Self {
        match err.classify() {
            serde_json::error::Category::Data => PlanError::Schema(err),
            _ => PlanError::Malformed(err),
        }
    }
}

/// Failures that end a task. Action and planning problems are not in here;
/// they become feedback for the next planning pass instead.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("browser launch failed: {0:#}")]
    Launch(anyhow::Error),

    #[error("lost the browser while observing step {step}: {source:#}")]
    Observation {
        step: usize,
        #[source]
        source: anyhow::Error,
    },

    #[error("task cancelled after {steps} step(s)")]
    Cancelled { steps: usize },
}

pub type Result<T> = core::result::Result<T, AgentError>;
