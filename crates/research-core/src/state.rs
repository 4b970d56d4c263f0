//! Run state machine
//!
//! `RECEIVED → CLASSIFYING → DECOMPOSING → SYNTHESIZING → COMPOSING → DONE`,
//! with `FAILED` reachable only from `RECEIVED` (rejected input).

use crate::error::PipelineError;
use crate::types::RunId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of one pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunState {
    Received,
    Classifying,
    Decomposing,
    Synthesizing,
    Composing,
    Done,
    Failed,
}

impl RunState {
    /// Every state, in pipeline order
    pub const ALL: [RunState; 7] = [
        RunState::Received,
        RunState::Classifying,
        RunState::Decomposing,
        RunState::Synthesizing,
        RunState::Composing,
        RunState::Done,
        RunState::Failed,
    ];

    /// Check if no transition leaves this state
    #[inline]
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        allowed_transitions(*self).is_empty()
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunState::Received => "RECEIVED",
            RunState::Classifying => "CLASSIFYING",
            RunState::Decomposing => "DECOMPOSING",
            RunState::Synthesizing => "SYNTHESIZING",
            RunState::Composing => "COMPOSING",
            RunState::Done => "DONE",
            RunState::Failed => "FAILED",
        };
        f.write_str(name)
    }
}

/// Validates a state transition.
///
/// # Errors
/// `PipelineError::InternalConsistency` naming the illegal edge
pub fn validate_transition(from: RunState, to: RunState) -> Result<(), PipelineError> {
    if allowed(from, to) {
        Ok(())
    } else {
        Err(PipelineError::InternalConsistency(format!(
            "illegal run transition {from} -> {to}"
        )))
    }
}

#[must_use]
pub fn allowed_transitions(from: RunState) -> Vec<RunState> {
    use RunState::*;
    match from {
        Received => vec![Classifying, Failed],
        Classifying => vec![Decomposing],
        Decomposing => vec![Synthesizing],
        Synthesizing => vec![Composing],
        Composing => vec![Done],
        Done => vec![],
        Failed => vec![],
    }
}

fn allowed(from: RunState, to: RunState) -> bool {
    allowed_transitions(from).into_iter().any(|s| s == to)
}

/// Tracks the state of one run
#[derive(Debug)]
pub struct RunTracker {
    run_id: RunId,
    state: RunState,
}

impl RunTracker {
    /// Start tracking a run in `RECEIVED`
    #[inline]
    #[must_use]
    pub fn new(run_id: RunId) -> Self {
        Self {
            run_id,
            state: RunState::Received,
        }
    }

    /// Current state
    #[inline]
    #[must_use]
    pub fn state(&self) -> RunState {
        self.state
    }

    /// Move to `next`
    ///
    /// # Errors
    /// `PipelineError::InternalConsistency` if the edge is not allowed
    pub fn advance(&mut self, next: RunState) -> Result<(), PipelineError> {
        validate_transition(self.state, next)?;
        tracing::debug!(
            run_id = %self.run_id,
            from = %self.state,
            to = %next,
            "Run state transition"
        );
        self.state = next;
        Ok(())
    }
}
