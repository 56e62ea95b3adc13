//! Stage state machine: explicit states and legal transition guards.
//!
//! Every stage invocation (classify, route, assign) owns one
//! `StageMachine`. Executors call `advance()` as they move through the
//! pipeline so that:
//! 1. Every transition is logged at debug level and kept for diagnostics.
//! 2. Writes are only issued once the machine has reached `Validated`.
//!
//! ```text
//! Pending → Prompted → ModelResponded → Validated → Persisted
//!     └──────────┴────────────┴─────────────┴──→ Failed
//! ```

use std::fmt;
use std::time::Instant;

use coordination::Stage;
use serde::{Deserialize, Serialize};

/// States of a single stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    /// Inputs checked, context not yet rendered.
    Pending,
    /// Prompt built and sent to the model.
    Prompted,
    /// Raw reply text received.
    ModelResponded,
    /// Reply parsed and every check passed.
    Validated,
    /// Side effects written. Terminal.
    Persisted,
    /// Terminal.
    Failed,
}

impl StageState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Persisted | Self::Failed)
    }
}

impl fmt::Display for StageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "Pending"),
            Self::Prompted => write!(f, "Prompted"),
            Self::ModelResponded => write!(f, "ModelResponded"),
            Self::Validated => write!(f, "Validated"),
            Self::Persisted => write!(f, "Persisted"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

fn is_legal_transition(from: StageState, to: StageState) -> bool {
    use StageState::*;

    if to == Failed && !from.is_terminal() {
        return true;
    }

    matches!(
        (from, to),
        (Pending, Prompted)
            | (Prompted, ModelResponded)
            | (ModelResponded, Validated)
            | (Validated, Persisted)
    )
}

/// A single recorded transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub from: StageState,
    pub to: StageState,
    /// Milliseconds since the machine was created.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Error returned when an illegal transition is attempted.
#[derive(Debug, Clone)]
pub struct IllegalStageTransition {
    pub from: StageState,
    pub to: StageState,
}

impl fmt::Display for IllegalStageTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal stage transition: {} → {}", self.from, self.to)
    }
}

impl std::error::Error for IllegalStageTransition {}

/// Per-invocation state machine with a transition log.
pub struct StageMachine {
    stage: Stage,
    ticket_id: String,
    current: StageState,
    created_at: Instant,
    transitions: Vec<TransitionRecord>,
}

impl StageMachine {
    pub fn new(stage: Stage, ticket_id: impl Into<String>) -> Self {
        Self {
            stage,
            ticket_id: ticket_id.into(),
            current: StageState::Pending,
            created_at: Instant::now(),
            transitions: Vec::new(),
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn ticket_id(&self) -> &str {
        &self.ticket_id
    }

    pub fn current(&self) -> StageState {
        self.current
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.created_at.elapsed().as_millis() as u64
    }

    /// Attempt to advance to `to`, recording the transition.
    pub fn advance(
        &mut self,
        to: StageState,
        reason: Option<&str>,
    ) -> Result<(), IllegalStageTransition> {
        if !is_legal_transition(self.current, to) {
            return Err(IllegalStageTransition {
                from: self.current,
                to,
            });
        }

        let record = TransitionRecord {
            from: self.current,
            to,
            elapsed_ms: self.elapsed_ms(),
            reason: reason.map(String::from),
        };

        tracing::debug!(
            ticket_id = %self.ticket_id,
            stage = %self.stage,
            from = %self.current,
            to = %to,
            "Stage transition"
        );

        self.transitions.push(record);
        self.current = to;
        Ok(())
    }

    /// Move to `Failed`. A no-op once the machine is terminal.
    pub fn fail(&mut self, reason: &str) {
        if !self.current.is_terminal() {
            let _ = self.advance(StageState::Failed, Some(reason));
            tracing::debug!(
                ticket_id = %self.ticket_id,
                history = %self.summary(),
                "Stage failed"
            );
        }
    }

    /// Whether side effects may be written now.
    pub fn may_persist(&self) -> bool {
        self.current == StageState::Validated
    }

    pub fn is_terminal(&self) -> bool {
        self.current.is_terminal()
    }

    /// Path taken so far, e.g.
    /// `routing: Pending → Prompted → ModelResponded → Validated → Persisted (12ms)`.
    pub fn summary(&self) -> String {
        let mut path = StageState::Pending.to_string();
        for record in &self.transitions {
            path.push_str(" → ");
            path.push_str(&record.to.to_string());
        }
        format!("{}: {} ({}ms)", self.stage, path, self.elapsed_ms())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        let sm = StageMachine::new(Stage::Routing, "t1");
        assert_eq!(sm.current(), StageState::Pending);
        assert!(!sm.is_terminal());
        assert!(!sm.may_persist());
        assert!(sm.summary().starts_with("routing: Pending ("));
    }

    #[test]
    fn test_happy_path() {
        let mut sm = StageMachine::new(Stage::Assignment, "t1");
        sm.advance(StageState::Prompted, None).unwrap();
        sm.advance(StageState::ModelResponded, None).unwrap();
        sm.advance(StageState::Validated, None).unwrap();
        assert!(sm.may_persist());
        sm.advance(StageState::Persisted, Some("metric written")).unwrap();

        assert!(sm.is_terminal());
        assert!(!sm.may_persist());
        assert!(sm
            .summary()
            .starts_with("assignment: Pending → Prompted → ModelResponded → Validated → Persisted ("));
    }

    #[test]
    fn test_cannot_skip_validation() {
        let mut sm = StageMachine::new(Stage::Routing, "t1");
        sm.advance(StageState::Prompted, None).unwrap();
        sm.advance(StageState::ModelResponded, None).unwrap();
        let err = sm.advance(StageState::Persisted, None).unwrap_err();
        assert_eq!(err.from, StageState::ModelResponded);
        assert_eq!(err.to, StageState::Persisted);
    }

    #[test]
    fn test_fail_from_any_non_terminal() {
        for steps in 0..4 {
            let mut sm = StageMachine::new(Stage::Classification, "t1");
            let path = [
                StageState::Prompted,
                StageState::ModelResponded,
                StageState::Validated,
            ];
            for to in path.iter().take(steps) {
                sm.advance(*to, None).unwrap();
            }
            sm.fail("boom");
            assert_eq!(sm.current(), StageState::Failed);
        }
    }

    #[test]
    fn test_fail_after_terminal_is_noop() {
        let mut sm = StageMachine::new(Stage::Routing, "t1");
        sm.fail("first");
        sm.fail("second");
        assert!(sm.summary().starts_with("routing: Pending → Failed ("));
        assert!(sm.advance(StageState::Prompted, None).is_err());
    }
}
