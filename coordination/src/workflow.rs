//! Ticket triage workflow: explicit states and legal transition guards.
//!
//! A ticket's triage state is derived from its row, so there is nothing
//! extra to persist. The orchestrator checks `TriageState::allows()`
//! before running a stage against a stored ticket:
//!
//! ```text
//! Unclassified → Classified
//! Classified   → Classified | Routed
//! Routed       → Routed | Assigned
//! Assigned     → Routed | Assigned
//! ```
//!
//! Re-routing an assigned ticket drops the assignee. The raw stage
//! executors stay callable without these guards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::model::{Ticket, TicketCategory};

/// The three triage stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Classification,
    Routing,
    Assignment,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Classification => write!(f, "classification"),
            Self::Routing => write!(f, "routing"),
            Self::Assignment => write!(f, "assignment"),
        }
    }
}

/// Where a ticket is in the classify → route → assign sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TriageState {
    Unclassified,
    Classified {
        category: TicketCategory,
    },
    Routed {
        category: Option<TicketCategory>,
        team_id: String,
    },
    Assigned {
        category: Option<TicketCategory>,
        team_id: String,
        agent_id: String,
    },
}

impl TriageState {
    /// Derive the state from a ticket row.
    ///
    /// Rows written by older clients may carry a team without a category;
    /// those are treated as routed.
    pub fn of(ticket: &Ticket) -> Self {
        match (&ticket.category, &ticket.team_id, &ticket.assigned_to) {
            (category, Some(team_id), Some(agent_id)) => Self::Assigned {
                category: *category,
                team_id: team_id.clone(),
                agent_id: agent_id.clone(),
            },
            (category, Some(team_id), None) => Self::Routed {
                category: *category,
                team_id: team_id.clone(),
            },
            (Some(category), None, _) => Self::Classified {
                category: *category,
            },
            (None, None, _) => Self::Unclassified,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Unclassified => "unclassified",
            Self::Classified { .. } => "classified",
            Self::Routed { .. } => "routed",
            Self::Assigned { .. } => "assigned",
        }
    }

    /// Whether running `stage` from this state is legal.
    pub fn allows(&self, stage: Stage) -> bool {
        match stage {
            Stage::Classification => matches!(self, Self::Unclassified | Self::Classified { .. }),
            Stage::Routing => !matches!(self, Self::Unclassified),
            Stage::Assignment => matches!(self, Self::Routed { .. } | Self::Assigned { .. }),
        }
    }

    /// Guard a stage, returning the violation when it is not legal.
    pub fn check(&self, stage: Stage) -> Result<(), IllegalTransition> {
        if self.allows(stage) {
            Ok(())
        } else {
            Err(IllegalTransition {
                from: self.name(),
                stage,
            })
        }
    }

    pub fn team_id(&self) -> Option<&str> {
        match self {
            Self::Routed { team_id, .. } | Self::Assigned { team_id, .. } => Some(team_id),
            _ => None,
        }
    }
}

impl fmt::Display for TriageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Error returned when a stage is not legal from the ticket's state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IllegalTransition {
    pub from: &'static str,
    pub stage: Stage,
}

impl fmt::Display for IllegalTransition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Illegal triage transition: cannot run {} from {}", self.stage, self.from)
    }
}

impl std::error::Error for IllegalTransition {}
