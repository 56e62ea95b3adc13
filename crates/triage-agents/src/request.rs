//! Inbound stage request.

use serde::{Deserialize, Serialize};

use coordination::model::{Ticket, TicketCategory, TicketPriority};

use crate::errors::{TriageError, TriageResult};

/// Synthetic ticket id used to ask for suggestions before a ticket exists.
pub const PREVIEW_ID: &str = "preview";

/// What a single stage executor is invoked with.
///
/// Accepts the camelCase field names the web client sends
/// (`requiredCapabilities`, `requiredSkills`, `estimatedWorkload`,
/// `complexity`, `teamId`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StageRequest {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub category: Option<TicketCategory>,
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    /// Required by the assignment stage only.
    #[serde(default, alias = "teamId")]
    pub team_id: Option<String>,
    #[serde(default, alias = "requiredCapabilities", alias = "requiredSkills")]
    pub required_capabilities: Option<Vec<String>>,
    #[serde(default, alias = "estimatedWorkload", alias = "complexity")]
    pub estimated_workload: Option<u8>,
}

impl StageRequest {
    pub fn new(id: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: description.into(),
            ..Self::default()
        }
    }

    /// Build a request from a stored ticket row.
    pub fn from_ticket(ticket: &Ticket) -> Self {
        Self {
            id: ticket.id.clone(),
            title: ticket.title.clone(),
            description: ticket.description.clone(),
            category: ticket.category,
            priority: Some(ticket.priority),
            team_id: ticket.team_id.clone(),
            required_capabilities: None,
            estimated_workload: None,
        }
    }

    pub fn is_preview(&self) -> bool {
        self.id == PREVIEW_ID
    }

    /// Title (trimmed) at least `min_title_len` chars and a non-blank description.
    pub fn check_text(&self, min_title_len: usize) -> TriageResult<()> {
        let title_len = self.title.trim().chars().count();
        if title_len < min_title_len {
            return Err(TriageError::MissingInput(format!(
                "title must be at least {min_title_len} characters (got {title_len})"
            )));
        }
        if self.description.trim().is_empty() {
            return Err(TriageError::MissingInput(
                "description must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// The team to assign within, or `MissingInput`.
    pub fn require_team(&self) -> TriageResult<&str> {
        self.team_id
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .ok_or_else(|| TriageError::MissingInput("team_id is required for assignment".into()))
    }
}
