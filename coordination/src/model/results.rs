//! Validated stage results and the metric rows persisted from them.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::types::TicketCategory;

/// Output of the classification stage. Never persisted on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub category: TicketCategory,
    pub confidence: f64,
    pub reasoning: String,
    pub requires_research: bool,
    pub timestamp: DateTime<Utc>,
}

/// Output of the routing stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub team_id: String,
    pub team_name: String,
    pub confidence: f64,
    pub reasoning: String,
    pub required_capabilities: Vec<String>,
    /// Integer in `1..=10`.
    pub estimated_workload: u8,
    pub timestamp: DateTime<Utc>,
}

/// Output of the assignment stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentResult {
    pub agent_id: String,
    pub agent_name: String,
    pub confidence: f64,
    pub skill_match_score: f64,
    pub reasoning: String,
    /// Formatted as `"<h>h <m>m"`.
    pub predicted_resolution_time: String,
    pub workload_after_assignment: u32,
    pub timestamp: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reply shapes the model is asked to produce
// ---------------------------------------------------------------------------

/// Exact JSON object the classifier must reply with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClassificationReply {
    pub category: TicketCategory,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    pub requires_research: bool,
}

/// Exact JSON object the router must reply with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RoutingReply {
    pub team_id: String,
    pub team_name: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    pub reasoning: String,
    pub required_capabilities: Vec<String>,
    /// Integer from 1 (trivial) to 10 (very heavy).
    pub estimated_workload: u8,
}

/// Exact JSON object the assigner must reply with.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AssignmentReply {
    pub agent_id: String,
    pub agent_name: String,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Skill match in `[0, 1]`.
    pub skill_match_score: f64,
    pub reasoning: String,
    /// Duration formatted as `"2h 30m"`.
    pub predicted_resolution_time: String,
    pub workload_after_assignment: u32,
}

// ---------------------------------------------------------------------------
// Metric rows
// ---------------------------------------------------------------------------

/// Persisted record of a non-preview routing decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingMetric {
    pub id: String,
    pub ticket_id: String,
    pub team_id: String,
    pub confidence: f64,
    pub reasoning: String,
    pub required_capabilities: Vec<String>,
    pub estimated_workload: u8,
    pub created_at: DateTime<Utc>,
}

impl RoutingMetric {
    pub fn from_result(ticket_id: &str, result: &RoutingResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            team_id: result.team_id.clone(),
            confidence: result.confidence,
            reasoning: result.reasoning.clone(),
            required_capabilities: result.required_capabilities.clone(),
            estimated_workload: result.estimated_workload,
            created_at: result.timestamp,
        }
    }
}

/// Persisted record of an assignment decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentMetric {
    pub id: String,
    pub ticket_id: String,
    pub agent_id: String,
    pub confidence: f64,
    pub skill_match_score: f64,
    pub reasoning: String,
    pub predicted_resolution_time: String,
    pub workload_after_assignment: u32,
    pub created_at: DateTime<Utc>,
}

impl AssignmentMetric {
    pub fn from_result(ticket_id: &str, result: &AssignmentResult) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            ticket_id: ticket_id.to_string(),
            agent_id: result.agent_id.clone(),
            confidence: result.confidence,
            skill_match_score: result.skill_match_score,
            reasoning: result.reasoning.clone(),
            predicted_resolution_time: result.predicted_resolution_time.clone(),
            workload_after_assignment: result.workload_after_assignment,
            created_at: result.timestamp,
        }
    }
}
