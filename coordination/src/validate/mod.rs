//! Fail-closed validation of model replies for each triage stage.
//!
//! Every reply goes through the same ordered checks and the first failure
//! is returned:
//!
//! ```text
//! 1. JSON object with every required key, each of the right JSON type
//! 2. referenced team/agent is a candidate (id AND name)
//! 3. numeric fields in range
//! 4. formatted fields match their pattern
//! ```
//!
//! Validators never touch storage. A reply that fails here must leave no
//! trace anywhere.

pub mod error;
pub mod reply;
pub mod rules;

use chrono::Utc;

use crate::model::{AssignmentResult, ClassificationResult, RoutingResult, TicketCategory};

pub use error::{ValidationError, ValidationResult};
pub use reply::{extract_json_block, ReplyObject};
pub use rules::{format_minutes, parse_resolution_time, RESOLUTION_TIME_PATTERN};

pub const CLASSIFICATION_KEYS: &[&str] =
    &["category", "confidence", "reasoning", "requires_research"];

pub const ROUTING_KEYS: &[&str] = &[
    "team_id",
    "team_name",
    "confidence",
    "reasoning",
    "required_capabilities",
    "estimated_workload",
];

pub const ASSIGNMENT_KEYS: &[&str] = &[
    "agent_id",
    "agent_name",
    "confidence",
    "skill_match_score",
    "reasoning",
    "predicted_resolution_time",
    "workload_after_assignment",
];

/// Something a reply may reference: a team or an agent offered to the model.
pub trait Candidate {
    fn candidate_id(&self) -> &str;
    fn candidate_name(&self) -> &str;
}

impl Candidate for crate::model::Team {
    fn candidate_id(&self) -> &str {
        &self.id
    }
    fn candidate_name(&self) -> &str {
        &self.name
    }
}

impl Candidate for crate::model::Profile {
    fn candidate_id(&self) -> &str {
        &self.id
    }
    fn candidate_name(&self) -> &str {
        &self.full_name
    }
}

/// Look up `(id, name)` in the candidate set. The id must match exactly and
/// the name must match ignoring case and surrounding whitespace.
pub fn check_reference<'a, C: Candidate>(
    entity: &'static str,
    candidates: &'a [C],
    id: &str,
    name: &str,
) -> ValidationResult<&'a C> {
    candidates
        .iter()
        .find(|c| {
            c.candidate_id() == id.trim()
                && c.candidate_name().trim().eq_ignore_ascii_case(name.trim())
        })
        .ok_or_else(|| ValidationError::ReferentialIntegrity {
            entity,
            id: id.to_string(),
            name: name.to_string(),
        })
}

/// Validate a classifier reply.
pub fn validate_classification(raw: &str) -> ValidationResult<ClassificationResult> {
    let reply = ReplyObject::parse(raw)?;
    reply.require_keys(CLASSIFICATION_KEYS)?;

    let category_raw = reply.string("category")?;
    let category = TicketCategory::parse(&category_raw).ok_or_else(|| {
        ValidationError::format(format!(
            "category {category_raw:?} is not one of: {}",
            TicketCategory::ALL.map(TicketCategory::as_str).join(", ")
        ))
    })?;
    let confidence = reply.number("confidence")?;
    let reasoning = reply.string("reasoning")?;
    let requires_research = reply.boolean("requires_research")?;

    let confidence = rules::check_unit_interval("confidence", confidence)?;

    Ok(ClassificationResult {
        category,
        confidence,
        reasoning,
        requires_research,
        timestamp: Utc::now(),
    })
}

/// Validate a router reply against the teams it was offered.
pub fn validate_routing<C: Candidate>(
    raw: &str,
    teams: &[C],
) -> ValidationResult<RoutingResult> {
    let reply = ReplyObject::parse(raw)?;
    reply.require_keys(ROUTING_KEYS)?;

    let team_id = reply.string("team_id")?;
    let team_name = reply.string("team_name")?;
    let confidence = reply.number("confidence")?;
    let reasoning = reply.string("reasoning")?;
    let required_capabilities = reply.string_list("required_capabilities")?;
    let estimated_workload = reply.number("estimated_workload")?;

    let team = check_reference("team", teams, &team_id, &team_name)?;

    let confidence = rules::check_unit_interval("confidence", confidence)?;
    let estimated_workload =
        rules::check_estimated_workload("estimated_workload", estimated_workload)?;

    Ok(RoutingResult {
        team_id: team.candidate_id().to_string(),
        team_name: team.candidate_name().to_string(),
        confidence,
        reasoning,
        required_capabilities,
        estimated_workload,
        timestamp: Utc::now(),
    })
}

/// Validate an assigner reply against the agents it was offered.
pub fn validate_assignment<C: Candidate>(
    raw: &str,
    agents: &[C],
) -> ValidationResult<AssignmentResult> {
    let reply = ReplyObject::parse(raw)?;
    reply.require_keys(ASSIGNMENT_KEYS)?;

    let agent_id = reply.string("agent_id")?;
    let agent_name = reply.string("agent_name")?;
    let confidence = reply.number("confidence")?;
    let skill_match_score = reply.number("skill_match_score")?;
    let reasoning = reply.string("reasoning")?;
    let predicted_resolution_time = reply.string("predicted_resolution_time")?;
    let workload_after_assignment = reply.number("workload_after_assignment")?;

    let agent = check_reference("agent", agents, &agent_id, &agent_name)?;

    let confidence = rules::check_unit_interval("confidence", confidence)?;
    let skill_match_score = rules::check_unit_interval("skill_match_score", skill_match_score)?;
    let workload_after_assignment =
        rules::check_non_negative_count("workload_after_assignment", workload_after_assignment)?;

    rules::check_resolution_time("predicted_resolution_time", &predicted_resolution_time)?;

    Ok(AssignmentResult {
        agent_id: agent.candidate_id().to_string(),
        agent_name: agent.candidate_name().to_string(),
        confidence,
        skill_match_score,
        reasoning,
        predicted_resolution_time,
        workload_after_assignment,
        timestamp: Utc::now(),
    })
}
