//! System prompts and user-turn renderers for each triage stage.
//!
//! Prompt versioning: bump `PROMPT_VERSION` whenever preamble content changes.
//! Every stage call logs it, so a bad reply can be traced back to the
//! instructions that produced it.
//!
//! The preambles are a textual contract with the model. Replies are still
//! validated in full by `coordination::validate`.

use std::fmt::Write as _;

use coordination::aggregate::{AgentInfo, TeamInfo};
use coordination::model::{AssignmentReply, ClassificationReply, RoutingReply};
use coordination::Stage;

use crate::request::StageRequest;

/// Prompt version. Bump on any preamble content change.
pub const PROMPT_VERSION: &str = "1.3.0";

/// Classifier preamble.
pub const CLASSIFIER_PREAMBLE: &str = "\
You are the ticket classifier of a customer-support system. Read the ticket \
and decide which single category fits it best.

## Categories
- bug: something that used to work, or should work, is broken
- feature_request: the customer asks for new functionality
- support: how-to questions and general help
- billing: invoices, charges, refunds, plans and payment methods
- account: sign-in, profile, permissions and account lifecycle
- security: vulnerabilities, suspicious activity, data exposure
- other: anything that fits none of the above

## Rules
- `category` MUST be exactly one of the values listed above.
- `confidence` is a number between 0 and 1.
- Set `requires_research` to true when a human must investigate before replying.
- Keep `reasoning` to one or two sentences.

## Output
Reply with a single JSON object with exactly these keys: \
category, confidence, reasoning, requires_research. \
No markdown. No code fences. No text before or after the object.";

/// Router preamble.
pub const ROUTER_PREAMBLE: &str = "\
You are the ticket router of a customer-support system. Pick the one team \
that should own the ticket.

## Rules
- You MUST pick a team from the list you are given. Copy its `id` and `name` exactly.
- Prefer teams whose capabilities and specialties match the ticket.
- Prefer teams with spare capacity: compare the live workload against `max_workload`.
- `confidence` is a number between 0 and 1.
- `required_capabilities` lists the capabilities the ticket needs.
- `estimated_workload` is an INTEGER from 1 (trivial) to 10 (very heavy).

## Output
Reply with a single JSON object with exactly these keys: \
team_id, team_name, confidence, reasoning, required_capabilities, estimated_workload. \
No markdown. No code fences. No text before or after the object.";

/// Assigner preamble.
pub const ASSIGNER_PREAMBLE: &str = "\
You are the ticket assigner of a customer-support team. Pick the one agent \
who should handle the ticket.

## Rules
- You MUST pick an agent from the list you are given. Copy its `id` and `full_name` \
  exactly into `agent_id` and `agent_name`.
- Match the ticket's required capabilities against each agent's expertise.
- Prefer available agents with spare capacity (`current_workload` below `max_workload`).
- Use historical performance: faster resolution and higher satisfaction are better.
- `confidence` and `skill_match_score` are numbers between 0 and 1.
- `predicted_resolution_time` MUST look like \"2h 30m\" (hours, space, minutes).
- `workload_after_assignment` is the agent's workload once this ticket is added, \
  an integer >= 0.

## Output
Reply with a single JSON object with exactly these keys: \
agent_id, agent_name, confidence, skill_match_score, reasoning, \
predicted_resolution_time, workload_after_assignment. \
No markdown. No code fences. No text before or after the object.";

/// JSON Schema of the reply a stage expects.
pub fn reply_schema(stage: Stage) -> String {
    let schema = match stage {
        Stage::Classification => schemars::schema_for!(ClassificationReply),
        Stage::Routing => schemars::schema_for!(RoutingReply),
        Stage::Assignment => schemars::schema_for!(AssignmentReply),
    };
    serde_json::to_string_pretty(&schema).unwrap_or_default()
}

/// Full system prompt: the stage preamble plus its reply schema.
pub fn system_prompt(stage: Stage) -> String {
    let preamble = match stage {
        Stage::Classification => CLASSIFIER_PREAMBLE,
        Stage::Routing => ROUTER_PREAMBLE,
        Stage::Assignment => ASSIGNER_PREAMBLE,
    };
    format!(
        "{preamble}\n\n## Reply JSON Schema\n{}",
        reply_schema(stage)
    )
}

fn ticket_block(out: &mut String, request: &StageRequest) {
    let _ = writeln!(out, "Ticket ID: {}", request.id);
    let _ = writeln!(out, "Title: {}", request.title.trim());
    let _ = writeln!(out, "Description: {}", request.description.trim());
    if let Some(category) = request.category {
        let _ = writeln!(out, "Category: {category}");
    }
    if let Some(priority) = request.priority {
        let _ = writeln!(out, "Priority: {priority}");
    }
}

fn capability_lines(out: &mut String, request: &StageRequest) {
    if let Some(caps) = request.required_capabilities.as_ref().filter(|c| !c.is_empty()) {
        let _ = writeln!(out, "Required capabilities: {}", caps.join(", "));
    }
    if let Some(workload) = request.estimated_workload {
        let _ = writeln!(out, "Estimated workload: {workload}/10");
    }
}

fn pretty<T: serde::Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "[]".to_string())
}

pub fn classification_prompt(request: &StageRequest) -> String {
    let mut out = String::from("Classify this support ticket.\n\n");
    ticket_block(&mut out, request);
    out
}

pub fn routing_prompt(request: &StageRequest, info: &TeamInfo) -> String {
    let mut out = String::from("Route this support ticket to a team.\n\n");
    ticket_block(&mut out, request);
    capability_lines(&mut out, request);

    let _ = write!(out, "\nAvailable teams:\n{}\n", pretty(&info.teams));

    out.push_str("\nLive team workload (open and in-progress tickets):\n");
    for summary in &info.teams {
        let team = &summary.team;
        let _ = writeln!(
            out,
            "- {} ({}): {} active tickets, max {}, {} members",
            team.name,
            team.id,
            info.live_workload(&team.id),
            team.max_workload,
            summary.member_count,
        );
    }
    out
}

pub fn assignment_prompt(request: &StageRequest, team_id: &str, info: &AgentInfo) -> String {
    let mut out = String::from("Assign this support ticket to an agent.\n\n");
    ticket_block(&mut out, request);
    let _ = writeln!(out, "Team: {team_id}");
    capability_lines(&mut out, request);

    let _ = write!(out, "\nAvailable agents:\n{}\n", pretty(&info.agents));

    out.push_str("\nHistorical performance:\n");
    for agent in &info.agents {
        match info.performance.get(&agent.id) {
            Some(perf) => {
                let resolution = perf
                    .avg_resolution_display()
                    .unwrap_or_else(|| "n/a".to_string());
                let satisfaction = perf
                    .avg_satisfaction()
                    .map(|s| format!("{s:.2}"))
                    .unwrap_or_else(|| "n/a".to_string());
                let _ = writeln!(
                    out,
                    "- {} ({}): {} resolved, avg resolution {}, avg satisfaction {}",
                    agent.full_name,
                    agent.id,
                    perf.resolved_count(),
                    resolution,
                    satisfaction,
                );
            }
            None => {
                let _ = writeln!(
                    out,
                    "- {} ({}): no resolution history",
                    agent.full_name, agent.id
                );
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordination::aggregate::TeamSummary;
    use coordination::model::{Availability, Profile, ProfileRole, ResolutionRecord, Team, TicketCategory};

    #[test]
    fn classifier_lists_every_category() {
        for category in TicketCategory::ALL {
            assert!(
                CLASSIFIER_PREAMBLE.contains(&format!("- {}:", category.as_str())),
                "missing {category}"
            );
        }
    }

    #[test]
    fn preambles_forbid_fences() {
        for stage in [Stage::Classification, Stage::Routing, Stage::Assignment] {
            let prompt = system_prompt(stage);
            assert!(prompt.contains("No code fences"));
            assert!(prompt.contains("## Reply JSON Schema"));
        }
    }

    #[test]
    fn schema_names_required_keys() {
        let schema = reply_schema(Stage::Assignment);
        for key in coordination::validate::ASSIGNMENT_KEYS {
            assert!(schema.contains(key), "schema missing {key}");
        }
    }

    #[test]
    fn routing_prompt_includes_live_workload() {
        let team = Team {
            id: "t-billing".into(),
            name: "Billing".into(),
            capabilities: vec!["billing".into()],
            specialties: vec![],
            current_workload: 0,
            max_workload: 20,
        };
        let mut active = coordination::model::Ticket::new("x", "Old", "Old ticket");
        active.team_id = Some("t-billing".into());
        let info = TeamInfo::build(
            vec![TeamSummary {
                team,
                member_count: 2,
            }],
            &[active],
        );
        let mut req = StageRequest::new("t1", "Double charge", "Charged twice in March");
        req.category = Some(TicketCategory::Billing);

        let prompt = routing_prompt(&req, &info);
        assert!(prompt.contains("Category: billing"));
        assert!(prompt.contains("\"id\": \"t-billing\""));
        assert!(prompt.contains("- Billing (t-billing): 1 active tickets, max 20, 2 members"));
    }

    #[test]
    fn assignment_prompt_summarises_history() {
        let agent = |id: &str, name: &str| Profile {
            id: id.into(),
            full_name: name.into(),
            role: ProfileRole::Agent,
            expertise: vec![],
            current_workload: 1,
            max_workload: 5,
            availability: Availability::Available,
        };
        let history = vec![ResolutionRecord {
            agent_id: "a1".into(),
            ticket_id: "old".into(),
            resolution_minutes: 150,
            satisfaction_score: Some(4.0),
            resolved_at: chrono::Utc::now(),
        }];
        let info = AgentInfo::build("t-billing", vec![agent("a1", "Ada"), agent("a2", "Bo")], &history, 100);
        let req = StageRequest::new("t1", "Double charge", "Charged twice");

        let prompt = assignment_prompt(&req, "t-billing", &info);
        assert!(prompt.contains("Team: t-billing"));
        assert!(prompt.contains("- Ada (a1): 1 resolved, avg resolution 2h 30m, avg satisfaction 4.00"));
        assert!(prompt.contains("- Bo (a2): no resolution history"));
    }
}
