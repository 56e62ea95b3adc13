//! Assignment stage. Picks an agent within a team.
//!
//! Unlike routing, a preview assignment still records its metric and
//! still overwrites the agent's workload counter. The overwrite is not an
//! increment, so concurrent assignments to one agent are last-write-wins.

use coordination::model::{AssignmentMetric, AssignmentResult};
use coordination::{validate_assignment, Stage};
use tracing::{info, warn};

use crate::config::TriageConfig;
use crate::context;
use crate::errors::TriageResult;
use crate::prompts::{self, PROMPT_VERSION};
use crate::request::StageRequest;
use crate::state_machine::{StageMachine, StageState};
use crate::store::TriageStore;

use super::{accept, ensure_may_persist, finish, invoke, or_fail, TriageModel};

/// Assign a ticket to an agent of `request.team_id`.
pub async fn assign(
    model: &dyn TriageModel,
    store: &dyn TriageStore,
    config: &TriageConfig,
    request: &StageRequest,
) -> TriageResult<AssignmentResult> {
    let mut sm = StageMachine::new(Stage::Assignment, &request.id);

    let team_id = or_fail(&mut sm, request.require_team())?;
    let info = or_fail(
        &mut sm,
        context::get_agent_info(store, team_id, config.history_limit).await,
    )?;

    let prompt = prompts::assignment_prompt(request, team_id, &info);
    let raw = invoke(&mut sm, model, &prompt).await?;
    let result = accept(&mut sm, validate_assignment(&raw, &info.agents))?;

    if request.is_preview() {
        warn!(
            agent_id = %result.agent_id,
            "Preview assignment: metric and workload overwrite are still persisted"
        );
    }

    ensure_may_persist(&mut sm)?;
    let metric = AssignmentMetric::from_result(&request.id, &result);
    or_fail(&mut sm, store.record_assignment(&metric).await)?;
    sm.advance(StageState::Persisted, Some("assignment metric and workload recorded"))?;

    info!(
        ticket_id = %request.id,
        stage = %Stage::Assignment,
        prompt_version = PROMPT_VERSION,
        team_id,
        agent_id = %result.agent_id,
        confidence = result.confidence,
        skill_match_score = result.skill_match_score,
        workload_after_assignment = result.workload_after_assignment,
        elapsed_ms = sm.elapsed_ms(),
        "Ticket assigned"
    );
    finish(&sm);
    Ok(result)
}
