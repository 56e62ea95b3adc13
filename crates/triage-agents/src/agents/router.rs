//! Routing stage. Picks a team and records a routing metric.

use coordination::model::{RoutingMetric, RoutingResult};
use coordination::{validate_routing, Stage};
use tracing::{debug, info};

use crate::context;
use crate::errors::{TriageError, TriageResult};
use crate::prompts::{self, PROMPT_VERSION};
use crate::request::StageRequest;
use crate::state_machine::{StageMachine, StageState};
use crate::store::TriageStore;

use super::{accept, ensure_may_persist, finish, invoke, or_fail, TriageModel};

/// Route a ticket to one of the existing teams.
///
/// Writes a routing-metric row unless the request is a preview. The
/// ticket row itself is left alone.
pub async fn route(
    model: &dyn TriageModel,
    store: &dyn TriageStore,
    request: &StageRequest,
) -> TriageResult<RoutingResult> {
    let mut sm = StageMachine::new(Stage::Routing, &request.id);

    let info = or_fail(&mut sm, context::get_team_info(store).await)?;
    if info.teams.is_empty() {
        return or_fail(
            &mut sm,
            Err(TriageError::NoCandidates("no teams to route to".into())),
        );
    }

    let prompt = prompts::routing_prompt(request, &info);
    let raw = invoke(&mut sm, model, &prompt).await?;
    let result = accept(&mut sm, validate_routing(&raw, &info.teams))?;

    if request.is_preview() {
        debug!(ticket_id = %request.id, "Preview routing, metric not recorded");
    } else {
        ensure_may_persist(&mut sm)?;
        let metric = RoutingMetric::from_result(&request.id, &result);
        or_fail(&mut sm, store.insert_routing_metric(&metric).await)?;
        sm.advance(StageState::Persisted, Some("routing metric recorded"))?;
    }

    info!(
        ticket_id = %request.id,
        stage = %Stage::Routing,
        prompt_version = PROMPT_VERSION,
        team_id = %result.team_id,
        confidence = result.confidence,
        estimated_workload = result.estimated_workload,
        elapsed_ms = sm.elapsed_ms(),
        "Ticket routed"
    );
    finish(&sm);
    Ok(result)
}
