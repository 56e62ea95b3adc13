//! Triage orchestrator: runs stages against stored tickets and applies the
//! resulting ticket updates.
//!
//! Every entry point derives the ticket's `TriageState` first and refuses
//! stages that are illegal from it. The stage executors themselves stay
//! callable directly without these guards.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use coordination::model::{
    AssignmentResult, ClassificationResult, RoutingResult, Ticket, TicketStatus,
};
use coordination::{Stage, TriageState};

use crate::agents::{self, TriageModel};
use crate::config::TriageConfig;
use crate::errors::{TriageError, TriageResult};
use crate::request::{StageRequest, PREVIEW_ID};
use crate::store::TriageStore;

/// Results of a full classify → route → assign run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriageOutcome {
    pub ticket_id: String,
    pub classification: ClassificationResult,
    pub routing: RoutingResult,
    pub assignment: AssignmentResult,
}

/// Store the suggested category.
pub fn apply_classification(ticket: &mut Ticket, result: &ClassificationResult) {
    ticket.category = Some(result.category);
}

/// Move the ticket to the routed team. Re-routing drops any assignee.
pub fn apply_routing(ticket: &mut Ticket, result: &RoutingResult) {
    if ticket.assigned_to.take().is_some() && ticket.status == TicketStatus::Assigned {
        ticket.status = TicketStatus::Open;
    }
    ticket.team_id = Some(result.team_id.clone());
    ticket.routing_attempts += 1;
    ticket.last_routing_timestamp = Some(result.timestamp);
    ticket.routing_confidence = Some(result.confidence);
}

/// Record the assignee and mark the ticket assigned.
pub fn apply_assignment(ticket: &mut Ticket, result: &AssignmentResult) {
    ticket.assigned_to = Some(result.agent_id.clone());
    ticket.assignment_attempts += 1;
    ticket.last_assignment_timestamp = Some(result.timestamp);
    ticket.assignment_confidence = Some(result.confidence);
    ticket.status = TicketStatus::Assigned;
}

/// Sequences the stage executors over a shared model and store.
pub struct TriageOrchestrator {
    model: Arc<dyn TriageModel>,
    store: Arc<dyn TriageStore>,
    config: TriageConfig,
}

impl TriageOrchestrator {
    pub fn new(model: Arc<dyn TriageModel>, store: Arc<dyn TriageStore>, config: TriageConfig) -> Self {
        Self {
            model,
            store,
            config,
        }
    }

    pub fn store(&self) -> &dyn TriageStore {
        self.store.as_ref()
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Load a ticket and check `stage` is legal from its current state.
    async fn load_for(&self, ticket_id: &str, stage: Stage) -> TriageResult<Ticket> {
        let ticket = self
            .store
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| TriageError::TicketNotFound(ticket_id.to_string()))?;
        TriageState::of(&ticket).check(stage)?;
        Ok(ticket)
    }

    /// Write back a ticket after `stage` succeeded.
    async fn save(&self, ticket: &Ticket, stage: Stage) -> TriageResult<()> {
        self.store.update_ticket(ticket).await.map_err(|e| {
            warn!(
                ticket_id = %ticket.id,
                stage = %stage,
                "Stage result not saved on ticket: {e}"
            );
            TriageError::from(e)
        })
    }

    // ── Single-stage executors (no workflow guard) ──────────────────────────

    pub async fn classify_request(&self, request: &StageRequest) -> TriageResult<ClassificationResult> {
        agents::classify(self.model.as_ref(), &self.config, request).await
    }

    pub async fn route_request(&self, request: &StageRequest) -> TriageResult<RoutingResult> {
        agents::route(self.model.as_ref(), self.store.as_ref(), request).await
    }

    pub async fn assign_request(&self, request: &StageRequest) -> TriageResult<AssignmentResult> {
        agents::assign(self.model.as_ref(), self.store.as_ref(), &self.config, request).await
    }

    // ── Stored-ticket entry points ──────────────────────────────────────────

    /// Classify a stored ticket and save its category.
    pub async fn classify(&self, ticket_id: &str) -> TriageResult<ClassificationResult> {
        let mut ticket = self.load_for(ticket_id, Stage::Classification).await?;
        let result = self
            .classify_request(&StageRequest::from_ticket(&ticket))
            .await?;
        apply_classification(&mut ticket, &result);
        self.save(&ticket, Stage::Classification).await?;
        Ok(result)
    }

    /// Route a stored, classified ticket.
    ///
    /// The routing metric is written by the stage before the ticket row is
    /// updated. If that update fails the metric stays behind.
    pub async fn route(&self, ticket_id: &str) -> TriageResult<RoutingResult> {
        let mut ticket = self.load_for(ticket_id, Stage::Routing).await?;
        let result = self
            .route_request(&StageRequest::from_ticket(&ticket))
            .await?;
        apply_routing(&mut ticket, &result);
        self.save(&ticket, Stage::Routing).await?;
        Ok(result)
    }

    /// Assign a stored, routed ticket within its team.
    ///
    /// The assignment metric and workload overwrite are committed by the
    /// stage before the ticket row is updated. If that update fails they
    /// stay behind and the ticket keeps its previous assignee.
    pub async fn assign(&self, ticket_id: &str) -> TriageResult<AssignmentResult> {
        self.assign_with(ticket_id, None).await
    }

    async fn assign_with(
        &self,
        ticket_id: &str,
        routing: Option<&RoutingResult>,
    ) -> TriageResult<AssignmentResult> {
        let mut ticket = self.load_for(ticket_id, Stage::Assignment).await?;
        let mut request = StageRequest::from_ticket(&ticket);
        if let Some(routing) = routing {
            request.required_capabilities = Some(routing.required_capabilities.clone());
            request.estimated_workload = Some(routing.estimated_workload);
        }
        let result = self.assign_request(&request).await?;
        apply_assignment(&mut ticket, &result);
        self.save(&ticket, Stage::Assignment).await?;
        Ok(result)
    }

    /// Classify, route and assign a stored ticket in sequence.
    ///
    /// Stops at the first failing stage; earlier stages keep their updates.
    /// Each stage's own writes and its ticket update are separate commits,
    /// see [`Self::route`] and [`Self::assign`].
    pub async fn triage(&self, ticket_id: &str) -> TriageResult<TriageOutcome> {
        let classification = self.classify(ticket_id).await?;
        let routing = self.route(ticket_id).await?;
        let assignment = self.assign_with(ticket_id, Some(&routing)).await?;

        info!(
            ticket_id,
            category = %classification.category,
            team_id = %routing.team_id,
            agent_id = %assignment.agent_id,
            "Ticket triaged"
        );
        Ok(TriageOutcome {
            ticket_id: ticket_id.to_string(),
            classification,
            routing,
            assignment,
        })
    }

    /// Suggest a full triage for a ticket that does not exist yet.
    ///
    /// Runs under the `"preview"` id: no ticket row is touched and no
    /// routing metric is written, but the assignment stage still records
    /// its metric and overwrites the chosen agent's workload.
    pub async fn preview(&self, request: StageRequest) -> TriageResult<TriageOutcome> {
        let mut request = StageRequest {
            id: PREVIEW_ID.to_string(),
            ..request
        };

        let classification = self.classify_request(&request).await?;
        request.category = Some(classification.category);

        let routing = self.route_request(&request).await?;
        request.team_id = Some(routing.team_id.clone());
        request.required_capabilities = Some(routing.required_capabilities.clone());
        request.estimated_workload = Some(routing.estimated_workload);

        let assignment = self.assign_request(&request).await?;

        Ok(TriageOutcome {
            ticket_id: PREVIEW_ID.to_string(),
            classification,
            routing,
            assignment,
        })
    }
}
