//! End-to-end tests of the triage pipeline against an in-memory store and
//! a scripted model. No endpoint or database is needed.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use coordination::aggregate::TeamSummary;
use coordination::model::{
    AssignmentMetric, Availability, MemberRole, MemberStatus, Profile, ProfileRole,
    ResolutionRecord, RoutingMetric, Team, TeamMember, Ticket, TicketCategory, TicketStatus,
};
use coordination::Stage;
use triage_agents::errors::ErrorKind;
use triage_agents::store::{Snapshot, StoreResult};
use triage_agents::{
    MemoryStore, StageRequest, StoreError, TriageConfig, TriageError, TriageModel,
    TriageOrchestrator, TriageResult, TriageStore, PREVIEW_ID,
};

// ── Scripted model ────────────────────────────────────────────────────────────

/// Replies with queued strings in order and records each prompt.
#[derive(Default)]
struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
    prompts: Mutex<Vec<(Stage, String)>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| r.to_string()).collect()),
            prompts: Mutex::default(),
        })
    }

    fn prompt_for(&self, stage: Stage) -> Option<String> {
        self.prompts
            .lock()
            .unwrap()
            .iter()
            .find(|(s, _)| *s == stage)
            .map(|(_, p)| p.clone())
    }

    fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl TriageModel for ScriptedModel {
    async fn complete(&self, stage: Stage, _preamble: &str, prompt: &str) -> TriageResult<String> {
        self.prompts.lock().unwrap().push((stage, prompt.to_string()));
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| TriageError::ModelInvocation("no scripted reply left".into()))
    }
}

// ── Store with failing writes ────────────────────────────────────────────────

/// Which write a `FailingStore` rejects.
#[derive(Clone, Copy, PartialEq)]
enum FailOn {
    RoutingMetric,
    Assignment,
    TicketUpdate,
}

/// Delegates to a `MemoryStore` but rejects one kind of write.
struct FailingStore {
    inner: Arc<MemoryStore>,
    fail_on: FailOn,
}

impl FailingStore {
    fn check(&self, op: FailOn) -> StoreResult<()> {
        if self.fail_on == op {
            return Err(StoreError::Decode("connection reset".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl TriageStore for FailingStore {
    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        self.inner.get_ticket(id).await
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        self.check(FailOn::TicketUpdate)?;
        self.inner.update_ticket(ticket).await
    }

    async fn list_teams(&self) -> StoreResult<Vec<TeamSummary>> {
        self.inner.list_teams().await
    }

    async fn list_tickets_by_status(&self, statuses: &[TicketStatus]) -> StoreResult<Vec<Ticket>> {
        self.inner.list_tickets_by_status(statuses).await
    }

    async fn list_team_agents(&self, team_id: &str) -> StoreResult<Vec<Profile>> {
        self.inner.list_team_agents(team_id).await
    }

    async fn recent_resolutions(
        &self,
        agent_ids: &[String],
        limit: usize,
    ) -> StoreResult<Vec<ResolutionRecord>> {
        self.inner.recent_resolutions(agent_ids, limit).await
    }

    async fn insert_routing_metric(&self, metric: &RoutingMetric) -> StoreResult<()> {
        self.check(FailOn::RoutingMetric)?;
        self.inner.insert_routing_metric(metric).await
    }

    async fn record_assignment(&self, metric: &AssignmentMetric) -> StoreResult<()> {
        self.check(FailOn::Assignment)?;
        self.inner.record_assignment(metric).await
    }
}

// ── Fixtures ──────────────────────────────────────────────────────────────────

const CLASSIFY_BILLING: &str = r#"{"category":"billing","confidence":0.9,
    "reasoning":"Duplicate charge on the card","requires_research":false}"#;

const ROUTE_BILLING: &str = r#"{"team_id":"t-billing","team_name":"Billing","confidence":0.88,
    "reasoning":"Payment dispute","required_capabilities":["billing"],"estimated_workload":3}"#;

const ASSIGN_BEN: &str = r#"{"agent_id":"a2","agent_name":"Ben Ortiz","confidence":0.85,
    "skill_match_score":0.9,"reasoning":"Only agent with billing expertise",
    "predicted_resolution_time":"4h 0m","workload_after_assignment":2}"#;

fn team(id: &str, name: &str, capabilities: &[&str]) -> Team {
    Team {
        id: id.into(),
        name: name.into(),
        capabilities: capabilities.iter().map(|c| c.to_string()).collect(),
        specialties: vec![],
        current_workload: 0,
        max_workload: 20,
    }
}

fn agent(id: &str, name: &str, expertise: &[&str]) -> Profile {
    Profile {
        id: id.into(),
        full_name: name.into(),
        role: ProfileRole::Agent,
        expertise: expertise.iter().map(|e| e.to_string()).collect(),
        current_workload: 1,
        max_workload: 8,
        availability: Availability::Available,
    }
}

fn member(team: &str, profile: &str) -> TeamMember {
    TeamMember {
        team_id: team.into(),
        profile_id: profile.into(),
        role: MemberRole::Member,
        status: MemberStatus::Active,
    }
}

fn resolution(agent: &str, minutes: u32, days_ago: i64) -> ResolutionRecord {
    ResolutionRecord {
        agent_id: agent.into(),
        ticket_id: format!("old-{agent}-{days_ago}"),
        resolution_minutes: minutes,
        satisfaction_score: Some(4.0),
        resolved_at: Utc::now() - Duration::days(days_ago),
    }
}

/// Billing team of three agents averaging 2h, 4h and 6h; only Ben knows billing.
fn snapshot() -> Snapshot {
    Snapshot {
        teams: vec![
            team("t-billing", "Billing", &["billing", "refunds"]),
            team("t-support", "Support", &["support"]),
        ],
        profiles: vec![
            agent("a1", "Alice Grant", &["technical"]),
            agent("a2", "Ben Ortiz", &["billing"]),
            agent("a3", "Cara Diaz", &["account"]),
        ],
        team_members: vec![
            member("t-billing", "a1"),
            member("t-billing", "a2"),
            member("t-billing", "a3"),
        ],
        tickets: vec![Ticket::new(
            "tk-1",
            "Charged twice for March",
            "My card shows two identical charges for the March plan.",
        )],
        resolution_history: vec![
            resolution("a1", 120, 1),
            resolution("a2", 200, 2),
            resolution("a2", 280, 3),
            resolution("a3", 360, 4),
        ],
        ..Snapshot::default()
    }
}

fn orchestrator(model: &Arc<ScriptedModel>, store: &Arc<MemoryStore>) -> TriageOrchestrator {
    TriageOrchestrator::new(model.clone(), store.clone(), TriageConfig::default())
}

fn failing_orchestrator(
    model: &Arc<ScriptedModel>,
    store: &Arc<MemoryStore>,
    fail_on: FailOn,
) -> TriageOrchestrator {
    let failing = Arc::new(FailingStore {
        inner: store.clone(),
        fail_on,
    });
    TriageOrchestrator::new(model.clone(), failing, TriageConfig::default())
}

/// Snapshot whose ticket is already classified and routed to billing.
fn routed_snapshot() -> Snapshot {
    let mut snap = snapshot();
    snap.tickets[0].category = Some(TicketCategory::Billing);
    snap.tickets[0].team_id = Some("t-billing".into());
    snap.tickets[0].routing_attempts = 1;
    snap
}

async fn stored(store: &MemoryStore, id: &str) -> Ticket {
    store.get_ticket(id).await.unwrap().unwrap()
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_three_agent_billing_scenario() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let model = ScriptedModel::new(&[ASSIGN_BEN]);
    let orch = orchestrator(&model, &store);

    let mut request = StageRequest::new("tk-1", "Charged twice for March", "Two charges");
    request.team_id = Some("t-billing".into());
    request.required_capabilities = Some(vec!["billing".into()]);

    let result = orch.assign_request(&request).await.unwrap();
    assert_eq!(result.agent_id, "a2");
    assert!(result.skill_match_score > 0.0);
    assert!(result.skill_match_score <= 1.0);

    let prompt = model.prompt_for(Stage::Assignment).unwrap();
    assert!(prompt.contains("Required capabilities: billing"));
    assert!(prompt.contains("- Alice Grant (a1): 1 resolved, avg resolution 2h 0m"));
    assert!(prompt.contains("- Ben Ortiz (a2): 2 resolved, avg resolution 4h 0m"));
    assert!(prompt.contains("- Cara Diaz (a3): 1 resolved, avg resolution 6h 0m"));
}

#[tokio::test]
async fn test_full_triage_updates_ticket_and_metrics() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let model = ScriptedModel::new(&[CLASSIFY_BILLING, ROUTE_BILLING, ASSIGN_BEN]);
    let orch = orchestrator(&model, &store);

    let outcome = orch.triage("tk-1").await.unwrap();
    assert_eq!(outcome.classification.category, TicketCategory::Billing);
    assert_eq!(outcome.routing.team_id, "t-billing");
    assert_eq!(outcome.assignment.agent_id, "a2");

    let ticket = stored(&store, "tk-1").await;
    assert_eq!(ticket.category, Some(TicketCategory::Billing));
    assert_eq!(ticket.team_id.as_deref(), Some("t-billing"));
    assert_eq!(ticket.assigned_to.as_deref(), Some("a2"));
    assert_eq!(ticket.status, TicketStatus::Assigned);
    assert_eq!(ticket.routing_attempts, 1);
    assert_eq!(ticket.assignment_attempts, 1);
    assert_eq!(ticket.routing_confidence, Some(0.88));
    assert_eq!(ticket.assignment_confidence, Some(0.85));

    assert_eq!(store.routing_metrics().unwrap().len(), 1);
    assert_eq!(store.assignment_metrics().unwrap().len(), 1);
    assert_eq!(store.profile("a2").unwrap().unwrap().current_workload, 2);

    // Routing's capabilities are carried into the assignment prompt.
    let prompt = model.prompt_for(Stage::Assignment).unwrap();
    assert!(prompt.contains("Estimated workload: 3/10"));
}

#[tokio::test]
async fn test_routing_unclassified_ticket_is_illegal() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let model = ScriptedModel::new(&[ROUTE_BILLING]);
    let orch = orchestrator(&model, &store);

    let err = orch.route("tk-1").await.unwrap_err();
    assert!(matches!(err, TriageError::IllegalTransition(_)));
    assert_eq!(err.kind(), ErrorKind::Workflow);
    assert_eq!(model.calls(), 0);
    assert!(store.routing_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn test_assigning_unrouted_ticket_is_illegal() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let model = ScriptedModel::new(&[CLASSIFY_BILLING, ASSIGN_BEN]);
    let orch = orchestrator(&model, &store);

    orch.classify("tk-1").await.unwrap();
    let err = orch.assign("tk-1").await.unwrap_err();
    assert!(matches!(err, TriageError::IllegalTransition(_)));
    assert!(store.assignment_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_validation_leaves_no_trace() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let bad_confidence = r#"{"team_id":"t-billing","team_name":"Billing","confidence":1.4,
        "reasoning":"x","required_capabilities":[],"estimated_workload":3}"#;
    let model = ScriptedModel::new(&[CLASSIFY_BILLING, bad_confidence]);
    let orch = orchestrator(&model, &store);

    orch.classify("tk-1").await.unwrap();
    let err = orch.route("tk-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::RangeViolation);

    let ticket = stored(&store, "tk-1").await;
    assert_eq!(ticket.routing_attempts, 0);
    assert!(ticket.team_id.is_none());
    assert!(ticket.last_routing_timestamp.is_none());
    assert!(store.routing_metrics().unwrap().is_empty());
}

#[tokio::test]
async fn test_failed_assignment_keeps_workload() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let invented_agent = r#"{"agent_id":"a9","agent_name":"Ben Ortiz","confidence":0.8,
        "skill_match_score":0.9,"reasoning":"x","predicted_resolution_time":"1h 0m",
        "workload_after_assignment":5}"#;
    let model = ScriptedModel::new(&[invented_agent]);
    let orch = orchestrator(&model, &store);

    let mut request = StageRequest::new("tk-1", "Charged twice", "Two charges");
    request.team_id = Some("t-billing".into());
    let err = orch.assign_request(&request).await.unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ReferentialIntegrityError);
    assert!(store.assignment_metrics().unwrap().is_empty());
    for id in ["a1", "a2", "a3"] {
        assert_eq!(store.profile(id).unwrap().unwrap().current_workload, 1);
    }
}

#[tokio::test]
async fn test_preview_asymmetry() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let model = ScriptedModel::new(&[CLASSIFY_BILLING, ROUTE_BILLING, ASSIGN_BEN]);
    let orch = orchestrator(&model, &store);

    let request = StageRequest::new("ignored", "Charged twice for March", "Two charges");
    let outcome = orch.preview(request).await.unwrap();
    assert_eq!(outcome.ticket_id, PREVIEW_ID);
    assert_eq!(outcome.assignment.agent_id, "a2");

    // Routing skips its metric; assignment still writes and overwrites.
    assert!(store.routing_metrics().unwrap().is_empty());
    let metrics = store.assignment_metrics().unwrap();
    assert_eq!(metrics.len(), 1);
    assert_eq!(metrics[0].ticket_id, PREVIEW_ID);
    assert_eq!(store.profile("a2").unwrap().unwrap().current_workload, 2);

    // No ticket row was touched.
    let ticket = stored(&store, "tk-1").await;
    assert!(ticket.category.is_none());
    assert!(ticket.team_id.is_none());
}

#[tokio::test]
async fn test_reroute_clears_assignee() {
    let mut snap = snapshot();
    let ticket = &mut snap.tickets[0];
    ticket.category = Some(TicketCategory::Billing);
    ticket.team_id = Some("t-support".into());
    ticket.assigned_to = Some("a1".into());
    ticket.status = TicketStatus::Assigned;
    ticket.assignment_attempts = 1;

    let store = Arc::new(MemoryStore::from_snapshot(snap));
    let model = ScriptedModel::new(&[ROUTE_BILLING]);
    let orch = orchestrator(&model, &store);

    orch.route("tk-1").await.unwrap();
    let ticket = stored(&store, "tk-1").await;
    assert_eq!(ticket.team_id.as_deref(), Some("t-billing"));
    assert!(ticket.assigned_to.is_none());
    assert_eq!(ticket.status, TicketStatus::Open);
    assert_eq!(ticket.routing_attempts, 1);
    assert_eq!(ticket.assignment_attempts, 1);
}

#[tokio::test]
async fn test_workload_overwrite_is_last_write_wins() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let first = ASSIGN_BEN.replace("\"workload_after_assignment\":2", "\"workload_after_assignment\":6");
    let model = ScriptedModel::new(&[first.as_str(), ASSIGN_BEN]);
    let orch = orchestrator(&model, &store);

    let mut request = StageRequest::new("tk-1", "Charged twice", "Two charges");
    request.team_id = Some("t-billing".into());
    orch.assign_request(&request).await.unwrap();
    orch.assign_request(&request).await.unwrap();

    assert_eq!(store.assignment_metrics().unwrap().len(), 2);
    assert_eq!(store.profile("a2").unwrap().unwrap().current_workload, 2);
}

#[tokio::test]
async fn test_unknown_ticket() {
    let store = Arc::new(MemoryStore::from_snapshot(snapshot()));
    let model = ScriptedModel::new(&[]);
    let orch = orchestrator(&model, &store);

    let err = orch.classify("nope").await.unwrap_err();
    assert!(matches!(err, TriageError::TicketNotFound(_)));
}

#[tokio::test]
async fn test_demo_seed_loads() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("../../demos/seed.json");
    let store = MemoryStore::from_json_file(&path).unwrap();

    let agents = store.list_team_agents("team-billing").await.unwrap();
    let names: Vec<&str> = agents.iter().map(|a| a.full_name.as_str()).collect();
    assert_eq!(names, vec!["Maya Chen", "Tomas Ruiz"]);

    let teams = store.list_teams().await.unwrap();
    assert_eq!(teams.len(), 3);
}

#[tokio::test]
async fn test_store_failure_during_assignment_leaves_no_trace() {
    let store = Arc::new(MemoryStore::from_snapshot(routed_snapshot()));
    let model = ScriptedModel::new(&[ASSIGN_BEN]);
    let orch = failing_orchestrator(&model, &store, FailOn::Assignment);

    let err = orch.assign("tk-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);
    assert!(!err.is_retriable());

    assert!(store.assignment_metrics().unwrap().is_empty());
    for id in ["a1", "a2", "a3"] {
        assert_eq!(store.profile(id).unwrap().unwrap().current_workload, 1);
    }
    let ticket = stored(&store, "tk-1").await;
    assert!(ticket.assigned_to.is_none());
    assert_eq!(ticket.assignment_attempts, 0);
    assert_eq!(ticket.status, TicketStatus::Open);
}

#[tokio::test]
async fn test_store_failure_during_routing_leaves_ticket_untouched() {
    let mut snap = snapshot();
    snap.tickets[0].category = Some(TicketCategory::Billing);
    let store = Arc::new(MemoryStore::from_snapshot(snap));
    let model = ScriptedModel::new(&[ROUTE_BILLING]);
    let orch = failing_orchestrator(&model, &store, FailOn::RoutingMetric);

    let err = orch.route("tk-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    assert!(store.routing_metrics().unwrap().is_empty());
    let ticket = stored(&store, "tk-1").await;
    assert!(ticket.team_id.is_none());
    assert_eq!(ticket.routing_attempts, 0);
}

#[tokio::test]
async fn test_ticket_update_failure_after_assignment_keeps_stage_writes() {
    let store = Arc::new(MemoryStore::from_snapshot(routed_snapshot()));
    let model = ScriptedModel::new(&[ASSIGN_BEN]);
    let orch = failing_orchestrator(&model, &store, FailOn::TicketUpdate);

    let err = orch.assign("tk-1").await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Storage);

    // The stage committed as a unit; only the ticket row is stale.
    assert_eq!(store.assignment_metrics().unwrap().len(), 1);
    assert_eq!(store.profile("a2").unwrap().unwrap().current_workload, 2);
    assert!(stored(&store, "tk-1").await.assigned_to.is_none());
}
