//! Persistence seam for the triage pipeline.
//!
//! Stage executors only see the `TriageStore` trait. `PgStore` talks to
//! the AutoCRM Postgres schema; `MemoryStore` keeps everything in process
//! and can be seeded from a JSON snapshot for dry runs and tests.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;

use coordination::aggregate::TeamSummary;
use coordination::model::{
    AssignmentMetric, Profile, ResolutionRecord, RoutingMetric, Ticket, TicketStatus,
};

pub use memory::{MemoryStore, Snapshot};
pub use postgres::PgStore;

/// Error type for store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("Row decode error: {0}")]
    Decode(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Seed error: {0}")]
    Seed(String),

    #[error("Lock poisoned")]
    LockPoisoned,
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Reads and writes the triage pipeline needs.
///
/// There is no per-ticket locking and workload updates are plain
/// overwrites: concurrent assignments to one agent are last-write-wins.
#[async_trait]
pub trait TriageStore: Send + Sync {
    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>>;

    /// Overwrite the mutable triage columns of an existing ticket.
    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()>;

    /// All teams with their active member counts.
    async fn list_teams(&self) -> StoreResult<Vec<TeamSummary>>;

    async fn list_tickets_by_status(&self, statuses: &[TicketStatus]) -> StoreResult<Vec<Ticket>>;

    /// Active members of `team_id` whose profile role is `agent`.
    async fn list_team_agents(&self, team_id: &str) -> StoreResult<Vec<Profile>>;

    /// Newest-first resolution records for the given agents.
    async fn recent_resolutions(
        &self,
        agent_ids: &[String],
        limit: usize,
    ) -> StoreResult<Vec<ResolutionRecord>>;

    async fn insert_routing_metric(&self, metric: &RoutingMetric) -> StoreResult<()>;

    /// Insert an assignment-metric row and overwrite the assigned agent's
    /// workload with `metric.workload_after_assignment`, as one unit.
    ///
    /// Either both writes land or neither does. An unknown agent is
    /// `NotFound` and leaves the store untouched.
    async fn record_assignment(&self, metric: &AssignmentMetric) -> StoreResult<()>;
}
