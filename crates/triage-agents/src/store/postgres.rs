//! Postgres-backed store (tokio-postgres).
//!
//! Enum columns are stored as text and parsed on read; an unknown value
//! is a decode error rather than a silent default.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_postgres::{Client, NoTls, Row};
use tracing::{error, info};

use coordination::aggregate::TeamSummary;
use coordination::model::{
    AssignmentMetric, Availability, Profile, ProfileRole, ResolutionRecord, RoutingMetric, Team,
    Ticket, TicketCategory, TicketPriority, TicketStatus,
};

use super::{StoreError, StoreResult, TriageStore};

/// DDL for every table the pipeline reads or writes.
pub const SCHEMA_SQL: &str = include_str!("../../sql/schema.sql");

/// Workload overwrite and metric insert in one statement. The insert selects
/// from the updated profile row, so an unknown agent writes nothing.
const RECORD_ASSIGNMENT_SQL: &str = "\
    WITH p AS (\
        UPDATE profiles SET current_workload = $8 WHERE id = $3 RETURNING id\
    ) \
    INSERT INTO assignment_metrics (id, ticket_id, agent_id, confidence, \
        skill_match_score, reasoning, predicted_resolution_time, \
        workload_after_assignment, created_at) \
    SELECT $1, $2, p.id, $4, $5, $6, $7, $8, $9 FROM p";

const TICKET_COLUMNS: &str = "id, title, description, category, priority, status, team_id, \
     assigned_to, routing_attempts, assignment_attempts, last_routing_timestamp, \
     last_assignment_timestamp, routing_confidence, assignment_confidence, created_at";

/// Store backed by a single tokio-postgres connection.
pub struct PgStore {
    client: Client,
}

impl PgStore {
    /// Connect and spawn the connection driver onto the current runtime.
    pub async fn connect(database_url: &str) -> StoreResult<Self> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls).await?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                error!("Postgres connection error: {e}");
            }
        });
        Ok(Self { client })
    }

    /// Apply `schema.sql`. Idempotent.
    pub async fn init_schema(&self) -> StoreResult<()> {
        self.client.batch_execute(SCHEMA_SQL).await?;
        info!("Triage schema applied");
        Ok(())
    }
}

fn to_i32(value: u32, what: &str) -> StoreResult<i32> {
    i32::try_from(value).map_err(|_| StoreError::Decode(format!("{what} {value} overflows INTEGER")))
}

fn to_u32(value: i32, what: &str) -> StoreResult<u32> {
    u32::try_from(value).map_err(|_| StoreError::Decode(format!("negative {what}: {value}")))
}

fn parse_enum<T>(value: &str, what: &str, parse: impl Fn(&str) -> Option<T>) -> StoreResult<T> {
    parse(value).ok_or_else(|| StoreError::Decode(format!("unknown {what} {value:?}")))
}

fn ticket_from_row(row: &Row) -> StoreResult<Ticket> {
    let category: Option<String> = row.try_get("category")?;
    let priority: String = row.try_get("priority")?;
    let status: String = row.try_get("status")?;
    let routing_attempts: i32 = row.try_get("routing_attempts")?;
    let assignment_attempts: i32 = row.try_get("assignment_attempts")?;

    Ok(Ticket {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        category: category
            .as_deref()
            .map(|c| parse_enum(c, "category", TicketCategory::parse))
            .transpose()?,
        priority: parse_enum(&priority, "priority", TicketPriority::parse)?,
        status: parse_enum(&status, "status", TicketStatus::parse)?,
        team_id: row.try_get("team_id")?,
        assigned_to: row.try_get("assigned_to")?,
        routing_attempts: to_u32(routing_attempts, "routing_attempts")?,
        assignment_attempts: to_u32(assignment_attempts, "assignment_attempts")?,
        last_routing_timestamp: row.try_get::<_, Option<DateTime<Utc>>>("last_routing_timestamp")?,
        last_assignment_timestamp: row
            .try_get::<_, Option<DateTime<Utc>>>("last_assignment_timestamp")?,
        routing_confidence: row.try_get("routing_confidence")?,
        assignment_confidence: row.try_get("assignment_confidence")?,
        created_at: row.try_get("created_at")?,
    })
}

fn profile_from_row(row: &Row) -> StoreResult<Profile> {
    let role: String = row.try_get("role")?;
    let availability: String = row.try_get("availability")?;
    let current_workload: i32 = row.try_get("current_workload")?;
    let max_workload: i32 = row.try_get("max_workload")?;

    Ok(Profile {
        id: row.try_get("id")?,
        full_name: row.try_get("full_name")?,
        role: parse_enum(&role, "role", ProfileRole::parse)?,
        expertise: row.try_get("expertise")?,
        current_workload: to_u32(current_workload, "current_workload")?,
        max_workload: to_u32(max_workload, "max_workload")?,
        availability: parse_enum(&availability, "availability", Availability::parse)?,
    })
}

fn team_summary_from_row(row: &Row) -> StoreResult<TeamSummary> {
    let current_workload: i32 = row.try_get("current_workload")?;
    let max_workload: i32 = row.try_get("max_workload")?;
    let member_count: i64 = row.try_get("member_count")?;

    Ok(TeamSummary {
        team: Team {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
            capabilities: row.try_get("capabilities")?,
            specialties: row.try_get("specialties")?,
            current_workload: to_u32(current_workload, "current_workload")?,
            max_workload: to_u32(max_workload, "max_workload")?,
        },
        member_count: u32::try_from(member_count).unwrap_or(u32::MAX),
    })
}

#[async_trait]
impl TriageStore for PgStore {
    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        let query = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE id = $1");
        let row = self.client.query_opt(query.as_str(), &[&id]).await?;
        row.as_ref().map(ticket_from_row).transpose()
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        let category = ticket.category.map(TicketCategory::as_str);
        let routing_attempts = to_i32(ticket.routing_attempts, "routing_attempts")?;
        let assignment_attempts = to_i32(ticket.assignment_attempts, "assignment_attempts")?;

        let updated = self
            .client
            .execute(
                "UPDATE tickets SET category = $2, priority = $3, status = $4, team_id = $5, \
                 assigned_to = $6, routing_attempts = $7, assignment_attempts = $8, \
                 last_routing_timestamp = $9, last_assignment_timestamp = $10, \
                 routing_confidence = $11, assignment_confidence = $12 \
                 WHERE id = $1",
                &[
                    &ticket.id,
                    &category,
                    &ticket.priority.as_str(),
                    &ticket.status.as_str(),
                    &ticket.team_id,
                    &ticket.assigned_to,
                    &routing_attempts,
                    &assignment_attempts,
                    &ticket.last_routing_timestamp,
                    &ticket.last_assignment_timestamp,
                    &ticket.routing_confidence,
                    &ticket.assignment_confidence,
                ],
            )
            .await?;

        if updated == 0 {
            return Err(StoreError::NotFound(format!("ticket {}", ticket.id)));
        }
        Ok(())
    }

    async fn list_teams(&self) -> StoreResult<Vec<TeamSummary>> {
        let rows = self
            .client
            .query(
                "SELECT t.id, t.name, t.capabilities, t.specialties, t.current_workload, \
                 t.max_workload, COUNT(m.profile_id) FILTER (WHERE m.status = 'active') \
                 AS member_count \
                 FROM teams t LEFT JOIN team_members m ON m.team_id = t.id \
                 GROUP BY t.id ORDER BY t.name",
                &[],
            )
            .await?;
        rows.iter().map(team_summary_from_row).collect()
    }

    async fn list_tickets_by_status(&self, statuses: &[TicketStatus]) -> StoreResult<Vec<Ticket>> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let query = format!("SELECT {TICKET_COLUMNS} FROM tickets WHERE status = ANY($1)");
        let rows = self.client.query(query.as_str(), &[&statuses]).await?;
        rows.iter().map(ticket_from_row).collect()
    }

    async fn list_team_agents(&self, team_id: &str) -> StoreResult<Vec<Profile>> {
        let rows = self
            .client
            .query(
                "SELECT p.id, p.full_name, p.role, p.expertise, p.current_workload, \
                 p.max_workload, p.availability \
                 FROM team_members m JOIN profiles p ON p.id = m.profile_id \
                 WHERE m.team_id = $1 AND m.status = 'active' AND p.role = 'agent' \
                 ORDER BY p.full_name",
                &[&team_id],
            )
            .await?;
        rows.iter().map(profile_from_row).collect()
    }

    async fn recent_resolutions(
        &self,
        agent_ids: &[String],
        limit: usize,
    ) -> StoreResult<Vec<ResolutionRecord>> {
        let agent_ids: Vec<String> = agent_ids.to_vec();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = self
            .client
            .query(
                "SELECT agent_id, ticket_id, resolution_minutes, satisfaction_score, resolved_at \
                 FROM resolution_history WHERE agent_id = ANY($1) \
                 ORDER BY resolved_at DESC LIMIT $2",
                &[&agent_ids, &limit],
            )
            .await?;

        rows.iter()
            .map(|row| -> StoreResult<ResolutionRecord> {
                let minutes: i32 = row.try_get("resolution_minutes")?;
                Ok(ResolutionRecord {
                    agent_id: row.try_get("agent_id")?,
                    ticket_id: row.try_get("ticket_id")?,
                    resolution_minutes: to_u32(minutes, "resolution_minutes")?,
                    satisfaction_score: row.try_get("satisfaction_score")?,
                    resolved_at: row.try_get("resolved_at")?,
                })
            })
            .collect()
    }

    async fn insert_routing_metric(&self, metric: &RoutingMetric) -> StoreResult<()> {
        let estimated_workload = i32::from(metric.estimated_workload);
        self.client
            .execute(
                "INSERT INTO routing_metrics (id, ticket_id, team_id, confidence, reasoning, \
                 required_capabilities, estimated_workload, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
                &[
                    &metric.id,
                    &metric.ticket_id,
                    &metric.team_id,
                    &metric.confidence,
                    &metric.reasoning,
                    &metric.required_capabilities,
                    &estimated_workload,
                    &metric.created_at,
                ],
            )
            .await?;
        Ok(())
    }

    async fn record_assignment(&self, metric: &AssignmentMetric) -> StoreResult<()> {
        let workload = to_i32(metric.workload_after_assignment, "workload_after_assignment")?;
        let inserted = self
            .client
            .execute(
                RECORD_ASSIGNMENT_SQL,
                &[
                    &metric.id,
                    &metric.ticket_id,
                    &metric.agent_id,
                    &metric.confidence,
                    &metric.skill_match_score,
                    &metric.reasoning,
                    &metric.predicted_resolution_time,
                    &workload,
                    &metric.created_at,
                ],
            )
            .await?;
        if inserted == 0 {
            return Err(StoreError::NotFound(format!("profile {}", metric.agent_id)));
        }
        Ok(())
    }
}
