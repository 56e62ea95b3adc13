//! In-process store backed by a JSON-serializable snapshot.

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use coordination::aggregate::TeamSummary;
use coordination::model::{
    AssignmentMetric, MemberStatus, Profile, ProfileRole, ResolutionRecord, RoutingMetric, Team,
    TeamMember, Ticket, TicketStatus,
};

use super::{StoreError, StoreResult, TriageStore};

/// Every table the triage pipeline touches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Snapshot {
    pub tickets: Vec<Ticket>,
    pub teams: Vec<Team>,
    pub profiles: Vec<Profile>,
    pub team_members: Vec<TeamMember>,
    pub resolution_history: Vec<ResolutionRecord>,
    pub routing_metrics: Vec<RoutingMetric>,
    pub assignment_metrics: Vec<AssignmentMetric>,
}

/// Store that keeps a `Snapshot` behind a lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<Snapshot>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: Snapshot) -> Self {
        Self {
            data: RwLock::new(snapshot),
        }
    }

    /// Load a snapshot from a JSON file.
    pub fn from_json_file(path: &Path) -> StoreResult<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Seed(format!("failed to read {}: {e}", path.display())))?;
        let snapshot: Snapshot = serde_json::from_str(&text)
            .map_err(|e| StoreError::Seed(format!("failed to parse {}: {e}", path.display())))?;
        Ok(Self::from_snapshot(snapshot))
    }

    /// Clone of the current contents.
    pub fn snapshot(&self) -> StoreResult<Snapshot> {
        Ok(self.read()?.clone())
    }

    pub fn insert_ticket(&self, ticket: Ticket) -> StoreResult<()> {
        let mut data = self.write()?;
        data.tickets.retain(|t| t.id != ticket.id);
        data.tickets.push(ticket);
        Ok(())
    }

    pub fn routing_metrics(&self) -> StoreResult<Vec<RoutingMetric>> {
        Ok(self.read()?.routing_metrics.clone())
    }

    pub fn assignment_metrics(&self) -> StoreResult<Vec<AssignmentMetric>> {
        Ok(self.read()?.assignment_metrics.clone())
    }

    pub fn profile(&self, id: &str) -> StoreResult<Option<Profile>> {
        Ok(self.read()?.profiles.iter().find(|p| p.id == id).cloned())
    }

    fn read(&self) -> StoreResult<std::sync::RwLockReadGuard<'_, Snapshot>> {
        self.data.read().map_err(|_| StoreError::LockPoisoned)
    }

    fn write(&self) -> StoreResult<std::sync::RwLockWriteGuard<'_, Snapshot>> {
        self.data.write().map_err(|_| StoreError::LockPoisoned)
    }
}

#[async_trait]
impl TriageStore for MemoryStore {
    async fn get_ticket(&self, id: &str) -> StoreResult<Option<Ticket>> {
        Ok(self.read()?.tickets.iter().find(|t| t.id == id).cloned())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> StoreResult<()> {
        let mut data = self.write()?;
        let slot = data
            .tickets
            .iter_mut()
            .find(|t| t.id == ticket.id)
            .ok_or_else(|| StoreError::NotFound(format!("ticket {}", ticket.id)))?;
        *slot = ticket.clone();
        Ok(())
    }

    async fn list_teams(&self) -> StoreResult<Vec<TeamSummary>> {
        let data = self.read()?;
        let mut teams: Vec<TeamSummary> = data
            .teams
            .iter()
            .map(|team| TeamSummary {
                member_count: data
                    .team_members
                    .iter()
                    .filter(|m| m.team_id == team.id && m.status == MemberStatus::Active)
                    .count() as u32,
                team: team.clone(),
            })
            .collect();
        teams.sort_by(|a, b| a.team.name.cmp(&b.team.name));
        Ok(teams)
    }

    async fn list_tickets_by_status(&self, statuses: &[TicketStatus]) -> StoreResult<Vec<Ticket>> {
        Ok(self
            .read()?
            .tickets
            .iter()
            .filter(|t| statuses.contains(&t.status))
            .cloned()
            .collect())
    }

    async fn list_team_agents(&self, team_id: &str) -> StoreResult<Vec<Profile>> {
        let data = self.read()?;
        let mut agents: Vec<Profile> = data
            .team_members
            .iter()
            .filter(|m| m.team_id == team_id && m.status == MemberStatus::Active)
            .filter_map(|m| data.profiles.iter().find(|p| p.id == m.profile_id))
            .filter(|p| p.role == ProfileRole::Agent)
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.full_name.cmp(&b.full_name));
        Ok(agents)
    }

    async fn recent_resolutions(
        &self,
        agent_ids: &[String],
        limit: usize,
    ) -> StoreResult<Vec<ResolutionRecord>> {
        let data = self.read()?;
        let mut records: Vec<ResolutionRecord> = data
            .resolution_history
            .iter()
            .filter(|r| agent_ids.contains(&r.agent_id))
            .cloned()
            .collect();
        records.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn insert_routing_metric(&self, metric: &RoutingMetric) -> StoreResult<()> {
        self.write()?.routing_metrics.push(metric.clone());
        Ok(())
    }

    async fn record_assignment(&self, metric: &AssignmentMetric) -> StoreResult<()> {
        let mut data = self.write()?;
        let profile = data
            .profiles
            .iter_mut()
            .find(|p| p.id == metric.agent_id)
            .ok_or_else(|| StoreError::NotFound(format!("profile {}", metric.agent_id)))?;
        profile.current_workload = metric.workload_after_assignment;
        data.assignment_metrics.push(metric.clone());
        Ok(())
    }
}
