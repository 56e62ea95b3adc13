//! Live context gathering for the routing and assignment stages.
//!
//! Both lookups are recomputed on every call. Any store error aborts the
//! lookup; there is no partial result.

use coordination::aggregate::{AgentInfo, TeamInfo};
use coordination::model::TicketStatus;
use tracing::debug;

use crate::errors::{TriageError, TriageResult};
use crate::store::TriageStore;

/// Ticket statuses that count toward a team's live workload.
pub const ACTIVE_STATUSES: [TicketStatus; 2] = [TicketStatus::Open, TicketStatus::InProgress];

/// All teams with member counts, plus live workload per team.
pub async fn get_team_info(store: &dyn TriageStore) -> TriageResult<TeamInfo> {
    let (teams, active) = tokio::try_join!(
        store.list_teams(),
        store.list_tickets_by_status(&ACTIVE_STATUSES)
    )?;
    debug!(
        teams = teams.len(),
        active_tickets = active.len(),
        "Fetched team info"
    );
    Ok(TeamInfo::build(teams, &active))
}

/// Active agents of `team_id` plus their historical performance over the
/// newest `history_limit` resolution records.
pub async fn get_agent_info(
    store: &dyn TriageStore,
    team_id: &str,
    history_limit: usize,
) -> TriageResult<AgentInfo> {
    let agents = store.list_team_agents(team_id).await?;
    if agents.is_empty() {
        return Err(TriageError::NoCandidates(format!(
            "team {team_id} has no active agents"
        )));
    }

    let ids: Vec<String> = agents.iter().map(|a| a.id.clone()).collect();
    let history = store.recent_resolutions(&ids, history_limit).await?;
    debug!(
        team_id,
        agents = agents.len(),
        records = history.len(),
        "Fetched agent info"
    );
    Ok(AgentInfo::build(team_id, agents, &history, history_limit))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Snapshot};
    use coordination::model::{Team, Ticket};

    fn team(id: &str) -> Team {
        Team {
            id: id.into(),
            name: id.to_uppercase(),
            capabilities: vec![],
            specialties: vec![],
            current_workload: 0,
            max_workload: 10,
        }
    }

    fn ticket(id: &str, team: &str, status: TicketStatus) -> Ticket {
        let mut t = Ticket::new(id, "Some title", "Some description");
        t.team_id = Some(team.into());
        t.status = status;
        t
    }

    #[tokio::test]
    async fn workload_counts_only_active_tickets() {
        let store = MemoryStore::from_snapshot(Snapshot {
            teams: vec![team("a"), team("b")],
            tickets: vec![
                ticket("1", "a", TicketStatus::Open),
                ticket("2", "a", TicketStatus::InProgress),
                ticket("3", "a", TicketStatus::Resolved),
                ticket("4", "b", TicketStatus::Closed),
                ticket("5", "b", TicketStatus::Assigned),
            ],
            ..Snapshot::default()
        });

        let info = get_team_info(&store).await.unwrap();
        assert_eq!(info.teams.len(), 2);
        assert_eq!(info.live_workload("a"), 2);
        assert_eq!(info.live_workload("b"), 0);
    }

    #[tokio::test]
    async fn team_without_agents_has_no_candidates() {
        let store = MemoryStore::from_snapshot(Snapshot {
            teams: vec![team("a")],
            ..Snapshot::default()
        });
        let err = get_agent_info(&store, "a", 100).await.unwrap_err();
        assert!(matches!(err, TriageError::NoCandidates(_)));
    }
}
