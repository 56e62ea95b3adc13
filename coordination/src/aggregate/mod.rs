//! Context aggregation for the routing and assignment stages.
//!
//! Storage access lives in the agent crate; this module only folds rows
//! that were already fetched into the shapes the prompts need.

pub mod performance;
pub mod workload;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Profile, ResolutionRecord, Ticket};

pub use performance::{
    compute_performance, HistoricalPerformance, RunningMean, DEFAULT_HISTORY_LIMIT,
};
pub use workload::{compute_team_workload, TeamSummary};

/// Candidate teams plus their live workload (team id → open ticket count).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamInfo {
    pub teams: Vec<TeamSummary>,
    pub workload: BTreeMap<String, u32>,
}

impl TeamInfo {
    pub fn build(teams: Vec<TeamSummary>, active_tickets: &[Ticket]) -> Self {
        Self {
            workload: compute_team_workload(active_tickets),
            teams,
        }
    }

    /// Live open-ticket count for a team (0 when it has none).
    pub fn live_workload(&self, team_id: &str) -> u32 {
        self.workload.get(team_id).copied().unwrap_or(0)
    }
}

/// Candidate agents of one team plus their historical performance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentInfo {
    pub team_id: String,
    pub agents: Vec<Profile>,
    pub performance: BTreeMap<String, HistoricalPerformance>,
}

impl AgentInfo {
    pub fn build(
        team_id: impl Into<String>,
        agents: Vec<Profile>,
        history: &[ResolutionRecord],
        limit: usize,
    ) -> Self {
        let ids: Vec<&str> = agents.iter().map(|a| a.id.as_str()).collect();
        let performance = compute_performance(history, &ids, limit);
        Self {
            team_id: team_id.into(),
            agents,
            performance,
        }
    }

    pub fn agent(&self, agent_id: &str) -> Option<&Profile> {
        self.agents.iter().find(|a| a.id == agent_id)
    }
}
