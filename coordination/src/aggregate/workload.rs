//! Live per-team workload from the current ticket set.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::{Team, Ticket};
use crate::validate::Candidate;

/// A team row plus its derived member count, as shown to the router.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamSummary {
    #[serde(flatten)]
    pub team: Team,
    pub member_count: u32,
}

impl Candidate for TeamSummary {
    fn candidate_id(&self) -> &str {
        &self.team.id
    }
    fn candidate_name(&self) -> &str {
        &self.team.name
    }
}

/// Count tickets per team whose status counts toward workload.
/// Tickets without a team are skipped.
pub fn compute_team_workload(tickets: &[Ticket]) -> BTreeMap<String, u32> {
    let mut workload = BTreeMap::new();
    for ticket in tickets {
        if !ticket.status.counts_toward_workload() {
            continue;
        }
        if let Some(team_id) = &ticket.team_id {
            *workload.entry(team_id.clone()).or_insert(0) += 1;
        }
    }
    workload
}
