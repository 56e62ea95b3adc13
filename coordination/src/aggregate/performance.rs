//! Per-agent historical performance from resolution history.
//!
//! Recomputed from the newest records on every call; nothing here is
//! cached between stage invocations.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::model::ResolutionRecord;
use crate::validate::format_minutes;

/// Default number of resolution records considered.
pub const DEFAULT_HISTORY_LIMIT: usize = 100;

/// Incremental arithmetic mean: `new = (old * n + x) / (n + 1)`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct RunningMean {
    mean: f64,
    count: u32,
}

impl RunningMean {
    pub fn push(&mut self, x: f64) {
        let n = f64::from(self.count);
        self.mean = (self.mean * n + x) / (n + 1.0);
        self.count += 1;
    }

    /// `None` until at least one sample has been pushed.
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}

/// Running averages for one agent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalPerformance {
    pub resolution_minutes: RunningMean,
    /// Only records that carry a satisfaction score contribute.
    pub satisfaction: RunningMean,
}

impl HistoricalPerformance {
    pub fn record(&mut self, record: &ResolutionRecord) {
        self.resolution_minutes
            .push(f64::from(record.resolution_minutes));
        if let Some(score) = record.satisfaction_score.filter(|s| s.is_finite()) {
            self.satisfaction.push(score);
        }
    }

    pub fn resolved_count(&self) -> u32 {
        self.resolution_minutes.count()
    }

    pub fn avg_resolution_minutes(&self) -> Option<f64> {
        self.resolution_minutes.mean()
    }

    pub fn avg_satisfaction(&self) -> Option<f64> {
        self.satisfaction.mean()
    }

    /// Average resolution time as `"<h>h <m>m"`.
    pub fn avg_resolution_display(&self) -> Option<String> {
        self.avg_resolution_minutes()
            .map(|m| format_minutes(m.round().max(0.0) as u64))
    }
}

/// Fold resolution records into per-agent performance.
///
/// Only the newest `limit` records belonging to `agent_ids` contribute.
/// Agents without any history are absent from the map.
pub fn compute_performance(
    records: &[ResolutionRecord],
    agent_ids: &[&str],
    limit: usize,
) -> BTreeMap<String, HistoricalPerformance> {
    let mut relevant: Vec<&ResolutionRecord> = records
        .iter()
        .filter(|r| agent_ids.contains(&r.agent_id.as_str()))
        .collect();
    relevant.sort_by(|a, b| b.resolved_at.cmp(&a.resolved_at));
    relevant.truncate(limit);

    let mut performance: BTreeMap<String, HistoricalPerformance> = BTreeMap::new();
    for record in relevant {
        performance
            .entry(record.agent_id.clone())
            .or_default()
            .record(record);
    }
    performance
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn record(agent: &str, minutes: u32, satisfaction: Option<f64>, age_hours: i64) -> ResolutionRecord {
        ResolutionRecord {
            agent_id: agent.into(),
            ticket_id: format!("tk-{agent}-{age_hours}"),
            resolution_minutes: minutes,
            satisfaction_score: satisfaction,
            resolved_at: Utc::now() - Duration::hours(age_hours),
        }
    }

    #[test]
    fn running_mean_matches_arithmetic_mean() {
        let samples = [120.0, 240.0, 360.0, 30.0, 75.0];
        let mut mean = RunningMean::default();
        for s in samples {
            mean.push(s);
        }
        let expected = samples.iter().sum::<f64>() / samples.len() as f64;
        assert!((mean.mean().unwrap() - expected).abs() < 1e-9);
        assert_eq!(mean.count(), 5);
    }

    #[test]
    fn empty_mean_is_none() {
        assert_eq!(RunningMean::default().mean(), None);
    }

    #[test]
    fn satisfaction_averages_only_rated_records() {
        let records = vec![
            record("a", 60, Some(4.0), 1),
            record("a", 120, None, 2),
            record("a", 180, Some(5.0), 3),
        ];
        let perf = compute_performance(&records, &["a"], DEFAULT_HISTORY_LIMIT);
        let a = &perf["a"];
        assert_eq!(a.resolved_count(), 3);
        assert_eq!(a.avg_resolution_minutes(), Some(120.0));
        assert_eq!(a.avg_satisfaction(), Some(4.5));
        assert_eq!(a.avg_resolution_display().as_deref(), Some("2h 0m"));
    }

    #[test]
    fn only_newest_records_within_limit_count() {
        let records = vec![
            record("a", 1000, None, 50), // oldest, dropped by limit 2
            record("a", 60, None, 1),
            record("a", 120, None, 2),
        ];
        let perf = compute_performance(&records, &["a"], 2);
        assert_eq!(perf["a"].resolved_count(), 2);
        assert_eq!(perf["a"].avg_resolution_minutes(), Some(90.0));
    }

    #[test]
    fn other_agents_are_ignored() {
        let records = vec![record("a", 60, None, 1), record("z", 600, None, 1)];
        let perf = compute_performance(&records, &["a", "b"], DEFAULT_HISTORY_LIMIT);
        assert!(perf.contains_key("a"));
        assert!(!perf.contains_key("b"));
        assert!(!perf.contains_key("z"));
    }
}
