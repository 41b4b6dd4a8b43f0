//! Read-side query types for trajectory recorders.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::policy::Verdict;
use crate::trajectory::{Trajectory, TrajectoryId, TrajectoryStatus};

/// Page size used when a caller does not specify one.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Optional filters for listing trajectories. Empty matches everything.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryFilter {
    pub agent_id: Option<String>,
    pub status: Option<TrajectoryStatus>,
}

impl TrajectoryFilter {
    pub fn matches(&self, trajectory: &Trajectory) -> bool {
        let agent_ok = self
            .agent_id
            .as_deref()
            .map_or(true, |a| trajectory.agent_id == a);
        let status_ok = self.status.map_or(true, |s| trajectory.status == s);
        agent_ok && status_ok
    }
}

/// Cursor-style pagination. `page_token` is opaque and comes from a
/// previous `Page::next_page_token`; `None` starts at the beginning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRequest {
    pub page_size: usize,
    pub page_token: Option<String>,
}

impl Default for PageRequest {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_token: None,
        }
    }
}

impl PageRequest {
    pub fn first(page_size: usize) -> Self {
        Self {
            page_size,
            page_token: None,
        }
    }
}

/// One page of results. `next_page_token` is `None` on the last page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_page_token: Option<String>,
}

/// Inclusive creation-time window. Open ends are unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| at >= s) && self.end.map_or(true, |e| at <= e)
    }
}

/// Trajectory header without its steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectorySummary {
    pub id: TrajectoryId,
    pub agent_id: String,
    pub status: TrajectoryStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub step_count: u64,
}

impl From<&Trajectory> for TrajectorySummary {
    fn from(t: &Trajectory) -> Self {
        Self {
            id: t.id.clone(),
            agent_id: t.agent_id.clone(),
            status: t.status,
            created_at: t.created_at,
            updated_at: t.updated_at,
            step_count: t.step_count,
        }
    }
}

/// Aggregate counts over one agent's trajectories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrajectoryAnalytics {
    pub agent_id: String,
    pub trajectory_count: u64,
    pub status_counts: BTreeMap<TrajectoryStatus, u64>,
    pub step_count: u64,
    pub verdict_counts: BTreeMap<Verdict, u64>,
    /// How often each declared policy `@id` determined a decision.
    pub policy_hits: BTreeMap<String, u64>,
    pub computed_at: DateTime<Utc>,
}
