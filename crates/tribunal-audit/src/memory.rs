//! In-memory implementation of `TrajectoryStore`.
//!
//! `InMemoryTrajectoryStore` keeps every trajectory, and the hash chain of
//! its steps, in maps protected by one `Mutex`. No lock is held across an
//! await point, so the store is safe to share between concurrent
//! trajectories of one harness.
//!
//! Use `export_log()` to obtain a trajectory's chained events and
//! `verify_integrity()` at any time to confirm the chain is intact.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info};

use tribunal_contracts::{
    error::{TribunalError, TribunalResult},
    query::{
        Page, PageRequest, TimeRange, TrajectoryAnalytics, TrajectoryFilter, TrajectorySummary,
        DEFAULT_PAGE_SIZE,
    },
    trajectory::{AdjudicatedStep, AdjudicationRecord, Trajectory, TrajectoryId, TrajectoryStatus},
};
use tribunal_core::TrajectoryStore;

use crate::{
    chain::{hash_step, verify_chain},
    event::{StepEvent, TrajectoryLog},
};

// ── Internal mutable state ───────────────────────────────────────────────────

pub(crate) struct Entry {
    pub(crate) trajectory: Trajectory,
    pub(crate) events: Vec<StepEvent>,
}

impl Entry {
    fn last_hash(&self) -> &str {
        self.events
            .last()
            .map(|e| e.this_hash.as_str())
            .unwrap_or(StepEvent::GENESIS_HASH)
    }
}

#[derive(Default)]
pub(crate) struct StoreState {
    pub(crate) entries: HashMap<TrajectoryId, Entry>,
    /// Trajectory ids in creation order; listing and pagination follow it.
    pub(crate) order: Vec<TrajectoryId>,
}

impl StoreState {
    fn entry_mut(&mut self, id: &TrajectoryId) -> TribunalResult<&mut Entry> {
        self.entries
            .get_mut(id)
            .ok_or_else(|| TribunalError::TrajectoryNotFound {
                trajectory_id: id.to_string(),
            })
    }

    fn entry(&self, id: &TrajectoryId) -> TribunalResult<&Entry> {
        self.entries
            .get(id)
            .ok_or_else(|| TribunalError::TrajectoryNotFound {
                trajectory_id: id.to_string(),
            })
    }

    fn in_order(&self) -> impl Iterator<Item = &Trajectory> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|e| &e.trajectory)
    }
}

// ── Public store ─────────────────────────────────────────────────────────────

/// An ephemeral trajectory recorder with a SHA-256 hash chain per trajectory.
#[derive(Default)]
pub struct InMemoryTrajectoryStore {
    pub(crate) state: Mutex<StoreState>,
}

impl InMemoryTrajectoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of trajectories recorded so far.
    pub fn len(&self) -> TribunalResult<usize> {
        Ok(self.lock()?.order.len())
    }

    pub fn is_empty(&self) -> TribunalResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Recompute the trajectory's hash chain and report whether it is intact.
    pub fn verify_integrity(&self, id: &TrajectoryId) -> TribunalResult<bool> {
        let state = self.lock()?;
        Ok(verify_chain(&state.entry(id)?.events))
    }

    /// Export the trajectory header with every chained event.
    pub fn export_log(&self, id: &TrajectoryId) -> TribunalResult<TrajectoryLog> {
        let state = self.lock()?;
        let entry = state.entry(id)?;
        Ok(TrajectoryLog {
            trajectory: TrajectorySummary::from(&entry.trajectory),
            events: entry.events.clone(),
            exported_at: Utc::now(),
            terminal_hash: entry
                .events
                .last()
                .map(|e| e.this_hash.clone())
                .unwrap_or_default(),
        })
    }

    fn lock(&self) -> TribunalResult<MutexGuard<'_, StoreState>> {
        self.state.lock().map_err(|e| TribunalError::Store {
            reason: format!("trajectory store lock poisoned: {e}"),
        })
    }
}

// ── TrajectoryStore impl ─────────────────────────────────────────────────────

#[async_trait]
impl TrajectoryStore for InMemoryTrajectoryStore {
    fn name(&self) -> &str {
        "in-memory"
    }

    async fn create(&self, agent_id: &str) -> TribunalResult<Trajectory> {
        let trajectory = Trajectory::new(agent_id);
        let mut state = self.lock()?;
        state.order.push(trajectory.id.clone());
        state.entries.insert(
            trajectory.id.clone(),
            Entry {
                trajectory: trajectory.clone(),
                events: Vec::new(),
            },
        );

        debug!(trajectory_id = %trajectory.id, agent_id = %agent_id, "trajectory created");
        Ok(trajectory)
    }

    async fn update_status(&self, id: &TrajectoryId, status: TrajectoryStatus) -> TribunalResult<()> {
        let mut state = self.lock()?;
        let trajectory = &mut state.entry_mut(id)?.trajectory;
        if trajectory.is_terminal() {
            return Err(TribunalError::TrajectoryState {
                reason: format!("trajectory '{id}' is already {:?}", trajectory.status),
            });
        }

        let now = Utc::now();
        if status == TrajectoryStatus::Running && trajectory.started_at.is_none() {
            trajectory.started_at = Some(now);
        }
        if status.is_terminal() {
            trajectory.ended_at = Some(now);
        }
        trajectory.status = status;
        trajectory.updated_at = now;
        Ok(())
    }

    /// Append one step to the trajectory and extend its hash chain.
    ///
    /// Rejects steps for trajectories that are not running, and steps whose
    /// number does not advance the trajectory's counter.
    async fn append(&self, id: &TrajectoryId, step: &AdjudicatedStep) -> TribunalResult<()> {
        let mut state = self.lock()?;
        let entry = state.entry_mut(id)?;

        if entry.trajectory.status != TrajectoryStatus::Running {
            return Err(TribunalError::TrajectoryState {
                reason: format!(
                    "cannot append to trajectory '{id}' while it is {:?}",
                    entry.trajectory.status
                ),
            });
        }
        if step.step <= entry.trajectory.step_count {
            return Err(TribunalError::Store {
                reason: format!(
                    "step {} does not advance trajectory '{id}' past step {}",
                    step.step, entry.trajectory.step_count
                ),
            });
        }

        let sequence = entry.events.len() as u64;
        let prev_hash = entry.last_hash().to_string();
        let this_hash = hash_step(id, sequence, step, &prev_hash)?;

        entry.events.push(StepEvent {
            sequence,
            trajectory_id: id.clone(),
            step: step.clone(),
            prev_hash,
            this_hash,
        });
        entry.trajectory.steps.push(step.clone());
        entry.trajectory.step_count = step.step;
        entry.trajectory.updated_at = Utc::now();
        Ok(())
    }

    async fn finalize(&self, id: &TrajectoryId, status: TrajectoryStatus) -> TribunalResult<()> {
        if !status.is_terminal() && status != TrajectoryStatus::Suspended {
            return Err(TribunalError::TrajectoryState {
                reason: format!("{status:?} is not a closing status"),
            });
        }

        let mut state = self.lock()?;
        let entry = state.entry_mut(id)?;
        if entry.trajectory.is_terminal() {
            return Err(TribunalError::TrajectoryState {
                reason: format!(
                    "trajectory '{id}' is already {:?}",
                    entry.trajectory.status
                ),
            });
        }

        let now = Utc::now();
        entry.trajectory.status = status;
        entry.trajectory.updated_at = now;
        if status.is_terminal() {
            entry.trajectory.ended_at = Some(now);
        }

        info!(
            trajectory_id = %id,
            status = ?status,
            event_count = entry.events.len(),
            terminal_hash = %entry.last_hash(),
            "trajectory log closed"
        );
        Ok(())
    }

    async fn get(&self, id: &TrajectoryId) -> TribunalResult<Option<Trajectory>> {
        let state = self.lock()?;
        Ok(state.entries.get(id).map(|e| e.trajectory.clone()))
    }

    async fn list(
        &self,
        filter: &TrajectoryFilter,
        page: &PageRequest,
    ) -> TribunalResult<Page<TrajectorySummary>> {
        let state = self.lock()?;
        let matching: Vec<TrajectorySummary> = state
            .in_order()
            .filter(|t| filter.matches(t))
            .map(TrajectorySummary::from)
            .collect();
        paginate(matching, page)
    }

    async fn analyze(
        &self,
        agent_id: &str,
        range: Option<TimeRange>,
    ) -> TribunalResult<TrajectoryAnalytics> {
        let range = range.unwrap_or_default();
        let state = self.lock()?;

        let mut analytics = TrajectoryAnalytics {
            agent_id: agent_id.to_string(),
            trajectory_count: 0,
            status_counts: BTreeMap::new(),
            step_count: 0,
            verdict_counts: BTreeMap::new(),
            policy_hits: BTreeMap::new(),
            computed_at: Utc::now(),
        };

        for trajectory in state
            .in_order()
            .filter(|t| t.agent_id == agent_id && range.contains(t.created_at))
        {
            analytics.trajectory_count += 1;
            *analytics.status_counts.entry(trajectory.status).or_default() += 1;
            for step in &trajectory.steps {
                analytics.step_count += 1;
                *analytics.verdict_counts.entry(step.decision.verdict).or_default() += 1;
                for policy in &step.decision.policies {
                    *analytics.policy_hits.entry(policy.id.clone()).or_default() += 1;
                }
            }
        }
        Ok(analytics)
    }

    async fn list_adjudications(
        &self,
        agent_id: Option<&str>,
        page: &PageRequest,
    ) -> TribunalResult<Page<AdjudicationRecord>> {
        let state = self.lock()?;
        let records: Vec<AdjudicationRecord> = state
            .in_order()
            .filter(|t| agent_id.map_or(true, |a| t.agent_id == a))
            .flat_map(|t| {
                t.steps.iter().map(move |s| AdjudicationRecord {
                    agent_id: t.agent_id.clone(),
                    trajectory_id: t.id.clone(),
                    step: s.step,
                    decision: s.decision.clone(),
                })
            })
            .collect();
        paginate(records, page)
    }

    /// Mark a non-terminal trajectory running again; its steps and chain are kept.
    async fn reopen(&self, id: &TrajectoryId) -> TribunalResult<Trajectory> {
        let mut state = self.lock()?;
        let trajectory = &mut state.entry_mut(id)?.trajectory;
        if trajectory.is_terminal() {
            return Err(TribunalError::TrajectoryState {
                reason: format!(
                    "trajectory '{id}' is {:?} and cannot be reopened",
                    trajectory.status
                ),
            });
        }

        let now = Utc::now();
        trajectory.status = TrajectoryStatus::Running;
        trajectory.updated_at = now;
        trajectory.started_at.get_or_insert(now);

        debug!(trajectory_id = %id, step_count = trajectory.step_count, "trajectory reopened");
        Ok(trajectory.clone())
    }
}

/// Slice `items` by the offset encoded in `page.page_token`.
///
/// A page size of zero falls back to `DEFAULT_PAGE_SIZE`.
fn paginate<T>(items: Vec<T>, page: &PageRequest) -> TribunalResult<Page<T>> {
    let offset = match page.page_token.as_deref() {
        None => 0,
        Some(token) => token.parse::<usize>().map_err(|_| TribunalError::Store {
            reason: format!("invalid page token '{token}'"),
        })?,
    };
    let size = if page.page_size == 0 {
        DEFAULT_PAGE_SIZE
    } else {
        page.page_size
    };

    let total = items.len();
    let end = offset.saturating_add(size).min(total);
    let next_page_token = (end < total).then(|| end.to_string());
    let items = items.into_iter().skip(offset).take(size).collect();

    Ok(Page {
        items,
        next_page_token,
    })
}
