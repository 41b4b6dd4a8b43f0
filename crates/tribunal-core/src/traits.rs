//! Core trait definitions for the Tribunal adjudication pipeline.
//!
//! These traits mark the seams between the engine and its collaborators:
//!
//! - `Evaluator`: the black-box policy evaluator
//! - `PolicyCatalog`: resolves evaluator policy ids to their annotations
//! - `TrajectoryStore`: records trajectories and serves them back to tooling
//! - `Harness`: the single adjudication entry point host bindings call
//!
//! The engine owns the merge rule; none of these traits may decide between
//! DENY and ESCALATE on their own.

use async_trait::async_trait;
use serde_json::{Map, Value};

use tribunal_contracts::{
    error::{TribunalError, TribunalResult},
    policy::{Decision, PolicyRecord},
    query::{Page, PageRequest, TimeRange, TrajectoryAnalytics, TrajectoryFilter, TrajectorySummary},
    trajectory::{
        AdjudicatedStep, AdjudicationRecord, Content, Role, Stage, Trajectory, TrajectoryId,
        TrajectoryStatus,
    },
};

use crate::entity::{EntityGraph, EntityUid};
use crate::harness::TrajectoryHandle;

/// The raw effect an evaluator reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Allow,
    Deny,
}

/// One authorization request: principal, action, resource, context, and
/// the entity graph they live in.
#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub principal: EntityUid,
    pub action: EntityUid,
    pub resource: EntityUid,
    pub context: Map<String, Value>,
    pub entities: EntityGraph,
}

/// What the evaluator decided and which policies determined it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationOutcome {
    pub effect: Effect,
    /// Internal (evaluator-assigned) ids of the determining policies.
    pub policy_ids: Vec<String>,
    /// Non-fatal evaluation problems, e.g. a policy that errored and was skipped.
    pub diagnostics: Vec<String>,
}

/// The policy evaluator.
///
/// Implementations hold the full policy set and the validated schema.
/// Remote evaluators may suspend here; timeouts belong to the transport.
#[async_trait]
pub trait Evaluator: Send + Sync {
    async fn authorize(&self, request: &EvaluationRequest) -> TribunalResult<EvaluationOutcome>;
}

/// Lookup of loaded policies by evaluator-assigned id.
pub trait PolicyCatalog: Send + Sync {
    fn policy(&self, internal_id: &str) -> Option<&PolicyRecord>;
}

/// The trajectory recorder.
///
/// Backed by anything from an ephemeral in-memory map to an authenticated
/// remote service; the engine only relies on this contract.
#[async_trait]
pub trait TrajectoryStore: Send + Sync {
    /// Short name used in error messages.
    fn name(&self) -> &str;

    /// Create a pending trajectory for `agent_id`.
    async fn create(&self, agent_id: &str) -> TribunalResult<Trajectory>;

    async fn update_status(&self, id: &TrajectoryId, status: TrajectoryStatus) -> TribunalResult<()>;

    /// Append one adjudicated step. Fails on terminal trajectories.
    async fn append(&self, id: &TrajectoryId, step: &AdjudicatedStep) -> TribunalResult<()>;

    /// Close the trajectory with a terminal or suspended status.
    async fn finalize(&self, id: &TrajectoryId, status: TrajectoryStatus) -> TribunalResult<()>;

    async fn get(&self, id: &TrajectoryId) -> TribunalResult<Option<Trajectory>>;

    async fn list(
        &self,
        filter: &TrajectoryFilter,
        page: &PageRequest,
    ) -> TribunalResult<Page<TrajectorySummary>>;

    async fn analyze(
        &self,
        agent_id: &str,
        range: Option<TimeRange>,
    ) -> TribunalResult<TrajectoryAnalytics>;

    async fn list_adjudications(
        &self,
        agent_id: Option<&str>,
        page: &PageRequest,
    ) -> TribunalResult<Page<AdjudicationRecord>>;

    /// Reopen a persisted, non-terminal trajectory and mark it running.
    ///
    /// Stores without durable state keep this default and fail loudly.
    async fn reopen(&self, _id: &TrajectoryId) -> TribunalResult<Trajectory> {
        Err(TribunalError::ResumeUnsupported {
            store: self.name().to_string(),
        })
    }
}

/// The adjudication entry point for host runtime bindings.
///
/// Every call takes an explicit `TrajectoryHandle`; a harness instance can
/// serve many concurrent runs of the same agent.
#[async_trait]
pub trait Harness: Send + Sync {
    async fn initialize(&self) -> TribunalResult<TrajectoryHandle>;

    async fn resume(&self, id: &TrajectoryId) -> TribunalResult<TrajectoryHandle>;

    async fn adjudicate(
        &self,
        trajectory: &TrajectoryHandle,
        stage: Stage,
        role: Role,
        content: Content,
    ) -> TribunalResult<Decision>;

    async fn finalize(&self, trajectory: &TrajectoryHandle) -> TribunalResult<()>;
}
