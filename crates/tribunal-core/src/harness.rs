//! The policy harness: trajectory lifecycle plus per-step adjudication.
//!
//! Each trajectory moves through `uninitialized → active → finalized`.
//! `initialize()` and `resume()` are the only ways to obtain a
//! `TrajectoryHandle`; every other operation takes one explicitly, so a
//! single harness can serve many concurrent runs of the same agent.
//!
//! Per step the harness:
//!
//!   increment step counter → route (stage, content) → Evaluator → merge → record
//!
//! Calls against one handle serialize on its mutex; different handles share
//! nothing mutable. A failed adjudication leaves the trajectory exactly as
//! it was.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::{json, Map, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tribunal_contracts::{
    agent::AgentDescriptor,
    error::{TribunalError, TribunalResult},
    policy::{Decision, EngineMode, Verdict},
    sanitize_identifier,
    trajectory::{AdjudicatedStep, Content, Role, Stage, TrajectoryId, TrajectoryStatus},
};
use tribunal_schema::{
    AuthorizationSchema, SchemaType, TypedField, ACTION_TYPE, AGENT_TYPE, CONTEXT_PARAMETERS, CONTEXT_PARAMETERS_JSON,
    CONTEXT_RESPONSE, CONTEXT_RESPONSE_JSON, MESSAGE_TYPE, PROMPT_ACTION, ROLE_TYPE, TOOL_TYPE,
    TRAJECTORY_TYPE,
};

use crate::entity::{Entity, EntityGraph, EntityUid};
use crate::merge::{merge, DEFAULT_ALLOW_REASON};
use crate::traits::{EvaluationRequest, Evaluator, Harness, PolicyCatalog, TrajectoryStore};

/// Mutable state of one active trajectory.
#[derive(Debug)]
pub(crate) struct ActiveTrajectory {
    pub(crate) step_count: u64,
    pub(crate) entities: EntityGraph,
    pub(crate) closed: bool,
}

/// Lock-free copies of the counters readers poll.
///
/// Written only while the state mutex is held, after the change commits.
#[derive(Debug)]
struct Progress {
    step_count: AtomicU64,
    closed: AtomicBool,
}

/// Explicit handle to an active trajectory.
///
/// Cloning the handle shares the same trajectory; adjudications through any
/// clone serialize.
#[derive(Debug, Clone)]
pub struct TrajectoryHandle {
    id: TrajectoryId,
    pub(crate) state: Arc<Mutex<ActiveTrajectory>>,
    progress: Arc<Progress>,
}

impl TrajectoryHandle {
    pub fn id(&self) -> &TrajectoryId {
        &self.id
    }

    /// Last committed step number. Never waits on an in-flight adjudication.
    pub fn step_count(&self) -> u64 {
        self.progress.step_count.load(Ordering::Acquire)
    }

    pub fn is_active(&self) -> bool {
        !self.progress.closed.load(Ordering::Acquire)
    }
}

/// Principal, action, resource and context for one routed step.
struct Route {
    action: EntityUid,
    resource: EntityUid,
    context: Map<String, Value>,
    /// Typed context key that may be dropped when the evaluator rejects it.
    fallback: Option<&'static str>,
}

/// Adjudicates the steps of one agent's trajectories against a policy set.
///
/// The descriptor, schema, evaluator and policy catalog are immutable after
/// construction and shared through `Arc`.
pub struct PolicyHarness {
    agent: Arc<AgentDescriptor>,
    schema: Arc<AuthorizationSchema>,
    evaluator: Arc<dyn Evaluator>,
    policies: Arc<dyn PolicyCatalog>,
    store: Arc<dyn TrajectoryStore>,
    mode: EngineMode,
    active: StdMutex<HashSet<TrajectoryId>>,
}

impl PolicyHarness {
    /// Wire the harness together.
    ///
    /// # Errors
    ///
    /// `TribunalError::Config` when `schema` was not synthesized for `agent`.
    pub fn new(
        agent: Arc<AgentDescriptor>,
        schema: Arc<AuthorizationSchema>,
        evaluator: Arc<dyn Evaluator>,
        policies: Arc<dyn PolicyCatalog>,
        store: Arc<dyn TrajectoryStore>,
    ) -> TribunalResult<Self> {
        let expected = sanitize_identifier(&agent.name);
        if schema.namespace() != expected {
            return Err(TribunalError::Config {
                reason: format!(
                    "schema namespace '{}' does not belong to agent '{}'",
                    schema.namespace(),
                    agent.name
                ),
            });
        }
        Ok(Self {
            agent,
            schema,
            evaluator,
            policies,
            store,
            mode: EngineMode::default(),
            active: StdMutex::new(HashSet::new()),
        })
    }

    pub fn with_mode(mut self, mode: EngineMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn agent(&self) -> &AgentDescriptor {
        &self.agent
    }

    pub fn schema(&self) -> &AuthorizationSchema {
        &self.schema
    }

    pub fn mode(&self) -> EngineMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn TrajectoryStore> {
        &self.store
    }

    /// Start a new trajectory for the agent.
    pub async fn initialize(&self) -> TribunalResult<TrajectoryHandle> {
        let trajectory = self.store.create(&self.agent.id).await?;
        self.store
            .update_status(&trajectory.id, TrajectoryStatus::Running)
            .await?;
        self.register(&trajectory.id)?;

        info!(
            trajectory_id = %trajectory.id,
            agent_id = %self.agent.id,
            mode = ?self.mode,
            "trajectory initialized"
        );
        Ok(self.handle(trajectory.id, 0))
    }

    /// Re-enter a persisted trajectory.
    ///
    /// # Errors
    ///
    /// - `ResumeUnsupported` when the store cannot reopen trajectories
    /// - `TrajectoryNotFound` for unknown ids
    /// - `TrajectoryState` when the id is already active here, is terminal,
    ///   or belongs to another agent
    pub async fn resume(&self, id: &TrajectoryId) -> TribunalResult<TrajectoryHandle> {
        if self.is_registered(id)? {
            return Err(TribunalError::TrajectoryState {
                reason: format!("trajectory '{id}' is already active"),
            });
        }

        let existing = self
            .store
            .get(id)
            .await?
            .ok_or_else(|| TribunalError::TrajectoryNotFound {
                trajectory_id: id.to_string(),
            })?;
        if existing.agent_id != self.agent.id {
            return Err(TribunalError::TrajectoryState {
                reason: format!(
                    "trajectory '{id}' belongs to agent '{}', not '{}'",
                    existing.agent_id, self.agent.id
                ),
            });
        }
        if existing.is_terminal() {
            return Err(TribunalError::TrajectoryState {
                reason: format!("trajectory '{id}' is {:?} and cannot be resumed", existing.status),
            });
        }

        self.register(id)?;
        let reopened = match self.store.reopen(id).await {
            Ok(t) => t,
            Err(e) => {
                self.unregister(id);
                return Err(e);
            }
        };

        info!(
            trajectory_id = %id,
            step_count = reopened.step_count,
            "trajectory resumed"
        );
        Ok(self.handle(reopened.id, reopened.step_count))
    }

    /// Adjudicate one step and return only the decision.
    pub async fn adjudicate(
        &self,
        trajectory: &TrajectoryHandle,
        stage: Stage,
        role: Role,
        content: Content,
    ) -> TribunalResult<Decision> {
        self.adjudicate_step(trajectory, stage, role, content)
            .await
            .map(|step| step.decision)
    }

    /// Adjudicate one step and return the recorded step.
    ///
    /// # Errors
    ///
    /// - `NotInitialized` when the trajectory was already closed
    /// - `UnknownAction` for a tool the schema does not declare
    /// - `PolicyNotFound` when the evaluator and policy store disagree
    /// - anything the evaluator or store reports
    pub async fn adjudicate_step(
        &self,
        trajectory: &TrajectoryHandle,
        stage: Stage,
        role: Role,
        content: Content,
    ) -> TribunalResult<AdjudicatedStep> {
        let mut active = trajectory.state.lock().await;
        if active.closed {
            return Err(TribunalError::NotInitialized {
                trajectory_id: trajectory.id.to_string(),
            });
        }

        let step_no = active.step_count + 1;
        debug!(
            trajectory_id = %trajectory.id,
            step = step_no,
            stage = %stage,
            content_kind = %content.kind(),
            "adjudicating step"
        );

        // Per-request copy: the message entity of a prompt step lives only
        // here, and any failure below leaves the trajectory untouched.
        let mut entities = active.entities.clone();
        entities.upsert(self.trajectory_entity(&trajectory.id, step_no));

        let decision = match self.route(&trajectory.id, stage, role, &content, &mut entities)? {
            None => Decision::allow(DEFAULT_ALLOW_REASON),
            Some(route) => {
                let mut request = EvaluationRequest {
                    principal: self.agent_uid(),
                    action: route.action,
                    resource: route.resource,
                    context: route.context,
                    entities,
                };
                let outcome = match (self.evaluator.authorize(&request).await, route.fallback) {
                    (Err(TribunalError::Evaluation { reason }), Some(field)) => {
                        warn!(
                            trajectory_id = %trajectory.id,
                            step = step_no,
                            field = field,
                            reason = %reason,
                            "typed context rejected, evaluating with JSON fallback only"
                        );
                        request.context.remove(field);
                        self.evaluator.authorize(&request).await?
                    }
                    (outcome, _) => outcome?,
                };
                for diagnostic in &outcome.diagnostics {
                    warn!(trajectory_id = %trajectory.id, step = step_no, diagnostic = %diagnostic, "policy evaluation diagnostic");
                }
                merge(&outcome, self.policies.as_ref())?
            }
        };

        match decision.verdict {
            Verdict::Allow => debug!(trajectory_id = %trajectory.id, step = step_no, "step allowed"),
            verdict => warn!(
                trajectory_id = %trajectory.id,
                step = step_no,
                verdict = ?verdict,
                reason = %decision.reason,
                enforced = self.mode == EngineMode::Govern,
                "step not allowed"
            ),
        }

        let step = AdjudicatedStep {
            step: step_no,
            stage,
            role,
            content,
            decision,
            mode: self.mode,
            created_at: Utc::now(),
        };
        self.store.append(&trajectory.id, &step).await?;

        active.step_count = step_no;
        active
            .entities
            .upsert(self.trajectory_entity(&trajectory.id, step_no));
        trajectory.progress.step_count.store(step_no, Ordering::Release);
        Ok(step)
    }

    /// Close the trajectory as completed.
    pub async fn finalize(&self, trajectory: &TrajectoryHandle) -> TribunalResult<()> {
        self.close(trajectory, TrajectoryStatus::Completed).await
    }

    /// Close the trajectory as failed.
    pub async fn fail(&self, trajectory: &TrajectoryHandle) -> TribunalResult<()> {
        self.close(trajectory, TrajectoryStatus::Failed).await
    }

    /// Pause the trajectory so it can be resumed later by id.
    pub async fn suspend(&self, trajectory: &TrajectoryHandle) -> TribunalResult<()> {
        self.close(trajectory, TrajectoryStatus::Suspended).await
    }

    async fn close(&self, trajectory: &TrajectoryHandle, status: TrajectoryStatus) -> TribunalResult<()> {
        let mut active = trajectory.state.try_lock().map_err(|_| TribunalError::TrajectoryState {
            reason: format!(
                "trajectory '{}' has an adjudication in flight",
                trajectory.id
            ),
        })?;
        if active.closed {
            return Err(TribunalError::NotInitialized {
                trajectory_id: trajectory.id.to_string(),
            });
        }

        self.store.finalize(&trajectory.id, status).await?;
        active.closed = true;
        trajectory.progress.closed.store(true, Ordering::Release);
        self.unregister(&trajectory.id);

        info!(
            trajectory_id = %trajectory.id,
            status = ?status,
            step_count = active.step_count,
            "trajectory closed"
        );
        Ok(())
    }

    // ── Request routing ──────────────────────────────────────────────────────

    fn route(
        &self,
        id: &TrajectoryId,
        stage: Stage,
        role: Role,
        content: &Content,
        entities: &mut EntityGraph,
    ) -> TribunalResult<Option<Route>> {
        match (stage, content) {
            (Stage::PreModel | Stage::PostModel, Content::Prompt { text }) => {
                let message = Entity::new(EntityUid::new(
                    self.schema.qualify(MESSAGE_TYPE),
                    uuid::Uuid::new_v4().to_string(),
                ))
                .attr("content", Value::String(text.clone()))
                .attr(
                    "role",
                    EntityUid::new(self.schema.qualify(ROLE_TYPE), role.as_str()).to_attr(),
                )
                .parent(self.trajectory_uid(id));
                let resource = message.uid.clone();
                entities.insert(message);

                Ok(Some(Route {
                    action: self.action_uid(PROMPT_ACTION),
                    resource,
                    context: Map::new(),
                    fallback: None,
                }))
            }
            (Stage::PreTool, Content::ToolRequest { tool_id, args }) => {
                let (action, def) = self.tool_action(tool_id)?;
                let args = Value::Object(args.clone());

                let mut context = Map::new();
                context.insert(CONTEXT_PARAMETERS_JSON.to_string(), Value::String(args.to_string()));
                let mut fallback = None;
                if let Some(field) = &def.parameters {
                    if declares_every_key(field, &args) {
                        fallback = Some(CONTEXT_PARAMETERS);
                    }
                    context.insert(CONTEXT_PARAMETERS.to_string(), wrap(args, field.wrapped));
                }

                Ok(Some(Route {
                    action: self.action_uid(&action),
                    resource: self.trajectory_uid(id),
                    context,
                    fallback,
                }))
            }
            (Stage::PostTool, Content::ToolResponse { tool_id, response }) => {
                let (action, def) = self.tool_action(tool_id)?;

                let mut context = Map::new();
                context.insert(
                    CONTEXT_RESPONSE_JSON.to_string(),
                    Value::String(response.to_string()),
                );
                let mut fallback = None;
                if let Some(field) = &def.response {
                    if declares_every_key(field, response) {
                        fallback = Some(CONTEXT_RESPONSE);
                    }
                    context.insert(CONTEXT_RESPONSE.to_string(), wrap(response.clone(), field.wrapped));
                }

                Ok(Some(Route {
                    action: self.action_uid(&action),
                    resource: self.trajectory_uid(id),
                    context,
                    fallback,
                }))
            }
            _ => Ok(None),
        }
    }

    fn tool_action(&self, tool_id: &str) -> TribunalResult<(String, &tribunal_schema::ActionDef)> {
        self.schema
            .tool_action(tool_id)
            .ok_or_else(|| TribunalError::UnknownAction {
                action: sanitize_identifier(tool_id),
                namespace: self.schema.namespace().to_string(),
            })
    }

    // ── Entities ─────────────────────────────────────────────────────────────

    fn handle(&self, id: TrajectoryId, step_count: u64) -> TrajectoryHandle {
        let state = ActiveTrajectory {
            step_count,
            entities: self.base_entities(&id, step_count),
            closed: false,
        };
        TrajectoryHandle {
            id,
            state: Arc::new(Mutex::new(state)),
            progress: Arc::new(Progress {
                step_count: AtomicU64::new(step_count),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Agent, tools and trajectory: the graph every request starts from.
    fn base_entities(&self, id: &TrajectoryId, step_count: u64) -> EntityGraph {
        let mut graph = EntityGraph::new();
        graph.upsert(self.trajectory_entity(id, step_count));

        let mut tool_refs = Vec::with_capacity(self.agent.tools.len());
        for tool in &self.agent.tools {
            let uid = EntityUid::new(self.schema.qualify(TOOL_TYPE), tool.effective_id());
            tool_refs.push(uid.to_attr());
            graph.upsert(
                Entity::new(uid)
                    .attr("name", json!(tool.name))
                    .attr("description", json!(tool.description)),
            );
        }

        graph.upsert(
            Entity::new(self.agent_uid())
                .attr("name", json!(self.agent.name))
                .attr("provider_id", json!(self.agent.provider_id))
                .attr("tools", Value::Array(tool_refs)),
        );
        graph
    }

    fn trajectory_entity(&self, id: &TrajectoryId, step_count: u64) -> Entity {
        Entity::new(self.trajectory_uid(id)).attr("step_count", json!(step_count))
    }

    fn agent_uid(&self) -> EntityUid {
        EntityUid::new(self.schema.qualify(AGENT_TYPE), self.agent.id.clone())
    }

    fn trajectory_uid(&self, id: &TrajectoryId) -> EntityUid {
        EntityUid::new(self.schema.qualify(TRAJECTORY_TYPE), id.as_str())
    }

    fn action_uid(&self, action: &str) -> EntityUid {
        EntityUid::new(self.schema.qualify(ACTION_TYPE), action)
    }

    // ── Active registry ──────────────────────────────────────────────────────

    fn register(&self, id: &TrajectoryId) -> TribunalResult<()> {
        let mut active = self.active.lock().map_err(|_| registry_poisoned())?;
        if !active.insert(id.clone()) {
            return Err(TribunalError::TrajectoryState {
                reason: format!("trajectory '{id}' is already active"),
            });
        }
        Ok(())
    }

    fn is_registered(&self, id: &TrajectoryId) -> TribunalResult<bool> {
        let active = self.active.lock().map_err(|_| registry_poisoned())?;
        Ok(active.contains(id))
    }

    /// Removal only shrinks the set, so a poisoned registry is still usable.
    fn unregister(&self, id: &TrajectoryId) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        active.remove(id);
    }
}

fn registry_poisoned() -> TribunalError {
    TribunalError::TrajectoryState {
        reason: "active trajectory registry lock poisoned".to_string(),
    }
}

/// False when `value` carries keys a declared, unwrapped record does not
/// list. Such values stay bound to the typed contract and never fall back.
fn declares_every_key(field: &TypedField, value: &Value) -> bool {
    match (&field.ty, value) {
        (SchemaType::Record(attributes), Value::Object(map)) if !field.wrapped => {
            map.keys().all(|key| attributes.contains_key(key))
        }
        _ => true,
    }
}

/// Mirror of the schema's `{value: ..}` wrapping for non-record contracts.
fn wrap(value: Value, wrapped: bool) -> Value {
    if wrapped {
        json!({ "value": value })
    } else {
        value
    }
}

#[async_trait]
impl Harness for PolicyHarness {
    async fn initialize(&self) -> TribunalResult<TrajectoryHandle> {
        PolicyHarness::initialize(self).await
    }

    async fn resume(&self, id: &TrajectoryId) -> TribunalResult<TrajectoryHandle> {
        PolicyHarness::resume(self, id).await
    }

    async fn adjudicate(
        &self,
        trajectory: &TrajectoryHandle,
        stage: Stage,
        role: Role,
        content: Content,
    ) -> TribunalResult<Decision> {
        PolicyHarness::adjudicate(self, trajectory, stage, role, content).await
    }

    async fn finalize(&self, trajectory: &TrajectoryHandle) -> TribunalResult<()> {
        PolicyHarness::finalize(self, trajectory).await
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
