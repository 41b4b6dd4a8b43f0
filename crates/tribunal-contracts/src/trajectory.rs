//! Trajectory, step, and content types.
//!
//! A `Trajectory` is the ordered record of every adjudicated step in one
//! agent invocation. It is created when the invocation starts, grows by one
//! `AdjudicatedStep` per adjudication, and is closed when the invocation
//! ends. After that it exists only for read access by observability tools.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{TribunalError, TribunalResult};
use crate::policy::{Decision, EngineMode, Verdict};

/// Unique identifier for one trajectory, e.g. `traj-2f0c…`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TrajectoryId(pub String);

impl TrajectoryId {
    /// Create a new random trajectory ID.
    pub fn new() -> Self {
        Self(format!("traj-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TrajectoryId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TrajectoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TrajectoryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Lifecycle status of a trajectory.
///
/// `Pending → Running → {Completed, Failed}`, with `Suspended` as a
/// resumable pause. `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrajectoryStatus {
    Pending,
    Running,
    Suspended,
    Completed,
    Failed,
}

impl TrajectoryStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, TrajectoryStatus::Completed | TrajectoryStatus::Failed)
    }
}

/// The interception point at which a step is adjudicated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    PreRun,
    PreModel,
    PostModel,
    PreTool,
    PostTool,
    PostRun,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::PreRun => "pre_run",
            Stage::PreModel => "pre_model",
            Stage::PostModel => "post_model",
            Stage::PreTool => "pre_tool",
            Stage::PostTool => "post_tool",
            Stage::PostRun => "post_run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who produced the content of a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Model,
    Tool,
    System,
}

impl Role {
    /// Every role, in the order they are declared as schema enum members.
    pub const ALL: [Role; 4] = [Role::User, Role::Model, Role::System, Role::Tool];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Model => "model",
            Role::Tool => "tool",
            Role::System => "system",
        }
    }
}

/// What a step carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "content_type", rename_all = "snake_case")]
pub enum Content {
    /// Conversational text going to or coming from the model.
    Prompt { text: String },
    /// A request to invoke a tool with arguments.
    ToolRequest {
        tool_id: String,
        args: serde_json::Map<String, serde_json::Value>,
    },
    /// The payload a tool returned.
    ToolResponse {
        tool_id: String,
        response: serde_json::Value,
    },
}

impl Content {
    pub fn prompt(text: impl Into<String>) -> Self {
        Content::Prompt { text: text.into() }
    }

    /// Build a tool request from a JSON object. Non-object values become an
    /// empty argument map.
    pub fn tool_request(tool_id: impl Into<String>, args: serde_json::Value) -> Self {
        let args = match args {
            serde_json::Value::Object(map) => map,
            _ => serde_json::Map::new(),
        };
        Content::ToolRequest {
            tool_id: tool_id.into(),
            args,
        }
    }

    pub fn tool_response(tool_id: impl Into<String>, response: serde_json::Value) -> Self {
        Content::ToolResponse {
            tool_id: tool_id.into(),
            response,
        }
    }

    /// Discriminant string, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Content::Prompt { .. } => "prompt",
            Content::ToolRequest { .. } => "tool_request",
            Content::ToolResponse { .. } => "tool_response",
        }
    }
}

/// One step of a trajectory together with the decision it received.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicatedStep {
    /// The trajectory's step counter value for this adjudication (1-based).
    pub step: u64,
    pub stage: Stage,
    pub role: Role,
    pub content: Content,
    pub decision: Decision,
    pub mode: EngineMode,
    pub created_at: DateTime<Utc>,
}

impl AdjudicatedStep {
    /// True when the step was denied and the engine is enforcing.
    pub fn is_denied(&self) -> bool {
        self.decision.verdict == Verdict::Deny && self.mode == EngineMode::Govern
    }

    /// True when the step was escalated and the engine is enforcing.
    pub fn is_escalated(&self) -> bool {
        self.decision.verdict == Verdict::Escalate && self.mode == EngineMode::Govern
    }

    pub fn is_allowed(&self) -> bool {
        self.decision.verdict == Verdict::Allow
    }

    /// True when the host must not let the action through.
    pub fn blocks(&self) -> bool {
        self.is_denied() || self.is_escalated()
    }

    /// Steering text substituted for blocked content, e.g. `"Deny: …"`.
    pub fn message(&self) -> String {
        format!("{}: {}", self.decision.verdict, self.decision.reason)
    }

    /// Pass the step through unchanged, or turn a blocking step into
    /// `TribunalError::PolicyViolation` for adapters that short-circuit by error.
    pub fn enforce(self) -> TribunalResult<Self> {
        if self.blocks() {
            return Err(TribunalError::PolicyViolation {
                stage: self.stage.to_string(),
                reason: self.message(),
            });
        }
        Ok(self)
    }
}

/// The recorded execution trajectory of one agent invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trajectory {
    pub id: TrajectoryId,
    pub agent_id: String,
    pub status: TrajectoryStatus,
    #[serde(default)]
    pub metadata: BTreeMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub ended_at: Option<DateTime<Utc>>,
    /// Latest value of the adjudication step counter.
    pub step_count: u64,
    pub steps: Vec<AdjudicatedStep>,
}

impl Trajectory {
    /// A fresh, pending trajectory for `agent_id`.
    pub fn new(agent_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: TrajectoryId::new(),
            agent_id: agent_id.into(),
            status: TrajectoryStatus::Pending,
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
            started_at: None,
            ended_at: None,
            step_count: 0,
            steps: Vec::new(),
        }
    }

    /// Wall-clock duration between start and end, once both are known.
    pub fn duration(&self) -> Option<chrono::Duration> {
        match (self.started_at, self.ended_at) {
            (Some(start), Some(end)) => Some(end - start),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn is_active(&self) -> bool {
        self.status == TrajectoryStatus::Running
    }

    pub fn steps_by_role(&self, role: Role) -> impl Iterator<Item = &AdjudicatedStep> {
        self.steps.iter().filter(move |s| s.role == role)
    }

    pub fn steps_by_stage(&self, stage: Stage) -> impl Iterator<Item = &AdjudicatedStep> {
        self.steps.iter().filter(move |s| s.stage == stage)
    }
}

/// A flat record of one adjudication, as listed by observability tooling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdjudicationRecord {
    pub agent_id: String,
    pub trajectory_id: TrajectoryId,
    pub step: u64,
    pub decision: Decision,
}
