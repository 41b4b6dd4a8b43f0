//! Agent and tool descriptors.
//!
//! An `AgentDescriptor` is the framework-agnostic view of a governed agent:
//! who it is and which tools it can call. It is produced once by the
//! introspector and then treated as immutable for the lifetime of every
//! trajectory that agent runs.

use serde::{Deserialize, Serialize};

/// One declared parameter of a tool.
///
/// `type_tag` is a primitive tag ("string", "integer", "number", "boolean",
/// "array", "object", "any") kept for display and metadata; the typed
/// authorization context is derived from the JSON-Schema instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterDescriptor {
    pub name: String,
    pub description: String,
    pub type_tag: String,
}

/// Source code retained for audit, when the host can provide it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceSnippet {
    pub language: String,
    pub code: String,
}

/// A single callable tool exposed to the agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Optional stable identifier. Falls back to `name` when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Unique within one agent. Becomes a policy-addressable action name,
    /// so it must be deterministic across repeated introspection.
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParameterDescriptor>,
    /// JSON-Schema document (as a string) describing the parameter object.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parameters_json_schema: Option<String>,
    /// Human-readable return type name, when one was declared.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<String>,
    /// JSON-Schema document (as a string) describing the tool's response.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_json_schema: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceSnippet>,
}

impl ToolDescriptor {
    /// The identifier used for the tool's entity: `id` if set, else `name`.
    pub fn effective_id(&self) -> &str {
        self.id.as_deref().unwrap_or(&self.name)
    }
}

/// Normalized description of a governed agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    pub id: String,
    /// Which host framework or vendor produced the agent (e.g. "google").
    pub provider_id: String,
    pub name: String,
    pub description: String,
    /// The agent's system instruction or goal text.
    pub instruction: String,
    /// Tools in declaration order.
    pub tools: Vec<ToolDescriptor>,
}

impl AgentDescriptor {
    /// Look up a tool by its exact (unsanitized) name.
    pub fn tool(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }
}
