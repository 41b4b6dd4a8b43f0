//! Turns an `AgentHandle` into an `AgentDescriptor`.
//!
//! Introspection is a pure transformation: the same handle always yields the
//! same descriptor, and a single unrecognized tool fails the whole call
//! without returning a partial descriptor.

use std::collections::BTreeSet;

use serde_json::{json, Map, Value};
use tracing::{debug, info};

use tribunal_contracts::{
    agent::{AgentDescriptor, ParameterDescriptor, SourceSnippet, ToolDescriptor},
    error::{TribunalError, TribunalResult},
};

use crate::handle::{AgentHandle, CallableSignature, ParamSpec, ToolCapabilities, ToolHandle};

/// Parameter names host frameworks inject into tool callables.
pub const DEFAULT_SKIPPED_PARAMS: [&str; 3] = ["self", "cls", "tool_context"];

/// Language recorded on placeholder snippets when a host gives no source.
const PLACEHOLDER_LANGUAGE: &str = "text";

/// Builds `AgentDescriptor`s from host adapter handles.
#[derive(Debug, Clone)]
pub struct Introspector {
    skipped_params: BTreeSet<String>,
}

impl Default for Introspector {
    fn default() -> Self {
        Self {
            skipped_params: DEFAULT_SKIPPED_PARAMS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl Introspector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also skip `name` when reflecting callable parameters.
    pub fn skip_param(mut self, name: impl Into<String>) -> Self {
        self.skipped_params.insert(name.into());
        self
    }

    /// Produce the descriptor for `agent`.
    ///
    /// # Errors
    ///
    /// `TribunalError::Introspection` when any tool is
    /// `ToolHandle::Unrecognized` or an object tool has neither a name nor a
    /// type name to fall back on.
    pub fn introspect(&self, agent: &dyn AgentHandle) -> TribunalResult<AgentDescriptor> {
        let name = agent.name().to_string();
        if name.trim().is_empty() {
            return Err(TribunalError::Introspection {
                tool: String::new(),
                reason: "agent name must not be empty".to_string(),
            });
        }

        let handles = agent.tools();
        let mut tools = Vec::with_capacity(handles.len());
        for handle in &handles {
            debug!(agent = %name, tool = ?handle, "analyzing tool");
            tools.push(self.describe_tool(handle)?);
        }

        info!(agent = %name, tool_count = tools.len(), "agent introspected");

        Ok(AgentDescriptor {
            id: agent.id().unwrap_or_else(|| name.clone()),
            provider_id: agent.provider_id().to_string(),
            description: agent.description(),
            instruction: agent.instruction().unwrap_or_default(),
            name,
            tools,
        })
    }

    fn describe_tool(&self, handle: &ToolHandle) -> TribunalResult<ToolDescriptor> {
        match handle {
            ToolHandle::Callable(sig) => Ok(self.describe_callable(sig)),
            ToolHandle::Object(obj) => describe_object(obj.as_ref()),
            ToolHandle::Unrecognized { type_name } => Err(TribunalError::Introspection {
                tool: type_name.clone(),
                reason: format!(
                    "'{type_name}' is neither a callable nor a recognized tool object"
                ),
            }),
        }
    }

    fn describe_callable(&self, sig: &CallableSignature) -> ToolDescriptor {
        let kept: Vec<&ParamSpec> = sig
            .params
            .iter()
            .filter(|p| !self.skipped_params.contains(&p.name))
            .collect();

        let parameters = kept
            .iter()
            .map(|p| ParameterDescriptor {
                name: p.name.clone(),
                description: param_description(&p.name, sig.doc.as_deref()),
                type_tag: p
                    .annotation
                    .as_ref()
                    .map_or("any", |ty| ty.type_tag())
                    .to_string(),
            })
            .collect();

        let description = sig
            .doc
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("Function {}", sig.name));

        // An absent or `Any` return annotation means "no response contract";
        // it is omitted rather than defaulted.
        let returns = sig.returns.as_ref().filter(|ty| !ty.is_any());

        ToolDescriptor {
            id: None,
            name: sig.name.clone(),
            description,
            parameters,
            parameters_json_schema: Some(parameters_schema(&kept).to_string()),
            response: returns.map(|ty| ty.type_tag().to_string()),
            response_json_schema: returns.map(|ty| ty.to_json_schema().to_string()),
            source: Some(sig.source.clone().unwrap_or_else(|| SourceSnippet {
                language: PLACEHOLDER_LANGUAGE.to_string(),
                code: format!("# Source code not available for {}", sig.name),
            })),
        }
    }
}

/// Introspect with the default skipped-parameter set.
pub fn introspect(agent: &dyn AgentHandle) -> TribunalResult<AgentDescriptor> {
    Introspector::default().introspect(agent)
}

fn describe_object(obj: &dyn ToolCapabilities) -> TribunalResult<ToolDescriptor> {
    let type_name = obj.type_name();
    let name = obj
        .name()
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| type_name.to_string());
    if name.trim().is_empty() {
        return Err(TribunalError::Introspection {
            tool: String::new(),
            reason: "tool object exposes neither a name nor a type name".to_string(),
        });
    }

    let description = obj
        .description()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or_else(|| format!("Tool {name}"));

    let source = obj.source().unwrap_or_else(|| SourceSnippet {
        language: PLACEHOLDER_LANGUAGE.to_string(),
        code: format!("# {type_name} instance: {name}"),
    });

    let response_schema = obj.response_json_schema().filter(|s| !is_any_schema(s));

    Ok(ToolDescriptor {
        id: obj.id(),
        description,
        parameters: obj.parameters(),
        parameters_json_schema: obj.parameters_json_schema().map(|s| s.to_string()),
        response: response_schema
            .as_ref()
            .and_then(|s| s.get("type"))
            .and_then(Value::as_str)
            .map(str::to_string),
        response_json_schema: response_schema.map(|s| s.to_string()),
        source: Some(source),
        name,
    })
}

/// `{type: object, properties: {...}, required: [...]}` for the kept
/// parameters. Unannotated parameters get an empty (`any`) schema.
fn parameters_schema(params: &[&ParamSpec]) -> Value {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in params {
        let schema = param
            .annotation
            .as_ref()
            .map_or_else(|| json!({}), |ty| ty.to_json_schema());
        properties.insert(param.name.clone(), schema);

        let optional = param.annotation.as_ref().is_some_and(|ty| ty.is_optional());
        if !param.has_default && !optional {
            required.push(Value::String(param.name.clone()));
        }
    }
    json!({ "type": "object", "properties": properties, "required": required })
}

/// The first doc line mentioning the parameter, else a generic label.
fn param_description(name: &str, doc: Option<&str>) -> String {
    doc.and_then(|d| d.lines().map(str::trim).find(|line| line.contains(name)))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Parameter {name}"))
}

fn is_any_schema(schema: &Value) -> bool {
    schema.as_object().map_or(true, |o| o.is_empty())
}
