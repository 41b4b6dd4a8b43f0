//! The capability-set interface host adapters implement.
//!
//! Tribunal never reflects on framework objects itself. A host adapter
//! translates whatever its framework calls a tool into a `ToolHandle`:
//! either a plain callable signature or an object implementing
//! `ToolCapabilities`. Anything the adapter cannot classify is passed
//! through as `ToolHandle::Unrecognized` so introspection can reject it
//! instead of silently dropping it.

use std::fmt;
use std::sync::Arc;

use serde_json::{json, Map, Value};

use tribunal_contracts::agent::{ParameterDescriptor, SourceSnippet};

/// The declared type of a parameter or return value.
#[derive(Debug, Clone, PartialEq)]
pub enum ValueType {
    String,
    Integer,
    Number,
    Boolean,
    Array(Box<ValueType>),
    Object(Vec<FieldSpec>),
    /// A nullable value; the parameter is treated as not required.
    Optional(Box<ValueType>),
    /// No usable type information.
    Any,
}

/// One field of a `ValueType::Object`.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub ty: ValueType,
    pub required: bool,
}

impl ValueType {
    /// Primitive tag recorded on `ParameterDescriptor::type_tag`.
    pub fn type_tag(&self) -> &'static str {
        match self {
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Number => "number",
            ValueType::Boolean => "boolean",
            ValueType::Array(_) => "array",
            ValueType::Object(_) => "object",
            ValueType::Optional(inner) => inner.type_tag(),
            ValueType::Any => "any",
        }
    }

    /// True when nothing can be said about the value, even through `Optional`.
    pub fn is_any(&self) -> bool {
        match self {
            ValueType::Any => true,
            ValueType::Optional(inner) => inner.is_any(),
            _ => false,
        }
    }

    pub fn is_optional(&self) -> bool {
        matches!(self, ValueType::Optional(_))
    }

    /// Render as a JSON-Schema fragment. `Any` renders as `{}`.
    pub fn to_json_schema(&self) -> Value {
        match self {
            ValueType::String => json!({ "type": "string" }),
            ValueType::Integer => json!({ "type": "integer" }),
            ValueType::Number => json!({ "type": "number" }),
            ValueType::Boolean => json!({ "type": "boolean" }),
            ValueType::Array(element) => json!({ "type": "array", "items": element.to_json_schema() }),
            ValueType::Object(fields) => {
                let mut properties = Map::new();
                let mut required = Vec::new();
                for field in fields {
                    properties.insert(field.name.clone(), field.ty.to_json_schema());
                    if field.required && !field.ty.is_optional() {
                        required.push(Value::String(field.name.clone()));
                    }
                }
                json!({ "type": "object", "properties": properties, "required": required })
            }
            ValueType::Optional(inner) => inner.to_json_schema(),
            ValueType::Any => json!({}),
        }
    }
}

/// One parameter of a callable, as reflected by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamSpec {
    pub name: String,
    /// `None` when the host has no annotation for the parameter.
    pub annotation: Option<ValueType>,
    pub has_default: bool,
}

/// A plain callable: name, doc text, ordered parameters, return annotation.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct CallableSignature {
    pub name: String,
    pub doc: Option<String>,
    pub params: Vec<ParamSpec>,
    pub returns: Option<ValueType>,
    pub source: Option<SourceSnippet>,
}

impl CallableSignature {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    /// Add a parameter without a default value.
    pub fn param(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation: Some(ty),
            has_default: false,
        });
        self
    }

    /// Add a parameter that has a default value.
    pub fn param_with_default(mut self, name: impl Into<String>, ty: ValueType) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation: Some(ty),
            has_default: true,
        });
        self
    }

    /// Add a parameter the host could not annotate.
    pub fn untyped_param(mut self, name: impl Into<String>) -> Self {
        self.params.push(ParamSpec {
            name: name.into(),
            annotation: None,
            has_default: false,
        });
        self
    }

    pub fn returns(mut self, ty: ValueType) -> Self {
        self.returns = Some(ty);
        self
    }

    pub fn source(mut self, language: impl Into<String>, code: impl Into<String>) -> Self {
        self.source = Some(SourceSnippet {
            language: language.into(),
            code: code.into(),
        });
        self
    }
}

/// A tool object that describes itself.
///
/// Every method except `type_name` has a conservative default so adapters
/// only implement what their framework actually exposes.
pub trait ToolCapabilities: Send + Sync {
    /// Framework type name, used when the object has no `name`.
    fn type_name(&self) -> &str;

    fn name(&self) -> Option<String> {
        None
    }

    fn id(&self) -> Option<String> {
        None
    }

    fn description(&self) -> Option<String> {
        None
    }

    fn parameters(&self) -> Vec<ParameterDescriptor> {
        Vec::new()
    }

    fn parameters_json_schema(&self) -> Option<Value> {
        None
    }

    fn response_json_schema(&self) -> Option<Value> {
        None
    }

    fn source(&self) -> Option<SourceSnippet> {
        None
    }
}

/// One entry of an agent's tool list, as handed over by a host adapter.
#[derive(Clone)]
pub enum ToolHandle {
    Callable(CallableSignature),
    Object(Arc<dyn ToolCapabilities>),
    /// Something the adapter could not classify. Always rejected.
    Unrecognized { type_name: String },
}

impl fmt::Debug for ToolHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ToolHandle::Callable(sig) => f.debug_tuple("Callable").field(&sig.name).finish(),
            ToolHandle::Object(obj) => f.debug_tuple("Object").field(&obj.type_name()).finish(),
            ToolHandle::Unrecognized { type_name } => f
                .debug_struct("Unrecognized")
                .field("type_name", type_name)
                .finish(),
        }
    }
}

/// An agent as seen through a host adapter.
pub trait AgentHandle {
    fn name(&self) -> &str;

    fn provider_id(&self) -> &str;

    /// Stable identifier. Defaults to the agent name.
    fn id(&self) -> Option<String> {
        None
    }

    fn description(&self) -> String {
        String::new()
    }

    /// Rendered instruction text, if any.
    fn instruction(&self) -> Option<String> {
        None
    }

    fn tools(&self) -> Vec<ToolHandle>;
}

/// A plain-data `AgentHandle` for adapters that have already extracted
/// everything up front.
#[derive(Debug, Clone, Default)]
pub struct AgentSpec {
    pub id: Option<String>,
    pub provider_id: String,
    pub name: String,
    pub description: String,
    pub instruction: Option<String>,
    pub tools: Vec<ToolHandle>,
}

impl AgentHandle for AgentSpec {
    fn name(&self) -> &str {
        &self.name
    }

    fn provider_id(&self) -> &str {
        &self.provider_id
    }

    fn id(&self) -> Option<String> {
        self.id.clone()
    }

    fn description(&self) -> String {
        self.description.clone()
    }

    fn instruction(&self) -> Option<String> {
        self.instruction.clone()
    }

    fn tools(&self) -> Vec<ToolHandle> {
        self.tools.clone()
    }
}
