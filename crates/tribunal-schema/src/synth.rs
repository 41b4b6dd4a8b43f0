//! Authorization schema synthesis.
//!
//! One namespace per agent, five fixed entity types, one action per tool and
//! the fixed `Prompt` action. Every tool action carries the four-field
//! context: typed `parameters` / `response` when a contract is known, and
//! the always-present `parameters_json` / `response_json` string fallbacks.

use std::collections::BTreeMap;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use tribunal_contracts::{
    agent::{AgentDescriptor, ToolDescriptor},
    error::{TribunalError, TribunalResult},
    sanitize_identifier,
    trajectory::Role,
};

use crate::types::{from_json_schema, is_fully_typed, Attribute, SchemaType};

pub const AGENT_TYPE: &str = "Agent";
pub const TOOL_TYPE: &str = "Tool";
pub const ROLE_TYPE: &str = "Role";
pub const MESSAGE_TYPE: &str = "Message";
pub const TRAJECTORY_TYPE: &str = "Trajectory";
pub const ACTION_TYPE: &str = "Action";

/// The conversational action every schema declares.
pub const PROMPT_ACTION: &str = "Prompt";

pub const CONTEXT_PARAMETERS: &str = "parameters";
pub const CONTEXT_PARAMETERS_JSON: &str = "parameters_json";
pub const CONTEXT_RESPONSE: &str = "response";
pub const CONTEXT_RESPONSE_JSON: &str = "response_json";

/// Shape of a declared entity type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityTypeDef {
    Shape {
        attributes: BTreeMap<String, Attribute>,
        member_of: Vec<String>,
    },
    /// An enumerated type whose only entities are the listed ids.
    Enum(Vec<String>),
}

impl EntityTypeDef {
    fn to_json(&self) -> Value {
        match self {
            EntityTypeDef::Shape { attributes, member_of } => {
                let mut def = Map::new();
                def.insert(
                    "shape".to_string(),
                    SchemaType::Record(attributes.clone()).to_json(),
                );
                if !member_of.is_empty() {
                    def.insert("memberOfTypes".to_string(), json!(member_of));
                }
                Value::Object(def)
            }
            EntityTypeDef::Enum(values) => json!({ "enum": values }),
        }
    }
}

/// A typed context field together with whether it was wrapped as `{value: ..}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypedField {
    pub ty: SchemaType,
    pub wrapped: bool,
}

/// One action of the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionDef {
    /// The unsanitized tool name, `None` for `Prompt`.
    pub tool: Option<String>,
    pub principal_types: Vec<String>,
    pub resource_types: Vec<String>,
    /// `None` means the action takes no context.
    pub context: Option<BTreeMap<String, Attribute>>,
    pub parameters: Option<TypedField>,
    pub response: Option<TypedField>,
}

impl ActionDef {
    fn to_json(&self) -> Value {
        let mut applies_to = Map::new();
        applies_to.insert("principalTypes".to_string(), json!(self.principal_types));
        applies_to.insert("resourceTypes".to_string(), json!(self.resource_types));
        if let Some(context) = &self.context {
            applies_to.insert(
                "context".to_string(),
                SchemaType::Record(context.clone()).to_json(),
            );
        }
        json!({ "appliesTo": Value::Object(applies_to) })
    }
}

/// The typed authorization schema synthesized for one agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationSchema {
    namespace: String,
    entity_types: BTreeMap<String, EntityTypeDef>,
    actions: BTreeMap<String, ActionDef>,
}

impl AuthorizationSchema {
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn entity_types(&self) -> &BTreeMap<String, EntityTypeDef> {
        &self.entity_types
    }

    pub fn actions(&self) -> &BTreeMap<String, ActionDef> {
        &self.actions
    }

    pub fn action(&self, name: &str) -> Option<&ActionDef> {
        self.actions.get(name)
    }

    /// The action a tool call under `tool_name` maps onto.
    pub fn tool_action(&self, tool_name: &str) -> Option<(String, &ActionDef)> {
        let action = sanitize_identifier(tool_name);
        self.actions
            .get(&action)
            .filter(|def| def.tool.is_some())
            .map(|def| (action, def))
    }

    /// Fully qualified entity type name, e.g. `Coding_Agent::Tool`.
    pub fn qualify(&self, type_name: &str) -> String {
        format!("{}::{}", self.namespace, type_name)
    }

    /// The schema in the evaluator's JSON format. Key order is stable.
    pub fn to_json(&self) -> Value {
        let entity_types: Map<String, Value> = self
            .entity_types
            .iter()
            .map(|(name, def)| (name.clone(), def.to_json()))
            .collect();
        let actions: Map<String, Value> = self
            .actions
            .iter()
            .map(|(name, def)| (name.clone(), def.to_json()))
            .collect();

        let mut root = Map::new();
        root.insert(
            self.namespace.clone(),
            json!({ "entityTypes": entity_types, "actions": actions }),
        );
        Value::Object(root)
    }

    pub fn to_json_string(&self) -> String {
        self.to_json().to_string()
    }

    /// Parse into the evaluator's schema type, surfacing every validation
    /// problem as `SchemaValidation`.
    pub fn to_cedar(&self) -> TribunalResult<cedar_policy::Schema> {
        cedar_policy::Schema::from_json_value(self.to_json()).map_err(|e| {
            TribunalError::SchemaValidation {
                reason: format!("namespace '{}': {}", self.namespace, e),
            }
        })
    }
}

/// Build and validate the authorization schema for `descriptor`.
///
/// # Errors
///
/// - `DuplicateAction` when two tools (or a tool and `Prompt`) share a
///   sanitized action name
/// - `SchemaValidation` when the agent name is empty or the evaluator
///   rejects the result
pub fn synthesize(descriptor: &AgentDescriptor) -> TribunalResult<AuthorizationSchema> {
    let namespace = sanitize_identifier(&descriptor.name);
    if namespace.is_empty() {
        return Err(TribunalError::SchemaValidation {
            reason: "agent name is empty; cannot derive a namespace".to_string(),
        });
    }

    let mut actions: BTreeMap<String, ActionDef> = BTreeMap::new();
    for tool in &descriptor.tools {
        let action = sanitize_identifier(&tool.name);
        if action == PROMPT_ACTION {
            return Err(TribunalError::DuplicateAction {
                action,
                first: PROMPT_ACTION.to_string(),
                second: tool.name.clone(),
            });
        }
        if let Some(existing) = actions.get(&action) {
            return Err(TribunalError::DuplicateAction {
                first: existing.tool.clone().unwrap_or_default(),
                second: tool.name.clone(),
                action,
            });
        }
        debug!(namespace = %namespace, tool = %tool.name, action = %action, "synthesizing tool action");
        actions.insert(action, tool_action(tool));
    }

    actions.insert(
        PROMPT_ACTION.to_string(),
        ActionDef {
            tool: None,
            principal_types: vec![AGENT_TYPE.to_string()],
            resource_types: vec![MESSAGE_TYPE.to_string()],
            context: None,
            parameters: None,
            response: None,
        },
    );

    let schema = AuthorizationSchema {
        namespace,
        entity_types: entity_types(),
        actions,
    };

    schema.to_cedar()?;

    info!(
        namespace = %schema.namespace,
        action_count = schema.actions.len(),
        "authorization schema synthesized"
    );
    Ok(schema)
}

fn entity_types() -> BTreeMap<String, EntityTypeDef> {
    let shape = |attrs: Vec<(&str, SchemaType)>, member_of: Vec<String>| EntityTypeDef::Shape {
        attributes: attrs
            .into_iter()
            .map(|(name, ty)| (name.to_string(), Attribute::required(ty)))
            .collect(),
        member_of,
    };

    let mut types = BTreeMap::new();
    types.insert(
        AGENT_TYPE.to_string(),
        shape(
            vec![
                ("name", SchemaType::String),
                ("provider_id", SchemaType::String),
                (
                    "tools",
                    SchemaType::Set(Box::new(SchemaType::Entity(TOOL_TYPE.to_string()))),
                ),
            ],
            vec![],
        ),
    );
    types.insert(
        TOOL_TYPE.to_string(),
        shape(
            vec![("name", SchemaType::String), ("description", SchemaType::String)],
            vec![],
        ),
    );
    types.insert(
        ROLE_TYPE.to_string(),
        EntityTypeDef::Enum(Role::ALL.iter().map(|r| r.as_str().to_string()).collect()),
    );
    types.insert(
        MESSAGE_TYPE.to_string(),
        shape(
            vec![
                ("content", SchemaType::String),
                ("role", SchemaType::Entity(ROLE_TYPE.to_string())),
            ],
            vec![TRAJECTORY_TYPE.to_string()],
        ),
    );
    types.insert(
        TRAJECTORY_TYPE.to_string(),
        shape(vec![("step_count", SchemaType::Long)], vec![]),
    );
    types
}

fn tool_action(tool: &ToolDescriptor) -> ActionDef {
    let parameters = typed_field(&tool.name, "parameters", tool.parameters_json_schema.as_deref());
    let response = typed_field(&tool.name, "response", tool.response_json_schema.as_deref());

    let mut context = BTreeMap::new();
    if let Some(field) = &parameters {
        context.insert(CONTEXT_PARAMETERS.to_string(), Attribute::optional(field.ty.clone()));
    }
    context.insert(
        CONTEXT_PARAMETERS_JSON.to_string(),
        Attribute::optional(SchemaType::String),
    );
    if let Some(field) = &response {
        context.insert(CONTEXT_RESPONSE.to_string(), Attribute::optional(field.ty.clone()));
    }
    context.insert(
        CONTEXT_RESPONSE_JSON.to_string(),
        Attribute::optional(SchemaType::String),
    );

    ActionDef {
        tool: Some(tool.name.clone()),
        principal_types: vec![AGENT_TYPE.to_string()],
        resource_types: vec![TRAJECTORY_TYPE.to_string()],
        context: Some(context),
        parameters,
        response,
    }
}

/// Derive the typed, record-shaped field for one JSON-Schema string.
/// An absent schema yields `None`. Unparsable and incomplete schemas are
/// logged and also yield `None`, leaving only the string fallback.
fn typed_field(tool: &str, field: &str, schema: Option<&str>) -> Option<TypedField> {
    let raw = schema?.trim();
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(raw) {
        Ok(parsed) if !is_fully_typed(&parsed) => {
            debug!(tool = %tool, field = %field, "incomplete JSON schema, using string fallback only");
            None
        }
        Ok(parsed) => {
            let (ty, wrapped) = from_json_schema(&parsed).into_record();
            Some(TypedField { ty, wrapped })
        }
        Err(e) => {
            warn!(tool = %tool, field = %field, error = %e, "unparsable JSON schema, using string fallback only");
            None
        }
    }
}
