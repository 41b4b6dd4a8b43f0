//! # tribunal-schema
//!
//! Synthesizes the typed authorization schema for one agent from its
//! `AgentDescriptor`.
//!
//! The schema has one namespace named after the sanitized agent name, the
//! fixed entity types `Agent`, `Tool`, `Role`, `Message` and `Trajectory`,
//! one action per tool and the fixed `Prompt` action. Synthesis validates
//! the result with the evaluator before returning it; a schema that fails
//! validation is never handed out.
//!
//! ```rust,ignore
//! let schema = tribunal_schema::synthesize(&descriptor)?;
//! assert!(schema.action("Prompt").is_some());
//! ```

pub mod synth;
pub mod types;

pub use synth::{
    synthesize, ActionDef, AuthorizationSchema, EntityTypeDef, TypedField, ACTION_TYPE, AGENT_TYPE,
    CONTEXT_PARAMETERS, CONTEXT_PARAMETERS_JSON, CONTEXT_RESPONSE, CONTEXT_RESPONSE_JSON,
    MESSAGE_TYPE, PROMPT_ACTION, ROLE_TYPE, TOOL_TYPE, TRAJECTORY_TYPE,
};
pub use types::{from_json_schema, is_fully_typed, Attribute, SchemaType};
