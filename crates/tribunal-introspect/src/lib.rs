//! # tribunal-introspect
//!
//! Framework-agnostic capability introspection for governed agents.
//!
//! Host adapters describe their agent through [`AgentHandle`] and each tool
//! through a [`ToolHandle`]; [`introspect`] normalizes that into an
//! [`AgentDescriptor`](tribunal_contracts::agent::AgentDescriptor) the schema
//! synthesizer can consume.
//!
//! ```rust,ignore
//! use tribunal_introspect::{introspect, AgentSpec, CallableSignature, ToolHandle, ValueType};
//!
//! let agent = AgentSpec {
//!     name: "Coding Agent".into(),
//!     provider_id: "local".into(),
//!     tools: vec![ToolHandle::Callable(
//!         CallableSignature::new("read_file").param("path", ValueType::String),
//!     )],
//!     ..Default::default()
//! };
//! let descriptor = introspect(&agent)?;
//! ```

pub mod handle;
pub mod introspect;

pub use handle::{
    AgentHandle, AgentSpec, CallableSignature, FieldSpec, ParamSpec, ToolCapabilities, ToolHandle,
    ValueType,
};
pub use introspect::{introspect, Introspector, DEFAULT_SKIPPED_PARAMS};
