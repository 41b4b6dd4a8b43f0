//! # tribunal-core
//!
//! The trajectory-scoped adjudication engine for Tribunal.
//!
//! This crate provides:
//! - The collaborator traits (`Evaluator`, `PolicyCatalog`, `TrajectoryStore`, `Harness`)
//! - The evaluator-neutral `EntityGraph` requests are built from
//! - The merge rule that turns an evaluator outcome into ALLOW / DENY / ESCALATE
//! - `PolicyHarness`, which owns the trajectory lifecycle and routes each step
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tribunal_core::PolicyHarness;
//!
//! let traj = harness.initialize().await?;
//! let decision = harness
//!     .adjudicate(&traj, Stage::PreTool, Role::Model, Content::tool_request("bash", args))
//!     .await?;
//! harness.finalize(&traj).await?;
//! ```

pub mod entity;
pub mod harness;
pub mod merge;
pub mod traits;

pub use entity::{Entity, EntityGraph, EntityUid};
pub use harness::{PolicyHarness, TrajectoryHandle};
pub use merge::merge;
pub use traits::{
    Effect, EvaluationOutcome, EvaluationRequest, Evaluator, Harness, PolicyCatalog,
    TrajectoryStore,
};
