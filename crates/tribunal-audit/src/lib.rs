//! # tribunal-audit
//!
//! Append-only, SHA-256 hash-chained trajectory recorder for the Tribunal
//! runtime.
//!
//! ## Overview
//!
//! Every adjudicated step appended to a trajectory is wrapped in a
//! `StepEvent` that links to the previous event of the same trajectory by
//! its hash. Editing a recorded step breaks the chain, and
//! `verify_integrity` reports it.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tribunal_audit::InMemoryTrajectoryStore;
//!
//! let store = Arc::new(InMemoryTrajectoryStore::new());
//! let harness = PolicyHarness::new(agent, schema, evaluator, policies, store.clone())?;
//! // ... run the agent ...
//! assert!(store.verify_integrity(traj.id())?);
//! let log = store.export_log(traj.id())?;
//! ```

pub mod chain;
pub mod event;
pub mod memory;

pub use chain::{hash_step, verify_chain};
pub use event::{StepEvent, TrajectoryLog};
pub use memory::InMemoryTrajectoryStore;

// ── Tests ────────────────────────────────────────────────────────────────────
