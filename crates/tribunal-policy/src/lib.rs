//! # tribunal-policy
//!
//! Cedar-backed policy loading and evaluation for the Tribunal runtime.
//!
//! - `PolicyStore` parses a Cedar policy set and enforces the structural
//!   annotation rules (`@id` required, `@escalate` only on `forbid`)
//! - `CedarEvaluator` implements `tribunal_core::Evaluator` against one
//!   agent's synthesized schema
//! - `HarnessConfig` reads the TOML configuration and environment overrides
//! - `build_harness` wires all of it into a ready `PolicyHarness`
//!
//! ## Policy format
//!
//! ```cedar
//! @id("no-etc-passwd")
//! @reason("Reading /etc/passwd is not allowed")
//! forbid(principal, action == Coding_Agent::Action::"read_file", resource)
//! when { context has parameters && context.parameters.path == "/etc/passwd" };
//!
//! @id("review-exec")
//! @reason("Shell commands need human review")
//! @escalate("security-team")
//! forbid(principal, action == Coding_Agent::Action::"execute_command", resource);
//! ```

pub mod bootstrap;
pub mod config;
pub mod evaluator;
pub mod store;

pub use bootstrap::build_harness;
pub use config::{HarnessConfig, PolicySection, PolicySource};
pub use evaluator::{validate_policies, CedarEvaluator};
pub use store::PolicyStore;

// ── Tests ────────────────────────────────────────────────────────────────────
