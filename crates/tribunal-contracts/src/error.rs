//! Runtime error types for the Tribunal adjudication pipeline.
//!
//! All fallible operations in Tribunal return `TribunalResult<T>`.
//! Variants are grouped by the taxonomy the engine reasons about:
//! configuration, structural validation, trajectory state, internal
//! consistency, and introspection. None of them are retried internally.

use thiserror::Error;

/// The unified error type for the Tribunal runtime.
#[derive(Debug, Error)]
pub enum TribunalError {
    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    Config { reason: String },

    /// The policy set failed to parse or violates a structural invariant
    /// (missing `@id`, `@escalate` on a permit policy).
    #[error("policy error: {reason}")]
    Policy { reason: String },

    /// The synthesized authorization schema was rejected by the evaluator.
    #[error("schema validation error: {reason}")]
    SchemaValidation { reason: String },

    /// Two tools map onto the same action identifier after sanitization.
    #[error("tools '{first}' and '{second}' both sanitize to action '{action}'")]
    DuplicateAction {
        action: String,
        first: String,
        second: String,
    },

    /// A tool handed over by a host adapter could not be introspected.
    #[error("cannot introspect tool '{tool}': {reason}")]
    Introspection { tool: String, reason: String },

    /// An operation required an active trajectory and there was none.
    #[error("trajectory '{trajectory_id}' is not active; call initialize() or resume() first")]
    NotInitialized { trajectory_id: String },

    /// A lifecycle operation was attempted from an illegal trajectory state.
    #[error("trajectory state error: {reason}")]
    TrajectoryState { reason: String },

    /// The recorder holds no trajectory with this identifier.
    #[error("trajectory '{trajectory_id}' not found")]
    TrajectoryNotFound { trajectory_id: String },

    /// The backing trajectory store cannot reopen persisted trajectories.
    #[error("resuming trajectories is not supported by the {store} store")]
    ResumeUnsupported { store: String },

    /// The evaluator returned a policy identifier the policy store does not know.
    ///
    /// This signals the store and the evaluator have drifted out of sync and
    /// is never converted into an allow or deny.
    #[error("policy '{policy_id}' returned by the evaluator is not in the policy store")]
    PolicyNotFound { policy_id: String },

    /// A tool call named an action the authorization schema does not declare.
    #[error("action '{action}' is not declared in namespace '{namespace}'")]
    UnknownAction { action: String, namespace: String },

    /// The evaluator could not build or run the authorization request.
    #[error("evaluation error: {reason}")]
    Evaluation { reason: String },

    /// The trajectory store failed to read or persist data.
    #[error("trajectory store error: {reason}")]
    Store { reason: String },

    /// A governed action was blocked; raised by adapters that prefer errors
    /// over inspecting the decision.
    #[error("policy violation at {stage}: {reason}")]
    PolicyViolation { stage: String, reason: String },
}

/// Convenience alias used throughout the Tribunal crates.
pub type TribunalResult<T> = Result<T, TribunalError>;
