//! Hash-chain primitives: hashing and chain integrity verification.
//!
//! Hash input layout (bytes, in order):
//!   1. trajectory_id as UTF-8 bytes
//!   2. sequence as 8-byte little-endian
//!   3. prev_hash as UTF-8 bytes (64 ASCII hex chars)
//!   4. compact JSON of the adjudicated step

use sha2::{Digest, Sha256};

use tribunal_contracts::{
    error::{TribunalError, TribunalResult},
    trajectory::{AdjudicatedStep, TrajectoryId},
};

use crate::event::StepEvent;

/// Compute the SHA-256 hash for one step event as a lowercase hex string.
///
/// # Errors
///
/// `TribunalError::Store` if the step cannot be serialized.
pub fn hash_step(
    trajectory_id: &TrajectoryId,
    sequence: u64,
    step: &AdjudicatedStep,
    prev_hash: &str,
) -> TribunalResult<String> {
    let step_json = serde_json::to_vec(step).map_err(|e| TribunalError::Store {
        reason: format!("failed to serialize step {} for hashing: {}", step.step, e),
    })?;

    let mut hasher = Sha256::new();
    hasher.update(trajectory_id.as_str().as_bytes());
    hasher.update(sequence.to_le_bytes());
    hasher.update(prev_hash.as_bytes());
    hasher.update(&step_json);

    Ok(hex::encode(hasher.finalize()))
}

/// Verify a hash chain.
///
/// Valid when every event's `prev_hash` links to the event before it (or
/// to `GENESIS_HASH`), its sequence matches its position, and its
/// `this_hash` matches the recomputed value. An empty chain is valid.
pub fn verify_chain(events: &[StepEvent]) -> bool {
    let mut expected_prev = StepEvent::GENESIS_HASH.to_string();

    for (position, event) in events.iter().enumerate() {
        if event.sequence != position as u64 || event.prev_hash != expected_prev {
            return false;
        }

        match hash_step(&event.trajectory_id, event.sequence, &event.step, &event.prev_hash) {
            Ok(recomputed) if recomputed == event.this_hash => {}
            _ => return false,
        }

        expected_prev = event.this_hash.clone();
    }

    true
}
