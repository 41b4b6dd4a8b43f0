//! Chained step events and exported trajectory logs.
//!
//! `StepEvent` wraps one `AdjudicatedStep` with its position in the
//! trajectory's hash chain. `TrajectoryLog` is what `export_log` hands to
//! auditors: the trajectory header plus every event in chain order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use tribunal_contracts::{
    query::TrajectorySummary,
    trajectory::{AdjudicatedStep, TrajectoryId},
};

/// A single entry in one trajectory's SHA-256 hash chain.
///
/// Changing any field, including anything inside `step`, invalidates
/// `this_hash` and every later `prev_hash`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepEvent {
    /// Position in the chain, starting at 0.
    pub sequence: u64,

    pub trajectory_id: TrajectoryId,

    pub step: AdjudicatedStep,

    /// `this_hash` of the previous event, or `GENESIS_HASH` for the first.
    pub prev_hash: String,

    /// Hex SHA-256 over (trajectory_id, sequence, prev_hash, step JSON).
    pub this_hash: String,
}

impl StepEvent {
    /// The `prev_hash` of the first event in every chain: 64 hex zeros.
    pub const GENESIS_HASH: &'static str =
        "0000000000000000000000000000000000000000000000000000000000000000";
}

/// An exported, verifiable record of one trajectory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryLog {
    pub trajectory: TrajectorySummary,

    /// Events in chain order (sequence 0 first).
    pub events: Vec<StepEvent>,

    pub exported_at: DateTime<Utc>,

    /// `this_hash` of the last event. Empty when nothing was recorded.
    pub terminal_hash: String,
}
