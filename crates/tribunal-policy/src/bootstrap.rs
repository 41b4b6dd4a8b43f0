//! Wiring a `PolicyHarness` from configuration.

use std::sync::Arc;

use tracing::info;

use tribunal_contracts::{agent::AgentDescriptor, error::TribunalResult};
use tribunal_core::{PolicyHarness, TrajectoryStore};
use tribunal_schema::synthesize;

use crate::config::HarnessConfig;
use crate::evaluator::CedarEvaluator;
use crate::store::PolicyStore;

/// Synthesize the agent's schema, load the configured policy set, and build
/// a harness that records into `store`.
///
/// # Errors
///
/// Any schema, policy or configuration failure. No harness is returned in a
/// partially configured state.
pub fn build_harness(
    config: &HarnessConfig,
    agent: AgentDescriptor,
    store: Arc<dyn TrajectoryStore>,
) -> TribunalResult<PolicyHarness> {
    let schema = Arc::new(synthesize(&agent)?);
    let policies = Arc::new(PolicyStore::from_source(&config.policy_source()?)?);
    let evaluator = Arc::new(CedarEvaluator::new(&schema, Arc::clone(&policies))?);

    info!(
        agent_id = %agent.id,
        namespace = %schema.namespace(),
        policy_count = policies.len(),
        mode = ?config.mode,
        "harness configured"
    );

    Ok(PolicyHarness::new(Arc::new(agent), schema, evaluator, policies, store)?.with_mode(config.mode))
}
