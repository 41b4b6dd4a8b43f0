//! The merge rule: evaluator outcome + policy annotations → `Decision`.
//!
//! | evaluator | plain policies | escalate policies | decision                    |
//! |-----------|----------------|-------------------|-----------------------------|
//! | allow     | any            | (never)           | ALLOW, plain metadata       |
//! | deny      | ≥ 1            | any               | DENY, plain metadata only   |
//! | deny      | 0              | ≥ 1               | ESCALATE, escalate metadata |
//! | deny      | 0              | 0                 | DENY, empty, default-closed |

use tracing::error;

use tribunal_contracts::{
    error::{TribunalError, TribunalResult},
    policy::{Decision, PolicyMetadata, Verdict},
};

use crate::traits::{Effect, EvaluationOutcome, PolicyCatalog};

pub const ALLOWED_REASON: &str = "Allowed by all policies";
pub const DENIED_REASON: &str = "Denied by policies";
pub const ESCALATED_REASON: &str = "Escalated by policies";
pub const NO_PERMIT_REASON: &str = "No matching permit policy";
pub const DEFAULT_ALLOW_REASON: &str = "Non-tool content allowed by default";

/// Resolve the determining policies and apply the merge rule.
///
/// # Errors
///
/// `TribunalError::PolicyNotFound` when the evaluator reports a policy id
/// the catalog does not hold. The outcome is never defaulted in that case.
pub fn merge(outcome: &EvaluationOutcome, catalog: &dyn PolicyCatalog) -> TribunalResult<Decision> {
    let mut plain = Vec::new();
    let mut escalating = Vec::new();

    for internal_id in &outcome.policy_ids {
        let record = catalog.policy(internal_id).ok_or_else(|| {
            error!(policy_id = %internal_id, "evaluator and policy store are out of sync");
            TribunalError::PolicyNotFound {
                policy_id: internal_id.clone(),
            }
        })?;
        if record.is_escalation() {
            escalating.push(record.to_metadata());
        } else {
            plain.push(record.to_metadata());
        }
    }

    let decision = match outcome.effect {
        Effect::Allow => explained(Verdict::Allow, ALLOWED_REASON, plain),
        Effect::Deny if !plain.is_empty() => explained(Verdict::Deny, DENIED_REASON, plain),
        Effect::Deny if !escalating.is_empty() => {
            explained(Verdict::Escalate, ESCALATED_REASON, escalating)
        }
        Effect::Deny => Decision {
            verdict: Verdict::Deny,
            reason: NO_PERMIT_REASON.to_string(),
            policies: Vec::new(),
        },
    };
    Ok(decision)
}

/// Blocking decisions carry the matched policies' reasons so the actor can
/// self-correct.
fn explained(verdict: Verdict, base: &str, policies: Vec<PolicyMetadata>) -> Decision {
    let reason = if verdict == Verdict::Allow {
        base.to_string()
    } else {
        let details: Vec<&str> = policies
            .iter()
            .map(|p| p.description.as_str())
            .filter(|d| !d.is_empty())
            .collect();
        if details.is_empty() {
            base.to_string()
        } else {
            format!("{base}: {}", details.join("; "))
        }
    };

    Decision {
        verdict,
        reason,
        policies,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};

    use tribunal_contracts::{
        error::TribunalError,
        policy::{PolicyEffect, PolicyRecord, Verdict},
    };

    use super::*;
    use crate::traits::{Effect, EvaluationOutcome, PolicyCatalog};

    struct MockCatalog {
        policies: HashMap<String, PolicyRecord>,
    }

    impl MockCatalog {
        fn new(records: Vec<PolicyRecord>) -> Self {
            Self {
                policies: records.into_iter().map(|r| (r.internal_id.clone(), r)).collect(),
            }
        }
    }

    impl PolicyCatalog for MockCatalog {
        fn policy(&self, internal_id: &str) -> Option<&PolicyRecord> {
            self.policies.get(internal_id)
        }
    }

    fn policy(internal: &str, effect: PolicyEffect, annotations: &[(&str, &str)]) -> PolicyRecord {
        let mut map: BTreeMap<String, String> = annotations
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        map.entry("id".to_string()).or_insert_with(|| format!("{internal}-id"));
        PolicyRecord {
            internal_id: internal.to_string(),
            declared_id: map["id"].clone(),
            effect,
            annotations: map,
        }
    }

    fn outcome(effect: Effect, ids: &[&str]) -> EvaluationOutcome {
        EvaluationOutcome {
            effect,
            policy_ids: ids.iter().map(|s| s.to_string()).collect(),
            diagnostics: vec![],
        }
    }

    fn catalog() -> MockCatalog {
        MockCatalog::new(vec![
            policy("policy0", PolicyEffect::Permit, &[("id", "allow-all")]),
            policy("policy1", PolicyEffect::Forbid, &[("id", "no-passwd"), ("reason", "/etc/passwd is off limits")]),
            policy("policy2", PolicyEffect::Forbid, &[("id", "review-exec"), ("escalate", "security-team")]),
            policy("policy3", PolicyEffect::Forbid, &[("id", "review-net"), ("escalate", "network-team")]),
            policy("policy4", PolicyEffect::Forbid, &[("id", "no-rm")]),
        ])
    }

    #[test]
    fn allow_reports_permitting_policies() {
        let d = merge(&outcome(Effect::Allow, &["policy0"]), &catalog()).unwrap();
        assert_eq!(d.verdict, Verdict::Allow);
        assert_eq!(d.reason, ALLOWED_REASON);
        assert_eq!(d.policies.len(), 1);
        assert_eq!(d.policies[0].id, "allow-all");
    }

    #[test]
    fn plain_denial_subsumes_escalation() {
        let d = merge(&outcome(Effect::Deny, &["policy2", "policy1"]), &catalog()).unwrap();
        assert_eq!(d.verdict, Verdict::Deny);
        let ids: Vec<&str> = d.policies.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["no-passwd"]);
        assert_eq!(d.reason, "Denied by policies: /etc/passwd is off limits");
    }

    #[test]
    fn multiple_plain_denials_are_all_reported_in_order() {
        let d = merge(&outcome(Effect::Deny, &["policy4", "policy1"]), &catalog()).unwrap();
        let ids: Vec<&str> = d.policies.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, ["no-rm", "no-passwd"]);
    }

    #[test]
    fn pure_escalation_fans_out() {
        let d = merge(&outcome(Effect::Deny, &["policy2", "policy3"]), &catalog()).unwrap();
        assert_eq!(d.verdict, Verdict::Escalate);
        assert_eq!(d.reason, ESCALATED_REASON);
        let args: Vec<&str> = d.policies.iter().map(|p| p.escalate_arg.as_str()).collect();
        assert_eq!(args, ["security-team", "network-team"]);
        assert!(d.policies.iter().all(|p| p.escalate));
    }

    #[test]
    fn deny_without_policies_is_default_closed() {
        let d = merge(&outcome(Effect::Deny, &[]), &catalog()).unwrap();
        assert_eq!(d.verdict, Verdict::Deny);
        assert_eq!(d.reason, NO_PERMIT_REASON);
        assert!(d.policies.is_empty());
    }

    #[test]
    fn unknown_policy_id_is_fatal() {
        match merge(&outcome(Effect::Allow, &["policy99"]), &catalog()) {
            Err(TribunalError::PolicyNotFound { policy_id }) => assert_eq!(policy_id, "policy99"),
            other => panic!("expected PolicyNotFound, got {:?}", other),
        }
    }
}
