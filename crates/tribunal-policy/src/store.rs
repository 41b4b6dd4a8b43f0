//! The Cedar policy store.
//!
//! Parsing is also where structural rules are enforced, so a policy set that
//! loads successfully can never trip them during evaluation:
//!
//! 1. every policy carries `@id` (hard failure)
//! 2. `@escalate` only appears on `forbid` policies (hard failure)
//! 3. `@id` values should be unique (warning only; the evaluator-assigned
//!    internal id stays the real key)

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::str::FromStr;

use cedar_policy::{Effect, PolicySet};
use tracing::{info, warn};

use tribunal_contracts::{
    error::{TribunalError, TribunalResult},
    policy::{PolicyEffect, PolicyRecord, ANNOTATION_ESCALATE, ANNOTATION_ID},
};
use tribunal_core::PolicyCatalog;

use crate::config::PolicySource;

/// A parsed, validated policy set plus the records the merge rule reads.
#[derive(Debug)]
pub struct PolicyStore {
    policy_set: PolicySet,
    records: BTreeMap<String, PolicyRecord>,
}

impl PolicyStore {
    /// Parse Cedar policy text.
    ///
    /// # Errors
    ///
    /// `TribunalError::Policy` when the text does not parse, a policy lacks
    /// `@id`, or a non-forbid policy carries `@escalate`.
    pub fn from_cedar_str(text: &str) -> TribunalResult<Self> {
        let policy_set = PolicySet::from_str(text).map_err(|e| TribunalError::Policy {
            reason: format!("failed to parse policy set: {e}"),
        })?;

        let mut records = BTreeMap::new();
        let mut seen = BTreeSet::new();
        for policy in policy_set.policies() {
            let internal_id = policy.id().to_string();
            let annotations: BTreeMap<String, String> = policy
                .annotations()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            let declared_id = annotations
                .get(ANNOTATION_ID)
                .cloned()
                .ok_or_else(|| TribunalError::Policy {
                    reason: format!("policy '{internal_id}' is missing the required @id annotation"),
                })?;

            if !seen.insert(declared_id.clone()) {
                warn!(policy_id = %declared_id, internal_id = %internal_id, "duplicate policy @id");
            }

            let effect = match policy.effect() {
                Effect::Permit => PolicyEffect::Permit,
                Effect::Forbid => PolicyEffect::Forbid,
            };
            if annotations.contains_key(ANNOTATION_ESCALATE) && effect != PolicyEffect::Forbid {
                return Err(TribunalError::Policy {
                    reason: format!(
                        "policy '{declared_id}' has @escalate but is not a forbid policy; \
                         @escalate is only valid on forbid policies"
                    ),
                });
            }

            records.insert(
                internal_id.clone(),
                PolicyRecord {
                    internal_id,
                    declared_id,
                    effect,
                    annotations,
                },
            );
        }

        info!(policy_count = records.len(), "policy set loaded");
        Ok(Self { policy_set, records })
    }

    /// Read and parse a `.cedar` file.
    pub fn from_file(path: &Path) -> TribunalResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| TribunalError::Config {
            reason: format!("failed to read policy file '{}': {}", path.display(), e),
        })?;
        Self::from_cedar_str(&text)
    }

    pub fn from_source(source: &PolicySource) -> TribunalResult<Self> {
        match source {
            PolicySource::Path(path) => Self::from_file(path),
            PolicySource::Text(text) => Self::from_cedar_str(text),
        }
    }

    /// The record for an evaluator-assigned id.
    pub fn policy(&self, internal_id: &str) -> Option<&PolicyRecord> {
        self.records.get(internal_id)
    }

    /// Every record, ordered by internal id.
    pub fn iter(&self) -> impl Iterator<Item = &PolicyRecord> {
        self.records.values()
    }

    /// Records whose declared `@id` is `declared_id`; more than one when ids repeat.
    pub fn by_declared_id<'a>(&'a self, declared_id: &'a str) -> impl Iterator<Item = &'a PolicyRecord> {
        self.records.values().filter(move |r| r.declared_id == declared_id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn policy_set(&self) -> &PolicySet {
        &self.policy_set
    }
}

impl PolicyCatalog for PolicyStore {
    fn policy(&self, internal_id: &str) -> Option<&PolicyRecord> {
        PolicyStore::policy(self, internal_id)
    }
}

#[cfg(test)]
mod tests {
    use tribunal_contracts::{error::TribunalError, policy::PolicyEffect};

    use super::PolicyStore;

    #[test]
    fn loads_policies_with_annotations() {
        let store = PolicyStore::from_cedar_str(
            r#"
            @id("allow-all")
            permit(principal, action, resource);

            @id("review-exec")
            @reason("commands need review")
            @escalate("security-team")
            @severity("high")
            forbid(principal, action, resource);
            "#,
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        let escalating: Vec<_> = store.iter().filter(|r| r.is_escalation()).collect();
        assert_eq!(escalating.len(), 1);
        let rec = escalating[0];
        assert_eq!(rec.declared_id, "review-exec");
        assert_eq!(rec.effect, PolicyEffect::Forbid);
        assert_eq!(rec.annotations["severity"], "high");
        assert_eq!(store.policy(&rec.internal_id), Some(rec));
    }

    #[test]
    fn missing_id_is_a_hard_failure() {
        let result = PolicyStore::from_cedar_str(
            r#"
            @id("ok")
            permit(principal, action, resource);

            @reason("no id here")
            forbid(principal, action, resource);
            "#,
        );
        match result {
            Err(TribunalError::Policy { reason }) => assert!(reason.contains("@id"), "{reason}"),
            other => panic!("expected Policy error, got {:?}", other),
        }
    }

    #[test]
    fn escalate_on_permit_is_rejected_at_load() {
        let result = PolicyStore::from_cedar_str(
            r#"
            @id("bad")
            @escalate("security-team")
            permit(principal, action, resource);
            "#,
        );
        match result {
            Err(TribunalError::Policy { reason }) => {
                assert!(reason.contains("bad"));
                assert!(reason.contains("@escalate"));
            }
            other => panic!("expected Policy error, got {:?}", other),
        }
    }

    #[test]
    fn duplicate_ids_load_with_warning() {
        let store = PolicyStore::from_cedar_str(
            r#"
            @id("same")
            permit(principal, action, resource);

            @id("same")
            forbid(principal, action, resource) when { false };
            "#,
        )
        .unwrap();

        assert_eq!(store.len(), 2);
        assert_eq!(store.by_declared_id("same").count(), 2);
    }

    #[test]
    fn syntax_errors_are_policy_errors() {
        let result = PolicyStore::from_cedar_str("permit(principal, action");
        assert!(matches!(result, Err(TribunalError::Policy { .. })));
    }

    #[test]
    fn empty_policy_set_is_valid() {
        let store = PolicyStore::from_cedar_str("").unwrap();
        assert!(store.is_empty());
    }
}
