//! Policy records, decisions, and the metadata that explains them.
//!
//! Tribunal is default-closed: unless some policy explicitly permits an
//! action, the decision is `Deny`. `Escalate` is a denial that asks for
//! human or external review instead of a hard stop.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Annotation carrying the author-declared policy identifier. Required.
pub const ANNOTATION_ID: &str = "id";
/// Annotation carrying the human-readable explanation of a policy.
pub const ANNOTATION_REASON: &str = "reason";
/// Annotation marking a forbid policy as an escalation; its value names the target.
pub const ANNOTATION_ESCALATE: &str = "escalate";

/// The effect a policy declares.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyEffect {
    Permit,
    Forbid,
}

/// One policy as loaded into the policy store.
///
/// `internal_id` is assigned by the evaluator and is the only reliable key;
/// `declared_id` comes from the `@id` annotation and may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyRecord {
    pub internal_id: String,
    pub declared_id: String,
    pub effect: PolicyEffect,
    pub annotations: BTreeMap<String, String>,
}

impl PolicyRecord {
    /// True iff the policy carries `@escalate`.
    pub fn is_escalation(&self) -> bool {
        self.annotations.contains_key(ANNOTATION_ESCALATE)
    }

    /// The `@reason` text, or empty.
    pub fn reason(&self) -> &str {
        self.annotations
            .get(ANNOTATION_REASON)
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Build the metadata reported for this policy in a `Decision`.
    ///
    /// `custom` holds every annotation except `id`, `reason` and `escalate`.
    pub fn to_metadata(&self) -> PolicyMetadata {
        let custom = self
            .annotations
            .iter()
            .filter(|(k, _)| {
                !matches!(
                    k.as_str(),
                    ANNOTATION_ID | ANNOTATION_REASON | ANNOTATION_ESCALATE
                )
            })
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        PolicyMetadata {
            id: self.declared_id.clone(),
            description: self.reason().to_string(),
            escalate: self.is_escalation(),
            escalate_arg: self
                .annotations
                .get(ANNOTATION_ESCALATE)
                .cloned()
                .unwrap_or_default(),
            custom,
        }
    }
}

/// Per-policy explanation attached to a decision.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyMetadata {
    /// The policy's declared `@id`.
    pub id: String,
    /// The policy's `@reason`, or empty.
    pub description: String,
    pub escalate: bool,
    /// Escalation target (e.g. "security-team"); empty for non-escalations.
    pub escalate_arg: String,
    pub custom: BTreeMap<String, String>,
}

/// The outcome class of one adjudication.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Allow,
    Deny,
    Escalate,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Verdict::Allow => "Allow",
            Verdict::Deny => "Deny",
            Verdict::Escalate => "Escalate",
        };
        f.write_str(s)
    }
}

/// The final, explained result of adjudicating one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub verdict: Verdict,
    /// Human-readable reason. On denial this is the text substituted for the
    /// blocked content, so it should let the actor self-correct.
    pub reason: String,
    /// One entry per policy that determined the outcome.
    #[serde(default)]
    pub policies: Vec<PolicyMetadata>,
}

impl Decision {
    /// An allow decision with no policy attribution.
    pub fn allow(reason: impl Into<String>) -> Self {
        Self {
            verdict: Verdict::Allow,
            reason: reason.into(),
            policies: Vec::new(),
        }
    }

    pub fn is_allowed(&self) -> bool {
        self.verdict == Verdict::Allow
    }

    pub fn is_denied(&self) -> bool {
        self.verdict == Verdict::Deny
    }

    pub fn is_escalated(&self) -> bool {
        self.verdict == Verdict::Escalate
    }
}

/// Whether decisions are enforced or only observed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineMode {
    /// Policies run and are recorded, but nothing is blocked.
    Monitor,
    /// Deny and escalate decisions block the action.
    #[default]
    Govern,
}
