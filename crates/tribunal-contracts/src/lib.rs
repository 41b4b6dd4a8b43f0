//! # tribunal-contracts
//!
//! Shared types, schemas, and contracts for the Tribunal adjudication runtime.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate: only data definitions, identifier sanitization, and error
//! types.

pub mod agent;
pub mod error;
pub mod naming;
pub mod policy;
pub mod query;
pub mod trajectory;

pub use naming::sanitize_identifier;

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::{Duration, Utc};
    use serde_json::json;

    use super::*;
    use error::TribunalError;
    use policy::{Decision, EngineMode, PolicyEffect, PolicyRecord, Verdict};
    use query::{TimeRange, TrajectoryFilter};
    use trajectory::{AdjudicatedStep, Content, Role, Stage, Trajectory, TrajectoryId, TrajectoryStatus};

    fn record(annotations: &[(&str, &str)], effect: PolicyEffect) -> PolicyRecord {
        PolicyRecord {
            internal_id: "policy0".to_string(),
            declared_id: annotations
                .iter()
                .find(|(k, _)| *k == "id")
                .map(|(_, v)| v.to_string())
                .unwrap_or_default(),
            effect,
            annotations: annotations
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect::<BTreeMap<_, _>>(),
        }
    }

    fn step(verdict: Verdict, mode: EngineMode) -> AdjudicatedStep {
        AdjudicatedStep {
            step: 1,
            stage: Stage::PreTool,
            role: Role::Model,
            content: Content::tool_request("bash", json!({ "command": "ls" })),
            decision: Decision {
                verdict,
                reason: "Denied by policies".to_string(),
                policies: vec![],
            },
            mode,
            created_at: Utc::now(),
        }
    }

    // ── Sanitization ─────────────────────────────────────────────────────────

    #[test]
    fn sanitize_replaces_spaces_and_dashes() {
        assert_eq!(sanitize_identifier("my-special tool"), "my_special_tool");
        assert_eq!(sanitize_identifier("Coding Agent"), "Coding_Agent");
        assert_eq!(sanitize_identifier("already_clean"), "already_clean");
    }

    #[test]
    fn sanitize_leaves_other_punctuation_alone() {
        assert_eq!(sanitize_identifier("fs.read"), "fs.read");
    }

    // ── PolicyRecord → PolicyMetadata ────────────────────────────────────────

    #[test]
    fn metadata_splits_reserved_and_custom_annotations() {
        let rec = record(
            &[
                ("id", "no-shell"),
                ("reason", "shell access is disabled"),
                ("escalate", "security-team"),
                ("severity", "high"),
            ],
            PolicyEffect::Forbid,
        );

        let meta = rec.to_metadata();
        assert_eq!(meta.id, "no-shell");
        assert_eq!(meta.description, "shell access is disabled");
        assert!(meta.escalate);
        assert_eq!(meta.escalate_arg, "security-team");
        assert_eq!(meta.custom.len(), 1);
        assert_eq!(meta.custom.get("severity").map(String::as_str), Some("high"));
    }

    #[test]
    fn metadata_for_plain_policy_has_empty_escalation() {
        let rec = record(&[("id", "allow-all")], PolicyEffect::Permit);
        let meta = rec.to_metadata();
        assert!(!meta.escalate);
        assert!(meta.escalate_arg.is_empty());
        assert!(meta.description.is_empty());
    }

    // ── AdjudicatedStep mode handling ────────────────────────────────────────

    #[test]
    fn monitor_mode_never_blocks() {
        let denied = step(Verdict::Deny, EngineMode::Monitor);
        assert!(!denied.is_denied());
        assert!(!denied.blocks());
        assert!(denied.enforce().is_ok());
    }

    #[test]
    fn govern_mode_blocks_and_enforce_raises_violation() {
        let escalated = step(Verdict::Escalate, EngineMode::Govern);
        assert!(escalated.is_escalated());
        assert!(escalated.blocks());

        match escalated.enforce() {
            Err(TribunalError::PolicyViolation { stage, reason }) => {
                assert_eq!(stage, "pre_tool");
                assert!(reason.starts_with("Escalate: "), "unexpected reason: {reason}");
            }
            other => panic!("expected PolicyViolation, got {:?}", other),
        }
    }

    #[test]
    fn step_message_prefixes_verdict() {
        let denied = step(Verdict::Deny, EngineMode::Govern);
        assert_eq!(denied.message(), "Deny: Denied by policies");
    }

    // ── Content ──────────────────────────────────────────────────────────────

    #[test]
    fn content_serializes_with_content_type_tag() {
        let content = Content::prompt("hello");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, json!({ "content_type": "prompt", "text": "hello" }));
    }

    #[test]
    fn tool_request_from_non_object_has_empty_args() {
        match Content::tool_request("noop", json!("not an object")) {
            Content::ToolRequest { args, .. } => assert!(args.is_empty()),
            other => panic!("expected ToolRequest, got {:?}", other),
        }
    }

    // ── Trajectory helpers ───────────────────────────────────────────────────

    #[test]
    fn trajectory_ids_are_unique_and_prefixed() {
        let ids: std::collections::HashSet<String> =
            (0..100).map(|_| TrajectoryId::new().0).collect();
        assert_eq!(ids.len(), 100);
        assert!(ids.iter().all(|id| id.starts_with("traj-")));
    }

    #[test]
    fn trajectory_duration_needs_both_ends() {
        let mut t = Trajectory::new("agent-1");
        assert!(t.duration().is_none());

        let start = Utc::now();
        t.started_at = Some(start);
        t.ended_at = Some(start + Duration::seconds(3));
        assert_eq!(t.duration(), Some(Duration::seconds(3)));
    }

    #[test]
    fn terminal_statuses() {
        assert!(TrajectoryStatus::Completed.is_terminal());
        assert!(TrajectoryStatus::Failed.is_terminal());
        assert!(!TrajectoryStatus::Suspended.is_terminal());
        assert!(!TrajectoryStatus::Running.is_terminal());
    }

    #[test]
    fn steps_filter_by_role_and_stage() {
        let mut t = Trajectory::new("agent-1");
        t.steps.push(step(Verdict::Allow, EngineMode::Govern));
        let mut prompt = step(Verdict::Allow, EngineMode::Govern);
        prompt.stage = Stage::PreModel;
        prompt.role = Role::User;
        t.steps.push(prompt);

        assert_eq!(t.steps_by_role(Role::User).count(), 1);
        assert_eq!(t.steps_by_stage(Stage::PreTool).count(), 1);
        assert_eq!(t.steps_by_stage(Stage::PostRun).count(), 0);
    }

    // ── Query helpers ────────────────────────────────────────────────────────

    #[test]
    fn filter_matches_agent_and_status() {
        let mut t = Trajectory::new("agent-1");
        t.status = TrajectoryStatus::Running;

        assert!(TrajectoryFilter::default().matches(&t));
        assert!(TrajectoryFilter {
            agent_id: Some("agent-1".into()),
            status: Some(TrajectoryStatus::Running),
        }
        .matches(&t));
        assert!(!TrajectoryFilter {
            agent_id: Some("agent-2".into()),
            status: None,
        }
        .matches(&t));
    }

    #[test]
    fn time_range_is_inclusive() {
        let now = Utc::now();
        let range = TimeRange {
            start: Some(now),
            end: Some(now),
        };
        assert!(range.contains(now));
        assert!(!range.contains(now + Duration::seconds(1)));
        assert!(TimeRange::default().contains(now));
    }

    // ── TribunalError display messages ───────────────────────────────────────

    #[test]
    fn error_duplicate_action_display() {
        let err = TribunalError::DuplicateAction {
            action: "my_tool".to_string(),
            first: "my-tool".to_string(),
            second: "my tool".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("my-tool"));
        assert!(msg.contains("my tool"));
        assert!(msg.contains("my_tool"));
    }

    #[test]
    fn error_policy_not_found_display() {
        let err = TribunalError::PolicyNotFound {
            policy_id: "policy7".to_string(),
        };
        assert!(err.to_string().contains("policy7"));
    }

    #[test]
    fn error_not_initialized_display() {
        let err = TribunalError::NotInitialized {
            trajectory_id: "traj-1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("traj-1"));
        assert!(msg.contains("initialize()"));
    }
}
