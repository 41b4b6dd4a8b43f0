//! `Evaluator` implementation backed by the Cedar authorizer.
//!
//! Translates the engine's neutral request (entity graph + JSON context)
//! into Cedar `Entities`, `Context` and `Request`, validated against the
//! synthesized schema, and reports Cedar's decision and determining
//! policies back unchanged. The merge rule stays in `tribunal-core`.

use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use cedar_policy::{
    Authorizer, Context, Decision, Entities, EntityId, EntityTypeName, EntityUid as CedarUid,
    Request, Schema, ValidationMode, Validator,
};
use serde_json::Value;
use tracing::{debug, warn};

use tribunal_contracts::error::{TribunalError, TribunalResult};
use tribunal_core::{Effect, EntityUid, EvaluationOutcome, EvaluationRequest, Evaluator};
use tribunal_schema::AuthorizationSchema;

use crate::store::PolicyStore;

/// Evaluates requests against a `PolicyStore` under one agent's schema.
pub struct CedarEvaluator {
    schema: Schema,
    policies: Arc<PolicyStore>,
    authorizer: Authorizer,
}

impl CedarEvaluator {
    /// Build an evaluator for `schema` and `policies`.
    ///
    /// Policies that do not type-check against the schema are reported as
    /// warnings; Cedar skips a policy that errors at evaluation time, so
    /// such policies degrade instead of failing the whole set.
    pub fn new(schema: &AuthorizationSchema, policies: Arc<PolicyStore>) -> TribunalResult<Self> {
        let cedar_schema = schema.to_cedar()?;

        for problem in validate_policies(schema, &policies)? {
            warn!(namespace = %schema.namespace(), problem = %problem, "policy does not type-check against schema");
        }

        Ok(Self {
            schema: cedar_schema,
            policies,
            authorizer: Authorizer::new(),
        })
    }

    pub fn policies(&self) -> &Arc<PolicyStore> {
        &self.policies
    }
}

/// Strict-mode validation messages for `policies` against `schema`.
/// An empty list means every policy type-checks.
pub fn validate_policies(
    schema: &AuthorizationSchema,
    policies: &PolicyStore,
) -> TribunalResult<Vec<String>> {
    let validator = Validator::new(schema.to_cedar()?);
    let result = validator.validate(policies.policy_set(), ValidationMode::Strict);
    Ok(result.validation_errors().map(|e| e.to_string()).collect())
}

#[async_trait]
impl Evaluator for CedarEvaluator {
    async fn authorize(&self, request: &EvaluationRequest) -> TribunalResult<EvaluationOutcome> {
        let entities = Entities::from_json_value(request.entities.to_json(), Some(&self.schema))
            .map_err(|e| evaluation("invalid entities", e))?;

        let principal = cedar_uid(&request.principal)?;
        let action = cedar_uid(&request.action)?;
        let resource = cedar_uid(&request.resource)?;

        let context = Context::from_json_value(
            Value::Object(request.context.clone()),
            Some((&self.schema, &action)),
        )
        .map_err(|e| evaluation("invalid context", e))?;

        let cedar_request = Request::new(principal, action, resource, context, Some(&self.schema))
            .map_err(|e| evaluation("invalid request", e))?;

        let response = self
            .authorizer
            .is_authorized(&cedar_request, self.policies.policy_set(), &entities);

        let effect = match response.decision() {
            Decision::Allow => Effect::Allow,
            Decision::Deny => Effect::Deny,
        };
        let diagnostics = response.diagnostics();
        let outcome = EvaluationOutcome {
            effect,
            policy_ids: diagnostics.reason().map(|id| id.to_string()).collect(),
            diagnostics: diagnostics.errors().map(|e| e.to_string()).collect(),
        };

        debug!(
            action = %request.action,
            effect = ?outcome.effect,
            policies = ?outcome.policy_ids,
            "cedar evaluation complete"
        );
        Ok(outcome)
    }
}

fn cedar_uid(uid: &EntityUid) -> TribunalResult<CedarUid> {
    let type_name = EntityTypeName::from_str(&uid.type_name)
        .map_err(|e| evaluation(&format!("invalid entity type '{}'", uid.type_name), e))?;
    Ok(CedarUid::from_type_name_and_id(type_name, EntityId::new(&uid.id)))
}

fn evaluation(what: &str, err: impl std::fmt::Display) -> TribunalError {
    TribunalError::Evaluation {
        reason: format!("{what}: {err}"),
    }
}
