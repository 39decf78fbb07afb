//! Deployment environments, owners of their secrets and variables.

use async_trait::async_trait;
use github_client::{ActorToken, GitHubProvider};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::property::Property;
use crate::secret::{Secret, SecretScope};
use crate::validation::{FailureType, ValidationContext};
use crate::variable::{Variable, VariableScope};

#[cfg(test)]
#[path = "environment_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub node_id: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub wait_timer: Property<i64>,
    /// Actor tokens (`@user`, `@org/team`) allowed to approve deployments.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub reviewers: Property<Vec<String>>,
    /// `all`, `protected` or `selected`.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub deployment_branch_policy: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub branch_policies: Property<Vec<String>>,

    #[serde(skip)]
    pub secrets: Vec<Secret>,
    #[serde(skip)]
    pub variables: Vec<Variable>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::external("node_id"),
    fields::key("name"),
    fields::value("wait_timer"),
    fields::set("reviewers"),
    fields::value("deployment_branch_policy"),
    fields::set("branch_policies"),
];

const MAX_WAIT_TIMER_MINUTES: i64 = 43200;

impl Environment {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        let mut environment: Environment = serde_json::from_value(data.clone())?;

        if let Some(secrets) = data.get("secrets").and_then(Value::as_array) {
            environment.secrets = secrets
                .iter()
                .map(|secret| Secret::from_model_value(SecretScope::Environment, secret))
                .collect::<Result<_, _>>()?;
        }
        if let Some(variables) = data.get("variables").and_then(Value::as_array) {
            environment.variables = variables
                .iter()
                .map(|variable| Variable::from_model_value(VariableScope::Environment, variable))
                .collect::<Result<_, _>>()?;
        }

        Ok(environment)
    }

    pub fn from_provider_data(org_id: &str, data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("environment data is not an object".to_string()))?;

        let mut model = ModelMap::new();
        for field in ["id", "node_id", "name", "branch_policies"] {
            if let Some(value) = object.get(field) {
                model.insert(field.to_string(), value.clone());
            }
        }

        // wait timer and reviewers arrive wrapped in protection rules
        if let Some(rules) = object.get("protection_rules").and_then(Value::as_array) {
            for rule in rules {
                match rule.get("type").and_then(Value::as_str) {
                    Some("wait_timer") => {
                        if let Some(timer) = rule.get("wait_timer") {
                            model.insert("wait_timer".to_string(), timer.clone());
                        }
                    }
                    Some("required_reviewers") => {
                        let reviewers = rule
                            .get("reviewers")
                            .and_then(Value::as_array)
                            .map(|reviewers| reviewer_tokens(org_id, reviewers))
                            .unwrap_or_default();
                        model.insert("reviewers".to_string(), json!(reviewers));
                    }
                    _ => {}
                }
            }
        }

        let policy = match object.get("deployment_branch_policy") {
            None | Some(Value::Null) => "all",
            Some(policy) => {
                if policy.get("protected_branches").and_then(Value::as_bool) == Some(true) {
                    "protected"
                } else {
                    "selected"
                }
            }
        };
        model.insert(
            "deployment_branch_policy".to_string(),
            Value::String(policy.to_string()),
        );

        let mut environment: Environment = serde_json::from_value(Value::Object(model))?;
        environment.secrets = Vec::new();
        environment.variables = Vec::new();
        Ok(environment)
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if let Some(policy) = self.deployment_branch_policy.as_deref() {
            if !matches!(policy, "all" | "protected" | "selected") {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'deployment_branch_policy' of value '{policy}', only values ('all' | 'protected' | 'selected') are allowed"
                    ),
                );
            }

            let has_policies = self
                .branch_policies
                .value()
                .is_some_and(|policies| !policies.is_empty());
            if policy != "selected" && has_policies {
                context.add_failure(
                    FailureType::Warning,
                    format!(
                        "{header} lists 'branch_policies' but 'deployment_branch_policy' is '{policy}'"
                    ),
                );
            }
        }

        if let Some(timer) = self.wait_timer.value() {
            if !(0..=MAX_WAIT_TIMER_MINUTES).contains(timer) {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'wait_timer' of value '{timer}', allowed range is [0, {MAX_WAIT_TIMER_MINUTES}]"
                    ),
                );
            }
        }

        if let Some(reviewers) = self.reviewers.value() {
            for reviewer in reviewers {
                match ActorToken::parse(reviewer) {
                    Ok(ActorToken::User(_) | ActorToken::Team(_)) => {}
                    _ => {
                        context.add_failure(
                            FailureType::Error,
                            format!(
                                "{header} has reviewer '{reviewer}', only '@user' and '@org/team' tokens are allowed"
                            ),
                        );
                    }
                }
            }
        }

        for secret in &self.secrets {
            secret.validate(context, parent);
        }
        for variable in &self.variables {
            variable.validate(context, parent);
        }
    }

    fn environment_name(&self) -> Result<String, ModelError> {
        self.name
            .cloned_value()
            .ok_or_else(|| ModelError::PatchFailed("environment without a name".to_string()))
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| ModelError::PatchFailed("environment without repository parent".to_string()))
    }
}

/// Renders provider reviewer objects as actor tokens.
fn reviewer_tokens(org_id: &str, reviewers: &[Value]) -> Vec<String> {
    let mut tokens = Vec::with_capacity(reviewers.len());
    for wrapper in reviewers {
        let reviewer = wrapper.get("reviewer").unwrap_or(wrapper);
        match wrapper.get("type").and_then(Value::as_str) {
            Some("User") => {
                if let Some(login) = reviewer.get("login").and_then(Value::as_str) {
                    tokens.push(format!("@{login}"));
                }
            }
            Some("Team") => {
                if let Some(slug) = reviewer.get("slug").and_then(Value::as_str) {
                    tokens.push(format!("@{org_id}/{slug}"));
                }
            }
            _ => {}
        }
    }
    tokens
}

#[async_trait]
impl ModelObject for Environment {
    fn resource_kind(&self) -> &'static str {
        "environment"
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        FIELD_SPECS
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    async fn map_to_provider(
        &self,
        _org_id: &str,
        data: &ModelMap,
        provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();

        for spec in self.field_specs() {
            if !spec.writable() {
                continue;
            }
            let Some(value) = data.get(spec.name) else {
                continue;
            };
            match spec.name {
                "reviewers" => {
                    let tokens: Vec<String> = value
                        .as_array()
                        .map(|tokens| {
                            tokens
                                .iter()
                                .filter_map(Value::as_str)
                                .map(str::to_string)
                                .collect()
                        })
                        .unwrap_or_default();
                    let resolved = provider.resolve_actors(&tokens).await?;
                    let reviewers: Vec<Value> = resolved
                        .iter()
                        .map(|actor| json!({"type": actor.actor_type, "id": actor.id}))
                        .collect();
                    body.insert("reviewers".to_string(), Value::Array(reviewers));
                }
                "deployment_branch_policy" => {
                    let policy = match value.as_str() {
                        Some("all") | None => Value::Null,
                        Some("protected") => json!({
                            "protected_branches": true,
                            "custom_branch_policies": false,
                        }),
                        Some(_) => json!({
                            "protected_branches": false,
                            "custom_branch_policies": true,
                        }),
                    };
                    body.insert("deployment_branch_policy".to_string(), policy);
                }
                name => {
                    body.insert(name.to_string(), value.clone());
                }
            }
        }

        Ok(body)
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let repo = Self::repo_name(parent)?;
        let name = self.environment_name()?;
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);
        provider
            .rest()
            .update_repo_environment(org_id, &repo, &name, &body)
            .await?;
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let repo = Self::repo_name(parent)?;
        let name = self.environment_name()?;
        provider
            .rest()
            .delete_repo_environment(org_id, &repo, &name)
            .await?;
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        _current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        let repo = Self::repo_name(parent)?;
        let name = self.environment_name()?;

        // the environment PUT replaces the whole protection configuration,
        // so a change always writes the full record
        let mut body = self.to_provider_body(org_id, provider).await?;
        let changed = self.changes_to_provider(org_id, changes, provider).await?;
        body.extend(changed);

        provider
            .rest()
            .update_repo_environment(org_id, &repo, &name, &Value::Object(body))
            .await?;
        Ok(())
    }
}
