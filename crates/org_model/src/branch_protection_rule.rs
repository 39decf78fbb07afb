//! Branch protection rules, managed through the GraphQL API.

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::property::Property;
use crate::validation::{FailureType, ValidationContext};

#[cfg(test)]
#[path = "branch_protection_rule_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BranchProtectionRule {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub pattern: Property<String>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_approving_reviews: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_approving_review_count: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dismisses_stale_reviews: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_code_owner_reviews: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_last_push_approval: Property<bool>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_commit_signatures: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_linear_history: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_conversation_resolution: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub is_admin_enforced: Property<bool>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allows_deletions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allows_force_pushes: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub blocks_creations: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub lock_branch: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub lock_allows_fetch_and_merge: Property<bool>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub restricts_pushes: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub push_restrictions: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub restricts_review_dismissals: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub review_dismissal_allowances: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub bypass_pull_request_allowances: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub bypass_force_push_allowances: Property<Vec<String>>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_status_checks: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_strict_status_checks: Property<bool>,
    /// Encoded as `<app-slug>:<context>`; `any:<context>` accepts the
    /// context from any source.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_status_checks: Property<Vec<String>>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::key("pattern"),
    fields::value("requires_approving_reviews"),
    fields::value("required_approving_review_count"),
    fields::value("dismisses_stale_reviews"),
    fields::value("requires_code_owner_reviews"),
    fields::value("requires_last_push_approval"),
    fields::value("requires_commit_signatures"),
    fields::value("requires_linear_history"),
    fields::value("requires_conversation_resolution"),
    fields::value("is_admin_enforced"),
    fields::value("allows_deletions"),
    fields::value("allows_force_pushes"),
    fields::value("blocks_creations"),
    fields::value("lock_branch"),
    fields::value("lock_allows_fetch_and_merge"),
    fields::value("restricts_pushes"),
    fields::set("push_restrictions"),
    fields::value("restricts_review_dismissals"),
    fields::set("review_dismissal_allowances"),
    fields::set("bypass_pull_request_allowances"),
    fields::set("bypass_force_push_allowances"),
    fields::value("requires_status_checks"),
    fields::value("requires_strict_status_checks"),
    fields::set("required_status_checks"),
];

/// Model field to GraphQL field renames; fields not listed keep their name
/// after camel-casing.
const GRAPHQL_NAMES: &[(&str, &str)] = &[
    ("pattern", "pattern"),
    ("requires_approving_reviews", "requiresApprovingReviews"),
    ("required_approving_review_count", "requiredApprovingReviewCount"),
    ("dismisses_stale_reviews", "dismissesStaleReviews"),
    ("requires_code_owner_reviews", "requiresCodeOwnerReviews"),
    ("requires_last_push_approval", "requireLastPushApproval"),
    ("requires_conversation_resolution", "requiresConversationResolution"),
    ("requires_commit_signatures", "requiresCommitSignatures"),
    ("requires_linear_history", "requiresLinearHistory"),
    ("is_admin_enforced", "isAdminEnforced"),
    ("allows_deletions", "allowsDeletions"),
    ("allows_force_pushes", "allowsForcePushes"),
    ("blocks_creations", "blocksCreations"),
    ("lock_branch", "lockBranch"),
    ("lock_allows_fetch_and_merge", "lockAllowsFetchAndMerge"),
    ("restricts_pushes", "restrictsPushes"),
    ("restricts_review_dismissals", "restrictsReviewDismissals"),
    ("requires_status_checks", "requiresStatusChecks"),
    ("requires_strict_status_checks", "requiresStrictStatusChecks"),
];

/// Allowance list fields and the GraphQL actor-id input they resolve to,
/// with the boolean gate implied by list non-emptiness.
const ALLOWANCE_INPUTS: &[(&str, &str, Option<&str>)] = &[
    ("push_restrictions", "pushActorIds", Some("restrictsPushes")),
    (
        "review_dismissal_allowances",
        "reviewDismissalActorIds",
        Some("restrictsReviewDismissals"),
    ),
    ("bypass_pull_request_allowances", "bypassPullRequestActorIds", None),
    ("bypass_force_push_allowances", "bypassForcePushActorIds", None),
];

impl BranchProtectionRule {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(data.clone())?)
    }

    /// Builds a rule from a GraphQL node; the client has already expanded
    /// allowance lists into actor tokens under their model names.
    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("branch protection rule is not an object".to_string()))?;

        let mut model = ModelMap::new();
        if let Some(id) = object.get("id") {
            model.insert("id".to_string(), id.clone());
        }

        for (model_name, graphql_name) in GRAPHQL_NAMES {
            if let Some(value) = object.get(*graphql_name) {
                model.insert(model_name.to_string(), value.clone());
            }
        }

        for (model_name, _, _) in ALLOWANCE_INPUTS {
            if let Some(value) = object.get(*model_name) {
                model.insert(model_name.to_string(), value.clone());
            }
        }

        if let Some(checks) = object.get("requiredStatusChecks").and_then(Value::as_array) {
            let encoded: Vec<Value> = checks
                .iter()
                .map(|check| {
                    let context = check.get("context").and_then(Value::as_str).unwrap_or_default();
                    let app = check
                        .pointer("/app/slug")
                        .and_then(Value::as_str)
                        .unwrap_or("any");
                    Value::String(format!("{app}:{context}"))
                })
                .collect();
            model.insert("required_status_checks".to_string(), Value::Array(encoded));
        }

        Self::from_model_value(&Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if self.requires_approving_reviews.value() == Some(&true) {
            match self.required_approving_review_count.value() {
                Some(count) if (0..=10).contains(count) => {}
                Some(count) => {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "{header} has 'required_approving_review_count' of value '{count}', allowed range is [0, 10]"
                        ),
                    );
                }
                None => {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "{header} requires approving reviews but 'required_approving_review_count' is not set"
                        ),
                    );
                }
            }
        }

        let has_bypass_force_pushers = self
            .bypass_force_push_allowances
            .value()
            .is_some_and(|actors| !actors.is_empty());
        if self.allows_force_pushes.value() == Some(&true) && has_bypass_force_pushers {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} allows force pushes for everyone, 'bypass_force_push_allowances' must be empty"
                ),
            );
        }

        let has_push_restrictions = self
            .push_restrictions
            .value()
            .is_some_and(|actors| !actors.is_empty());
        if has_push_restrictions && self.restricts_pushes.value() == Some(&false) {
            context.add_failure(
                FailureType::Warning,
                format!("{header} lists 'push_restrictions' while 'restricts_pushes' is disabled"),
            );
        }
    }

    fn rule_id(entity: &dyn ModelObject) -> Result<String, ModelError> {
        entity
            .to_model_map()
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| ModelError::PatchFailed("branch protection rule carries no id".to_string()))
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| {
                ModelError::PatchFailed("branch protection rule without repository parent".to_string())
            })
    }
}

fn string_list(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|values| {
            values
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

#[async_trait]
impl ModelObject for BranchProtectionRule {
    fn resource_kind(&self) -> &'static str {
        "branch_protection_rule"
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

        for (model_name, graphql_name) in GRAPHQL_NAMES {
            if let Some(value) = data.get(*model_name) {
                body.insert(graphql_name.to_string(), value.clone());
            }
        }

        for (model_name, input_name, gate) in ALLOWANCE_INPUTS {
            let Some(value) = data.get(*model_name) else {
                continue;
            };
            let tokens = string_list(value);
            let actor_ids = provider.get_actor_node_ids(&tokens).await?;

            // the boolean gate follows from list non-emptiness unless the
            // declaration pins it explicitly
            if let Some(gate) = gate {
                body.entry(gate.to_string())
                    .or_insert(Value::Bool(!actor_ids.is_empty()));
            }
            body.insert(input_name.to_string(), json!(actor_ids));
        }

        if let Some(value) = data.get("required_status_checks") {
            let mut app_slugs = Vec::new();
            let mut parsed: Vec<(Option<String>, String)> = Vec::new();
            for check in string_list(value) {
                match check.split_once(':') {
                    Some((app, context)) if !app.is_empty() && app != "any" => {
                        app_slugs.push(app.to_string());
                        parsed.push((Some(app.to_string()), context.to_string()));
                    }
                    _ => parsed.push((None, check_context(&check))),
                }
            }

            let app_ids = provider.get_app_node_ids(&app_slugs).await?;
            let checks: Vec<Value> = parsed
                .into_iter()
                .map(|(app, context)| match app.and_then(|slug| app_ids.get(&slug).cloned()) {
                    Some(app_id) => json!({"appId": app_id, "context": context}),
                    None => json!({"context": context}),
                })
                .collect();
            body.insert("requiredStatusChecks".to_string(), Value::Array(checks));
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
        let body = self.to_provider_body(org_id, provider).await?;

        // a freshly created repository has no node id in the patch stream yet
        let node_id = match parent.and_then(|parent| parent.repository_node_id.clone()) {
            Some(node_id) => node_id,
            None => provider.rest().get_repo_node_id(org_id, &repo).await?,
        };

        provider
            .graphql()
            .add_branch_protection_rule(org_id, &repo, &node_id, &body)
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
        let id = Self::rule_id(self)?;
        provider
            .graphql()
            .delete_branch_protection_rule(org_id, &repo, &id)
            .await?;
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        let repo = Self::repo_name(parent)?;
        let id = Self::rule_id(current)?;
        let body = self.changes_to_provider(org_id, changes, provider).await?;
        provider
            .graphql()
            .update_branch_protection_rule(org_id, &repo, &id, &body)
            .await?;
        Ok(())
    }
}

/// The context part of an encoded status check.
fn check_context(check: &str) -> String {
    match check.split_once(':') {
        Some((_, context)) => context.to_string(),
        None => check.to_string(),
    }
}
