//! Actions/workflow settings, as an organization-wide singleton and a
//! per-repository override.

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::property::Property;
use crate::validation::{FailureType, ValidationContext};

#[cfg(test)]
#[path = "workflow_settings_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WorkflowScope {
    #[default]
    Organization,
    Repository,
}

/// The fields that parameterize the `selected` actions policy.
pub(crate) const SELECTED_ACTION_FIELDS: &[&str] = &[
    "allow_github_owned_actions",
    "allow_verified_creator_actions",
    "allow_action_patterns",
];

/// Position of an allowed-actions policy on the restriction scale.
fn restriction_level(allowed_actions: &str) -> Option<u8> {
    match allowed_actions {
        "all" => Some(0),
        "local_only" => Some(1),
        "selected" => Some(2),
        _ => None,
    }
}

/// Model field to provider field renames shared by both scopes.
const PROVIDER_RENAMES: &[(&str, &str)] = &[
    ("allow_github_owned_actions", "github_owned_allowed"),
    ("allow_verified_creator_actions", "verified_allowed"),
    ("allow_action_patterns", "patterns_allowed"),
    (
        "actions_can_approve_pull_request_reviews",
        "can_approve_pull_request_reviews",
    ),
];

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    #[serde(skip)]
    pub scope: WorkflowScope,

    // repository scope only
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub enabled: Property<bool>,

    // organization scope only
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub enabled_repositories: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub selected_repositories: Property<Vec<String>>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allowed_actions: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_github_owned_actions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_verified_creator_actions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_action_patterns: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub default_workflow_permissions: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub actions_can_approve_pull_request_reviews: Property<bool>,
}

const ORG_FIELD_SPECS: &[FieldSpec] = &[
    fields::value("enabled_repositories"),
    fields::model_only("selected_repositories"),
    fields::value("allowed_actions"),
    fields::value("allow_github_owned_actions"),
    fields::value("allow_verified_creator_actions"),
    fields::list("allow_action_patterns"),
    fields::value("default_workflow_permissions"),
    fields::value("actions_can_approve_pull_request_reviews"),
];

const REPO_FIELD_SPECS: &[FieldSpec] = &[
    fields::value("enabled"),
    fields::value("allowed_actions"),
    fields::value("allow_github_owned_actions"),
    fields::value("allow_verified_creator_actions"),
    fields::list("allow_action_patterns"),
    fields::value("default_workflow_permissions"),
    fields::value("actions_can_approve_pull_request_reviews"),
];

impl WorkflowSettings {
    pub fn empty(scope: WorkflowScope) -> Self {
        let mut settings: WorkflowSettings = serde_json::from_value(Value::Object(ModelMap::new()))
            .unwrap_or_else(|_| unreachable!("empty object always deserializes"));
        settings.scope = scope;
        settings
    }

    pub fn from_model_value(scope: WorkflowScope, data: &Value) -> Result<Self, ModelError> {
        let mut settings: WorkflowSettings = serde_json::from_value(data.clone())?;
        settings.scope = scope;
        Ok(settings)
    }

    pub fn from_provider_data(scope: WorkflowScope, data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("workflow settings are not an object".to_string()))?;

        let mut model = ModelMap::new();
        for (key, value) in object {
            let model_name = PROVIDER_RENAMES
                .iter()
                .find(|(_, provider)| provider == key)
                .map(|(model, _)| model.to_string())
                .unwrap_or_else(|| key.clone());
            model.insert(model_name, value.clone());
        }

        Self::from_model_value(scope, &Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if self.scope == WorkflowScope::Organization {
            if let Some(enabled) = self.enabled_repositories.as_deref() {
                if !matches!(enabled, "all" | "none" | "selected") {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "{header} has 'enabled_repositories' of value '{enabled}', only values ('all' | 'none' | 'selected') are allowed"
                        ),
                    );
                }
                let has_selection = self
                    .selected_repositories
                    .value()
                    .is_some_and(|repos| !repos.is_empty());
                if enabled != "selected" && has_selection {
                    context.add_failure(
                        FailureType::Warning,
                        format!(
                            "{header} lists 'selected_repositories' but 'enabled_repositories' is '{enabled}'"
                        ),
                    );
                }
            }
        }

        if let Some(allowed) = self.allowed_actions.as_deref() {
            if !matches!(allowed, "all" | "local_only" | "selected") {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'allowed_actions' of value '{allowed}', only values ('all' | 'local_only' | 'selected') are allowed"
                    ),
                );
            }
        }

        if let Some(permissions) = self.default_workflow_permissions.as_deref() {
            if !matches!(permissions, "read" | "write") {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'default_workflow_permissions' of value '{permissions}', only values ('read' | 'write') are allowed"
                    ),
                );
            }
        }
    }

    fn actions_disabled(&self) -> bool {
        match self.scope {
            WorkflowScope::Organization => self.enabled_repositories.as_deref() == Some("none"),
            WorkflowScope::Repository => self.enabled.value() == Some(&false),
        }
    }

    /// Whether this organization-level policy restricts allowed actions
    /// at least as much as the given repository-level policy; such a
    /// repository override is meaningless and coerced out of the diff.
    pub fn restricts_actions_at_least_as_much_as(&self, allowed_actions: &Property<String>) -> bool {
        match (
            self.allowed_actions.as_deref().and_then(restriction_level),
            allowed_actions.as_deref().and_then(restriction_level),
        ) {
            (Some(org_level), Some(repo_level)) => org_level >= repo_level,
            _ => false,
        }
    }
}

#[async_trait]
impl ModelObject for WorkflowSettings {
    fn resource_kind(&self) -> &'static str {
        match self.scope {
            WorkflowScope::Organization => "org_workflow_settings",
            WorkflowScope::Repository => "repo_workflow_settings",
        }
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        match self.scope {
            WorkflowScope::Organization => ORG_FIELD_SPECS,
            WorkflowScope::Repository => REPO_FIELD_SPECS,
        }
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    fn include_field_for_diff(&self, field: &str) -> bool {
        // when actions are off entirely, only the off switch itself diffs
        if self.actions_disabled() {
            return matches!(field, "enabled" | "enabled_repositories");
        }
        // the selected-actions fields only exist for allowed_actions = selected
        if SELECTED_ACTION_FIELDS.contains(&field) {
            return self.allowed_actions.as_deref() == Some("selected");
        }
        true
    }

    async fn map_to_provider(
        &self,
        org_id: &str,
        data: &ModelMap,
        provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();

        for spec in self.field_specs() {
            if spec.kind == crate::fields::FieldKind::ExternalOnly {
                continue;
            }
            let Some(value) = data.get(spec.name) else {
                continue;
            };
            let provider_name = PROVIDER_RENAMES
                .iter()
                .find(|(model, _)| *model == spec.name)
                .map(|(_, provider)| provider.to_string())
                .unwrap_or_else(|| spec.name.to_string());
            body.insert(provider_name, value.clone());
        }

        // selected repositories are written as ids
        if let Some(names) = body.remove("selected_repositories") {
            let names: Vec<String> = names
                .as_array()
                .map(|values| {
                    values
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let ids = provider.rest().get_repo_ids(org_id, &names).await?;
            body.insert("selected_repository_ids".to_string(), serde_json::json!(ids));
        }

        Ok(body)
    }

    async fn apply_add(
        &self,
        _org_id: &str,
        _provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        Err(ModelError::PatchFailed(
            "workflow settings are a singleton and cannot be added".to_string(),
        ))
    }

    async fn apply_remove(
        &self,
        _org_id: &str,
        _provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        Err(ModelError::PatchFailed(
            "workflow settings are a singleton and cannot be removed".to_string(),
        ))
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        _current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        let mut changes = changes.clone();
        // changing the selection implies writing the repository list
        if changes.contains_key("enabled_repositories")
            && self.enabled_repositories.as_deref() == Some("selected")
        {
            if let Some(repos) = self.to_model_map().get("selected_repositories") {
                changes.insert(
                    "selected_repositories".to_string(),
                    crate::object::FieldChange::forced(repos.clone()),
                );
            }
        }

        let body = self.changes_to_provider(org_id, &changes, provider).await?;

        match self.scope {
            WorkflowScope::Organization => {
                provider.rest().update_org_workflow_settings(org_id, &body).await?;
            }
            WorkflowScope::Repository => {
                let repo = parent
                    .and_then(|parent| parent.repository.clone())
                    .ok_or_else(|| {
                        ModelError::PatchFailed("repository workflow settings without parent".to_string())
                    })?;
                provider
                    .rest()
                    .update_repo_workflow_settings(org_id, &repo, &body)
                    .await?;
            }
        }
        Ok(())
    }
}
