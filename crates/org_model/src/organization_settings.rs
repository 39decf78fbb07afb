//! Organization-wide settings.
//!
//! A handful of these only exist as web-UI form fields; the provider
//! facade routes them, the model treats them like any other field.

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
#[path = "organization_settings_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub plan: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub description: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub email: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub location: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub company: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub billing_email: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub blog: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub twitter_username: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub has_discussions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub discussion_source_repository: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub has_organization_projects: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub default_repository_permission: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub default_branch_name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub web_commit_signoff_required: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_create_private_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_create_public_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_fork_private_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub two_factor_requirement: Property<bool>,

    // web-UI only settings
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_change_repo_visibility: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_delete_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_delete_issues: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_create_teams: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members_can_create_public_pages: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub readers_can_create_discussions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub packages_containers_public: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub packages_containers_internal: Property<bool>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dependabot_alerts_enabled_for_new_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dependabot_security_updates_enabled_for_new_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dependency_graph_enabled_for_new_repositories: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub security_managers: Property<Vec<String>>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::value("name"),
    fields::read_only("plan"),
    fields::value("description"),
    fields::value("email"),
    fields::value("location"),
    fields::value("company"),
    fields::value("billing_email"),
    fields::value("blog"),
    fields::value("twitter_username"),
    fields::value("has_discussions"),
    fields::value("discussion_source_repository"),
    fields::value("has_organization_projects"),
    fields::value("default_repository_permission"),
    fields::value("default_branch_name"),
    fields::value("web_commit_signoff_required"),
    fields::value("members_can_create_private_repositories"),
    fields::value("members_can_create_public_repositories"),
    fields::value("members_can_fork_private_repositories"),
    fields::read_only("two_factor_requirement"),
    fields::value("members_can_change_repo_visibility"),
    fields::value("members_can_delete_repositories"),
    fields::value("members_can_delete_issues"),
    fields::value("members_can_create_teams"),
    fields::value("members_can_create_public_pages"),
    fields::value("readers_can_create_discussions"),
    fields::value("packages_containers_public"),
    fields::value("packages_containers_internal"),
    fields::value("dependabot_alerts_enabled_for_new_repositories"),
    fields::value("dependabot_security_updates_enabled_for_new_repositories"),
    fields::value("dependency_graph_enabled_for_new_repositories"),
    fields::set("security_managers"),
];

const REPOSITORY_PERMISSIONS: &[&str] = &["none", "read", "write", "admin"];

impl OrganizationSettings {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(data.clone())?)
    }

    /// Builds settings from the merged REST and web-UI data; unknown
    /// provider fields are dropped.
    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("organization settings are not an object".to_string()))?;

        let mut model = ModelMap::new();
        for spec in FIELD_SPECS {
            if let Some(value) = object.get(spec.name) {
                model.insert(spec.name.to_string(), value.clone());
            }
        }
        // the billing plan arrives nested
        if let Some(plan) = data.pointer("/plan/name") {
            model.insert("plan".to_string(), plan.clone());
        }

        Self::from_model_value(&Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext) {
        let header = "org_settings";

        if let Some(permission) = self.default_repository_permission.as_deref() {
            if !REPOSITORY_PERMISSIONS.contains(&permission) {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'default_repository_permission' of value '{permission}', only values {REPOSITORY_PERMISSIONS:?} are allowed"
                    ),
                );
            }
        }

        if self.dependabot_alerts_enabled_for_new_repositories.value() == Some(&true)
            && self.dependency_graph_enabled_for_new_repositories.value() == Some(&false)
        {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} enables 'dependabot_alerts_enabled_for_new_repositories' while 'dependency_graph_enabled_for_new_repositories' is disabled"
                ),
            );
        }

        if self
            .dependabot_security_updates_enabled_for_new_repositories
            .value()
            == Some(&true)
            && self.dependabot_alerts_enabled_for_new_repositories.value() == Some(&false)
        {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} enables 'dependabot_security_updates_enabled_for_new_repositories' while 'dependabot_alerts_enabled_for_new_repositories' is disabled"
                ),
            );
        }

        if self.has_discussions.value() == Some(&true)
            && self.discussion_source_repository.value().is_none()
        {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} enables 'has_discussions' but names no 'discussion_source_repository'"
                ),
            );
        }

        if let Some(branch) = self.default_branch_name.as_deref() {
            if branch.is_empty() {
                context.add_failure(
                    FailureType::Error,
                    format!("{header} has an empty 'default_branch_name'"),
                );
            }
        }
    }

    pub fn on_free_plan(&self) -> bool {
        self.plan.as_deref() == Some("free")
    }
}

#[async_trait]
impl ModelObject for OrganizationSettings {
    fn resource_kind(&self) -> &'static str {
        "org_settings"
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
        _provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();
        for spec in self.field_specs() {
            if !spec.writable() {
                continue;
            }
            if let Some(value) = data.get(spec.name) {
                body.insert(spec.name.to_string(), value.clone());
            }
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
            "organization settings are a singleton and cannot be added".to_string(),
        ))
    }

    async fn apply_remove(
        &self,
        _org_id: &str,
        _provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        Err(ModelError::PatchFailed(
            "organization settings are a singleton and cannot be removed".to_string(),
        ))
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
        _current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        let body = self.changes_to_provider(org_id, changes, provider).await?;
        provider.update_org_settings(org_id, &body).await?;
        Ok(())
    }
}
