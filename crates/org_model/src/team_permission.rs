//! Team permissions on a repository.

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
#[path = "team_permission_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TeamPermission {
    /// Team slug; the `@org/` prefix of an actor token is accepted and
    /// stripped on input.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub team: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub permission: Property<String>,
}

const FIELD_SPECS: &[FieldSpec] = &[fields::key("team"), fields::value("permission")];

const PERMISSIONS: &[&str] = &["pull", "triage", "push", "maintain", "admin"];

fn normalize_team(team: &str) -> String {
    let team = team.strip_prefix('@').unwrap_or(team);
    match team.split_once('/') {
        Some((_, slug)) => slug.to_string(),
        None => team.to_string(),
    }
}

impl TeamPermission {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        let mut permission: TeamPermission = serde_json::from_value(data.clone())?;
        permission.team = permission.team.map(|team| normalize_team(&team));
        Ok(permission)
    }

    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("team permission data is not an object".to_string()))?;

        let mut model = ModelMap::new();
        if let Some(slug) = object.get("slug") {
            model.insert("team".to_string(), slug.clone());
        }
        if let Some(permission) = object.get("permission") {
            model.insert("permission".to_string(), permission.clone());
        }

        Self::from_model_value(&Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        if let Some(permission) = self.permission.as_deref() {
            if !PERMISSIONS.contains(&permission) {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{} has 'permission' of value '{permission}', only values {PERMISSIONS:?} are allowed",
                        self.model_header(parent)
                    ),
                );
            }
        }
    }

    fn team_slug(&self) -> Result<String, ModelError> {
        self.team
            .cloned_value()
            .ok_or_else(|| ModelError::PatchFailed("team permission without a team".to_string()))
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| ModelError::PatchFailed("team permission without repository parent".to_string()))
    }
}

#[async_trait]
impl ModelObject for TeamPermission {
    fn resource_kind(&self) -> &'static str {
        "team_permission"
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
        Ok(data.clone())
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let repo = Self::repo_name(parent)?;
        let team = self.team_slug()?;
        let permission = self
            .permission
            .cloned_value()
            .ok_or_else(|| ModelError::PatchFailed("team permission without a permission".to_string()))?;

        provider
            .rest()
            .update_team_permission(org_id, &repo, &team, &permission)
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
        let team = self.team_slug()?;
        provider
            .rest()
            .remove_team_permission(org_id, &repo, &team)
            .await?;
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        _current: &dyn ModelObject,
        _changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        // the permission PUT is an upsert
        self.apply_add(org_id, provider, parent).await
    }
}
