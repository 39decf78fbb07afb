//! Actions secrets, at organization, repository and environment scope.
//!
//! Secret values can never be read back from the provider, so current
//! objects carry no `value` and the diff engine only acts on secrets via
//! dummy detection, forced updates and presence changes.

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::patterns::{is_dummy_secret, is_secret_reference};
use crate::property::Property;
use crate::validation::{FailureType, ValidationContext};

#[cfg(test)]
#[path = "secret_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SecretScope {
    #[default]
    Organization,
    Repository,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Secret {
    #[serde(skip)]
    pub scope: SecretScope,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub value: Property<String>,

    // organization scope only
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub visibility: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub selected_repositories: Property<Vec<String>>,
}

const ORG_FIELD_SPECS: &[FieldSpec] = &[
    fields::key("name"),
    fields::value("value"),
    fields::value("visibility"),
    fields::set("selected_repositories"),
];

const SCOPED_FIELD_SPECS: &[FieldSpec] = &[fields::key("name"), fields::value("value")];

impl Secret {
    pub fn from_model_value(scope: SecretScope, data: &Value) -> Result<Self, ModelError> {
        let mut secret: Secret = serde_json::from_value(data.clone())?;
        secret.scope = scope;
        Ok(secret)
    }

    pub fn from_provider_data(scope: SecretScope, data: &Value) -> Result<Self, ModelError> {
        let mut model = data
            .as_object()
            .cloned()
            .ok_or_else(|| ModelError::InvalidData("secret data is not an object".to_string()))?;

        // provider "all" is the model's "public"
        if model.get("visibility").and_then(Value::as_str) == Some("all") {
            model.insert("visibility".to_string(), Value::String("public".to_string()));
        }
        model.remove("created_at");
        model.remove("updated_at");

        Self::from_model_value(scope, &Value::Object(model))
    }

    pub fn has_dummy_secret(&self) -> bool {
        self.value.as_deref().is_some_and(is_dummy_secret)
    }

    pub fn has_real_value(&self) -> bool {
        self.value.as_deref().is_some_and(|value| !is_dummy_secret(value))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if self.has_dummy_secret() {
            context.add_failure(
                FailureType::Info,
                format!("{header} will be skipped during processing: secret only has a dummy value"),
            );
        } else if let Some(value) = self.value.as_deref() {
            if !is_secret_reference(value) {
                context.add_failure(
                    FailureType::Warning,
                    format!("{header} has a value that does not use a credential provider"),
                );
            }
        }

        if self.scope == SecretScope::Organization {
            validate_visibility(context, &header, &self.visibility, &self.selected_repositories);
        }
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| ModelError::PatchFailed("scoped secret without repository parent".to_string()))
    }

    fn environment_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.environment.clone())
            .ok_or_else(|| ModelError::PatchFailed("environment secret without environment parent".to_string()))
    }

    fn secret_name(&self) -> Result<String, ModelError> {
        self.name
            .cloned_value()
            .ok_or_else(|| ModelError::PatchFailed("secret without a name".to_string()))
    }

    /// Secrets are upserts: create and update share the PUT endpoint.
    async fn upsert(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        body: ModelMap,
    ) -> Result<(), ModelError> {
        let name = self.secret_name()?;
        let body = Value::Object(body);

        match self.scope {
            SecretScope::Organization => {
                provider.rest().update_org_secret(org_id, &name, &body).await?;
            }
            SecretScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider
                    .rest()
                    .update_repo_secret(org_id, &repo, &name, &body)
                    .await?;
            }
            SecretScope::Environment => {
                let repo = Self::repo_name(parent)?;
                let environment = Self::environment_name(parent)?;
                provider
                    .rest()
                    .update_environment_secret(org_id, &repo, &environment, &name, &body)
                    .await?;
            }
        }
        Ok(())
    }
}

/// Shared consistency checks for org-scoped secret/variable visibility.
pub(crate) fn validate_visibility(
    context: &mut ValidationContext,
    header: &str,
    visibility: &Property<String>,
    selected_repositories: &Property<Vec<String>>,
) {
    if let Some(visibility) = visibility.as_deref() {
        if !matches!(visibility, "public" | "private" | "selected") {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} has 'visibility' of value '{visibility}', only values ('public' | 'private' | 'selected') are allowed"
                ),
            );
            return;
        }

        let has_selection = selected_repositories
            .value()
            .is_some_and(|repos| !repos.is_empty());

        if visibility != "selected" && has_selection {
            context.add_failure(
                FailureType::Warning,
                format!("{header} lists 'selected_repositories' but visibility is '{visibility}'"),
            );
        }
        if visibility == "selected" && !has_selection {
            context.add_failure(
                FailureType::Warning,
                format!("{header} has visibility 'selected' but lists no repositories"),
            );
        }
    }
}

/// Maps visibility and selected repositories to the provider write shape;
/// shared with variables.
pub(crate) async fn map_org_scope_to_provider(
    org_id: &str,
    body: &mut ModelMap,
    provider: &GitHubProvider,
) -> Result<(), ModelError> {
    if body.get("visibility").and_then(Value::as_str) == Some("public") {
        body.insert("visibility".to_string(), Value::String("all".to_string()));
    }
    provider
        .rest()
        .resolve_selected_repositories(org_id, body)
        .await?;
    Ok(())
}

#[async_trait]
impl ModelObject for Secret {
    fn resource_kind(&self) -> &'static str {
        match self.scope {
            SecretScope::Organization => "org_secret",
            SecretScope::Repository => "repo_secret",
            SecretScope::Environment => "environment_secret",
        }
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        match self.scope {
            SecretScope::Organization => ORG_FIELD_SPECS,
            _ => SCOPED_FIELD_SPECS,
        }
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    fn secret_fields(&self) -> &'static [&'static str] {
        &["value"]
    }

    // values cannot be read back from the provider; the diff engine only
    // compares unresolved references against each other
    fn include_field_for_diff(&self, field: &str) -> bool {
        field != "value"
    }

    fn resolve_secret_fields(
        &self,
        resolved: &std::collections::HashMap<String, String>,
    ) -> Option<std::sync::Arc<dyn ModelObject>> {
        let mut secret = self.clone();
        if let Some(reference) = secret.value.as_deref() {
            if let Some(plaintext) = resolved.get(reference) {
                secret.value = Property::Value(plaintext.clone());
            }
        }
        Some(std::sync::Arc::new(secret))
    }

    async fn map_to_provider(
        &self,
        org_id: &str,
        data: &ModelMap,
        provider: &GitHubProvider,
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
        if self.scope == SecretScope::Organization {
            map_org_scope_to_provider(org_id, &mut body, provider).await?;
        }
        Ok(body)
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let body = self.to_provider_body(org_id, provider).await?;
        self.upsert(org_id, provider, parent, body).await
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let name = self.secret_name()?;
        match self.scope {
            SecretScope::Organization => {
                provider.rest().delete_org_secret(org_id, &name).await?;
            }
            SecretScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider.rest().delete_repo_secret(org_id, &repo, &name).await?;
            }
            SecretScope::Environment => {
                let repo = Self::repo_name(parent)?;
                let environment = Self::environment_name(parent)?;
                provider
                    .rest()
                    .delete_environment_secret(org_id, &repo, &environment, &name)
                    .await?;
            }
        }
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
        let body = self.changes_to_provider(org_id, changes, provider).await?;
        self.upsert(org_id, provider, parent, body).await
    }
}
