//! Actions variables, at organization, repository and environment scope.
//!
//! Unlike secrets, variable values read back from the provider, so they
//! diff like any other field.

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::property::Property;
use crate::secret::{map_org_scope_to_provider, validate_visibility};
use crate::validation::ValidationContext;

#[cfg(test)]
#[path = "variable_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VariableScope {
    #[default]
    Organization,
    Repository,
    Environment,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variable {
    #[serde(skip)]
    pub scope: VariableScope,

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

impl Variable {
    pub fn from_model_value(scope: VariableScope, data: &Value) -> Result<Self, ModelError> {
        let mut variable: Variable = serde_json::from_value(data.clone())?;
        variable.scope = scope;
        Ok(variable)
    }

    pub fn from_provider_data(scope: VariableScope, data: &Value) -> Result<Self, ModelError> {
        let mut model = data
            .as_object()
            .cloned()
            .ok_or_else(|| ModelError::InvalidData("variable data is not an object".to_string()))?;

        if model.get("visibility").and_then(Value::as_str) == Some("all") {
            model.insert("visibility".to_string(), Value::String("public".to_string()));
        }
        model.remove("created_at");
        model.remove("updated_at");

        Self::from_model_value(scope, &Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        if self.scope == VariableScope::Organization {
            let header = self.model_header(parent);
            validate_visibility(context, &header, &self.visibility, &self.selected_repositories);
        }
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| ModelError::PatchFailed("scoped variable without repository parent".to_string()))
    }

    fn environment_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.environment.clone())
            .ok_or_else(|| {
                ModelError::PatchFailed("environment variable without environment parent".to_string())
            })
    }

    fn variable_name(&self) -> Result<String, ModelError> {
        self.name
            .cloned_value()
            .ok_or_else(|| ModelError::PatchFailed("variable without a name".to_string()))
    }
}

#[async_trait]
impl ModelObject for Variable {
    fn resource_kind(&self) -> &'static str {
        match self.scope {
            VariableScope::Organization => "org_variable",
            VariableScope::Repository => "repo_variable",
            VariableScope::Environment => "environment_variable",
        }
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        match self.scope {
            VariableScope::Organization => ORG_FIELD_SPECS,
            _ => SCOPED_FIELD_SPECS,
        }
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
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
        if self.scope == VariableScope::Organization {
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
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);

        match self.scope {
            VariableScope::Organization => {
                provider.rest().add_org_variable(org_id, &body).await?;
            }
            VariableScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider.rest().add_repo_variable(org_id, &repo, &body).await?;
            }
            VariableScope::Environment => {
                let repo = Self::repo_name(parent)?;
                let environment = Self::environment_name(parent)?;
                provider
                    .rest()
                    .add_environment_variable(org_id, &repo, &environment, &body)
                    .await?;
            }
        }
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let name = self.variable_name()?;
        match self.scope {
            VariableScope::Organization => {
                provider.rest().delete_org_variable(org_id, &name).await?;
            }
            VariableScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider
                    .rest()
                    .delete_repo_variable(org_id, &repo, &name)
                    .await?;
            }
            VariableScope::Environment => {
                let repo = Self::repo_name(parent)?;
                let environment = Self::environment_name(parent)?;
                provider
                    .rest()
                    .delete_environment_variable(org_id, &repo, &environment, &name)
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
        current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        // updates address the variable by its current name
        let current_name = current
            .key_value()
            .ok_or_else(|| ModelError::PatchFailed("current variable carries no name".to_string()))?;
        let body = Value::Object(self.changes_to_provider(org_id, changes, provider).await?);

        match self.scope {
            VariableScope::Organization => {
                provider
                    .rest()
                    .update_org_variable(org_id, &current_name, &body)
                    .await?;
            }
            VariableScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider
                    .rest()
                    .update_repo_variable(org_id, &repo, &current_name, &body)
                    .await?;
            }
            VariableScope::Environment => {
                let repo = Self::repo_name(parent)?;
                let environment = Self::environment_name(parent)?;
                provider
                    .rest()
                    .update_environment_variable(org_id, &repo, &environment, &current_name, &body)
                    .await?;
            }
        }
        Ok(())
    }
}
