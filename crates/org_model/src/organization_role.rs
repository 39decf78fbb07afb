//! Custom organization roles.

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
#[path = "organization_role_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationRole {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub description: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub base_role: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub permissions: Property<Vec<String>>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::key("name"),
    fields::value("description"),
    fields::value("base_role"),
    fields::set("permissions"),
];

const BASE_ROLES: &[&str] = &["none", "read", "triage", "write", "maintain", "admin"];

impl OrganizationRole {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let mut model = data
            .as_object()
            .cloned()
            .ok_or_else(|| ModelError::InvalidData("role data is not an object".to_string()))?;

        // the provider reports no base role as null
        if model.get("base_role").map(Value::is_null).unwrap_or(false) {
            model.insert("base_role".to_string(), Value::String("none".to_string()));
        }
        for external in ["organization", "created_at", "updated_at", "source"] {
            model.remove(external);
        }

        Self::from_model_value(&Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if let Some(base_role) = self.base_role.as_deref() {
            if !BASE_ROLES.contains(&base_role) {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'base_role' of value '{base_role}', only values {BASE_ROLES:?} are allowed"
                    ),
                );
            }
        }

        let has_permissions = self.permissions.value().is_some_and(|perms| !perms.is_empty());
        if !has_permissions && self.permissions.is_value() {
            context.add_failure(
                FailureType::Warning,
                format!("{header} grants no permissions"),
            );
        }
    }

    fn current_role_id(current: &dyn ModelObject) -> Result<i64, ModelError> {
        current
            .to_model_map()
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ModelError::PatchFailed("current role carries no id".to_string()))
    }
}

#[async_trait]
impl ModelObject for OrganizationRole {
    fn resource_kind(&self) -> &'static str {
        "org_role"
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
                // "none" means no base role on the provider side
                if spec.name == "base_role" && value.as_str() == Some("none") {
                    continue;
                }
                body.insert(spec.name.to_string(), value.clone());
            }
        }
        Ok(body)
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);
        provider.rest().add_org_role(org_id, &body).await?;
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let id = Self::current_role_id(self)?;
        provider.rest().delete_org_role(org_id, id).await?;
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
        current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        let id = Self::current_role_id(current)?;
        let body = Value::Object(self.changes_to_provider(org_id, changes, provider).await?);
        provider.rest().update_org_role(org_id, id, &body).await?;
        Ok(())
    }
}
