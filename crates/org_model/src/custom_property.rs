//! Organization custom property definitions.

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
#[path = "custom_property_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomProperty {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub value_type: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub default_value: Property<Value>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub description: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allowed_values: Property<Vec<String>>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::key("name"),
    fields::value("value_type"),
    fields::value("required"),
    fields::value("default_value"),
    fields::value("description"),
    fields::set("allowed_values"),
];

const VALUE_TYPES: &[&str] = &["string", "single_select", "multi_select", "true_false"];

impl CustomProperty {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let mut model = data
            .as_object()
            .cloned()
            .ok_or_else(|| ModelError::InvalidData("custom property data is not an object".to_string()))?;

        // the provider names the key field property_name
        if let Some(name) = model.remove("property_name") {
            model.insert("name".to_string(), name);
        }
        model.remove("url");
        model.remove("source_type");
        model.remove("values_editable_by");

        Self::from_model_value(&Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        let value_type = self.value_type.as_deref();
        if let Some(value_type) = value_type {
            if !VALUE_TYPES.contains(&value_type) {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'value_type' of value '{value_type}', only values {VALUE_TYPES:?} are allowed"
                    ),
                );
                return;
            }
        }

        let allowed = self.allowed_values.value();
        let needs_allowed_values = matches!(value_type, Some("single_select" | "multi_select"));

        if needs_allowed_values && allowed.is_none_or(|values| values.is_empty()) {
            context.add_failure(
                FailureType::Error,
                format!("{header} requires 'allowed_values' for its value type"),
            );
        }

        if let (Some(allowed), Some(default)) = (allowed, self.default_value.value()) {
            let default_is_allowed = match default {
                Value::String(value) => allowed.contains(value),
                Value::Array(values) => values
                    .iter()
                    .all(|value| value.as_str().is_some_and(|value| allowed.contains(&value.to_string()))),
                _ => true,
            };
            if !default_is_allowed {
                context.add_failure(
                    FailureType::Error,
                    format!("{header} has a 'default_value' outside its 'allowed_values'"),
                );
            }
        }

        if self.required.value() == Some(&true) && self.default_value.value().is_none() {
            context.add_failure(
                FailureType::Error,
                format!("{header} is required but provides no 'default_value'"),
            );
        }
    }

    fn property_name(&self) -> Result<String, ModelError> {
        self.name
            .cloned_value()
            .ok_or_else(|| ModelError::PatchFailed("custom property without a name".to_string()))
    }
}

#[async_trait]
impl ModelObject for CustomProperty {
    fn resource_kind(&self) -> &'static str {
        "custom_property"
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
            if !spec.writable() || spec.name == "name" {
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
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let name = self.property_name()?;
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);
        provider
            .rest()
            .update_org_custom_property(org_id, &name, &body)
            .await?;
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let name = self.property_name()?;
        provider.rest().delete_org_custom_property(org_id, &name).await?;
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
        _current: &dyn ModelObject,
        _changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        // the schema endpoint is an upsert, changes write the full record
        let name = self.property_name()?;
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);
        provider
            .rest()
            .update_org_custom_property(org_id, &name, &body)
            .await?;
        Ok(())
    }
}
