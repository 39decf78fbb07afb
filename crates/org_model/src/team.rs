//! Teams and their membership.

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
#[path = "team_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Team {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub slug: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub description: Property<String>,
    /// `visible` or `secret`; the provider calls visible teams `closed`.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub privacy: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub notifications: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub members: Property<Vec<String>>,

    /// Leave live membership untouched.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub skip_members: Property<bool>,
    /// Tolerate members that are not organization members.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub skip_non_organization_members: Property<bool>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::external("slug"),
    fields::key("name"),
    fields::value("description"),
    fields::value("privacy"),
    fields::value("notifications"),
    fields::set("members"),
    fields::model_only("skip_members"),
    fields::model_only("skip_non_organization_members"),
];

impl Team {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        Ok(serde_json::from_value(data.clone())?)
    }

    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("team data is not an object".to_string()))?;

        let mut model = ModelMap::new();
        for field in ["id", "slug", "name", "description", "members"] {
            if let Some(value) = object.get(field) {
                model.insert(field.to_string(), value.clone());
            }
        }

        if let Some(privacy) = object.get("privacy").and_then(Value::as_str) {
            let mapped = match privacy {
                "closed" => "visible",
                other => other,
            };
            model.insert("privacy".to_string(), Value::String(mapped.to_string()));
        }

        if let Some(setting) = object.get("notification_setting").and_then(Value::as_str) {
            model.insert(
                "notifications".to_string(),
                Value::Bool(setting == "notifications_enabled"),
            );
        }

        Self::from_model_value(&Value::Object(model))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if let Some(privacy) = self.privacy.as_deref() {
            if !matches!(privacy, "visible" | "secret") {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'privacy' of value '{privacy}', only values ('visible' | 'secret') are allowed"
                    ),
                );
            }
        }

        let has_members = self.members.value().is_some_and(|members| !members.is_empty());
        if self.skip_members.value() == Some(&true) && has_members {
            context.add_failure(
                FailureType::Warning,
                format!("{header} has 'skip_members' enabled, the listed members are ignored"),
            );
        }
    }

    /// Updates address teams by slug; current objects carry the real one,
    /// additions fall back to the name.
    fn team_slug(entity: &dyn ModelObject) -> Result<String, ModelError> {
        let map = entity.to_model_map();
        map.get("slug")
            .and_then(Value::as_str)
            .or_else(|| map.get("name").and_then(Value::as_str))
            .map(str::to_string)
            .ok_or_else(|| ModelError::PatchFailed("team carries neither slug nor name".to_string()))
    }

    fn wanted_members(&self) -> Option<Vec<String>> {
        if self.skip_members.value() == Some(&true) {
            return None;
        }
        self.members.cloned_value()
    }
}

#[async_trait]
impl ModelObject for Team {
    fn resource_kind(&self) -> &'static str {
        "team"
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        FIELD_SPECS
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    fn include_field_for_diff(&self, field: &str) -> bool {
        // membership is managed outside the declaration
        !(field == "members" && self.skip_members.value() == Some(&true))
    }

    async fn map_to_provider(
        &self,
        _org_id: &str,
        data: &ModelMap,
        _provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();

        for spec in self.field_specs() {
            if !spec.writable() || spec.name == "members" {
                continue;
            }
            let Some(value) = data.get(spec.name) else {
                continue;
            };
            match spec.name {
                "privacy" => {
                    let mapped = match value.as_str() {
                        Some("visible") => "closed",
                        Some(other) => other,
                        None => continue,
                    };
                    body.insert("privacy".to_string(), Value::String(mapped.to_string()));
                }
                "notifications" => {
                    let setting = if value.as_bool() == Some(true) {
                        "notifications_enabled"
                    } else {
                        "notifications_disabled"
                    };
                    body.insert(
                        "notification_setting".to_string(),
                        Value::String(setting.to_string()),
                    );
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
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);
        provider.rest().add_org_team(org_id, &body).await?;

        if let Some(members) = self.wanted_members() {
            let slug = Self::team_slug(self)?;
            provider.rest().sync_team_members(org_id, &slug, &members).await?;
        }
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let slug = Self::team_slug(self)?;
        provider.rest().delete_org_team(org_id, &slug).await?;
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
        let slug = Self::team_slug(current)?;

        let mut settings_changes = changes.clone();
        let members_changed = settings_changes.remove("members").is_some();

        if !settings_changes.is_empty() {
            let body =
                Value::Object(self.changes_to_provider(org_id, &settings_changes, provider).await?);
            provider.rest().update_org_team(org_id, &slug, &body).await?;
        }

        if members_changed {
            if let Some(members) = self.wanted_members() {
                provider.rest().sync_team_members(org_id, &slug, &members).await?;
            }
        }
        Ok(())
    }
}
