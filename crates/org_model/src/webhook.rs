//! Webhooks, at organization and repository scope.

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ModelMap, ModelObject};
use crate::patterns::{is_dummy_secret, is_secret_reference};
use crate::property::Property;
use crate::validation::{FailureType, ValidationContext};

#[cfg(test)]
#[path = "webhook_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WebhookScope {
    #[default]
    Organization,
    Repository,
}

/// A webhook; the provider keeps `url`, `content_type`, `insecure_ssl` and
/// `secret` in a nested `config` object, the model keeps them flat.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    #[serde(skip)]
    pub scope: WebhookScope,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub url: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub events: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub active: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub content_type: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub insecure_ssl: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub secret: Property<String>,

    /// Previous urls of this webhook, used to recognize renames.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::key("url"),
    fields::set("events"),
    fields::value("active"),
    fields::value("content_type"),
    fields::value("insecure_ssl"),
    fields::value("secret"),
    fields::model_only("aliases"),
];

/// The flat model fields the provider nests under `config`.
const CONFIG_FIELDS: &[&str] = &["url", "content_type", "insecure_ssl", "secret"];

impl Webhook {
    pub fn from_model_value(scope: WebhookScope, data: &Value) -> Result<Self, ModelError> {
        let mut webhook: Webhook = serde_json::from_value(data.clone())?;
        webhook.scope = scope;
        Ok(webhook)
    }

    pub fn from_provider_data(scope: WebhookScope, data: &Value) -> Result<Self, ModelError> {
        let mut model = data
            .as_object()
            .cloned()
            .ok_or_else(|| ModelError::InvalidData("webhook data is not an object".to_string()))?;

        if let Some(Value::Object(config)) = model.remove("config") {
            for field in CONFIG_FIELDS {
                match config.get(*field) {
                    Some(value) => {
                        model.insert(field.to_string(), value.clone());
                    }
                    // a hidden secret reads back as explicitly absent so
                    // that presence changes show up in the diff
                    None if *field == "secret" => {
                        model.insert(field.to_string(), Value::Null);
                    }
                    None => {}
                }
            }
        }

        Self::from_model_value(scope, &Value::Object(model))
    }

    /// The primary url plus all aliases.
    pub fn all_urls(&self) -> Vec<String> {
        let mut urls = Vec::with_capacity(1 + self.aliases.len());
        if let Some(url) = self.url.as_deref() {
            urls.push(url.to_string());
        }
        urls.extend(self.aliases.iter().cloned());
        urls
    }

    pub fn has_dummy_secret(&self) -> bool {
        self.secret.as_deref().is_some_and(is_dummy_secret)
    }

    /// A secret that is present and not a redaction placeholder.
    pub fn has_real_secret(&self) -> bool {
        self.secret.as_deref().is_some_and(|secret| !is_dummy_secret(secret))
    }

    pub fn validate(&self, context: &mut ValidationContext, parent: Option<&ParentRef>) {
        let header = self.model_header(parent);

        if self.has_dummy_secret() {
            context.add_failure(
                FailureType::Info,
                format!(
                    "{header} will be skipped during processing: webhook only has a dummy secret configured"
                ),
            );
        } else if let Some(secret) = self.secret.as_deref() {
            if !is_secret_reference(secret) {
                context.add_failure(
                    FailureType::Warning,
                    format!("{header} has a secret that does not use a credential provider"),
                );
            }
        }

        if let Some(content_type) = self.content_type.as_deref() {
            if !matches!(content_type, "json" | "form") {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'content_type' of value '{content_type}', only values ('json' | 'form') are allowed"
                    ),
                );
            }
        }

        if let Some(insecure_ssl) = self.insecure_ssl.as_deref() {
            if !matches!(insecure_ssl, "0" | "1") {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'insecure_ssl' of value '{insecure_ssl}', only values ('0' | '1') are allowed"
                    ),
                );
            }
        }

        if let Some(url) = self.url.as_deref() {
            if url::Url::parse(url).is_err() {
                context.add_failure(
                    FailureType::Error,
                    format!("{header} has an invalid url '{url}'"),
                );
            }
        }
    }

    fn current_id(current: &dyn ModelObject) -> Result<i64, ModelError> {
        current
            .to_model_map()
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ModelError::PatchFailed("current webhook carries no id".to_string()))
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| ModelError::PatchFailed("repository webhook without parent".to_string()))
    }
}

#[async_trait]
impl ModelObject for Webhook {
    fn resource_kind(&self) -> &'static str {
        match self.scope {
            WebhookScope::Organization => "org_webhook",
            WebhookScope::Repository => "repo_webhook",
        }
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        FIELD_SPECS
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    fn secret_fields(&self) -> &'static [&'static str] {
        &["secret"]
    }

    // the provider masks configured secrets, so plain comparison would
    // always disagree; the diff engine applies presence semantics instead
    fn include_field_for_diff(&self, field: &str) -> bool {
        field != "secret"
    }

    fn resolve_secret_fields(
        &self,
        resolved: &std::collections::HashMap<String, String>,
    ) -> Option<std::sync::Arc<dyn ModelObject>> {
        let mut webhook = self.clone();
        if let Some(reference) = webhook.secret.as_deref() {
            if let Some(plaintext) = resolved.get(reference) {
                webhook.secret = Property::Value(plaintext.clone());
            }
        }
        Some(std::sync::Arc::new(webhook))
    }

    async fn map_to_provider(
        &self,
        _org_id: &str,
        data: &ModelMap,
        _provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();
        let mut config = ModelMap::new();

        for spec in self.field_specs() {
            if !spec.writable() {
                continue;
            }
            let Some(value) = data.get(spec.name) else {
                continue;
            };
            if CONFIG_FIELDS.contains(&spec.name) {
                config.insert(spec.name.to_string(), value.clone());
            } else {
                body.insert(spec.name.to_string(), value.clone());
            }
        }

        if !config.is_empty() {
            body.insert("config".to_string(), Value::Object(config));
        }

        Ok(body)
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let mut body = self.to_provider_body(org_id, provider).await?;
        // organization webhooks require the legacy form name
        body.insert("name".to_string(), Value::String("web".to_string()));
        let body = Value::Object(body);

        match self.scope {
            WebhookScope::Organization => {
                provider.rest().add_org_webhook(org_id, &body).await?;
            }
            WebhookScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider.rest().add_repo_webhook(org_id, &repo, &body).await?;
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
        let id = Self::current_id(self)?;
        match self.scope {
            WebhookScope::Organization => {
                provider.rest().delete_org_webhook(org_id, id).await?;
            }
            WebhookScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider.rest().delete_repo_webhook(org_id, &repo, id).await?;
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
        changes: &crate::object::ChangeSet,
    ) -> Result<(), ModelError> {
        let id = Self::current_id(current)?;
        let body = Value::Object(self.changes_to_provider(org_id, changes, provider).await?);

        match self.scope {
            WebhookScope::Organization => {
                provider.rest().update_org_webhook(org_id, id, &body).await?;
            }
            WebhookScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider
                    .rest()
                    .update_repo_webhook(org_id, &repo, id, &body)
                    .await?;
            }
        }
        Ok(())
    }
}
