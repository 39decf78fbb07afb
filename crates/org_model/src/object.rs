//! The uniform surface shared by all model entities.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde_json::{Map, Value};

use crate::errors::ModelError;
use crate::fields::{FieldKind, FieldSpec};
use crate::livepatch::ParentRef;

#[cfg(test)]
#[path = "object_tests.rs"]
mod tests;

/// The serialized form of an entity: field name to JSON value, with
/// `Unset` fields omitted and owned collections excluded.
pub type ModelMap = Map<String, Value>;

/// A single field change between current and expected state.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

impl FieldChange {
    pub fn new(from: Value, to: Value) -> Self {
        Self { from, to }
    }

    /// A forced change: the value is written regardless of equality.
    pub fn forced(value: Value) -> Self {
        Self {
            from: value.clone(),
            to: value,
        }
    }
}

/// Field changes keyed by field name; BTreeMap keeps output deterministic.
pub type ChangeSet = BTreeMap<String, FieldChange>;

/// Serializes an entity into its model map.
pub fn to_map<T: serde::Serialize>(entity: &T) -> ModelMap {
    match serde_json::to_value(entity) {
        Ok(Value::Object(map)) => map,
        _ => ModelMap::new(),
    }
}

/// Compares two field values, order-insensitively for set-like fields.
pub fn values_equal(spec: &FieldSpec, left: &Value, right: &Value) -> bool {
    if spec.unordered {
        if let (Value::Array(left), Value::Array(right)) = (left, right) {
            if left.len() != right.len() {
                return false;
            }
            let mut left: Vec<String> = left.iter().map(Value::to_string).collect();
            let mut right: Vec<String> = right.iter().map(Value::to_string).collect();
            left.sort();
            right.sort();
            return left == right;
        }
    }
    left == right
}

/// The uniform entity surface: field metadata, serialization, pair-wise
/// comparison, provider mapping and patch application.
///
/// `difference_from`, `patch_against` and the provider body builders have
/// default implementations driven by the entity's field specs; entities
/// implement the mapping and the patch operations.
#[async_trait]
pub trait ModelObject: Send + Sync + std::fmt::Debug {
    /// Short kind name used in headers and patch output, e.g. `repo_webhook`.
    fn resource_kind(&self) -> &'static str;

    fn field_specs(&self) -> &'static [FieldSpec];

    /// The serialized model form with `Unset` fields and owned collections
    /// omitted.
    fn to_model_map(&self) -> ModelMap;

    /// Field names whose values are opaque secrets, excluded from diff
    /// display and forced-change sets by the callers that need it.
    fn secret_fields(&self) -> &'static [&'static str] {
        &[]
    }

    /// A copy of the entity with secret-field references replaced by
    /// their resolved plaintext; `None` for entities without secret
    /// fields. Called by the applier immediately before a write.
    fn resolve_secret_fields(
        &self,
        _resolved: &HashMap<String, String>,
    ) -> Option<Arc<dyn ModelObject>> {
        None
    }

    fn key_field(&self) -> Option<&'static str> {
        self.field_specs()
            .iter()
            .find(|spec| spec.kind == FieldKind::Key)
            .map(|spec| spec.name)
    }

    /// The value of the key field, when the entity is keyed and the key is
    /// set.
    fn key_value(&self) -> Option<String> {
        let key_field = self.key_field()?;
        self.to_model_map()
            .get(key_field)
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    /// Per-entity opt-out of diffing for state-dependent fields.
    fn include_field_for_diff(&self, _field: &str) -> bool {
        true
    }

    /// Header identifying the entity in human output.
    fn model_header(&self, parent: Option<&ParentRef>) -> String {
        let kind = self.resource_kind();
        let key = match (self.key_field(), self.key_value()) {
            (Some(field), Some(value)) => Some(format!("{field}=\"{value}\"")),
            _ => None,
        };
        match (key, parent.and_then(|parent| parent.repository.as_deref())) {
            (Some(key), Some(repo)) => format!("{kind}[{key}, repository=\"{repo}\"]"),
            (None, Some(repo)) => format!("{kind}[repository=\"{repo}\"]"),
            (Some(key), None) => format!("{kind}[{key}]"),
            (None, None) => kind.to_string(),
        }
    }

    /// Field-wise difference of `self` (expected) from `current`.
    ///
    /// `Unset` on either side removes the field from the comparison;
    /// read-only, external and model-only fields never participate.
    fn difference_from(&self, current: &dyn ModelObject) -> ChangeSet {
        let expected_map = self.to_model_map();
        let current_map = current.to_model_map();
        let mut changes = ChangeSet::new();

        for spec in self.field_specs() {
            if !spec.diffable() {
                continue;
            }
            if !self.include_field_for_diff(spec.name) {
                continue;
            }
            let Some(expected) = expected_map.get(spec.name) else {
                continue;
            };
            let Some(current_value) = current_map.get(spec.name) else {
                continue;
            };

            if !values_equal(spec, expected, current_value) {
                changes.insert(
                    spec.name.to_string(),
                    FieldChange::new(current_value.clone(), expected.clone()),
                );
            }
        }

        changes
    }

    /// A forced change set covering every set field of the entity.
    fn forced_changes(&self) -> ChangeSet {
        let mut changes = ChangeSet::new();
        let map = self.to_model_map();
        for spec in self.field_specs() {
            if !spec.writable() {
                continue;
            }
            if let Some(value) = map.get(spec.name) {
                changes.insert(spec.name.to_string(), FieldChange::forced(value.clone()));
            }
        }
        changes
    }

    /// The fields of `self` differing from a default entity, used when
    /// rendering declarations: only non-default fields are emitted.
    fn patch_against(&self, default: &dyn ModelObject) -> ModelMap {
        let own = self.to_model_map();
        let default_map = default.to_model_map();
        let mut patch = ModelMap::new();

        for spec in self.field_specs() {
            if !spec.rendered() {
                continue;
            }
            let Some(value) = own.get(spec.name) else {
                continue;
            };
            match default_map.get(spec.name) {
                Some(default_value) if values_equal(spec, value, default_value) => {}
                _ => {
                    patch.insert(spec.name.to_string(), value.clone());
                }
            }
        }

        patch
    }

    /// Maps a model-shaped map to the provider write shape.
    async fn map_to_provider(
        &self,
        org_id: &str,
        data: &ModelMap,
        provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError>;

    /// The full provider write body for this entity.
    async fn to_provider_body(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let map = self.to_model_map();
        self.map_to_provider(org_id, &map, provider).await
    }

    /// The provider write body restricted to the changed fields.
    async fn changes_to_provider(
        &self,
        org_id: &str,
        changes: &ChangeSet,
        provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut partial = ModelMap::new();
        for (field, change) in changes {
            partial.insert(field.clone(), change.to.clone());
        }
        self.map_to_provider(org_id, &partial, provider).await
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError>;

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError>;

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError>;
}
