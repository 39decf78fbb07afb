//! Live patches: the atomic units of change between expected and current
//! state.

use std::collections::HashMap;
use std::sync::Arc;

use github_client::GitHubProvider;
use regex::Regex;
use serde_json::Value;

use crate::errors::ModelError;
use crate::object::{ChangeSet, ModelObject};
use crate::patterns::is_secret_reference;

#[cfg(test)]
#[path = "livepatch_tests.rs"]
mod tests;

/// Identifies the owner of a nested entity for patch application; carries
/// only what the provider operations need, not the parent entity itself.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ParentRef {
    pub repository: Option<String>,
    pub repository_node_id: Option<String>,
    pub environment: Option<String>,
}

impl ParentRef {
    pub fn repository(name: impl Into<String>) -> Self {
        Self {
            repository: Some(name.into()),
            ..Self::default()
        }
    }

    pub fn environment(repository: impl Into<String>, environment: impl Into<String>) -> Self {
        Self {
            repository: Some(repository.into()),
            environment: Some(environment.into()),
            ..Self::default()
        }
    }

    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.repository_node_id = Some(node_id.into());
        self
    }
}

/// Options steering patch generation, passed down from the driver.
#[derive(Debug, Clone)]
pub struct PatchContext {
    /// Force full updates of webhooks carrying a real secret.
    pub update_webhooks: bool,
    /// Force full updates of secrets carrying a real value.
    pub update_secrets: bool,
    /// Restricts forced updates to matching keys.
    pub update_filter: Regex,
}

impl Default for PatchContext {
    fn default() -> Self {
        Self {
            update_webhooks: false,
            update_secrets: false,
            update_filter: Regex::new(".*").unwrap(),
        }
    }
}

impl PatchContext {
    pub fn filter_matches(&self, key: &str) -> bool {
        self.update_filter.is_match(key)
    }
}

/// One atomic change, consumed at most once by the applier.
#[derive(Debug, Clone)]
pub enum LivePatch {
    Add {
        expected: Arc<dyn ModelObject>,
        parent: Option<ParentRef>,
    },
    Remove {
        current: Arc<dyn ModelObject>,
        parent: Option<ParentRef>,
    },
    Change {
        expected: Arc<dyn ModelObject>,
        current: Arc<dyn ModelObject>,
        changes: ChangeSet,
        parent: Option<ParentRef>,
        forced: bool,
    },
}

impl LivePatch {
    pub fn addition(expected: Arc<dyn ModelObject>, parent: Option<ParentRef>) -> Self {
        LivePatch::Add { expected, parent }
    }

    pub fn deletion(current: Arc<dyn ModelObject>, parent: Option<ParentRef>) -> Self {
        LivePatch::Remove { current, parent }
    }

    pub fn changes(
        expected: Arc<dyn ModelObject>,
        current: Arc<dyn ModelObject>,
        changes: ChangeSet,
        parent: Option<ParentRef>,
        forced: bool,
    ) -> Self {
        LivePatch::Change {
            expected,
            current,
            changes,
            parent,
            forced,
        }
    }

    /// The entity the patch is about: expected for additions and changes,
    /// current for removals.
    pub fn entity(&self) -> &dyn ModelObject {
        match self {
            LivePatch::Add { expected, .. } => expected.as_ref(),
            LivePatch::Remove { current, .. } => current.as_ref(),
            LivePatch::Change { expected, .. } => expected.as_ref(),
        }
    }

    pub fn parent(&self) -> Option<&ParentRef> {
        match self {
            LivePatch::Add { parent, .. }
            | LivePatch::Remove { parent, .. }
            | LivePatch::Change { parent, .. } => parent.as_ref(),
        }
    }

    pub fn is_addition(&self) -> bool {
        matches!(self, LivePatch::Add { .. })
    }

    pub fn is_deletion(&self) -> bool {
        matches!(self, LivePatch::Remove { .. })
    }

    pub fn is_change(&self) -> bool {
        matches!(self, LivePatch::Change { .. })
    }

    /// Human description of the patch target.
    pub fn header(&self) -> String {
        self.entity().model_header(self.parent())
    }

    /// The unresolved secret references the patch would write: the secret
    /// fields of a new entity, or the target values of a change set.
    /// Dummy placeholders and plaintext values are not references and
    /// never show up here.
    pub fn secret_references(&self) -> Vec<String> {
        match self {
            LivePatch::Add { expected, .. } => {
                let map = expected.to_model_map();
                expected
                    .secret_fields()
                    .iter()
                    .filter_map(|field| map.get(*field).and_then(Value::as_str))
                    .filter(|value| is_secret_reference(value))
                    .map(str::to_string)
                    .collect()
            }
            LivePatch::Remove { .. } => Vec::new(),
            LivePatch::Change {
                expected, changes, ..
            } => expected
                .secret_fields()
                .iter()
                .filter_map(|field| changes.get(*field))
                .filter_map(|change| change.to.as_str())
                .filter(|value| is_secret_reference(value))
                .map(str::to_string)
                .collect(),
        }
    }

    /// A copy of the patch with resolved plaintext substituted into the
    /// expected entity and the change set; values not present in the map
    /// are left untouched.
    pub fn with_resolved_secrets(&self, resolved: &HashMap<String, String>) -> LivePatch {
        let substitute = |entity: &Arc<dyn ModelObject>| {
            entity
                .resolve_secret_fields(resolved)
                .unwrap_or_else(|| Arc::clone(entity))
        };

        match self {
            LivePatch::Add { expected, parent } => LivePatch::Add {
                expected: substitute(expected),
                parent: parent.clone(),
            },
            LivePatch::Remove { .. } => self.clone(),
            LivePatch::Change {
                expected,
                current,
                changes,
                parent,
                forced,
            } => {
                let mut changes = changes.clone();
                for field in expected.secret_fields() {
                    if let Some(change) = changes.get_mut(*field) {
                        let plaintext = change
                            .to
                            .as_str()
                            .and_then(|reference| resolved.get(reference));
                        if let Some(plaintext) = plaintext {
                            change.to = Value::String(plaintext.clone());
                        }
                    }
                }
                LivePatch::Change {
                    expected: substitute(expected),
                    current: Arc::clone(current),
                    changes,
                    parent: parent.clone(),
                    forced: *forced,
                }
            }
        }
    }

    /// Executes the patch against the provider, dispatching to the
    /// entity's operation for the patch kind.
    pub async fn apply(&self, org_id: &str, provider: &GitHubProvider) -> Result<(), ModelError> {
        match self {
            LivePatch::Add { expected, parent } => {
                expected.apply_add(org_id, provider, parent.as_ref()).await
            }
            LivePatch::Remove { current, parent } => {
                current.apply_remove(org_id, provider, parent.as_ref()).await
            }
            LivePatch::Change {
                expected,
                current,
                changes,
                parent,
                ..
            } => {
                expected
                    .apply_change(org_id, provider, parent.as_ref(), current.as_ref(), changes)
                    .await
            }
        }
    }
}
