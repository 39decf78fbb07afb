//! The diff engine: compares an expected against a current organization
//! and produces the ordered stream of live patches.
//!
//! Ordering is fixed so that prerequisites precede their dependents:
//! organization singletons, then organization collections, then
//! repositories with their sub-trees. Within a collection, current items
//! are visited in provider order for removals and changes, remaining
//! expected items in key order for additions.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;
use tracing::warn;

use crate::livepatch::{LivePatch, ParentRef, PatchContext};
use crate::object::{ChangeSet, FieldChange, ModelObject};
use crate::organization::GitHubOrganization;
use crate::patterns::is_dummy_secret;
use crate::property::Property;
use crate::repository::Repository;
use crate::secret::Secret;
use crate::webhook::Webhook;
use crate::workflow_settings::{WorkflowSettings, SELECTED_ACTION_FIELDS};

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;

/// Generates all live patches turning `current` into `expected`.
pub fn generate_live_patches(
    expected: &GitHubOrganization,
    current: &GitHubOrganization,
    context: &PatchContext,
) -> Vec<LivePatch> {
    let mut patches = Vec::new();

    // organization settings come first; some of their changes coerce
    // repository-level fields below
    let settings_changes = expected.settings.difference_from(&current.settings);
    if settings_changes
        .get("web_commit_signoff_required")
        .is_some_and(|change| change.to == Value::Bool(false))
    {
        warn!(
            "disabling 'web_commit_signoff_required' on organization level; effective repository \
             values are only known after applying, a second run may be required"
        );
    }
    let org_signoff_enabled = settings_changes
        .get("web_commit_signoff_required")
        .is_some_and(|change| change.to == Value::Bool(true));

    if !settings_changes.is_empty() {
        patches.push(LivePatch::changes(
            Arc::new(expected.settings.clone()),
            Arc::new(current.settings.clone()),
            settings_changes,
            None,
            false,
        ));
    }

    let workflow_changes = expected
        .workflow_settings
        .difference_from(&current.workflow_settings);
    if !workflow_changes.is_empty() {
        patches.push(LivePatch::changes(
            Arc::new(expected.workflow_settings.clone()),
            Arc::new(current.workflow_settings.clone()),
            workflow_changes,
            None,
            false,
        ));
    }

    diff_collection(
        &expected.custom_properties,
        &current.custom_properties,
        None,
        |_| false,
        &mut patches,
    );
    diff_collection(&expected.roles, &current.roles, None, |_| false, &mut patches);
    diff_collection(&expected.rulesets, &current.rulesets, None, |_| false, &mut patches);
    diff_collection(&expected.teams, &current.teams, None, |_| false, &mut patches);
    diff_webhooks(&expected.webhooks, &current.webhooks, None, context, &mut patches);
    diff_secrets(&expected.secrets, &current.secrets, None, context, &mut patches);
    diff_collection(
        &expected.variables,
        &current.variables,
        None,
        has_dummy_variable_value,
        &mut patches,
    );

    diff_repositories(expected, current, context, org_signoff_enabled, &mut patches);

    patches
}

fn has_dummy_variable_value(variable: &crate::variable::Variable) -> bool {
    variable.value.as_deref().is_some_and(is_dummy_secret)
}

/// Diff of a plain keyed collection: removals and changes follow current
/// order, additions follow key order. `skip` drops an expected item from
/// processing entirely.
fn diff_collection<T>(
    expected: &[T],
    current: &[T],
    parent: Option<&ParentRef>,
    skip: impl Fn(&T) -> bool,
    patches: &mut Vec<LivePatch>,
) where
    T: ModelObject + Clone + 'static,
{
    let mut expected_by_key: HashMap<String, usize> = HashMap::new();
    for (index, item) in expected.iter().enumerate() {
        if let Some(key) = item.key_value() {
            expected_by_key.insert(key, index);
        }
    }
    let mut claimed = vec![false; expected.len()];

    for current_item in current {
        let Some(key) = current_item.key_value() else {
            continue;
        };
        match expected_by_key.get(&key) {
            Some(&index) => {
                claimed[index] = true;
                let expected_item = &expected[index];
                if skip(expected_item) {
                    continue;
                }
                let changes = expected_item.difference_from(current_item);
                if !changes.is_empty() {
                    patches.push(LivePatch::changes(
                        Arc::new(expected_item.clone()),
                        Arc::new(current_item.clone()),
                        changes,
                        parent.cloned(),
                        false,
                    ));
                }
            }
            None => {
                patches.push(LivePatch::deletion(
                    Arc::new(current_item.clone()),
                    parent.cloned(),
                ));
            }
        }
    }

    let mut additions: Vec<&T> = expected
        .iter()
        .enumerate()
        .filter(|(index, item)| !claimed[*index] && !skip(item))
        .map(|(_, item)| item)
        .collect();
    additions.sort_by_key(|item| item.key_value());

    for item in additions {
        patches.push(LivePatch::addition(Arc::new(item.clone()), parent.cloned()));
    }
}

/// Webhook collections match on all urls (primary plus aliases), skip
/// dummy secrets, honor forced updates, and treat the opaque secret field
/// with presence semantics.
fn diff_webhooks(
    expected: &[Webhook],
    current: &[Webhook],
    parent: Option<&ParentRef>,
    context: &PatchContext,
    patches: &mut Vec<LivePatch>,
) {
    let mut expected_by_url: HashMap<String, usize> = HashMap::new();
    for (index, webhook) in expected.iter().enumerate() {
        for url in webhook.all_urls() {
            expected_by_url.insert(url, index);
        }
    }
    let mut claimed = vec![false; expected.len()];

    for current_webhook in current {
        let Some(url) = current_webhook.url.as_deref() else {
            continue;
        };
        let Some(&index) = expected_by_url.get(url) else {
            patches.push(LivePatch::deletion(
                Arc::new(current_webhook.clone()),
                parent.cloned(),
            ));
            continue;
        };
        claimed[index] = true;
        let expected_webhook = &expected[index];

        // a dummy secret marks the webhook as unmanaged for this run
        if expected_webhook.has_dummy_secret() {
            continue;
        }

        let matches_filter = expected_webhook
            .url
            .as_deref()
            .is_some_and(|url| context.filter_matches(url));
        if context.update_webhooks && expected_webhook.has_real_secret() && matches_filter {
            patches.push(LivePatch::changes(
                Arc::new(expected_webhook.clone()),
                Arc::new(current_webhook.clone()),
                expected_webhook.forced_changes(),
                parent.cloned(),
                true,
            ));
            continue;
        }

        let mut changes = expected_webhook.difference_from(current_webhook);
        if let Some(secret_change) =
            webhook_secret_change(expected_webhook, current_webhook)
        {
            changes.insert("secret".to_string(), secret_change);
        }

        if !changes.is_empty() {
            patches.push(LivePatch::changes(
                Arc::new(expected_webhook.clone()),
                Arc::new(current_webhook.clone()),
                changes,
                parent.cloned(),
                false,
            ));
        }
    }

    let mut additions: Vec<&Webhook> = expected
        .iter()
        .enumerate()
        .filter(|(index, webhook)| !claimed[*index] && !webhook.has_dummy_secret())
        .map(|(_, webhook)| webhook)
        .collect();
    additions.sort_by_key(|webhook| webhook.key_value());

    for webhook in additions {
        patches.push(LivePatch::addition(Arc::new(webhook.clone()), parent.cloned()));
    }
}

/// The secret never participates in the plain diff: the provider masks
/// set secrets, so only presence changes and differing unresolved
/// references are meaningful.
fn webhook_secret_change(expected: &Webhook, current: &Webhook) -> Option<FieldChange> {
    if expected.secret.is_unset() {
        return None;
    }

    let expected_secret = expected.secret.as_deref();
    let current_secret = current.secret.as_deref();

    let presence_differs = matches!(
        (&expected.secret, &current.secret),
        (Property::Value(_), Property::Null) | (Property::Null, Property::Value(_))
    );
    let both_real_and_different = expected.has_real_secret()
        && current.has_real_secret()
        && expected_secret != current_secret;

    if presence_differs || both_real_and_different {
        Some(FieldChange::new(
            current_secret.map(Value::from).unwrap_or(Value::Null),
            expected_secret.map(Value::from).unwrap_or(Value::Null),
        ))
    } else {
        None
    }
}

/// Secret collections skip dummy values and honor forced updates; values
/// themselves only diff when both sides carry differing unresolved
/// references.
fn diff_secrets(
    expected: &[Secret],
    current: &[Secret],
    parent: Option<&ParentRef>,
    context: &PatchContext,
    patches: &mut Vec<LivePatch>,
) {
    let mut expected_by_name: HashMap<String, usize> = HashMap::new();
    for (index, secret) in expected.iter().enumerate() {
        if let Some(name) = secret.name.cloned_value() {
            expected_by_name.insert(name, index);
        }
    }
    let mut claimed = vec![false; expected.len()];

    for current_secret in current {
        let Some(name) = current_secret.name.as_deref() else {
            continue;
        };
        let Some(&index) = expected_by_name.get(name) else {
            patches.push(LivePatch::deletion(
                Arc::new(current_secret.clone()),
                parent.cloned(),
            ));
            continue;
        };
        claimed[index] = true;
        let expected_secret = &expected[index];

        if expected_secret.has_dummy_secret() {
            continue;
        }

        let matches_filter = expected_secret
            .name
            .as_deref()
            .is_some_and(|name| context.filter_matches(name));
        if context.update_secrets && expected_secret.has_real_value() && matches_filter {
            patches.push(LivePatch::changes(
                Arc::new(expected_secret.clone()),
                Arc::new(current_secret.clone()),
                expected_secret.forced_changes(),
                parent.cloned(),
                true,
            ));
            continue;
        }

        let mut changes = expected_secret.difference_from(current_secret);
        if let (Some(expected_value), Some(current_value)) = (
            expected_secret.value.as_deref(),
            current_secret.value.as_deref(),
        ) {
            let both_unresolved = crate::patterns::is_secret_reference(expected_value)
                && crate::patterns::is_secret_reference(current_value);
            if both_unresolved && expected_value != current_value {
                changes.insert(
                    "value".to_string(),
                    FieldChange::new(Value::from(current_value), Value::from(expected_value)),
                );
            }
        }

        if !changes.is_empty() {
            patches.push(LivePatch::changes(
                Arc::new(expected_secret.clone()),
                Arc::new(current_secret.clone()),
                changes,
                parent.cloned(),
                false,
            ));
        }
    }

    let mut additions: Vec<&Secret> = expected
        .iter()
        .enumerate()
        .filter(|(index, secret)| !claimed[*index] && !secret.has_dummy_secret())
        .map(|(_, secret)| secret)
        .collect();
    additions.sort_by_key(|secret| secret.key_value());

    for secret in additions {
        patches.push(LivePatch::addition(Arc::new(secret.clone()), parent.cloned()));
    }
}

fn diff_repositories(
    expected_org: &GitHubOrganization,
    current_org: &GitHubOrganization,
    context: &PatchContext,
    org_signoff_enabled: bool,
    patches: &mut Vec<LivePatch>,
) {
    let mut expected_by_name: HashMap<String, usize> = HashMap::new();
    for (index, repository) in expected_org.repositories.iter().enumerate() {
        for name in repository.all_names() {
            expected_by_name.insert(name, index);
        }
    }
    let mut claimed = vec![false; expected_org.repositories.len()];

    let org_projects_disabled =
        expected_org.settings.has_organization_projects.value() == Some(&false);

    for current_repo in &current_org.repositories {
        let Some(name) = current_repo.name.as_deref() else {
            continue;
        };
        let Some(&index) = expected_by_name.get(name) else {
            patches.push(LivePatch::deletion(Arc::new(current_repo.clone()), None));
            continue;
        };
        claimed[index] = true;
        let expected_repo = &expected_org.repositories[index];

        // an organization-wide signoff requirement wins over the
        // repository value as soon as it is applied
        let mut coerced_current = current_repo.clone();
        if org_signoff_enabled {
            coerced_current.web_commit_signoff_required = Property::Value(true);
        }

        let mut changes = expected_repo.difference_from(&coerced_current);
        if org_projects_disabled {
            changes.remove("has_projects");
        }
        // GitHub writes both pages source fields as one object
        if changes.contains_key("gh_pages_source_branch") {
            if let Some(path) = expected_repo.gh_pages_source_path.as_deref() {
                changes
                    .entry("gh_pages_source_path".to_string())
                    .or_insert_with(|| FieldChange::forced(Value::from(path)));
            }
        }

        if !changes.is_empty() {
            patches.push(LivePatch::changes(
                Arc::new(expected_repo.clone()),
                Arc::new(coerced_current.clone()),
                changes,
                None,
                false,
            ));
        }

        diff_repository_children(
            expected_repo,
            Some(&coerced_current),
            context,
            &expected_org.workflow_settings,
            patches,
        );
    }

    let mut additions: Vec<&Repository> = expected_org
        .repositories
        .iter()
        .enumerate()
        .filter(|(index, _)| !claimed[*index])
        .map(|(_, repository)| repository)
        .collect();
    additions.sort_by_key(|repository| repository.key_value());

    for repository in additions {
        patches.push(LivePatch::addition(Arc::new(repository.clone()), None));
        diff_repository_children(
            repository,
            None,
            context,
            &expected_org.workflow_settings,
            patches,
        );
    }
}

/// Diffs everything a repository owns. `current` is `None` for freshly
/// added repositories, in which case every child becomes an addition.
fn diff_repository_children(
    expected: &Repository,
    current: Option<&Repository>,
    context: &PatchContext,
    org_workflow_settings: &WorkflowSettings,
    patches: &mut Vec<LivePatch>,
) {
    let repo_name = expected.name.as_deref().unwrap_or_default();
    let mut parent = ParentRef::repository(repo_name);
    if let Some(node_id) = current.and_then(|repository| repository.node_id.cloned_value()) {
        parent = parent.with_node_id(node_id);
    }
    let parent = Some(&parent);

    static EMPTY_RULES: Vec<crate::branch_protection_rule::BranchProtectionRule> = Vec::new();
    static EMPTY_RULESETS: Vec<crate::ruleset::Ruleset> = Vec::new();
    static EMPTY_WEBHOOKS: Vec<Webhook> = Vec::new();
    static EMPTY_SECRETS: Vec<Secret> = Vec::new();
    static EMPTY_VARIABLES: Vec<crate::variable::Variable> = Vec::new();
    static EMPTY_ENVIRONMENTS: Vec<crate::environment::Environment> = Vec::new();
    static EMPTY_PERMISSIONS: Vec<crate::team_permission::TeamPermission> = Vec::new();

    // branch protection rules on archived repositories are dropped
    if !expected.is_archived() {
        let current_rules = current
            .map(|repository| &repository.branch_protection_rules)
            .unwrap_or(&EMPTY_RULES);
        diff_collection(
            &expected.branch_protection_rules,
            current_rules,
            parent,
            |_| false,
            patches,
        );
    }

    diff_collection(
        &expected.rulesets,
        current.map(|repository| &repository.rulesets).unwrap_or(&EMPTY_RULESETS),
        parent,
        |_| false,
        patches,
    );
    diff_webhooks(
        &expected.webhooks,
        current.map(|repository| &repository.webhooks).unwrap_or(&EMPTY_WEBHOOKS),
        parent,
        context,
        patches,
    );
    diff_secrets(
        &expected.secrets,
        current.map(|repository| &repository.secrets).unwrap_or(&EMPTY_SECRETS),
        parent,
        context,
        patches,
    );
    diff_collection(
        &expected.variables,
        current.map(|repository| &repository.variables).unwrap_or(&EMPTY_VARIABLES),
        parent,
        has_dummy_variable_value,
        patches,
    );

    // environments, each followed by its own secrets and variables
    let current_environments = current
        .map(|repository| &repository.environments)
        .unwrap_or(&EMPTY_ENVIRONMENTS);
    diff_collection(&expected.environments, current_environments, parent, |_| false, patches);

    for environment in &expected.environments {
        let Some(env_name) = environment.name.as_deref() else {
            continue;
        };
        let current_environment = current_environments
            .iter()
            .find(|current| current.name.as_deref() == Some(env_name));

        let env_parent = ParentRef::environment(repo_name, env_name);
        let env_parent = Some(&env_parent);

        diff_secrets(
            &environment.secrets,
            current_environment
                .map(|environment| &environment.secrets)
                .unwrap_or(&EMPTY_SECRETS),
            env_parent,
            context,
            patches,
        );
        diff_collection(
            &environment.variables,
            current_environment
                .map(|environment| &environment.variables)
                .unwrap_or(&EMPTY_VARIABLES),
            env_parent,
            has_dummy_variable_value,
            patches,
        );
    }

    diff_collection(
        &expected.team_permissions,
        current
            .map(|repository| &repository.team_permissions)
            .unwrap_or(&EMPTY_PERMISSIONS),
        parent,
        |_| false,
        patches,
    );

    if let Some(expected_settings) = &expected.workflow_settings {
        let current_settings = current.and_then(|repository| repository.workflow_settings.as_ref());
        if let Some(current_settings) = current_settings {
            let mut changes = expected_settings.difference_from(current_settings);
            coerce_repo_workflow_changes(
                &mut changes,
                org_workflow_settings,
                repo_name,
                expected_settings,
            );
            if !changes.is_empty() {
                patches.push(LivePatch::changes(
                    Arc::new(expected_settings.clone()),
                    Arc::new(current_settings.clone()),
                    changes,
                    parent.cloned(),
                    false,
                ));
            }
        }
    }
}

/// Coerces repository workflow changes against the organization-wide
/// settings, field by field: a field the organization already pins is
/// dropped from the repository diff, the rest of the object still diffs.
fn coerce_repo_workflow_changes(
    changes: &mut ChangeSet,
    org: &WorkflowSettings,
    repo_name: &str,
    expected: &WorkflowSettings,
) {
    // the per-repo switch has no effect when the organization disables
    // actions outright or does not select this repository
    let org_enabled = org.enabled_repositories.as_deref();
    let repo_unselected = !org
        .selected_repositories
        .value()
        .is_some_and(|repos| repos.iter().any(|name| name == repo_name));
    if org_enabled == Some("none") || (org_enabled == Some("selected") && repo_unselected) {
        changes.remove("enabled");
    }

    if org.restricts_actions_at_least_as_much_as(&expected.allowed_actions) {
        changes.remove("allowed_actions");
        for field in SELECTED_ACTION_FIELDS {
            changes.remove(*field);
        }
    }

    if org.default_workflow_permissions.as_deref() == Some("read") {
        changes.remove("default_workflow_permissions");
    }

    if org.actions_can_approve_pull_request_reviews.value() == Some(&false) {
        changes.remove("actions_can_approve_pull_request_reviews");
    }
}

/// Summary counters over a patch stream.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DiffStatus {
    pub additions: usize,
    pub differences: usize,
    pub deletions: usize,
}

impl DiffStatus {
    pub fn of(patches: &[LivePatch]) -> Self {
        let mut status = DiffStatus::default();
        for patch in patches {
            match patch {
                LivePatch::Add { .. } => status.additions += 1,
                LivePatch::Remove { .. } => status.deletions += 1,
                LivePatch::Change { .. } => status.differences += 1,
            }
        }
        status
    }

    pub fn total_changes(&self, include_deletions: bool) -> usize {
        if include_deletions {
            self.additions + self.differences + self.deletions
        } else {
            self.additions + self.differences
        }
    }
}
