//! Rendering an organization model back into its declarative form.
//!
//! Used by import and the show/canonical-diff operations: the model tree
//! is walked and emitted as `newOrg(...)` plus per-entity `new*`
//! template invocations, with every field equal to the template default
//! omitted. Secret values are replaced by a redaction placeholder.

use org_model::{
    GitHubOrganization, ModelMap, ModelObject, Property, Repository,
};
use serde_json::{json, Value};

use crate::errors::Result;

#[cfg(test)]
#[path = "render_tests.rs"]
mod tests;

const REDACTED: &str = "********";

/// The template defaults rendered declarations patch against; mirrors the
/// defaults of the shared base template.
pub fn default_organization(github_id: &str) -> GitHubOrganization {
    let defaults = json!({
        "settings": {
            "has_organization_projects": true,
            "default_repository_permission": "read",
            "web_commit_signoff_required": false,
            "members_can_create_private_repositories": false,
            "members_can_create_public_repositories": true,
            "members_can_fork_private_repositories": false,
            "dependabot_alerts_enabled_for_new_repositories": true,
            "dependabot_security_updates_enabled_for_new_repositories": false,
            "dependency_graph_enabled_for_new_repositories": true
        },
        "workflow_settings": {
            "enabled_repositories": "all",
            "allowed_actions": "all",
            "default_workflow_permissions": "read",
            "actions_can_approve_pull_request_reviews": false
        }
    });

    GitHubOrganization::from_model_value(github_id, &defaults)
        .unwrap_or_else(|_| unreachable!("static defaults always parse"))
}

/// The default repository the base template creates.
pub fn default_repository() -> Repository {
    Repository::from_model_value(&json!({
        "private": false,
        "archived": false,
        "has_issues": true,
        "has_projects": true,
        "has_wiki": true,
        "is_template": false,
        "allow_auto_merge": false,
        "allow_forking": true,
        "allow_merge_commit": true,
        "allow_rebase_merge": true,
        "allow_squash_merge": true,
        "allow_update_branch": false,
        "delete_branch_on_merge": false,
        "default_branch": "main",
        "web_commit_signoff_required": false,
        "dependabot_alerts_enabled": true,
        "gh_pages_build_type": "disabled"
    }))
    .unwrap_or_else(|_| unreachable!("static defaults always parse"))
}

/// Renders a JSON value as a jsonnet literal at the given indent level.
fn render_value(value: &Value, indent: usize) -> String {
    let rendered = serde_json::to_string_pretty(value).unwrap_or_else(|_| "null".to_string());
    let pad = "  ".repeat(indent);
    rendered
        .lines()
        .enumerate()
        .map(|(index, line)| {
            if index == 0 {
                line.to_string()
            } else {
                format!("{pad}{line}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Renders the non-default fields of an entity as a jsonnet object body.
fn render_patch(patch: &ModelMap, indent: usize) -> String {
    if patch.is_empty() {
        return String::new();
    }
    let pad = "  ".repeat(indent);
    patch
        .iter()
        .map(|(field, value)| format!("{pad}{field}: {},\n", render_value(value, indent)))
        .collect()
}

fn redact(mut patch: ModelMap, secret_fields: &[&str], redact_secrets: bool) -> ModelMap {
    if !redact_secrets {
        return patch;
    }
    for field in secret_fields {
        if let Some(value) = patch.get_mut(*field) {
            if value.as_str().is_some_and(|value| !value.is_empty()) {
                *value = Value::String(REDACTED.to_string());
            }
        }
    }
    patch
}

/// Emits one `orgs.new*('key') { ... }` invocation.
fn render_invocation(
    out: &mut String,
    indent: usize,
    function: &str,
    key: Option<&str>,
    body: &str,
) {
    let pad = "  ".repeat(indent);
    let args = match key {
        Some(key) => format!("('{key}')"),
        None => "()".to_string(),
    };
    if body.is_empty() {
        out.push_str(&format!("{pad}orgs.{function}{args},\n"));
    } else {
        out.push_str(&format!("{pad}orgs.{function}{args} {{\n{body}{pad}}},\n"));
    }
}

fn render_collection<T: ModelObject>(
    out: &mut String,
    indent: usize,
    field: &str,
    function: &str,
    items: &[T],
    redact_secrets: bool,
    mut extra: impl FnMut(&T, usize) -> String,
) {
    if items.is_empty() {
        return;
    }
    let pad = "  ".repeat(indent);
    out.push_str(&format!("{pad}{field}+: [\n"));
    for item in items {
        let mut patch = item.to_model_map();
        if let Some(key_field) = item.key_field() {
            patch.remove(key_field);
        }
        for spec in item.field_specs() {
            if !spec.rendered() {
                patch.remove(spec.name);
            }
        }
        let patch = redact(patch, item.secret_fields(), redact_secrets);

        let mut body = render_patch(&patch, indent + 2);
        body.push_str(&extra(item, indent + 2));
        render_invocation(
            out,
            indent + 1,
            function,
            item.key_value().as_deref(),
            &body,
        );
    }
    out.push_str(&format!("{pad}],\n"));
}

/// Renders a complete organization declaration.
pub fn render_organization(
    org: &GitHubOrganization,
    template_import: &str,
    redact_secrets: bool,
) -> Result<String> {
    let mut out = String::new();
    out.push_str(template_import);
    out.push_str("\n\n");
    out.push_str(&format!("orgs.newOrg('{}') {{\n", org.github_id));

    let defaults = default_organization(&org.github_id);

    let settings_patch = org.settings.patch_against(&defaults.settings);
    if !settings_patch.is_empty() {
        out.push_str("  settings+: {\n");
        out.push_str(&render_patch(&settings_patch, 2));
        out.push_str("  },\n");
    }

    let workflow_patch = org.workflow_settings.patch_against(&defaults.workflow_settings);
    if !workflow_patch.is_empty() {
        out.push_str("  workflow_settings+: {\n");
        out.push_str(&render_patch(&workflow_patch, 2));
        out.push_str("  },\n");
    }

    render_collection(&mut out, 1, "webhooks", "newOrgWebhook", &org.webhooks, redact_secrets, |_, _| String::new());
    render_collection(&mut out, 1, "secrets", "newOrgSecret", &org.secrets, redact_secrets, |_, _| String::new());
    render_collection(&mut out, 1, "variables", "newOrgVariable", &org.variables, redact_secrets, |_, _| String::new());
    render_collection(
        &mut out,
        1,
        "custom_properties",
        "newCustomProperty",
        &org.custom_properties,
        redact_secrets,
        |_, _| String::new(),
    );
    render_collection(&mut out, 1, "roles", "newOrgRole", &org.roles, redact_secrets, |_, _| {
        String::new()
    });
    render_collection(&mut out, 1, "rulesets", "newOrgRuleset", &org.rulesets, redact_secrets, |_, _| {
        String::new()
    });
    render_collection(&mut out, 1, "teams", "newTeam", &org.teams, redact_secrets, |_, _| {
        String::new()
    });

    if !org.repositories.is_empty() {
        out.push_str("  _repositories+:: [\n");
        let repo_default = default_repository();
        for repository in &org.repositories {
            out.push_str(&render_repository(repository, &repo_default, redact_secrets));
        }
        out.push_str("  ],\n");
    }

    out.push_str("}\n");
    Ok(out)
}

fn render_repository(
    repository: &Repository,
    default: &Repository,
    redact_secrets: bool,
) -> String {
    let mut patch = repository.patch_against(default);
    patch.remove("name");
    let mut body = render_patch(&patch, 3);

    let mut children = String::new();
    render_collection(
        &mut children,
        3,
        "branch_protection_rules",
        "newBranchProtectionRule",
        &repository.branch_protection_rules,
        redact_secrets,
        |_, _| String::new(),
    );
    render_collection(
        &mut children,
        3,
        "rulesets",
        "newRepoRuleset",
        &repository.rulesets,
        redact_secrets,
        |_, _| String::new(),
    );
    render_collection(
        &mut children,
        3,
        "webhooks",
        "newRepoWebhook",
        &repository.webhooks,
        redact_secrets,
        |_, _| String::new(),
    );
    render_collection(
        &mut children,
        3,
        "secrets",
        "newRepoSecret",
        &repository.secrets,
        redact_secrets,
        |_, _| String::new(),
    );
    render_collection(
        &mut children,
        3,
        "variables",
        "newRepoVariable",
        &repository.variables,
        redact_secrets,
        |_, _| String::new(),
    );
    render_collection(
        &mut children,
        3,
        "environments",
        "newEnvironment",
        &repository.environments,
        redact_secrets,
        |environment, indent| {
            let mut nested = String::new();
            render_collection(
                &mut nested,
                indent,
                "secrets",
                "newEnvironmentSecret",
                &environment.secrets,
                redact_secrets,
                |_, _| String::new(),
            );
            render_collection(
                &mut nested,
                indent,
                "variables",
                "newEnvironmentVariable",
                &environment.variables,
                redact_secrets,
                |_, _| String::new(),
            );
            nested
        },
    );
    render_collection(
        &mut children,
        3,
        "team_permissions",
        "newTeamPermission",
        &repository.team_permissions,
        redact_secrets,
        |_, _| String::new(),
    );

    if let Some(settings) = &repository.workflow_settings {
        let map = settings.to_model_map();
        if !map.is_empty() {
            children.push_str("      workflow_settings+: {\n");
            children.push_str(&render_patch(&map, 4));
            children.push_str("      },\n");
        }
    }

    body.push_str(&children);

    let mut out = String::new();
    render_invocation(
        &mut out,
        2,
        "newRepo",
        repository.name.as_deref(),
        &body,
    );
    out
}

/// A unified diff between the on-disk declaration and its canonical
/// rendering.
pub fn unified_diff(original: &str, canonical: &str, file_name: &str) -> String {
    similar::TextDiff::from_lines(original, canonical)
        .unified_diff()
        .context_radius(3)
        .header(file_name, &format!("{file_name} (canonical)"))
        .to_string()
}

/// Replaces resolved secret values by the redaction placeholder before a
/// model is shown or written.
pub fn redact_organization_secrets(org: &mut GitHubOrganization) {
    fn redact_property(property: &mut Property<String>) {
        if property.value().is_some_and(|value| !value.is_empty()) {
            *property = Property::Value(REDACTED.to_string());
        }
    }

    for webhook in &mut org.webhooks {
        redact_property(&mut webhook.secret);
    }
    for secret in &mut org.secrets {
        redact_property(&mut secret.value);
    }
    for repository in &mut org.repositories {
        for webhook in &mut repository.webhooks {
            redact_property(&mut webhook.secret);
        }
        for secret in &mut repository.secrets {
            redact_property(&mut secret.value);
        }
        for environment in &mut repository.environments {
            for secret in &mut environment.secrets {
                redact_property(&mut secret.value);
            }
        }
    }
}
