//! The operations the CLI dispatches to, one module per operation.

use github_client::GitHubProvider;
use org_model::{
    FailureType, GitHubOrganization, LivePatch, PatchContext, ValidationContext,
};
use regex::Regex;

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{Error, Result};
use crate::printer::IndentingPrinter;

pub mod apply;
pub mod approve_blueprints;
pub mod canonical_diff;
pub mod check_status;
pub mod check_token_permissions;
pub mod delete_file;
pub mod dispatch_workflow;
pub mod fetch_config;
pub mod import;
pub mod install_app;
pub mod list_advisories;
pub mod list_apps;
pub mod list_blueprints;
pub mod list_members;
pub mod local_plan;
pub mod open_pull_request;
pub mod plan;
pub mod push_config;
pub mod review_app_permissions;
pub mod show;
pub mod show_default;
pub mod show_live;
pub mod sync_template;
pub mod uninstall_app;
pub mod validate;
pub mod web_login;

#[cfg(test)]
#[path = "operations_tests.rs"]
mod tests;

/// Options shared by plan and apply.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    pub no_web_ui: bool,
    pub update_webhooks: bool,
    pub update_secrets: bool,
    pub update_filter: Option<String>,
    pub repo_filter: Option<String>,
}

impl PlanOptions {
    pub fn patch_context(&self) -> Result<PatchContext> {
        let update_filter = match &self.update_filter {
            Some(filter) => Regex::new(filter)?,
            None => Regex::new(".*")?,
        };
        Ok(PatchContext {
            update_webhooks: self.update_webhooks,
            update_secrets: self.update_secrets,
            update_filter,
        })
    }

    pub fn repo_filter(&self) -> Result<Option<Regex>> {
        Ok(match &self.repo_filter {
            Some(filter) => Some(Regex::new(filter)?),
            None => None,
        })
    }
}

/// Builds the provider for an organization from its credential block.
pub(crate) async fn setup_provider(org: &OrganizationConfig) -> Result<GitHubProvider> {
    let credentials = org.get_credentials().await?;
    let provider = GitHubProvider::new(credentials.github_token(), credentials.web_credentials())?;
    Ok(provider)
}

/// Like [`setup_provider`], but also hands out the token for subprocess
/// environments (template vendoring exports it as `GH_TOKEN`).
pub(crate) async fn setup_provider_and_token(
    org: &OrganizationConfig,
) -> Result<(GitHubProvider, String)> {
    let credentials = org.get_credentials().await?;
    let provider = GitHubProvider::new(credentials.github_token(), credentials.web_credentials())?;
    Ok((provider, credentials.github_token_value()))
}

/// Evaluates and parses the expected organization of an org config.
pub(crate) async fn load_expected(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
) -> Result<GitHubOrganization> {
    let jsonnet = config.jsonnet_config(org);
    let tree = jsonnet.evaluate_org_config().await?;
    Ok(GitHubOrganization::from_model_value(&org.github_id, &tree)?)
}

/// Restricts the repositories of an organization to those matching the
/// filter; used by `--repo-filter`.
pub(crate) fn filter_repositories(org: &mut GitHubOrganization, filter: &Regex) {
    org.repositories.retain(|repository| {
        repository
            .name
            .as_deref()
            .is_some_and(|name| filter.is_match(name))
    });
}

/// Prints validation output; returns the number of errors.
pub(crate) fn report_validation(
    context: &ValidationContext,
    printer: &mut IndentingPrinter,
) -> usize {
    for (severity, message) in context.failures() {
        match severity {
            FailureType::Error => printer.print_error(message),
            FailureType::Warning => printer.print_warn(message),
            FailureType::Info => printer.print_info(message),
        }
    }

    let infos = context.info_count();
    if infos > 0 && printer.verbosity() == 0 {
        printer.println(format!(
            "there have been {infos} validation info(s), enable verbose output with '-v' to display them"
        ));
    }

    context.error_count()
}

/// Prints a patch stream in plan form. Secret-valued fields are always
/// masked; by the time an apply prints its plan they may be resolved.
pub(crate) fn print_patches(patches: &[LivePatch], printer: &mut IndentingPrinter) {
    fn masked(entity: &dyn org_model::ModelObject, field: &str, value: &serde_json::Value) -> String {
        if entity.secret_fields().contains(&field) && !value.is_null() {
            "\"********\"".to_string()
        } else {
            value.to_string()
        }
    }

    for patch in patches {
        match patch {
            LivePatch::Add { expected, .. } => {
                printer.println(format!("+ add {}", patch.header()));
                printer.level_up();
                for (field, value) in expected.to_model_map() {
                    printer.println(format!(
                        "{field} = {}",
                        masked(expected.as_ref(), &field, &value)
                    ));
                }
                printer.level_down();
            }
            LivePatch::Remove { .. } => {
                printer.println(format!("- remove {}", patch.header()));
            }
            LivePatch::Change {
                expected,
                changes,
                forced,
                ..
            } => {
                let marker = if *forced { "! force update" } else { "~ update" };
                printer.println(format!("{marker} {}", patch.header()));
                printer.level_up();
                for (field, change) in changes {
                    let to = masked(expected.as_ref(), field, &change.to);
                    if *forced {
                        printer.println(format!("{field} = {to}"));
                    } else {
                        let from = masked(expected.as_ref(), field, &change.from);
                        printer.println(format!("{field} = {from} -> {to}"));
                    }
                }
                printer.level_down();
            }
        }
    }
}

/// Maps a per-organization outcome to an exit code, reporting credential
/// failures as a skipped organization so other organizations proceed.
pub(crate) fn organization_exit_code(result: Result<i32>, printer: &mut IndentingPrinter) -> i32 {
    match result {
        Ok(code) => code,
        Err(Error::Credentials(e)) => {
            printer.print_error(format!("invalid credentials, skipping organization: {e}"));
            crate::errors::exit_codes::OPERATION_FAILED
        }
        Err(e) => {
            printer.print_error(e.to_string());
            crate::errors::exit_codes::OPERATION_FAILED
        }
    }
}
