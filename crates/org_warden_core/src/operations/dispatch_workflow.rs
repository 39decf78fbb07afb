//! Triggers a workflow dispatch event.

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    repo_name: &str,
    workflow: &str,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = dispatch(config, org, repo_name, workflow, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn dispatch(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    repo_name: &str,
    workflow: &str,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let provider = setup_provider(org).await?;
    let branch = &config.defaults.github.default_branch;

    provider
        .rest()
        .dispatch_workflow(&org.github_id, repo_name, workflow, branch)
        .await?;
    printer.println(format!(
        "dispatched workflow '{workflow}' on {}/{repo_name}@{branch}",
        org.github_id
    ));
    Ok(exit_codes::OK)
}
