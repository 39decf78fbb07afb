//! Applies the changes between expected and live state.

use std::io::Write;

use org_model::{generate_live_patches, DiffStatus};

use crate::applier::{apply_patches, ApplyOptions, CancellationFlag};
use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Error, Result};
use crate::printer::IndentingPrinter;

use super::{
    filter_repositories, load_expected, organization_exit_code, print_patches, report_validation,
    setup_provider_and_token, PlanOptions,
};

#[derive(Debug, Clone, Default)]
pub struct ApplyCommandOptions {
    pub plan: PlanOptions,
    /// Skip the interactive confirmation.
    pub force: bool,
    /// Execute REMOVE patches.
    pub delete_resources: bool,
    /// Keep going after a terminal patch failure.
    pub continue_on_error: bool,
}

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    options: &ApplyCommandOptions,
    cancellation: &CancellationFlag,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = apply_organization(config, org, options, cancellation, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();

        if cancellation.is_cancelled() {
            break;
        }
    }

    Ok(exit_code)
}

async fn apply_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    options: &ApplyCommandOptions,
    cancellation: &CancellationFlag,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let (provider, github_token) = setup_provider_and_token(org).await?;
    config
        .jsonnet_config(org)
        .init_template(Some(&github_token))
        .await?;

    let mut expected = load_expected(config, org).await?;

    let validation = expected.validate();
    if report_validation(&validation, printer) > 0 {
        printer.println("apply aborted due to validation errors");
        return Ok(exit_codes::OPERATION_FAILED);
    }

    let mut current = org_model::GitHubOrganization::load_from_provider(
        &org.github_id,
        &provider,
        options.plan.no_web_ui,
    )
    .await?;

    if let Some(filter) = options.plan.repo_filter()? {
        filter_repositories(&mut expected, &filter);
        filter_repositories(&mut current, &filter);
    }

    let context = options.plan.patch_context()?;
    let patches = generate_live_patches(&expected, &current, &context);

    if patches.is_empty() {
        printer.println("no changes, organization matches the declared configuration");
        return Ok(exit_codes::OK);
    }

    print_patches(&patches, printer);
    let status = DiffStatus::of(&patches);
    printer.println(format!(
        "plan: {} addition(s), {} change(s), {} deletion(s)",
        status.additions, status.differences, status.deletions
    ));

    if !options.force && !confirm_apply()? {
        printer.println("apply aborted");
        return Ok(exit_codes::OK);
    }

    let apply_options = ApplyOptions {
        delete_resources: options.delete_resources,
        continue_on_error: options.continue_on_error,
    };
    let status = apply_patches(
        &patches,
        &org.github_id,
        &provider,
        &apply_options,
        cancellation,
        printer,
    )
    .await;

    Ok(status.exit_code())
}

fn confirm_apply() -> Result<bool> {
    print!("Do you want to apply these changes? [y/N] ");
    std::io::stdout().flush().map_err(Error::Io)?;

    let mut answer = String::new();
    std::io::stdin().read_line(&mut answer).map_err(Error::Io)?;
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}
