//! Shows the changes an apply would make; never writes.

use org_model::{generate_live_patches, DiffStatus};

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{
    filter_repositories, load_expected, organization_exit_code, print_patches, report_validation,
    setup_provider_and_token, PlanOptions,
};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    options: &PlanOptions,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = plan_organization(config, org, options, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn plan_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    options: &PlanOptions,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let (provider, github_token) = setup_provider_and_token(org).await?;
    config
        .jsonnet_config(org)
        .init_template(Some(&github_token))
        .await?;

    let mut expected = load_expected(config, org).await?;

    // validation gates the live read
    let validation = expected.validate();
    if report_validation(&validation, printer) > 0 {
        printer.println("planning aborted due to validation errors");
        return Ok(exit_codes::OPERATION_FAILED);
    }

    let mut current =
        org_model::GitHubOrganization::load_from_provider(&org.github_id, &provider, options.no_web_ui)
            .await?;

    if let Some(filter) = options.repo_filter()? {
        filter_repositories(&mut expected, &filter);
        filter_repositories(&mut current, &filter);
    }

    let context = options.patch_context()?;
    let patches = generate_live_patches(&expected, &current, &context);
    print_patches(&patches, printer);

    let status = DiffStatus::of(&patches);
    printer.println(format!(
        "plan: {} addition(s), {} change(s), {} deletion(s)",
        status.additions, status.differences, status.deletions
    ));

    Ok(exit_codes::OK)
}
