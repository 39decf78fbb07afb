//! Diffs the expected organization against a second local declaration
//! instead of the live state.

use org_model::{generate_live_patches, DiffStatus, GitHubOrganization};

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{load_expected, organization_exit_code, print_patches, PlanOptions};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    suffix: &str,
    options: &PlanOptions,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = local_plan_organization(config, org, suffix, options, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn local_plan_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    suffix: &str,
    options: &PlanOptions,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let expected = load_expected(config, org).await?;

    let jsonnet = config.jsonnet_config(org);
    let other_file = jsonnet.org_config_file_with_suffix(suffix);
    let other_tree = jsonnet.evaluate_file(&other_file).await?;
    let other = GitHubOrganization::from_model_value(&org.github_id, &other_tree)?;

    let context = options.patch_context()?;
    let patches = generate_live_patches(&expected, &other, &context);
    print_patches(&patches, printer);

    let status = DiffStatus::of(&patches);
    printer.println(format!(
        "local plan against '{}': {} addition(s), {} change(s), {} deletion(s)",
        other_file.display(),
        status.additions,
        status.differences,
        status.deletions
    ));

    Ok(exit_codes::OK)
}
