//! Diffs the on-disk declaration against its canonical rendering.

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;
use crate::render;

use super::{load_expected, organization_exit_code};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = diff_organization(config, org, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn diff_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let expected = load_expected(config, org).await?;

    let jsonnet = config.jsonnet_config(org);
    let source_file = jsonnet.org_config_file();
    let original = tokio::fs::read_to_string(&source_file).await?;

    let template_import = jsonnet.template_import()?;
    let canonical = render::render_organization(&expected, &template_import, false)?;

    let diff = render::unified_diff(
        &original,
        &canonical,
        &source_file.file_name().unwrap_or_default().to_string_lossy(),
    );

    if diff.is_empty() {
        printer.println("declaration is already canonical");
    } else {
        printer.println(diff);
    }
    Ok(exit_codes::OK)
}
