//! Builds a declarative file from the live state of an organization.

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;
use crate::render;

use super::{organization_exit_code, setup_provider};

#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    pub no_web_ui: bool,
    /// Overwrite an existing declaration.
    pub force: bool,
}

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    options: &ImportOptions,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = import_organization(config, org, options, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn import_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    options: &ImportOptions,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let jsonnet = config.jsonnet_config(org);
    let target = jsonnet.org_config_file();

    if target.exists() && !options.force {
        printer.print_error(format!(
            "declaration '{}' already exists, use --force to overwrite",
            target.display()
        ));
        return Ok(exit_codes::OPERATION_FAILED);
    }

    let provider = setup_provider(org).await?;
    let mut current =
        org_model::GitHubOrganization::load_from_provider(&org.github_id, &provider, options.no_web_ui)
            .await?;

    // imported secrets are always placeholders
    render::redact_organization_secrets(&mut current);

    let template_import = jsonnet.template_import()?;
    let rendered = render::render_organization(&current, &template_import, true)?;

    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, rendered).await?;

    printer.println(format!(
        "imported {} repositories into '{}'",
        current.repositories.len(),
        target.display()
    ));
    Ok(exit_codes::OK)
}
