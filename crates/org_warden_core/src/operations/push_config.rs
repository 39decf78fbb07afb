//! Pushes the local declarative file to the organization's configuration
//! repository.

use crate::config::{OrgWardenConfig, OrganizationConfig, CONFIG_DIR_IN_REPO};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    message: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = push_organization(config, org, message, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn push_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    message: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let jsonnet = config.jsonnet_config(org);
    let source = jsonnet.org_config_file();
    let content = tokio::fs::read_to_string(&source).await?;

    let provider = setup_provider(org).await?;
    let config_repo = &config.defaults.github.config_repo;
    let path = format!("{CONFIG_DIR_IN_REPO}/{}.jsonnet", org.github_id);
    let message = message.unwrap_or("Update organization configuration");

    let updated = provider
        .rest()
        .update_content(&org.github_id, config_repo, &path, &content, Some(message))
        .await?;

    if updated {
        printer.println(format!("pushed configuration to {}/{config_repo}", org.github_id));
    } else {
        printer.println("configuration is already up to date");
    }
    Ok(exit_codes::OK)
}
