//! Fetches the declarative file from the organization's configuration
//! repository.

use crate::config::{OrgWardenConfig, OrganizationConfig, CONFIG_DIR_IN_REPO};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    pull_request: Option<i64>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = fetch_organization(config, org, pull_request, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn fetch_organization(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    pull_request: Option<i64>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let provider = setup_provider(org).await?;
    let config_repo = &config.defaults.github.config_repo;
    let path = format!("{CONFIG_DIR_IN_REPO}/{}.jsonnet", org.github_id);

    // a pull request number fetches the proposed state instead of the
    // default branch
    let r#ref = match pull_request {
        Some(number) => Some(
            provider
                .rest()
                .get_ref_for_pull_request(&org.github_id, config_repo, number)
                .await?,
        ),
        None => None,
    };

    let content = provider
        .rest()
        .get_content(&org.github_id, config_repo, &path, r#ref.as_deref())
        .await?;

    let jsonnet = config.jsonnet_config(org);
    let target = jsonnet.org_config_file();
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(&target, content).await?;

    printer.println(format!(
        "fetched configuration from {}/{config_repo} to '{}'",
        org.github_id,
        target.display()
    ));
    Ok(exit_codes::OK)
}
