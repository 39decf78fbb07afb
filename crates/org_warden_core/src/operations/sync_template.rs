//! Synchronizes a repository from its declared template repository.

use crate::config::{OrgWardenConfig, OrganizationConfig};
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{load_expected, organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    repo_name: &str,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();
        let result = sync_repository(config, org, repo_name, printer).await;
        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}

async fn sync_repository(
    config: &OrgWardenConfig,
    org: &OrganizationConfig,
    repo_name: &str,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let expected = load_expected(config, org).await?;

    let repository = expected
        .repositories
        .iter()
        .find(|repository| repository.name.as_deref() == Some(repo_name));

    let Some(template) = repository.and_then(|repository| repository.template_repository.as_deref())
    else {
        printer.print_error(format!(
            "repository '{repo_name}' declares no template repository"
        ));
        return Ok(exit_codes::OPERATION_FAILED);
    };

    let template_paths = repository
        .map(|repository| repository.post_process_template_content.clone())
        .filter(|paths| !paths.is_empty());

    let provider = setup_provider(org).await?;
    let updated = provider
        .rest()
        .sync_from_template_repository(
            &org.github_id,
            repo_name,
            template,
            template_paths.as_deref(),
        )
        .await?;

    if updated.is_empty() {
        printer.println(format!("'{repo_name}' is up to date with '{template}'"));
    } else {
        printer.println(format!(
            "synced {} file(s) from '{template}' into '{repo_name}':",
            updated.len()
        ));
        printer.level_up();
        for path in updated {
            printer.println(path);
        }
        printer.level_down();
    }
    Ok(exit_codes::OK)
}
