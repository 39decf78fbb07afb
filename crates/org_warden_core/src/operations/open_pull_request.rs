//! Opens a pull request in a repository.

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    repo_name: &str,
    title: &str,
    head: &str,
    base: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let base = base.unwrap_or(&config.defaults.github.default_branch);
            let number = provider
                .rest()
                .create_pull_request(&org.github_id, repo_name, title, head, base, None)
                .await?;
            printer.println(format!(
                "opened pull request #{number} in {}/{repo_name}",
                org.github_id
            ));
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
