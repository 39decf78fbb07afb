//! Lists open blueprint pull requests across an organization.
//!
//! Blueprint updates are proposed as pull requests on branches with a
//! well-known prefix; this lists whatever is still open.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

/// Head branch prefix of blueprint pull requests.
pub(crate) const BLUEPRINT_BRANCH_PREFIX: &str = "org-warden/blueprint/";

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let repos = provider.rest().get_repos(&org.github_id).await?;

            let mut total = 0usize;
            for repo_name in &repos {
                let pulls = provider
                    .rest()
                    .list_open_pull_requests(&org.github_id, repo_name, Some(BLUEPRINT_BRANCH_PREFIX))
                    .await?;
                for pull in &pulls {
                    let number = pull.get("number").and_then(Value::as_i64).unwrap_or(0);
                    let title = pull.get("title").and_then(Value::as_str).unwrap_or("");
                    printer.println(format!("{repo_name}#{number}: {title}"));
                    total += 1;
                }
            }
            printer.println(format!("{total} open blueprint pull request(s)"));
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
