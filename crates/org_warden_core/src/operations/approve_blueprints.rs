//! Merges open blueprint pull requests.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::list_blueprints::BLUEPRINT_BRANCH_PREFIX;
use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    repo_filter: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let filter = repo_filter.map(regex::Regex::new).transpose()?;
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let repos = provider.rest().get_repos(&org.github_id).await?;

            let mut merged = 0usize;
            let mut failed = 0usize;
            for repo_name in &repos {
                if let Some(filter) = &filter {
                    if !filter.is_match(repo_name) {
                        continue;
                    }
                }

                let pulls = provider
                    .rest()
                    .list_open_pull_requests(&org.github_id, repo_name, Some(BLUEPRINT_BRANCH_PREFIX))
                    .await?;
                for pull in &pulls {
                    let Some(number) = pull.get("number").and_then(Value::as_i64) else {
                        continue;
                    };
                    match provider
                        .rest()
                        .merge_pull_request(&org.github_id, repo_name, number)
                        .await
                    {
                        Ok(()) => {
                            merged += 1;
                            printer.println(format!("merged {repo_name}#{number}"));
                        }
                        Err(e) => {
                            failed += 1;
                            printer.print_error(format!("failed to merge {repo_name}#{number}: {e}"));
                        }
                    }
                }
            }

            printer.println(format!("merged {merged} blueprint pull request(s), {failed} failure(s)"));
            if failed > 0 {
                Ok(exit_codes::OPERATION_FAILED)
            } else {
                Ok(exit_codes::OK)
            }
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
