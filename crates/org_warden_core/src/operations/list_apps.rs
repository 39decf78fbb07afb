//! Lists the GitHub Apps installed on each organization.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    json_output: bool,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        if !json_output {
            printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        }
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let installations = provider.rest().list_app_installations(&org.github_id).await?;

            if json_output {
                printer.println(serde_json::to_string_pretty(&installations)?);
            } else {
                for installation in &installations {
                    let slug = installation
                        .get("app_slug")
                        .and_then(Value::as_str)
                        .unwrap_or("<unknown>");
                    let id = installation.get("id").and_then(Value::as_i64).unwrap_or(0);
                    let suspended = installation
                        .get("suspended_at")
                        .is_some_and(|value| !value.is_null());
                    let marker = if suspended { " (suspended)" } else { "" };
                    printer.println(format!("{slug} [installation_id={id}]{marker}"));
                }
                printer.println(format!("{} app(s) installed", installations.len()));
            }
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
