//! Renders the live model of each organization.

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    no_web_ui: bool,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let current =
                org_model::GitHubOrganization::load_from_provider(&org.github_id, &provider, no_web_ui)
                    .await?;
            printer.println(serde_json::to_string_pretty(&current.to_model_value())?);
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
