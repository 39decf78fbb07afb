//! Renders the expected model of each organization.

use crate::config::OrgWardenConfig;
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

        let result = async {
            let mut expected = load_expected(config, org).await?;
            render::redact_organization_secrets(&mut expected);
            let value = expected.to_model_value();
            printer.println(serde_json::to_string_pretty(&value)?);
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
