//! Checks connectivity, credentials and rate-limit headroom.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

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

            let user = provider.rest().get_current_user().await?;
            let login = user.get("login").and_then(Value::as_str).unwrap_or("<unknown>");
            printer.println(format!("authenticated as '{login}'"));

            // access check, independent of rate limit state
            provider.rest().get_org_settings(&org.github_id).await?;
            printer.println("organization is accessible");

            let rate = provider.rest().get_rate_limit().await?;
            let remaining = rate
                .pointer("/resources/core/remaining")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            let limit = rate
                .pointer("/resources/core/limit")
                .and_then(Value::as_i64)
                .unwrap_or(0);
            printer.println(format!("rate limit: {remaining}/{limit} remaining"));

            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
