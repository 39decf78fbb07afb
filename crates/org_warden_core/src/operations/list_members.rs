//! Lists organization members, optionally only those without 2FA.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    two_factor_disabled: bool,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let members = provider
                .rest()
                .list_members(&org.github_id, two_factor_disabled)
                .await?;

            for member in &members {
                if let Some(login) = member.get("login").and_then(Value::as_str) {
                    printer.println(login);
                }
            }
            let qualifier = if two_factor_disabled {
                " without two-factor authentication"
            } else {
                ""
            };
            printer.println(format!("{} member(s){qualifier}", members.len()));
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
