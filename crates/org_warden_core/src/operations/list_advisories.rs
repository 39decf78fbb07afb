//! Lists security advisories of each organization.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    state: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let advisories = provider
                .rest()
                .list_security_advisories(&org.github_id, state)
                .await?;

            for advisory in &advisories {
                let id = advisory
                    .get("ghsa_id")
                    .and_then(Value::as_str)
                    .unwrap_or("<unknown>");
                let severity = advisory
                    .get("severity")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown");
                let summary = advisory
                    .get("summary")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                printer.println(format!("{id} [{severity}] {summary}"));
            }
            printer.println(format!("{} advisories", advisories.len()));
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
