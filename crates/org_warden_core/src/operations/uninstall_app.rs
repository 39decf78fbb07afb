//! Uninstalls a GitHub App through the web UI.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    app_slug: &str,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;

            // the installation id comes from the REST API, the removal
            // itself only works through the web UI
            let installations = provider.rest().list_app_installations(&org.github_id).await?;
            let installation_id = installations
                .iter()
                .find(|installation| {
                    installation.get("app_slug").and_then(Value::as_str) == Some(app_slug)
                })
                .and_then(|installation| installation.get("id").and_then(Value::as_i64));

            let Some(installation_id) = installation_id else {
                printer.print_error(format!("app '{app_slug}' is not installed"));
                return Ok(exit_codes::OPERATION_FAILED);
            };

            let session = provider.web()?.open_session().await?;
            session.uninstall_app(&org.github_id, installation_id).await?;
            printer.println(format!("uninstalled app '{app_slug}'"));
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
