//! Approves pending app permission updates through the web UI.

use serde_json::Value;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    app_slug: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut exit_code = exit_codes::OK;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let result = async {
            let provider = setup_provider(org).await?;
            let installations = provider.rest().list_app_installations(&org.github_id).await?;

            let session = provider.web()?.open_session().await?;
            let mut approved = 0usize;

            for installation in &installations {
                let slug = installation.get("app_slug").and_then(Value::as_str);
                if let Some(wanted) = app_slug {
                    if slug != Some(wanted) {
                        continue;
                    }
                }

                let Some(installation_id) = installation.get("id").and_then(Value::as_i64) else {
                    continue;
                };

                match session
                    .approve_permission_update(&org.github_id, installation_id)
                    .await
                {
                    Ok(()) => {
                        approved += 1;
                        printer.println(format!(
                            "approved permission update for '{}'",
                            slug.unwrap_or("<unknown>")
                        ));
                    }
                    // apps without a pending update have no approval screen
                    Err(github_client::Error::WebUi(_)) => {}
                    Err(e) => return Err(e.into()),
                }
            }

            printer.println(format!("approved {approved} permission update(s)"));
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
