//! Verifies that web-UI credentials produce a working session.

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
            provider.web()?.open_session().await?;
            printer.println("web UI login succeeded");
            Ok(exit_codes::OK)
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
