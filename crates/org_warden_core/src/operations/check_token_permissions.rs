//! Checks the scopes of the configured token against what the engine
//! needs.

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{organization_exit_code, setup_provider};

/// Scopes a classic token needs for full management.
const REQUIRED_SCOPES: &[&str] = &["repo", "admin:org", "workflow", "delete_repo"];

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
            let scopes = provider.rest().get_token_scopes().await?;

            if scopes.is_empty() {
                // fine-grained and installation tokens report no scopes
                printer.println("token reports no scopes (fine-grained or app token)");
                return Ok(exit_codes::OK);
            }

            printer.println(format!("token scopes: {}", scopes.join(", ")));
            let missing: Vec<&str> = REQUIRED_SCOPES
                .iter()
                .filter(|scope| !scopes.iter().any(|granted| granted == *scope))
                .copied()
                .collect();

            if missing.is_empty() {
                printer.println("token carries all required scopes");
                Ok(exit_codes::OK)
            } else {
                printer.print_error(format!("missing scopes: {}", missing.join(", ")));
                Ok(exit_codes::OPERATION_FAILED)
            }
        }
        .await;

        exit_code = exit_code.max(organization_exit_code(result, printer));
        printer.level_down();
    }

    Ok(exit_code)
}
