//! Validates expected organizations without any provider traffic.

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;

use super::{load_expected, report_validation};

/// Exit code is 0 for a clean configuration, otherwise the number of
/// validation errors.
pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    let mut total_errors = 0usize;

    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        match load_expected(config, org).await {
            Ok(expected) => {
                let context = expected.validate();
                let errors = report_validation(&context, printer);
                total_errors += errors;
                if errors == 0 {
                    printer.println(format!(
                        "configuration is valid ({} warning(s))",
                        context.warning_count()
                    ));
                }
            }
            Err(e) => {
                printer.print_error(e.to_string());
                printer.level_down();
                return Ok(exit_codes::OPERATION_FAILED);
            }
        }
        printer.level_down();
    }

    Ok(i32::try_from(total_errors).unwrap_or(i32::MAX))
}
