//! Renders the template defaults a declaration patches against.

use org_model::ModelObject;

use crate::config::OrgWardenConfig;
use crate::errors::{exit_codes, Result};
use crate::printer::IndentingPrinter;
use crate::render;

pub async fn execute(
    config: &OrgWardenConfig,
    organization: Option<&str>,
    printer: &mut IndentingPrinter,
) -> Result<i32> {
    for org in config.selected_organizations(organization)? {
        printer.println(format!("Organization {} [id={}]", org.name, org.github_id));
        printer.level_up();

        let defaults = render::default_organization(&org.github_id);
        let mut value = defaults.to_model_value();
        if let Some(map) = value.as_object_mut() {
            let repository = render::default_repository();
            map.insert(
                "repository_defaults".to_string(),
                serde_json::Value::Object(repository.to_model_map()),
            );
        }
        printer.println(serde_json::to_string_pretty(&value)?);
        printer.level_down();
    }

    Ok(exit_codes::OK)
}
