//! Organization roles.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "roles_tests.rs"]
mod tests;

impl RestClient {
    /// Lists custom organization roles; predefined GitHub roles are
    /// filtered out since they cannot be managed.
    pub async fn get_org_roles(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        let roles = self
            .get_paged_keyed(&format!("/orgs/{org_id}/organization-roles"), "roles")
            .await?;
        Ok(roles
            .into_iter()
            .filter(|role| role.get("source").and_then(Value::as_str) != Some("Predefined"))
            .collect())
    }

    #[instrument(skip(self, data))]
    pub async fn add_org_role(&self, org_id: &str, data: &Value) -> Result<(), Error> {
        self.post_empty(&format!("/orgs/{org_id}/organization-roles"), data)
            .await?;
        debug!(org_id, "added organization role");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_org_role(
        &self,
        org_id: &str,
        role_id: i64,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(&format!("/orgs/{org_id}/organization-roles/{role_id}"), data)
            .await?;
        debug!(org_id, role_id, "updated organization role");
        Ok(())
    }

    pub async fn delete_org_role(&self, org_id: &str, role_id: i64) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/organization-roles/{role_id}"))
            .await?;
        Ok(())
    }
}
