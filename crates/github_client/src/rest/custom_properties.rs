//! Organization custom property schema.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "custom_properties_tests.rs"]
mod tests;

impl RestClient {
    pub async fn get_org_custom_properties(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        let response = self
            .get_json(&format!("/orgs/{org_id}/properties/schema"))
            .await?;
        response
            .as_array()
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("expected array of custom properties".to_string()))
    }

    /// Creates or updates a custom property definition; the endpoint is an
    /// upsert PUT.
    #[instrument(skip(self, data))]
    pub async fn update_org_custom_property(
        &self,
        org_id: &str,
        property_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.put_json(
            &format!("/orgs/{org_id}/properties/schema/{property_name}"),
            data,
        )
        .await?;
        debug!(org_id, property_name, "updated custom property");
        Ok(())
    }

    pub async fn delete_org_custom_property(
        &self,
        org_id: &str,
        property_name: &str,
    ) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/properties/schema/{property_name}"))
            .await?;
        Ok(())
    }
}
