//! Organization and repository webhooks.

use serde_json::Value;
use tracing::{debug, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "webhooks_tests.rs"]
mod tests;

impl RestClient {
    pub async fn get_org_webhooks(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        self.get_paged_array(&format!("/orgs/{org_id}/hooks")).await
    }

    #[instrument(skip(self, data))]
    pub async fn add_org_webhook(&self, org_id: &str, data: &Value) -> Result<(), Error> {
        self.post_empty(&format!("/orgs/{org_id}/hooks"), data).await?;
        debug!(org_id, "added organization webhook");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_org_webhook(
        &self,
        org_id: &str,
        webhook_id: i64,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(&format!("/orgs/{org_id}/hooks/{webhook_id}"), data)
            .await?;
        debug!(org_id, webhook_id, "updated organization webhook");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_org_webhook(&self, org_id: &str, webhook_id: i64) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/hooks/{webhook_id}")).await?;
        debug!(org_id, webhook_id, "deleted organization webhook");
        Ok(())
    }

    pub async fn get_repo_webhooks(&self, org_id: &str, repo_name: &str) -> Result<Vec<Value>, Error> {
        self.get_paged_array(&format!("/repos/{org_id}/{repo_name}/hooks"))
            .await
    }

    #[instrument(skip(self, data))]
    pub async fn add_repo_webhook(
        &self,
        org_id: &str,
        repo_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.post_empty(&format!("/repos/{org_id}/{repo_name}/hooks"), data)
            .await?;
        debug!(org_id, repo_name, "added repository webhook");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_repo_webhook(
        &self,
        org_id: &str,
        repo_name: &str,
        webhook_id: i64,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(
            &format!("/repos/{org_id}/{repo_name}/hooks/{webhook_id}"),
            data,
        )
        .await?;
        debug!(org_id, repo_name, webhook_id, "updated repository webhook");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_repo_webhook(
        &self,
        org_id: &str,
        repo_name: &str,
        webhook_id: i64,
    ) -> Result<(), Error> {
        self.delete(&format!("/repos/{org_id}/{repo_name}/hooks/{webhook_id}"))
            .await?;
        debug!(org_id, repo_name, webhook_id, "deleted repository webhook");
        Ok(())
    }
}
