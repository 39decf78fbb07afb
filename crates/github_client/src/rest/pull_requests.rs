//! Pull requests, refs and commit statuses.

use serde_json::{json, Value};
use tracing::{info, instrument};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "pull_requests_tests.rs"]
mod tests;

impl RestClient {
    /// Opens a pull request and returns its number.
    #[instrument(skip(self, body))]
    pub async fn create_pull_request(
        &self,
        org_id: &str,
        repo_name: &str,
        title: &str,
        head: &str,
        base: &str,
        body: Option<&str>,
    ) -> Result<i64, Error> {
        let mut payload = json!({
            "title": title,
            "head": head,
            "base": base,
        });
        if let Some(body) = body {
            payload["body"] = Value::String(body.to_string());
        }

        let response = self
            .post_json(&format!("/repos/{org_id}/{repo_name}/pulls"), &payload)
            .await?;
        let number = response
            .get("number")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::InvalidResponse("pull request without number".to_string()))?;

        info!(org_id, repo_name, number, "opened pull request");
        Ok(number)
    }

    #[instrument(skip(self))]
    pub async fn merge_pull_request(
        &self,
        org_id: &str,
        repo_name: &str,
        pull_number: i64,
    ) -> Result<(), Error> {
        self.put_json(
            &format!("/repos/{org_id}/{repo_name}/pulls/{pull_number}/merge"),
            &json!({}),
        )
        .await?;
        info!(org_id, repo_name, pull_number, "merged pull request");
        Ok(())
    }

    /// Returns the head ref of a pull request.
    pub async fn get_ref_for_pull_request(
        &self,
        org_id: &str,
        repo_name: &str,
        pull_number: i64,
    ) -> Result<String, Error> {
        let response = self
            .get_json(&format!("/repos/{org_id}/{repo_name}/pulls/{pull_number}"))
            .await?;
        response
            .get("head")
            .and_then(|head| head.get("ref"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("pull request without head ref".to_string()))
    }

    /// Creates or updates a branch ref to point at the given commit.
    #[instrument(skip(self))]
    pub async fn update_ref(
        &self,
        org_id: &str,
        repo_name: &str,
        branch: &str,
        sha: &str,
    ) -> Result<(), Error> {
        let route = format!("/repos/{org_id}/{repo_name}/git/refs/heads/{branch}");
        match self
            .patch_empty(&route, &json!({ "sha": sha, "force": false }))
            .await
        {
            Ok(()) => Ok(()),
            Err(Error::NotFound) => {
                self.post_empty(
                    &format!("/repos/{org_id}/{repo_name}/git/refs"),
                    &json!({ "ref": format!("refs/heads/{branch}"), "sha": sha }),
                )
                .await
            }
            Err(e) => Err(e),
        }
    }

    pub async fn get_branch_sha(
        &self,
        org_id: &str,
        repo_name: &str,
        branch: &str,
    ) -> Result<String, Error> {
        let response = self
            .get_json(&format!("/repos/{org_id}/{repo_name}/git/ref/heads/{branch}"))
            .await?;
        response
            .get("object")
            .and_then(|object| object.get("sha"))
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse(format!("branch '{branch}' without sha")))
    }

    /// Lists open pull requests, optionally restricted to head branches
    /// with the given prefix.
    pub async fn list_open_pull_requests(
        &self,
        org_id: &str,
        repo_name: &str,
        head_prefix: Option<&str>,
    ) -> Result<Vec<Value>, Error> {
        let pulls = self
            .get_paged_array(&format!("/repos/{org_id}/{repo_name}/pulls?state=open"))
            .await?;

        Ok(match head_prefix {
            Some(prefix) => pulls
                .into_iter()
                .filter(|pull| {
                    pull.pointer("/head/ref")
                        .and_then(Value::as_str)
                        .is_some_and(|head| head.starts_with(prefix))
                })
                .collect(),
            None => pulls,
        })
    }

    /// Triggers a workflow dispatch event on the given ref.
    #[instrument(skip(self))]
    pub async fn dispatch_workflow(
        &self,
        org_id: &str,
        repo_name: &str,
        workflow: &str,
        r#ref: &str,
    ) -> Result<(), Error> {
        self.post_empty(
            &format!("/repos/{org_id}/{repo_name}/actions/workflows/{workflow}/dispatches"),
            &json!({ "ref": r#ref }),
        )
        .await?;
        info!(org_id, repo_name, workflow, "dispatched workflow");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn create_commit_status(
        &self,
        org_id: &str,
        repo_name: &str,
        sha: &str,
        state: &str,
        context: &str,
        description: Option<&str>,
    ) -> Result<(), Error> {
        let mut body = json!({
            "state": state,
            "context": context,
        });
        if let Some(description) = description {
            body["description"] = Value::String(description.to_string());
        }

        self.post_empty(&format!("/repos/{org_id}/{repo_name}/statuses/{sha}"), &body)
            .await?;
        Ok(())
    }
}
