//! Teams, team membership and team permissions on repositories.

use serde_json::{json, Value};
use tracing::{debug, instrument, warn};

use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "teams_tests.rs"]
mod tests;

impl RestClient {
    /// Lists teams with their member logins merged in.
    pub async fn get_org_teams(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        let mut teams = self.get_paged_array(&format!("/orgs/{org_id}/teams")).await?;

        for team in &mut teams {
            let slug = team
                .get("slug")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            let members = self
                .get_paged_array(&format!("/orgs/{org_id}/teams/{slug}/members"))
                .await?;
            let logins: Vec<Value> = members
                .iter()
                .filter_map(|member| member.get("login").cloned())
                .collect();
            if let Value::Object(map) = team {
                map.insert("members".to_string(), Value::Array(logins));
            }
        }

        Ok(teams)
    }

    #[instrument(skip(self, data))]
    pub async fn add_org_team(&self, org_id: &str, data: &Value) -> Result<(), Error> {
        self.post_empty(&format!("/orgs/{org_id}/teams"), data).await?;
        debug!(org_id, "added team");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_org_team(
        &self,
        org_id: &str,
        team_slug: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.patch_empty(&format!("/orgs/{org_id}/teams/{team_slug}"), data)
            .await?;
        debug!(org_id, team_slug, "updated team");
        Ok(())
    }

    pub async fn delete_org_team(&self, org_id: &str, team_slug: &str) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/teams/{team_slug}")).await?;
        Ok(())
    }

    /// Brings team membership in line with the wanted list of logins.
    #[instrument(skip(self, members))]
    pub async fn sync_team_members(
        &self,
        org_id: &str,
        team_slug: &str,
        members: &[String],
    ) -> Result<(), Error> {
        let current = self
            .get_paged_array(&format!("/orgs/{org_id}/teams/{team_slug}/members"))
            .await?;
        let current_logins: Vec<String> = current
            .iter()
            .filter_map(|member| member.get("login").and_then(Value::as_str))
            .map(str::to_string)
            .collect();

        for login in members {
            if !current_logins.contains(login) {
                self.put_json(
                    &format!("/orgs/{org_id}/teams/{team_slug}/memberships/{login}"),
                    &json!({ "role": "member" }),
                )
                .await?;
            }
        }

        for login in &current_logins {
            if !members.contains(login) {
                self.delete(&format!(
                    "/orgs/{org_id}/teams/{team_slug}/memberships/{login}"
                ))
                .await?;
            }
        }

        Ok(())
    }

    /// Lists the teams that have an explicit permission on a repository.
    pub async fn get_repo_teams(&self, org_id: &str, repo_name: &str) -> Result<Vec<Value>, Error> {
        self.get_paged_array(&format!("/repos/{org_id}/{repo_name}/teams"))
            .await
    }

    #[instrument(skip(self))]
    pub async fn update_team_permission(
        &self,
        org_id: &str,
        repo_name: &str,
        team_slug: &str,
        permission: &str,
    ) -> Result<(), Error> {
        match self
            .put_json(
                &format!("/orgs/{org_id}/teams/{team_slug}/repos/{org_id}/{repo_name}"),
                &json!({ "permission": permission }),
            )
            .await
        {
            Ok(()) => Ok(()),
            Err(Error::NotFound) => {
                warn!(org_id, team_slug, "team does not exist, skipping permission update");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub async fn remove_team_permission(
        &self,
        org_id: &str,
        repo_name: &str,
        team_slug: &str,
    ) -> Result<(), Error> {
        self.delete(&format!(
            "/orgs/{org_id}/teams/{team_slug}/repos/{org_id}/{repo_name}"
        ))
        .await?;
        Ok(())
    }

    /// Resolves a team slug (optionally `org/team`) to `(id, node_id)`.
    pub async fn get_team_ids(&self, combined_slug: &str) -> Result<(i64, String), Error> {
        let (org, team_slug) = combined_slug
            .split_once('/')
            .ok_or_else(|| Error::InvalidResponse(format!("invalid team slug '{combined_slug}'")))?;

        let team = self.get_json(&format!("/orgs/{org}/teams/{team_slug}")).await?;
        let id = team
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| Error::InvalidResponse(format!("team '{combined_slug}' without id")))?;
        let node_id = team
            .get("node_id")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::InvalidResponse(format!("team '{combined_slug}' without node id")))?;
        Ok((id, node_id.to_string()))
    }
}
