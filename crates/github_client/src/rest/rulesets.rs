//! Organization and repository rulesets.
//!
//! Read results are normalized for the model layer: numeric bypass actor
//! ids become actor tokens and status check integration ids become app
//! slugs, both resolved against the organization's teams and
//! installations.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, instrument, warn};

use crate::actors;
use crate::errors::Error;
use crate::rest::RestClient;

#[cfg(test)]
#[path = "rulesets_tests.rs"]
mod tests;

impl RestClient {
    /// Lists organization rulesets in full detail.
    ///
    /// The list endpoint only carries summaries, so every ruleset is
    /// fetched individually afterwards.
    pub async fn get_org_rulesets(&self, org_id: &str) -> Result<Vec<Value>, Error> {
        let summaries = self
            .get_paged_array(&format!("/orgs/{org_id}/rulesets"))
            .await?;

        let mut rulesets = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(id) = summary.get("id").and_then(Value::as_i64) {
                rulesets.push(self.get_json(&format!("/orgs/{org_id}/rulesets/{id}")).await?);
            }
        }
        self.normalize_rulesets(org_id, &mut rulesets).await?;
        Ok(rulesets)
    }

    /// Replaces numeric actor and integration ids with tokens and slugs.
    async fn normalize_rulesets(&self, org_id: &str, rulesets: &mut [Value]) -> Result<(), Error> {
        if rulesets.is_empty() {
            return Ok(());
        }

        let mut team_slugs: Option<HashMap<i64, String>> = None;
        let mut app_slugs: Option<HashMap<i64, String>> = None;

        for ruleset in rulesets.iter_mut() {
            if let Some(actors) = ruleset.get_mut("bypass_actors").and_then(Value::as_array_mut) {
                let mut tokens = Vec::with_capacity(actors.len());
                for actor in actors.iter() {
                    let actor_id = actor.get("actor_id").and_then(Value::as_i64).unwrap_or(0);
                    let actor_type = actor.get("actor_type").and_then(Value::as_str).unwrap_or("");
                    let bypass_mode = actor.get("bypass_mode").and_then(Value::as_str);

                    let base = match actor_type {
                        "OrganizationAdmin" | "RepositoryRole" => {
                            actors::role_actor_token(actor_id, actor_type)
                        }
                        "Team" => {
                            if team_slugs.is_none() {
                                team_slugs = Some(self.team_slug_map(org_id).await?);
                            }
                            team_slugs
                                .as_ref()
                                .and_then(|slugs| slugs.get(&actor_id))
                                .map(|slug| format!("@{org_id}/{slug}"))
                        }
                        "Integration" => {
                            if app_slugs.is_none() {
                                app_slugs = Some(self.app_slug_map(org_id).await?);
                            }
                            app_slugs
                                .as_ref()
                                .and_then(|slugs| slugs.get(&actor_id))
                                .cloned()
                        }
                        _ => None,
                    };

                    match base {
                        Some(base) => {
                            let token = match bypass_mode {
                                Some(mode) if mode != "always" => format!("{base}:{mode}"),
                                _ => base,
                            };
                            tokens.push(Value::String(token));
                        }
                        None => {
                            warn!(actor_id, actor_type, "unresolvable bypass actor, skipping");
                        }
                    }
                }
                *actors = tokens;
            }

            let Some(rules) = ruleset.get_mut("rules").and_then(Value::as_array_mut) else {
                continue;
            };
            for rule in rules {
                if rule.get("type").and_then(Value::as_str) != Some("required_status_checks") {
                    continue;
                }
                let Some(checks) = rule
                    .pointer_mut("/parameters/required_status_checks")
                    .and_then(Value::as_array_mut)
                else {
                    continue;
                };
                for check in checks {
                    let Some(integration_id) = check.get("integration_id").and_then(Value::as_i64)
                    else {
                        continue;
                    };
                    if app_slugs.is_none() {
                        app_slugs = Some(self.app_slug_map(org_id).await?);
                    }
                    let slug = app_slugs
                        .as_ref()
                        .and_then(|slugs| slugs.get(&integration_id))
                        .cloned();
                    if let (Some(slug), Some(check)) = (slug, check.as_object_mut()) {
                        check.remove("integration_id");
                        check.insert("integration_slug".to_string(), Value::String(slug));
                    }
                }
            }
        }

        Ok(())
    }

    async fn team_slug_map(&self, org_id: &str) -> Result<HashMap<i64, String>, Error> {
        let teams = self.get_paged_array(&format!("/orgs/{org_id}/teams")).await?;
        Ok(teams
            .iter()
            .filter_map(|team| {
                Some((
                    team.get("id").and_then(Value::as_i64)?,
                    team.get("slug").and_then(Value::as_str)?.to_string(),
                ))
            })
            .collect())
    }

    async fn app_slug_map(&self, org_id: &str) -> Result<HashMap<i64, String>, Error> {
        let installations = self.list_app_installations(org_id).await?;
        Ok(installations
            .iter()
            .filter_map(|installation| {
                Some((
                    installation.get("app_id").and_then(Value::as_i64)?,
                    installation
                        .get("app_slug")
                        .and_then(Value::as_str)?
                        .to_string(),
                ))
            })
            .collect())
    }

    #[instrument(skip(self, data))]
    pub async fn add_org_ruleset(&self, org_id: &str, data: &Value) -> Result<(), Error> {
        self.post_empty(&format!("/orgs/{org_id}/rulesets"), data).await?;
        debug!(org_id, "added organization ruleset");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_org_ruleset(
        &self,
        org_id: &str,
        ruleset_id: i64,
        data: &Value,
    ) -> Result<(), Error> {
        self.put_json(&format!("/orgs/{org_id}/rulesets/{ruleset_id}"), data)
            .await?;
        debug!(org_id, ruleset_id, "updated organization ruleset");
        Ok(())
    }

    pub async fn delete_org_ruleset(&self, org_id: &str, ruleset_id: i64) -> Result<(), Error> {
        self.delete(&format!("/orgs/{org_id}/rulesets/{ruleset_id}"))
            .await?;
        Ok(())
    }

    /// Lists the rulesets defined directly on a repository, excluding
    /// rules inherited from the organization.
    pub async fn get_repo_rulesets(&self, org_id: &str, repo_name: &str) -> Result<Vec<Value>, Error> {
        let summaries = self
            .get_paged_array(&format!(
                "/repos/{org_id}/{repo_name}/rulesets?includes_parents=false"
            ))
            .await?;

        let mut rulesets = Vec::with_capacity(summaries.len());
        for summary in summaries {
            if let Some(id) = summary.get("id").and_then(Value::as_i64) {
                rulesets.push(
                    self.get_json(&format!("/repos/{org_id}/{repo_name}/rulesets/{id}"))
                        .await?,
                );
            }
        }
        self.normalize_rulesets(org_id, &mut rulesets).await?;
        Ok(rulesets)
    }

    #[instrument(skip(self, data))]
    pub async fn add_repo_ruleset(
        &self,
        org_id: &str,
        repo_name: &str,
        data: &Value,
    ) -> Result<(), Error> {
        self.post_empty(&format!("/repos/{org_id}/{repo_name}/rulesets"), data)
            .await?;
        debug!(org_id, repo_name, "added repository ruleset");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_repo_ruleset(
        &self,
        org_id: &str,
        repo_name: &str,
        ruleset_id: i64,
        data: &Value,
    ) -> Result<(), Error> {
        self.put_json(
            &format!("/repos/{org_id}/{repo_name}/rulesets/{ruleset_id}"),
            data,
        )
        .await?;
        debug!(org_id, repo_name, ruleset_id, "updated repository ruleset");
        Ok(())
    }

    pub async fn delete_repo_ruleset(
        &self,
        org_id: &str,
        repo_name: &str,
        ruleset_id: i64,
    ) -> Result<(), Error> {
        self.delete(&format!("/repos/{org_id}/{repo_name}/rulesets/{ruleset_id}"))
            .await?;
        Ok(())
    }
}
