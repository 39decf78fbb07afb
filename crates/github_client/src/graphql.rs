//! GraphQL transport, used where the REST API has no coverage: listing
//! and mutating branch protection rules.

use serde_json::{json, Map, Value};
use tracing::{debug, instrument};

use crate::errors::Error;

#[cfg(test)]
#[path = "graphql_tests.rs"]
mod tests;

const BRANCH_PROTECTION_RULES_QUERY: &str = r#"
query($organization: String!, $repository: String!, $endCursor: String) {
  repository(owner: $organization, name: $repository) {
    branchProtectionRules(first: 100, after: $endCursor) {
      nodes {
        id
        pattern
        allowsDeletions
        allowsForcePushes
        blocksCreations
        dismissesStaleReviews
        isAdminEnforced
        lockBranch
        lockAllowsFetchAndMerge
        requireLastPushApproval
        requiredApprovingReviewCount
        requiresApprovingReviews
        requiresCodeOwnerReviews
        requiresCommitSignatures
        requiresConversationResolution
        requiresLinearHistory
        requiresStatusChecks
        requiresStrictStatusChecks
        restrictsPushes
        restrictsReviewDismissals
        requiredStatusChecks {
          app { slug }
          context
        }
        pushAllowances { totalCount }
        reviewDismissalAllowances { totalCount }
        bypassPullRequestAllowances { totalCount }
        bypassForcePushAllowances { totalCount }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
    }
  }
}
"#;

const ACTOR_NODE_SELECTION: &str = r#"
      nodes {
        actor {
          __typename
          ... on User { login }
          ... on Team { combinedSlug }
          ... on App { slug }
        }
      }
      pageInfo {
        endCursor
        hasNextPage
      }
"#;

/// The four allowance lists of a branch protection rule that have to be
/// paged separately: (GraphQL field, model field).
const ALLOWANCE_FIELDS: &[(&str, &str)] = &[
    ("pushAllowances", "push_restrictions"),
    ("reviewDismissalAllowances", "review_dismissal_allowances"),
    ("bypassPullRequestAllowances", "bypass_pull_request_allowances"),
    ("bypassForcePushAllowances", "bypass_force_push_allowances"),
];

/// Client for the GitHub GraphQL endpoint, delegating the transport to
/// octocrab's graphql passthrough.
#[derive(Debug, Clone)]
pub struct GraphQlClient {
    client: octocrab::Octocrab,
}

impl GraphQlClient {
    pub fn new(client: octocrab::Octocrab) -> Self {
        Self { client }
    }

    async fn run_query(&self, query: &str, variables: Value) -> Result<Value, Error> {
        let payload = json!({ "query": query, "variables": variables });
        let response: Value = self
            .client
            .graphql(&payload)
            .await
            .map_err(Error::from_octocrab)?;

        if let Some(errors) = response.get("errors").and_then(Value::as_array) {
            if !errors.is_empty() {
                return Err(Error::InvalidResponse(format!(
                    "GraphQL query failed: {}",
                    serde_json::to_string(errors).unwrap_or_default()
                )));
            }
        }

        response
            .get("data")
            .cloned()
            .ok_or_else(|| Error::InvalidResponse("GraphQL response without data".to_string()))
    }

    /// Lists branch protection rules of a repository, with every non-empty
    /// allowance list expanded via its own paged query.
    #[instrument(skip(self))]
    pub async fn get_branch_protection_rules(
        &self,
        org_id: &str,
        repo_name: &str,
    ) -> Result<Vec<Value>, Error> {
        let mut rules = Vec::new();
        let mut end_cursor: Option<String> = None;

        loop {
            let data = self
                .run_query(
                    BRANCH_PROTECTION_RULES_QUERY,
                    json!({
                        "organization": org_id,
                        "repository": repo_name,
                        "endCursor": end_cursor,
                    }),
                )
                .await?;

            let connection = data
                .pointer("/repository/branchProtectionRules")
                .ok_or_else(|| {
                    Error::InvalidResponse("missing branchProtectionRules in response".to_string())
                })?;

            if let Some(nodes) = connection.get("nodes").and_then(Value::as_array) {
                rules.extend(nodes.iter().cloned());
            }

            let page_info = connection.get("pageInfo");
            if page_info
                .and_then(|info| info.get("hasNextPage"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                end_cursor = page_info
                    .and_then(|info| info.get("endCursor"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            } else {
                break;
            }
        }

        for rule in &mut rules {
            self.expand_allowances(rule).await?;
        }

        debug!(org_id, repo_name, count = rules.len(), "retrieved branch protection rules");
        Ok(rules)
    }

    /// Replaces each `{ totalCount }` allowance stub with the full actor
    /// token list, querying only when the count is non-zero.
    async fn expand_allowances(&self, rule: &mut Value) -> Result<(), Error> {
        let rule_id = rule
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("branch protection rule without id".to_string()))?;

        let Value::Object(rule_map) = rule else {
            return Err(Error::InvalidResponse(
                "branch protection rule is not an object".to_string(),
            ));
        };

        for (graphql_field, model_field) in ALLOWANCE_FIELDS {
            let total_count = rule_map
                .remove(*graphql_field)
                .and_then(|stub| stub.get("totalCount").and_then(Value::as_i64))
                .unwrap_or(0);

            let actors = if total_count > 0 {
                self.get_allowance_actors(&rule_id, graphql_field).await?
            } else {
                Vec::new()
            };

            rule_map.insert(model_field.to_string(), Value::Array(actors));
        }

        Ok(())
    }

    async fn get_allowance_actors(
        &self,
        rule_id: &str,
        field: &str,
    ) -> Result<Vec<Value>, Error> {
        let query = format!(
            r#"
query($branchProtectionRuleId: ID!, $endCursor: String) {{
  node(id: $branchProtectionRuleId) {{
    ... on BranchProtectionRule {{
      {field}(first: 100, after: $endCursor) {{{ACTOR_NODE_SELECTION}      }}
    }}
  }}
}}
"#
        );

        let mut actors = Vec::new();
        let mut end_cursor: Option<String> = None;

        loop {
            let data = self
                .run_query(
                    &query,
                    json!({
                        "branchProtectionRuleId": rule_id,
                        "endCursor": end_cursor,
                    }),
                )
                .await?;

            let connection = data
                .pointer(&format!("/node/{field}"))
                .cloned()
                .ok_or_else(|| {
                    Error::InvalidResponse(format!("missing '{field}' in allowance response"))
                })?;

            if let Some(nodes) = connection.get("nodes").and_then(Value::as_array) {
                for node in nodes {
                    if let Some(actor) = node.get("actor") {
                        actors.push(Value::String(transform_actor(actor)?));
                    }
                }
            }

            let page_info = connection.get("pageInfo");
            if page_info
                .and_then(|info| info.get("hasNextPage"))
                .and_then(Value::as_bool)
                .unwrap_or(false)
            {
                end_cursor = page_info
                    .and_then(|info| info.get("endCursor"))
                    .and_then(Value::as_str)
                    .map(str::to_string);
            } else {
                return Ok(actors);
            }
        }
    }

    #[instrument(skip(self, data))]
    pub async fn add_branch_protection_rule(
        &self,
        org_id: &str,
        repo_name: &str,
        repo_node_id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), Error> {
        let mut input = data.clone();
        input.insert("repositoryId".to_string(), Value::String(repo_node_id.to_string()));

        let query = r#"mutation($ruleInput: CreateBranchProtectionRuleInput!) {
  createBranchProtectionRule(input: $ruleInput) {
    branchProtectionRule {
      pattern
    }
  }
}"#;

        self.run_query(query, json!({ "ruleInput": input })).await?;
        debug!(org_id, repo_name, "created branch protection rule");
        Ok(())
    }

    #[instrument(skip(self, data))]
    pub async fn update_branch_protection_rule(
        &self,
        org_id: &str,
        repo_name: &str,
        rule_id: &str,
        data: &Map<String, Value>,
    ) -> Result<(), Error> {
        let mut input = data.clone();
        input.insert(
            "branchProtectionRuleId".to_string(),
            Value::String(rule_id.to_string()),
        );

        let query = r#"mutation($ruleInput: UpdateBranchProtectionRuleInput!) {
  updateBranchProtectionRule(input: $ruleInput) {
    branchProtectionRule {
      pattern
    }
  }
}"#;

        self.run_query(query, json!({ "ruleInput": input })).await?;
        debug!(org_id, repo_name, rule_id, "updated branch protection rule");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn delete_branch_protection_rule(
        &self,
        org_id: &str,
        repo_name: &str,
        rule_id: &str,
    ) -> Result<(), Error> {
        let query = r#"mutation($ruleInput: DeleteBranchProtectionRuleInput!) {
  deleteBranchProtectionRule(input: $ruleInput) {
    clientMutationId
  }
}"#;

        self.run_query(
            query,
            json!({ "ruleInput": { "branchProtectionRuleId": rule_id } }),
        )
        .await?;
        debug!(org_id, repo_name, rule_id, "deleted branch protection rule");
        Ok(())
    }
}

/// Renders a GraphQL actor node as an actor token: `@login` for users,
/// `@org/team` for teams, the bare slug for apps.
fn transform_actor(actor: &Value) -> Result<String, Error> {
    let typename = actor
        .get("__typename")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match typename {
        "User" => actor
            .get("login")
            .and_then(Value::as_str)
            .map(|login| format!("@{login}"))
            .ok_or_else(|| Error::InvalidResponse("user actor without login".to_string())),
        "Team" => actor
            .get("combinedSlug")
            .and_then(Value::as_str)
            .map(|slug| format!("@{slug}"))
            .ok_or_else(|| Error::InvalidResponse("team actor without slug".to_string())),
        "App" => actor
            .get("slug")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| Error::InvalidResponse("app actor without slug".to_string())),
        other => Err(Error::InvalidResponse(format!("unsupported actor type '{other}'"))),
    }
}
