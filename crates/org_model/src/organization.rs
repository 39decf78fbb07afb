//! The organization root entity: owner of every managed resource.

use std::sync::Arc;

use futures::future::join_all;
use github_client::GitHubProvider;
use serde_json::{json, Value};
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument};

use crate::custom_property::CustomProperty;
use crate::environment::Environment;
use crate::errors::ModelError;
use crate::object::{ModelMap, ModelObject};
use crate::organization_role::OrganizationRole;
use crate::organization_settings::OrganizationSettings;
use crate::patterns::glob_matches_any;
use crate::repository::Repository;
use crate::ruleset::{Ruleset, RulesetScope};
use crate::secret::{Secret, SecretScope};
use crate::team::Team;
use crate::team_permission::TeamPermission;
use crate::validation::{FailureType, ValidationContext};
use crate::variable::{Variable, VariableScope};
use crate::webhook::{Webhook, WebhookScope};
use crate::workflow_settings::{WorkflowScope, WorkflowSettings};

#[cfg(test)]
#[path = "organization_tests.rs"]
mod tests;

/// How many repositories are read concurrently during import and plan.
const DEFAULT_REPO_CONCURRENCY: usize = 8;

#[derive(Debug, Clone)]
pub struct GitHubOrganization {
    pub github_id: String,
    pub settings: OrganizationSettings,
    pub workflow_settings: WorkflowSettings,
    pub webhooks: Vec<Webhook>,
    pub secrets: Vec<Secret>,
    pub variables: Vec<Variable>,
    pub custom_properties: Vec<CustomProperty>,
    pub roles: Vec<OrganizationRole>,
    pub rulesets: Vec<Ruleset>,
    pub teams: Vec<Team>,
    pub repositories: Vec<Repository>,
}

impl GitHubOrganization {
    /// Builds an expected organization from the evaluated declarative tree.
    pub fn from_model_value(github_id: &str, data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("organization data is not an object".to_string()))?;

        let settings = match object.get("settings") {
            Some(settings) => OrganizationSettings::from_model_value(settings)?,
            None => OrganizationSettings::from_model_value(&json!({}))?,
        };
        let workflow_settings = match object.get("workflow_settings") {
            Some(settings) => WorkflowSettings::from_model_value(WorkflowScope::Organization, settings)?,
            None => WorkflowSettings::empty(WorkflowScope::Organization),
        };

        fn collection<T>(
            object: &ModelMap,
            field: &str,
            parse: impl Fn(&Value) -> Result<T, ModelError>,
        ) -> Result<Vec<T>, ModelError> {
            object
                .get(field)
                .and_then(Value::as_array)
                .map(|items| items.iter().map(&parse).collect())
                .unwrap_or_else(|| Ok(Vec::new()))
        }

        Ok(Self {
            github_id: github_id.to_string(),
            settings,
            workflow_settings,
            webhooks: collection(object, "webhooks", |data| {
                Webhook::from_model_value(WebhookScope::Organization, data)
            })?,
            secrets: collection(object, "secrets", |data| {
                Secret::from_model_value(SecretScope::Organization, data)
            })?,
            variables: collection(object, "variables", |data| {
                Variable::from_model_value(VariableScope::Organization, data)
            })?,
            custom_properties: collection(object, "custom_properties", CustomProperty::from_model_value)?,
            roles: collection(object, "roles", OrganizationRole::from_model_value)?,
            rulesets: collection(object, "rulesets", |data| {
                Ruleset::from_model_value(RulesetScope::Organization, data)
            })?,
            teams: collection(object, "teams", Team::from_model_value)?,
            repositories: collection(object, "repositories", Repository::from_model_value)?,
        })
    }

    /// Reads the live state of an organization.
    ///
    /// Organization-level resources are read first, then repositories fan
    /// out with bounded concurrency; all reads share the provider.
    #[instrument(skip(provider))]
    pub async fn load_from_provider(
        github_id: &str,
        provider: &GitHubProvider,
        no_web_ui: bool,
    ) -> Result<Self, ModelError> {
        info!(github_id, "reading live organization state");

        let settings_data = provider.get_org_settings(github_id, no_web_ui).await?;
        let settings = OrganizationSettings::from_provider_data(&Value::Object(settings_data))?;

        let workflow_data = provider.rest().get_org_workflow_settings(github_id).await?;
        let workflow_settings = WorkflowSettings::from_provider_data(
            WorkflowScope::Organization,
            &Value::Object(workflow_data),
        )?;

        let webhooks = provider
            .rest()
            .get_org_webhooks(github_id)
            .await?
            .iter()
            .map(|data| Webhook::from_provider_data(WebhookScope::Organization, data))
            .collect::<Result<_, _>>()?;
        let secrets = provider
            .rest()
            .get_org_secrets(github_id)
            .await?
            .iter()
            .map(|data| Secret::from_provider_data(SecretScope::Organization, data))
            .collect::<Result<_, _>>()?;
        let variables = provider
            .rest()
            .get_org_variables(github_id)
            .await?
            .iter()
            .map(|data| Variable::from_provider_data(VariableScope::Organization, data))
            .collect::<Result<_, _>>()?;
        let custom_properties = provider
            .rest()
            .get_org_custom_properties(github_id)
            .await?
            .iter()
            .map(CustomProperty::from_provider_data)
            .collect::<Result<_, _>>()?;
        let roles = provider
            .rest()
            .get_org_roles(github_id)
            .await?
            .iter()
            .map(OrganizationRole::from_provider_data)
            .collect::<Result<_, _>>()?;
        let rulesets = provider
            .rest()
            .get_org_rulesets(github_id)
            .await?
            .iter()
            .map(|data| Ruleset::from_provider_data(RulesetScope::Organization, data))
            .collect::<Result<_, _>>()?;
        let teams = provider
            .rest()
            .get_org_teams(github_id)
            .await?
            .iter()
            .map(Team::from_provider_data)
            .collect::<Result<_, _>>()?;

        let repo_names = provider.rest().get_repos(github_id).await?;
        let semaphore = Arc::new(Semaphore::new(DEFAULT_REPO_CONCURRENCY));

        let futures = repo_names.iter().map(|repo_name| {
            let semaphore = Arc::clone(&semaphore);
            async move {
                let _permit = semaphore
                    .acquire()
                    .await
                    .map_err(|_| ModelError::PatchFailed("repository read pool closed".to_string()))?;
                Self::load_repository(github_id, repo_name, provider).await
            }
        });

        let repositories = join_all(futures)
            .await
            .into_iter()
            .collect::<Result<Vec<_>, _>>()?;

        info!(
            github_id,
            repositories = repositories.len(),
            "finished reading live organization state"
        );

        Ok(Self {
            github_id: github_id.to_string(),
            settings,
            workflow_settings,
            webhooks,
            secrets,
            variables,
            custom_properties,
            roles,
            rulesets,
            teams,
            repositories,
        })
    }

    /// Reads one repository with its owned resources.
    async fn load_repository(
        github_id: &str,
        repo_name: &str,
        provider: &GitHubProvider,
    ) -> Result<Repository, ModelError> {
        debug!(github_id, repo_name, "reading repository");

        let data = provider.rest().get_repo_data(github_id, repo_name).await?;
        let mut repository = Repository::from_provider_data(&Value::Object(data))?;

        if !repository.is_archived() {
            repository.branch_protection_rules = provider
                .graphql()
                .get_branch_protection_rules(github_id, repo_name)
                .await?
                .iter()
                .map(crate::branch_protection_rule::BranchProtectionRule::from_provider_data)
                .collect::<Result<_, _>>()?;
        }

        repository.rulesets = provider
            .rest()
            .get_repo_rulesets(github_id, repo_name)
            .await?
            .iter()
            .map(|data| Ruleset::from_provider_data(RulesetScope::Repository, data))
            .collect::<Result<_, _>>()?;
        repository.webhooks = provider
            .rest()
            .get_repo_webhooks(github_id, repo_name)
            .await?
            .iter()
            .map(|data| Webhook::from_provider_data(WebhookScope::Repository, data))
            .collect::<Result<_, _>>()?;
        repository.secrets = provider
            .rest()
            .get_repo_secrets(github_id, repo_name)
            .await?
            .iter()
            .map(|data| Secret::from_provider_data(SecretScope::Repository, data))
            .collect::<Result<_, _>>()?;
        repository.variables = provider
            .rest()
            .get_repo_variables(github_id, repo_name)
            .await?
            .iter()
            .map(|data| Variable::from_provider_data(VariableScope::Repository, data))
            .collect::<Result<_, _>>()?;

        let mut environments = Vec::new();
        for data in provider.rest().get_repo_environments(github_id, repo_name).await? {
            let mut environment = Environment::from_provider_data(github_id, &data)?;
            if let Some(env_name) = environment.name.cloned_value() {
                environment.secrets = provider
                    .rest()
                    .get_environment_secrets(github_id, repo_name, &env_name)
                    .await?
                    .iter()
                    .map(|data| Secret::from_provider_data(SecretScope::Environment, data))
                    .collect::<Result<_, _>>()?;
                environment.variables = provider
                    .rest()
                    .get_environment_variables(github_id, repo_name, &env_name)
                    .await?
                    .iter()
                    .map(|data| Variable::from_provider_data(VariableScope::Environment, data))
                    .collect::<Result<_, _>>()?;
            }
            environments.push(environment);
        }
        repository.environments = environments;

        repository.team_permissions = provider
            .rest()
            .get_repo_teams(github_id, repo_name)
            .await?
            .iter()
            .map(TeamPermission::from_provider_data)
            .collect::<Result<_, _>>()?;

        let workflow_data = provider
            .rest()
            .get_repo_workflow_settings(github_id, repo_name)
            .await?;
        repository.workflow_settings = Some(WorkflowSettings::from_provider_data(
            WorkflowScope::Repository,
            &Value::Object(workflow_data),
        )?);

        Ok(repository)
    }

    /// Serializes the organization back into the declarative tree shape.
    pub fn to_model_value(&self) -> Value {
        let mut root = ModelMap::new();
        root.insert("github_id".to_string(), Value::String(self.github_id.clone()));
        root.insert("settings".to_string(), Value::Object(self.settings.to_model_map()));
        root.insert(
            "workflow_settings".to_string(),
            Value::Object(self.workflow_settings.to_model_map()),
        );

        fn serialize_all<T: ModelObject>(items: &[T]) -> Value {
            Value::Array(
                items
                    .iter()
                    .map(|item| Value::Object(item.to_model_map()))
                    .collect(),
            )
        }

        root.insert("webhooks".to_string(), serialize_all(&self.webhooks));
        root.insert("secrets".to_string(), serialize_all(&self.secrets));
        root.insert("variables".to_string(), serialize_all(&self.variables));
        root.insert(
            "custom_properties".to_string(),
            serialize_all(&self.custom_properties),
        );
        root.insert("roles".to_string(), serialize_all(&self.roles));
        root.insert("rulesets".to_string(), serialize_all(&self.rulesets));
        root.insert("teams".to_string(), serialize_all(&self.teams));

        let repositories: Vec<Value> = self
            .repositories
            .iter()
            .map(|repository| {
                let mut map = repository.to_model_map();
                map.insert(
                    "branch_protection_rules".to_string(),
                    serialize_all(&repository.branch_protection_rules),
                );
                map.insert("rulesets".to_string(), serialize_all(&repository.rulesets));
                map.insert("webhooks".to_string(), serialize_all(&repository.webhooks));
                map.insert("secrets".to_string(), serialize_all(&repository.secrets));
                map.insert("variables".to_string(), serialize_all(&repository.variables));
                map.insert(
                    "team_permissions".to_string(),
                    serialize_all(&repository.team_permissions),
                );

                let environments: Vec<Value> = repository
                    .environments
                    .iter()
                    .map(|environment| {
                        let mut map = environment.to_model_map();
                        map.insert("secrets".to_string(), serialize_all(&environment.secrets));
                        map.insert("variables".to_string(), serialize_all(&environment.variables));
                        Value::Object(map)
                    })
                    .collect();
                map.insert("environments".to_string(), Value::Array(environments));

                if let Some(settings) = &repository.workflow_settings {
                    map.insert(
                        "workflow_settings".to_string(),
                        Value::Object(settings.to_model_map()),
                    );
                }
                Value::Object(map)
            })
            .collect();
        root.insert("repositories".to_string(), Value::Array(repositories));

        Value::Object(root)
    }

    /// Validates the expected organization; no provider traffic happens
    /// here.
    pub fn validate(&self) -> ValidationContext {
        let mut context = ValidationContext::new();

        self.settings.validate(&mut context);
        self.workflow_settings.validate(&mut context, None);

        for webhook in &self.webhooks {
            webhook.validate(&mut context, None);
        }
        for secret in &self.secrets {
            secret.validate(&mut context, None);
        }
        for variable in &self.variables {
            variable.validate(&mut context, None);
        }
        for custom_property in &self.custom_properties {
            custom_property.validate(&mut context, None);
        }
        for role in &self.roles {
            role.validate(&mut context, None);
        }

        let enterprise_plan = self.settings.plan.as_deref() == Some("enterprise");
        let repo_names: Vec<String> = self
            .repositories
            .iter()
            .filter_map(|repository| repository.name.cloned_value())
            .collect();

        for ruleset in &self.rulesets {
            ruleset.validate(&mut context, None, enterprise_plan);

            for globs in [
                ruleset.include_repo_names.value(),
                ruleset.exclude_repo_names.value(),
            ]
            .into_iter()
            .flatten()
            {
                for glob in globs {
                    match glob_matches_any(glob, &repo_names) {
                        Ok(true) => {}
                        Ok(false) => {
                            context.add_failure(
                                FailureType::Warning,
                                format!(
                                    "{} has repository pattern '{glob}' matching no declared repository",
                                    ruleset.model_header(None)
                                ),
                            );
                        }
                        Err(_) => {
                            context.add_failure(
                                FailureType::Error,
                                format!(
                                    "{} has an invalid repository pattern '{glob}'",
                                    ruleset.model_header(None)
                                ),
                            );
                        }
                    }
                }
            }
        }

        for team in &self.teams {
            team.validate(&mut context, None);
        }
        for repository in &self.repositories {
            repository.validate(&mut context, &self.settings);
        }

        self.validate_unique_keys(&mut context);
        context
    }

    /// Keys must be unique within their collection, and aliases must not
    /// collide with any primary key.
    fn validate_unique_keys(&self, context: &mut ValidationContext) {
        fn check_duplicates<T: ModelObject>(
            context: &mut ValidationContext,
            kind: &str,
            items: &[T],
        ) {
            let mut seen = std::collections::HashSet::new();
            for item in items {
                if let Some(key) = item.key_value() {
                    if !seen.insert(key.clone()) {
                        context.add_failure(
                            FailureType::Error,
                            format!("duplicate {kind} with key '{key}'"),
                        );
                    }
                }
            }
        }

        check_duplicates(context, "org_webhook", &self.webhooks);
        check_duplicates(context, "org_secret", &self.secrets);
        check_duplicates(context, "org_variable", &self.variables);
        check_duplicates(context, "custom_property", &self.custom_properties);
        check_duplicates(context, "org_role", &self.roles);
        check_duplicates(context, "org_ruleset", &self.rulesets);
        check_duplicates(context, "team", &self.teams);
        check_duplicates(context, "repository", &self.repositories);

        let repo_names: std::collections::HashSet<String> = self
            .repositories
            .iter()
            .filter_map(|repository| repository.name.cloned_value())
            .collect();
        for repository in &self.repositories {
            for alias in &repository.aliases {
                if repo_names.contains(alias) {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "alias '{alias}' of {} collides with a declared repository",
                            repository.model_header(None)
                        ),
                    );
                }
            }
        }

        for repository in &self.repositories {
            check_duplicates(
                context,
                "branch_protection_rule",
                &repository.branch_protection_rules,
            );
            check_duplicates(context, "repo_ruleset", &repository.rulesets);
            check_duplicates(context, "repo_webhook", &repository.webhooks);
            check_duplicates(context, "repo_secret", &repository.secrets);
            check_duplicates(context, "repo_variable", &repository.variables);
            check_duplicates(context, "environment", &repository.environments);
            check_duplicates(context, "team_permission", &repository.team_permissions);
        }
    }
}
