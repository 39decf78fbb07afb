//! Repositories and everything they own.

use async_trait::async_trait;
use github_client::GitHubProvider;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::branch_protection_rule::BranchProtectionRule;
use crate::environment::Environment;
use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::property::Property;
use crate::ruleset::{Ruleset, RulesetScope};
use crate::secret::{Secret, SecretScope};
use crate::team_permission::TeamPermission;
use crate::validation::{FailureType, ValidationContext};
use crate::variable::{Variable, VariableScope};
use crate::webhook::{Webhook, WebhookScope};
use crate::workflow_settings::{WorkflowSettings, WorkflowScope};

#[cfg(test)]
#[path = "repository_tests.rs"]
mod tests;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Repository {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub node_id: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    /// Previous names of this repository, used to recognize renames.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub description: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub homepage: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub private: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub archived: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub is_template: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub template_repository: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub forked_repository: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub default_branch: Property<String>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub has_discussions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub has_issues: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub has_projects: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub has_wiki: Property<bool>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_auto_merge: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_forking: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_merge_commit: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_rebase_merge: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_squash_merge: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allow_update_branch: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub delete_branch_on_merge: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub merge_commit_title: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub merge_commit_message: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub squash_merge_commit_title: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub squash_merge_commit_message: Property<String>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub web_commit_signoff_required: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub topics: Property<Vec<String>>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dependabot_alerts_enabled: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dependabot_security_updates_enabled: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub secret_scanning: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub secret_scanning_push_protection: Property<String>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub gh_pages_build_type: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub gh_pages_source_branch: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub gh_pages_source_path: Property<String>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub code_scanning_default_setup_enabled: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub code_scanning_default_query_suite: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub code_scanning_default_languages: Property<Vec<String>>,

    /// Initialize an empty repository with a first commit on creation.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub auto_init: Property<bool>,
    /// Files rewritten after generating from the template repository.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub post_process_template_content: Vec<String>,

    #[serde(skip)]
    pub branch_protection_rules: Vec<BranchProtectionRule>,
    #[serde(skip)]
    pub rulesets: Vec<Ruleset>,
    #[serde(skip)]
    pub webhooks: Vec<Webhook>,
    #[serde(skip)]
    pub secrets: Vec<Secret>,
    #[serde(skip)]
    pub variables: Vec<Variable>,
    #[serde(skip)]
    pub environments: Vec<Environment>,
    #[serde(skip)]
    pub team_permissions: Vec<TeamPermission>,
    #[serde(skip)]
    pub workflow_settings: Option<WorkflowSettings>,
}

const FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::external("node_id"),
    fields::key("name"),
    fields::model_only("aliases"),
    fields::value("description"),
    fields::value("homepage"),
    fields::value("private"),
    fields::value("archived"),
    fields::value("is_template"),
    fields::read_only("template_repository"),
    fields::read_only("forked_repository"),
    fields::value("default_branch"),
    fields::value("has_discussions"),
    fields::value("has_issues"),
    fields::value("has_projects"),
    fields::value("has_wiki"),
    fields::value("allow_auto_merge"),
    fields::value("allow_forking"),
    fields::value("allow_merge_commit"),
    fields::value("allow_rebase_merge"),
    fields::value("allow_squash_merge"),
    fields::value("allow_update_branch"),
    fields::value("delete_branch_on_merge"),
    fields::value("merge_commit_title"),
    fields::value("merge_commit_message"),
    fields::value("squash_merge_commit_title"),
    fields::value("squash_merge_commit_message"),
    fields::value("web_commit_signoff_required"),
    fields::set("topics"),
    fields::value("dependabot_alerts_enabled"),
    fields::value("dependabot_security_updates_enabled"),
    fields::value("secret_scanning"),
    fields::value("secret_scanning_push_protection"),
    fields::value("gh_pages_build_type"),
    fields::value("gh_pages_source_branch"),
    fields::value("gh_pages_source_path"),
    fields::value("code_scanning_default_setup_enabled"),
    fields::value("code_scanning_default_query_suite"),
    fields::set("code_scanning_default_languages"),
    fields::model_only("auto_init"),
    fields::model_only("post_process_template_content"),
];

/// Security-analysis fields private repositories do not support.
const SECURITY_FIELDS: &[&str] = &["secret_scanning", "secret_scanning_push_protection"];

/// Fields GitHub refuses to change on archived repositories.
const UNAVAILABLE_IN_ARCHIVED_REPOS: &[&str] = &[
    "allow_auto_merge",
    "allow_merge_commit",
    "allow_rebase_merge",
    "allow_squash_merge",
    "allow_update_branch",
    "delete_branch_on_merge",
    "merge_commit_title",
    "merge_commit_message",
    "squash_merge_commit_title",
    "squash_merge_commit_message",
    "dependabot_alerts_enabled",
    "dependabot_security_updates_enabled",
    "secret_scanning_push_protection",
    "code_scanning_default_setup_enabled",
    "code_scanning_default_query_suite",
    "code_scanning_default_languages",
];

impl Repository {
    pub fn from_model_value(data: &Value) -> Result<Self, ModelError> {
        let mut repository: Repository = serde_json::from_value(data.clone())?;

        if let Some(rules) = data.get("branch_protection_rules").and_then(Value::as_array) {
            repository.branch_protection_rules = rules
                .iter()
                .map(BranchProtectionRule::from_model_value)
                .collect::<Result<_, _>>()?;
        }
        if let Some(rulesets) = data.get("rulesets").and_then(Value::as_array) {
            repository.rulesets = rulesets
                .iter()
                .map(|ruleset| Ruleset::from_model_value(RulesetScope::Repository, ruleset))
                .collect::<Result<_, _>>()?;
        }
        if let Some(webhooks) = data.get("webhooks").and_then(Value::as_array) {
            repository.webhooks = webhooks
                .iter()
                .map(|webhook| Webhook::from_model_value(WebhookScope::Repository, webhook))
                .collect::<Result<_, _>>()?;
        }
        if let Some(secrets) = data.get("secrets").and_then(Value::as_array) {
            repository.secrets = secrets
                .iter()
                .map(|secret| Secret::from_model_value(SecretScope::Repository, secret))
                .collect::<Result<_, _>>()?;
        }
        if let Some(variables) = data.get("variables").and_then(Value::as_array) {
            repository.variables = variables
                .iter()
                .map(|variable| Variable::from_model_value(VariableScope::Repository, variable))
                .collect::<Result<_, _>>()?;
        }
        if let Some(environments) = data.get("environments").and_then(Value::as_array) {
            repository.environments = environments
                .iter()
                .map(Environment::from_model_value)
                .collect::<Result<_, _>>()?;
        }
        if let Some(permissions) = data.get("team_permissions").and_then(Value::as_array) {
            repository.team_permissions = permissions
                .iter()
                .map(TeamPermission::from_model_value)
                .collect::<Result<_, _>>()?;
        }
        if let Some(settings) = data.get("workflow_settings") {
            repository.workflow_settings = Some(WorkflowSettings::from_model_value(
                WorkflowScope::Repository,
                settings,
            )?);
        }

        Ok(repository)
    }

    /// Builds a repository from the merged provider data; owned
    /// collections are loaded separately by the organization loader.
    pub fn from_provider_data(data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("repository data is not an object".to_string()))?;

        let mut model = ModelMap::new();
        for spec in FIELD_SPECS {
            if let Some(value) = object.get(spec.name) {
                model.insert(spec.name.to_string(), value.clone());
            }
        }
        model.remove("aliases");
        model.remove("auto_init");
        model.remove("post_process_template_content");

        if let Some(template) = data.pointer("/template_repository/full_name") {
            model.insert("template_repository".to_string(), template.clone());
        } else {
            model.insert("template_repository".to_string(), Value::Null);
        }
        if let Some(parent) = data.pointer("/parent/full_name") {
            model.insert("forked_repository".to_string(), parent.clone());
        } else {
            model.insert("forked_repository".to_string(), Value::Null);
        }

        if let Some(status) = data.pointer("/security_and_analysis/secret_scanning/status") {
            model.insert("secret_scanning".to_string(), status.clone());
        }
        if let Some(status) =
            data.pointer("/security_and_analysis/secret_scanning_push_protection/status")
        {
            model.insert("secret_scanning_push_protection".to_string(), status.clone());
        }

        match object.get("gh_pages") {
            Some(pages) => {
                if let Some(build_type) = pages.get("build_type") {
                    model.insert("gh_pages_build_type".to_string(), build_type.clone());
                }
                if let Some(branch) = pages.pointer("/source/branch") {
                    model.insert("gh_pages_source_branch".to_string(), branch.clone());
                }
                if let Some(path) = pages.pointer("/source/path") {
                    model.insert("gh_pages_source_path".to_string(), path.clone());
                }
            }
            None => {
                model.insert(
                    "gh_pages_build_type".to_string(),
                    Value::String("disabled".to_string()),
                );
            }
        }

        if let Some(setup) = object.get("code_scanning_default_setup") {
            model.insert(
                "code_scanning_default_setup_enabled".to_string(),
                Value::Bool(setup.get("state").and_then(Value::as_str) == Some("configured")),
            );
            if let Some(suite) = setup.get("query_suite") {
                model.insert("code_scanning_default_query_suite".to_string(), suite.clone());
            }
            if let Some(languages) = setup.get("languages") {
                model.insert("code_scanning_default_languages".to_string(), languages.clone());
            }
        }

        Self::from_model_value(&Value::Object(model))
    }

    /// The primary name plus all aliases.
    pub fn all_names(&self) -> Vec<String> {
        let mut names = Vec::with_capacity(1 + self.aliases.len());
        if let Some(name) = self.name.as_deref() {
            names.push(name.to_string());
        }
        names.extend(self.aliases.iter().cloned());
        names
    }

    pub fn is_archived(&self) -> bool {
        self.archived.value() == Some(&true)
    }

    pub fn validate(
        &self,
        context: &mut ValidationContext,
        org_settings: &crate::organization_settings::OrganizationSettings,
    ) {
        let header = self.model_header(None);
        let is_private = self.private.value() == Some(&true);
        let is_public = self.private.value() == Some(&false);

        if is_public && self.allow_forking.value() == Some(&false) {
            context.add_failure(
                FailureType::Warning,
                format!("public {header} has 'allow_forking' disabled which is not permitted"),
            );
        }

        if is_private
            && org_settings.members_can_fork_private_repositories.value() == Some(&false)
            && self.allow_forking.value() == Some(&true)
        {
            context.add_failure(
                FailureType::Error,
                format!(
                    "private {header} has 'allow_forking' enabled while the organization disables 'members_can_fork_private_repositories'"
                ),
            );
        }

        if is_private && self.has_wiki.value() == Some(&true) && org_settings.on_free_plan() {
            context.add_failure(
                FailureType::Warning,
                format!(
                    "private {header} has 'has_wiki' enabled which requires at least GitHub Team billing"
                ),
            );
        }

        if self.web_commit_signoff_required.value() == Some(&false)
            && org_settings.web_commit_signoff_required.value() == Some(&true)
        {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} has 'web_commit_signoff_required' disabled while the organization requires it"
                ),
            );
        }

        if is_private {
            for field in SECURITY_FIELDS {
                let set = match *field {
                    "secret_scanning" => self.secret_scanning.is_value(),
                    _ => self.secret_scanning_push_protection.is_value(),
                };
                if set {
                    context.add_failure(
                        FailureType::Error,
                        format!("private {header} configures '{field}' which is not available"),
                    );
                }
            }
        }

        if self.secret_scanning.as_deref() == Some("disabled")
            && self.secret_scanning_push_protection.as_deref() == Some("enabled")
        {
            context.add_failure(
                FailureType::Error,
                format!(
                    "{header} has 'secret_scanning' disabled while 'secret_scanning_push_protection' is enabled"
                ),
            );
        }

        if self.code_scanning_default_setup_enabled.value() == Some(&true) {
            let actions_enabled = self
                .workflow_settings
                .as_ref()
                .and_then(|settings| settings.enabled.value())
                .copied()
                .unwrap_or(true);
            if !actions_enabled {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} enables 'code_scanning_default_setup_enabled' while actions are disabled"
                    ),
                );
            }
        }

        if self.gh_pages_build_type.as_deref() == Some("legacy")
            && self.gh_pages_source_branch.value().is_none()
        {
            context.add_failure(
                FailureType::Error,
                format!("{header} uses legacy pages builds but sets no 'gh_pages_source_branch'"),
            );
        }

        if let Some(topics) = self.topics.value() {
            if topics.len() > 20 {
                context.add_failure(
                    FailureType::Error,
                    format!("{header} declares more than 20 topics"),
                );
            }
            for topic in topics {
                let well_formed = !topic.is_empty()
                    && topic.len() <= 50
                    && topic
                        .chars()
                        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
                if !well_formed {
                    context.add_failure(
                        FailureType::Error,
                        format!("{header} has an invalid topic '{topic}'"),
                    );
                }
            }
        }

        let parent = ParentRef::repository(self.name.as_deref().unwrap_or_default());
        let environment_names: Vec<String> = self
            .environments
            .iter()
            .filter_map(|environment| environment.name.cloned_value())
            .collect();

        for rule in &self.branch_protection_rules {
            rule.validate(context, Some(&parent));
        }
        for ruleset in &self.rulesets {
            ruleset.validate(context, Some(&parent), !org_settings.on_free_plan());

            if let Some(required) = ruleset.required_deployment_environments.value() {
                for environment in required {
                    if !environment_names.contains(environment) {
                        context.add_failure(
                            FailureType::Error,
                            format!(
                                "{} requires deployments to undeclared environment '{environment}'",
                                ruleset.model_header(Some(&parent))
                            ),
                        );
                    }
                }
            }
        }
        for webhook in &self.webhooks {
            webhook.validate(context, Some(&parent));
        }
        for secret in &self.secrets {
            secret.validate(context, Some(&parent));
        }
        for variable in &self.variables {
            variable.validate(context, Some(&parent));
        }
        for environment in &self.environments {
            environment.validate(context, Some(&parent));
        }
        for permission in &self.team_permissions {
            permission.validate(context, Some(&parent));
        }
        if let Some(settings) = &self.workflow_settings {
            settings.validate(context, Some(&parent));
        }

        if self.is_archived() && !self.branch_protection_rules.is_empty() {
            context.add_failure(
                FailureType::Info,
                format!("archived {header} declares branch protection rules, they are ignored"),
            );
        }
    }

    fn repository_name(entity: &dyn ModelObject) -> Result<String, ModelError> {
        entity
            .key_value()
            .ok_or_else(|| ModelError::PatchFailed("repository without a name".to_string()))
    }

    /// Splits a provider body into the main PATCH resource and satellite
    /// endpoint fields, which creation must apply in a second call.
    fn split_satellites(body: &mut ModelMap) -> ModelMap {
        let mut satellites = ModelMap::new();
        for field in [
            "topics",
            "dependabot_alerts_enabled",
            "dependabot_security_updates_enabled",
            "gh_pages",
            "code_scanning_default_setup",
        ] {
            if let Some(value) = body.remove(field) {
                satellites.insert(field.to_string(), value);
            }
        }
        satellites
    }
}

#[async_trait]
impl ModelObject for Repository {
    fn resource_kind(&self) -> &'static str {
        "repository"
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        FIELD_SPECS
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    fn include_field_for_diff(&self, field: &str) -> bool {
        if self.private.value() == Some(&true) && SECURITY_FIELDS.contains(&field) {
            return false;
        }
        if self.is_archived() && UNAVAILABLE_IN_ARCHIVED_REPOS.contains(&field) {
            return false;
        }
        true
    }

    async fn map_to_provider(
        &self,
        _org_id: &str,
        data: &ModelMap,
        _provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();
        let is_private = data
            .get("private")
            .and_then(Value::as_bool)
            .or(self.private.value().copied())
            .unwrap_or(false);

        let mut security = ModelMap::new();
        let mut pages = ModelMap::new();
        let mut pages_source = ModelMap::new();
        let mut code_scanning = ModelMap::new();

        for spec in self.field_specs() {
            if !spec.writable() {
                continue;
            }
            let Some(value) = data.get(spec.name) else {
                continue;
            };
            match spec.name {
                "secret_scanning" | "secret_scanning_push_protection" => {
                    // private repositories have no security block at all
                    if !is_private {
                        security.insert(spec.name.to_string(), json!({ "status": value }));
                    }
                }
                "gh_pages_build_type" => {
                    pages.insert("build_type".to_string(), value.clone());
                }
                "gh_pages_source_branch" => {
                    pages_source.insert("branch".to_string(), value.clone());
                }
                "gh_pages_source_path" => {
                    pages_source.insert("path".to_string(), value.clone());
                }
                "code_scanning_default_setup_enabled" => {
                    let state = if value.as_bool() == Some(true) {
                        "configured"
                    } else {
                        "not-configured"
                    };
                    code_scanning.insert("state".to_string(), Value::String(state.to_string()));
                }
                "code_scanning_default_query_suite" => {
                    code_scanning.insert("query_suite".to_string(), value.clone());
                }
                "code_scanning_default_languages" => {
                    code_scanning.insert("languages".to_string(), value.clone());
                }
                name => {
                    body.insert(name.to_string(), value.clone());
                }
            }
        }

        if !security.is_empty() {
            body.insert("security_and_analysis".to_string(), Value::Object(security));
        }
        if !pages_source.is_empty() {
            pages.insert("source".to_string(), Value::Object(pages_source));
        }
        if !pages.is_empty() {
            body.insert("gh_pages".to_string(), Value::Object(pages));
        }
        if !code_scanning.is_empty() {
            body.insert(
                "code_scanning_default_setup".to_string(),
                Value::Object(code_scanning),
            );
        }

        Ok(body)
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let name = Self::repository_name(self)?;
        let mut body = self.to_provider_body(org_id, provider).await?;
        let satellites = Self::split_satellites(&mut body);

        let template = self.template_repository.cloned_value();
        let auto_init = self.auto_init.value().copied().unwrap_or(false);

        provider
            .rest()
            .add_repo(
                org_id,
                &body,
                template.as_deref(),
                &self.post_process_template_content,
                auto_init,
            )
            .await?;

        if !satellites.is_empty() {
            provider.rest().update_repo(org_id, &name, &satellites).await?;
        }
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let name = Self::repository_name(self)?;
        provider.rest().delete_repo(org_id, &name).await?;
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        _parent: Option<&ParentRef>,
        current: &dyn ModelObject,
        changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        // updates address the repository by its current name; a rename is
        // part of the body
        let current_name = Self::repository_name(current)?;
        let body = self.changes_to_provider(org_id, changes, provider).await?;
        provider.rest().update_repo(org_id, &current_name, &body).await?;
        Ok(())
    }
}
