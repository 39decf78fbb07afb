//! Rulesets, at organization and repository scope.
//!
//! The provider models a ruleset as a list of typed rules; the model uses
//! boolean fields (inverted for the `allows_*` family) plus embedded
//! records for the compound rules (`pull_request`, `required_status_checks`,
//! `merge_queue`, `required_deployments`).

use async_trait::async_trait;
use github_client::{BypassActorToken, GitHubProvider};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::ModelError;
use crate::fields::{self, FieldSpec};
use crate::livepatch::ParentRef;
use crate::object::{to_map, ChangeSet, ModelMap, ModelObject};
use crate::property::Property;
use crate::validation::{FailureType, ValidationContext};

#[cfg(test)]
#[path = "ruleset_tests.rs"]
mod tests;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RulesetScope {
    #[default]
    Organization,
    Repository,
}

/// Parameters of the `pull_request` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestSettings {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_approving_review_count: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub dismisses_stale_reviews: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_code_owner_review: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_last_push_approval: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_review_thread_resolution: Property<bool>,
}

/// Parameters of the `required_status_checks` rule; checks are encoded as
/// `<app-slug>:<context>`, with `any:` for unbound contexts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusCheckSettings {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub do_not_enforce_on_create: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub strict: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub status_checks: Property<Vec<String>>,
}

/// Parameters of the `merge_queue` rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeQueueSettings {
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub merge_method: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub grouping_strategy: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub max_entries_to_build: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub max_entries_to_merge: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub min_entries_to_merge: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub min_entries_to_merge_wait_minutes: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub check_response_timeout_minutes: Property<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ruleset {
    #[serde(skip)]
    pub scope: RulesetScope,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub id: Property<i64>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub node_id: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub name: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub target: Property<String>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub enforcement: Property<String>,
    /// Bypass actor tokens with optional `:bypass_mode` suffix.
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub bypass_actors: Property<Vec<String>>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub include_refs: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub exclude_refs: Property<Vec<String>>,

    // organization scope only
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub include_repo_names: Property<Vec<String>>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub exclude_repo_names: Property<Vec<String>>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allows_creations: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allows_updates: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allows_deletions: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub allows_force_pushes: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_linear_history: Property<bool>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub requires_commit_signatures: Property<bool>,

    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_pull_request: Property<PullRequestSettings>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_status_checks: Property<StatusCheckSettings>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_merge_queue: Property<MergeQueueSettings>,
    #[serde(default, skip_serializing_if = "Property::is_unset")]
    pub required_deployment_environments: Property<Vec<String>>,
}

const ORG_FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::external("node_id"),
    fields::key("name"),
    fields::value("target"),
    fields::value("enforcement"),
    fields::list("bypass_actors"),
    fields::set("include_refs"),
    fields::set("exclude_refs"),
    fields::set("include_repo_names"),
    fields::set("exclude_repo_names"),
    fields::value("allows_creations"),
    fields::value("allows_updates"),
    fields::value("allows_deletions"),
    fields::value("allows_force_pushes"),
    fields::value("requires_linear_history"),
    fields::value("requires_commit_signatures"),
    fields::embedded("required_pull_request"),
    fields::embedded("required_status_checks"),
    fields::embedded("required_merge_queue"),
    fields::value("required_deployment_environments"),
];

const REPO_FIELD_SPECS: &[FieldSpec] = &[
    fields::external("id"),
    fields::external("node_id"),
    fields::key("name"),
    fields::value("target"),
    fields::value("enforcement"),
    fields::list("bypass_actors"),
    fields::set("include_refs"),
    fields::set("exclude_refs"),
    fields::value("allows_creations"),
    fields::value("allows_updates"),
    fields::value("allows_deletions"),
    fields::value("allows_force_pushes"),
    fields::value("requires_linear_history"),
    fields::value("requires_commit_signatures"),
    fields::embedded("required_pull_request"),
    fields::embedded("required_status_checks"),
    fields::embedded("required_merge_queue"),
    fields::value("required_deployment_environments"),
];

/// Simple rules: (provider rule type, model field, model value when the
/// rule is present).
const SIMPLE_RULES: &[(&str, &str, bool)] = &[
    ("creation", "allows_creations", false),
    ("update", "allows_updates", false),
    ("deletion", "allows_deletions", false),
    ("non_fast_forward", "allows_force_pushes", false),
    ("required_linear_history", "requires_linear_history", true),
    ("required_signatures", "requires_commit_signatures", true),
];

const PULL_REQUEST_PARAMS: &[(&str, &str)] = &[
    ("required_approving_review_count", "required_approving_review_count"),
    ("dismisses_stale_reviews", "dismiss_stale_reviews_on_push"),
    ("requires_code_owner_review", "require_code_owner_review"),
    ("requires_last_push_approval", "require_last_push_approval"),
    ("requires_review_thread_resolution", "required_review_thread_resolution"),
];

const MERGE_QUEUE_PARAMS: &[(&str, &str)] = &[
    ("merge_method", "merge_method"),
    ("grouping_strategy", "grouping_strategy"),
    ("max_entries_to_build", "max_entries_to_build"),
    ("max_entries_to_merge", "max_entries_to_merge"),
    ("min_entries_to_merge", "min_entries_to_merge"),
    ("min_entries_to_merge_wait_minutes", "min_entries_to_merge_wait_minutes"),
    ("check_response_timeout_minutes", "check_response_timeout_minutes"),
];

const TARGETS: &[&str] = &["branch", "tag", "push"];
const ENFORCEMENTS: &[&str] = &["active", "disabled", "evaluate"];
const MERGE_METHODS: &[&str] = &["MERGE", "SQUASH", "REBASE"];
const GROUPING_STRATEGIES: &[&str] = &["ALLGREEN", "HEADGREEN"];

fn rename(map: &ModelMap, table: &[(&str, &str)], to_provider: bool) -> ModelMap {
    let mut result = ModelMap::new();
    for (model_name, provider_name) in table {
        let (from, to) = if to_provider {
            (*model_name, *provider_name)
        } else {
            (*provider_name, *model_name)
        };
        if let Some(value) = map.get(from) {
            result.insert(to.to_string(), value.clone());
        }
    }
    result
}

impl Ruleset {
    pub fn from_model_value(scope: RulesetScope, data: &Value) -> Result<Self, ModelError> {
        let mut ruleset: Ruleset = serde_json::from_value(data.clone())?;
        ruleset.scope = scope;
        Ok(ruleset)
    }

    /// Builds a ruleset from the provider shape. Bypass actors and status
    /// check integrations arrive already resolved to tokens and slugs by
    /// the REST client.
    pub fn from_provider_data(scope: RulesetScope, data: &Value) -> Result<Self, ModelError> {
        let object = data
            .as_object()
            .ok_or_else(|| ModelError::InvalidData("ruleset data is not an object".to_string()))?;

        let mut model = ModelMap::new();
        for field in ["id", "node_id", "name", "target", "enforcement", "bypass_actors"] {
            if let Some(value) = object.get(field) {
                model.insert(field.to_string(), value.clone());
            }
        }

        if let Some(ref_name) = data.pointer("/conditions/ref_name") {
            for (provider_name, model_name) in [("include", "include_refs"), ("exclude", "exclude_refs")] {
                if let Some(value) = ref_name.get(provider_name) {
                    model.insert(model_name.to_string(), value.clone());
                }
            }
        }
        if scope == RulesetScope::Organization {
            if let Some(repo_name) = data.pointer("/conditions/repository_name") {
                for (provider_name, model_name) in
                    [("include", "include_repo_names"), ("exclude", "exclude_repo_names")]
                {
                    if let Some(value) = repo_name.get(provider_name) {
                        model.insert(model_name.to_string(), value.clone());
                    }
                }
            }
        }

        // absent rules mean "allowed" / "not required"
        for (_, field, value_when_present) in SIMPLE_RULES {
            model.insert(field.to_string(), Value::Bool(!value_when_present));
        }
        for field in [
            "required_pull_request",
            "required_status_checks",
            "required_merge_queue",
            "required_deployment_environments",
        ] {
            model.insert(field.to_string(), Value::Null);
        }

        let rules = object.get("rules").and_then(Value::as_array).cloned().unwrap_or_default();
        for rule in &rules {
            let rule_type = rule.get("type").and_then(Value::as_str).unwrap_or_default();
            let parameters = rule
                .get("parameters")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            if let Some((_, field, value)) = SIMPLE_RULES.iter().find(|(name, _, _)| *name == rule_type) {
                model.insert(field.to_string(), Value::Bool(*value));
                continue;
            }

            match rule_type {
                "pull_request" => {
                    model.insert(
                        "required_pull_request".to_string(),
                        Value::Object(rename(&parameters, PULL_REQUEST_PARAMS, false)),
                    );
                }
                "required_status_checks" => {
                    let mut settings = ModelMap::new();
                    if let Some(value) = parameters.get("do_not_enforce_on_create") {
                        settings.insert("do_not_enforce_on_create".to_string(), value.clone());
                    }
                    if let Some(value) = parameters.get("strict_required_status_checks_policy") {
                        settings.insert("strict".to_string(), value.clone());
                    }
                    if let Some(checks) = parameters.get("required_status_checks").and_then(Value::as_array)
                    {
                        let encoded: Vec<Value> = checks
                            .iter()
                            .map(|check| {
                                let context =
                                    check.get("context").and_then(Value::as_str).unwrap_or_default();
                                match check.get("integration_slug").and_then(Value::as_str) {
                                    Some(slug) => Value::String(format!("{slug}:{context}")),
                                    None => Value::String(format!("any:{context}")),
                                }
                            })
                            .collect();
                        settings.insert("status_checks".to_string(), Value::Array(encoded));
                    }
                    model.insert("required_status_checks".to_string(), Value::Object(settings));
                }
                "merge_queue" => {
                    model.insert(
                        "required_merge_queue".to_string(),
                        Value::Object(rename(&parameters, MERGE_QUEUE_PARAMS, false)),
                    );
                }
                "required_deployments" => {
                    if let Some(environments) = parameters.get("required_deployment_environments") {
                        model.insert(
                            "required_deployment_environments".to_string(),
                            environments.clone(),
                        );
                    }
                }
                _ => {}
            }
        }

        Self::from_model_value(scope, &Value::Object(model))
    }

    pub fn validate(
        &self,
        context: &mut ValidationContext,
        parent: Option<&ParentRef>,
        enterprise_plan: bool,
    ) {
        let header = self.model_header(parent);

        let target = self.target.as_deref();
        if let Some(target) = target {
            if !TARGETS.contains(&target) {
                context.add_failure(
                    FailureType::Error,
                    format!("{header} has 'target' of value '{target}', only values {TARGETS:?} are allowed"),
                );
            }
        }

        if let Some(enforcement) = self.enforcement.as_deref() {
            if !ENFORCEMENTS.contains(&enforcement) {
                context.add_failure(
                    FailureType::Error,
                    format!(
                        "{header} has 'enforcement' of value '{enforcement}', only values {ENFORCEMENTS:?} are allowed"
                    ),
                );
            } else if enforcement == "evaluate" && !enterprise_plan {
                context.add_failure(
                    FailureType::Error,
                    format!("{header} uses enforcement 'evaluate' which requires an enterprise plan"),
                );
            }
        }

        if let Some(actors) = self.bypass_actors.value() {
            for actor in actors {
                if BypassActorToken::parse(actor).is_err() {
                    context.add_failure(
                        FailureType::Error,
                        format!("{header} has an invalid bypass actor '{actor}'"),
                    );
                }
            }
        }

        if let Some(target) = target {
            let expected_prefix = match target {
                "branch" => Some("refs/heads/"),
                "tag" => Some("refs/tags/"),
                _ => None,
            };
            if let Some(prefix) = expected_prefix {
                for refs in [self.include_refs.value(), self.exclude_refs.value()].into_iter().flatten() {
                    for pattern in refs {
                        if matches!(pattern.as_str(), "~ALL" | "~DEFAULT_BRANCH") {
                            continue;
                        }
                        if !pattern.starts_with(prefix) {
                            context.add_failure(
                                FailureType::Error,
                                format!(
                                    "{header} has ref pattern '{pattern}' not matching its '{target}' target, expected a '{prefix}' prefix"
                                ),
                            );
                        }
                    }
                }
            }
        }

        if let Some(pull_request) = self.required_pull_request.value() {
            if let Some(count) = pull_request.required_approving_review_count.value() {
                if !(0..=10).contains(count) {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "{header} has 'required_approving_review_count' of value '{count}', allowed range is [0, 10]"
                        ),
                    );
                }
            }
        }

        if let Some(merge_queue) = self.required_merge_queue.value() {
            if let Some(method) = merge_queue.merge_method.as_deref() {
                if !MERGE_METHODS.contains(&method) {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "{header} has 'merge_method' of value '{method}', only values {MERGE_METHODS:?} are allowed"
                        ),
                    );
                }
            }
            if let Some(strategy) = merge_queue.grouping_strategy.as_deref() {
                if !GROUPING_STRATEGIES.contains(&strategy) {
                    context.add_failure(
                        FailureType::Error,
                        format!(
                            "{header} has 'grouping_strategy' of value '{strategy}', only values {GROUPING_STRATEGIES:?} are allowed"
                        ),
                    );
                }
            }
        }
    }

    fn ruleset_id(entity: &dyn ModelObject) -> Result<i64, ModelError> {
        entity
            .to_model_map()
            .get("id")
            .and_then(Value::as_i64)
            .ok_or_else(|| ModelError::PatchFailed("ruleset carries no id".to_string()))
    }

    fn repo_name(parent: Option<&ParentRef>) -> Result<String, ModelError> {
        parent
            .and_then(|parent| parent.repository.clone())
            .ok_or_else(|| ModelError::PatchFailed("repository ruleset without parent".to_string()))
    }

    /// Builds the provider `rules` array from the rule-carrying fields of
    /// a model map.
    fn build_rules(data: &ModelMap) -> Vec<Value> {
        let mut rules = Vec::new();

        for (rule_type, field, value_when_present) in SIMPLE_RULES {
            if data.get(*field).and_then(Value::as_bool) == Some(*value_when_present) {
                rules.push(json!({ "type": rule_type }));
            }
        }

        if let Some(Value::Object(settings)) = data.get("required_pull_request") {
            rules.push(json!({
                "type": "pull_request",
                "parameters": rename(settings, PULL_REQUEST_PARAMS, true),
            }));
        }

        if let Some(Value::Object(settings)) = data.get("required_status_checks") {
            let mut parameters = ModelMap::new();
            if let Some(value) = settings.get("do_not_enforce_on_create") {
                parameters.insert("do_not_enforce_on_create".to_string(), value.clone());
            }
            if let Some(value) = settings.get("strict") {
                parameters.insert("strict_required_status_checks_policy".to_string(), value.clone());
            }
            if let Some(checks) = settings.get("status_checks").and_then(Value::as_array) {
                let decoded: Vec<Value> = checks
                    .iter()
                    .filter_map(Value::as_str)
                    .map(|check| match check.split_once(':') {
                        Some((app, context)) if !app.is_empty() && app != "any" => {
                            json!({"context": context, "integration_slug": app})
                        }
                        Some((_, context)) => json!({ "context": context }),
                        None => json!({ "context": check }),
                    })
                    .collect();
                parameters.insert("required_status_checks".to_string(), Value::Array(decoded));
            }
            rules.push(json!({
                "type": "required_status_checks",
                "parameters": Value::Object(parameters),
            }));
        }

        if let Some(Value::Object(settings)) = data.get("required_merge_queue") {
            rules.push(json!({
                "type": "merge_queue",
                "parameters": rename(settings, MERGE_QUEUE_PARAMS, true),
            }));
        }

        if let Some(environments) = data.get("required_deployment_environments") {
            if !environments.is_null() {
                rules.push(json!({
                    "type": "required_deployments",
                    "parameters": { "required_deployment_environments": environments },
                }));
            }
        }

        rules
    }
}

#[async_trait]
impl ModelObject for Ruleset {
    fn resource_kind(&self) -> &'static str {
        match self.scope {
            RulesetScope::Organization => "org_ruleset",
            RulesetScope::Repository => "repo_ruleset",
        }
    }

    fn field_specs(&self) -> &'static [FieldSpec] {
        match self.scope {
            RulesetScope::Organization => ORG_FIELD_SPECS,
            RulesetScope::Repository => REPO_FIELD_SPECS,
        }
    }

    fn to_model_map(&self) -> ModelMap {
        to_map(self)
    }

    async fn map_to_provider(
        &self,
        _org_id: &str,
        data: &ModelMap,
        provider: &GitHubProvider,
    ) -> Result<ModelMap, ModelError> {
        let mut body = ModelMap::new();

        for field in ["name", "target", "enforcement"] {
            if let Some(value) = data.get(field) {
                body.insert(field.to_string(), value.clone());
            }
        }

        if let Some(actors) = data.get("bypass_actors") {
            let tokens: Vec<String> = actors
                .as_array()
                .map(|tokens| {
                    tokens
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default();
            let resolved = provider.resolve_bypass_actors(&tokens).await?;
            body.insert("bypass_actors".to_string(), Value::Array(resolved));
        }

        let mut conditions = ModelMap::new();
        let include_refs = data.get("include_refs").cloned().unwrap_or_else(|| json!([]));
        let exclude_refs = data.get("exclude_refs").cloned().unwrap_or_else(|| json!([]));
        if data.contains_key("include_refs") || data.contains_key("exclude_refs") {
            conditions.insert(
                "ref_name".to_string(),
                json!({ "include": include_refs, "exclude": exclude_refs }),
            );
        }
        if self.scope == RulesetScope::Organization
            && (data.contains_key("include_repo_names") || data.contains_key("exclude_repo_names"))
        {
            conditions.insert(
                "repository_name".to_string(),
                json!({
                    "include": data.get("include_repo_names").cloned().unwrap_or_else(|| json!([])),
                    "exclude": data.get("exclude_repo_names").cloned().unwrap_or_else(|| json!([])),
                }),
            );
        }
        if !conditions.is_empty() {
            body.insert("conditions".to_string(), Value::Object(conditions));
        }

        let mut rules = Self::build_rules(data);
        for rule in &mut rules {
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
                let Some(slug) = check
                    .as_object_mut()
                    .and_then(|check| check.remove("integration_slug"))
                else {
                    continue;
                };
                if let Some(slug) = slug.as_str() {
                    let (app_id, _) = provider.rest().get_app_ids(slug).await?;
                    check["integration_id"] = json!(app_id);
                }
            }
        }
        body.insert("rules".to_string(), Value::Array(rules));

        Ok(body)
    }

    async fn apply_add(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);
        match self.scope {
            RulesetScope::Organization => {
                provider.rest().add_org_ruleset(org_id, &body).await?;
            }
            RulesetScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider.rest().add_repo_ruleset(org_id, &repo, &body).await?;
            }
        }
        Ok(())
    }

    async fn apply_remove(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
    ) -> Result<(), ModelError> {
        let id = Self::ruleset_id(self)?;
        match self.scope {
            RulesetScope::Organization => {
                provider.rest().delete_org_ruleset(org_id, id).await?;
            }
            RulesetScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider.rest().delete_repo_ruleset(org_id, &repo, id).await?;
            }
        }
        Ok(())
    }

    async fn apply_change(
        &self,
        org_id: &str,
        provider: &GitHubProvider,
        parent: Option<&ParentRef>,
        current: &dyn ModelObject,
        _changes: &ChangeSet,
    ) -> Result<(), ModelError> {
        // the rules array replaces the live rules wholesale, so a change
        // always writes the full record
        let id = Self::ruleset_id(current)?;
        let body = Value::Object(self.to_provider_body(org_id, provider).await?);

        match self.scope {
            RulesetScope::Organization => {
                provider.rest().update_org_ruleset(org_id, id, &body).await?;
            }
            RulesetScope::Repository => {
                let repo = Self::repo_name(parent)?;
                provider
                    .rest()
                    .update_repo_ruleset(org_id, &repo, id, &body)
                    .await?;
            }
        }
        Ok(())
    }
}
