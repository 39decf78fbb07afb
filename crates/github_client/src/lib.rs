//! Crate for interacting with GitHub across its three management surfaces.
//!
//! The [`GitHubProvider`] facade composes a REST client (octocrab), a
//! GraphQL client for branch protection rules, and a web-UI client for the
//! handful of organization settings GitHub only exposes through HTML forms.
//! All three share the same error taxonomy and rate-limit behavior.

use std::collections::HashMap;

use jsonwebtoken::EncodingKey;
use octocrab::Octocrab;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value};
use tracing::{instrument, warn};

pub mod errors;
pub use errors::Error;

pub mod actors;
pub mod encryption;
pub mod graphql;
pub mod rest;
pub mod web;

// Re-export types for convenient access
pub use actors::{ActorToken, BypassActorToken, BypassMode};
pub use encryption::seal_secret_value;
pub use graphql::GraphQlClient;
pub use rest::RestClient;
pub use web::{OtpSource, WebClient, WebCredentials, WebUiSession};

#[cfg(test)]
#[path = "lib_tests.rs"]
mod tests;

/// A resolved actor with its provider identifiers.
#[derive(Debug, Clone)]
pub struct ResolvedActor {
    pub token: String,
    pub actor_type: &'static str,
    pub id: i64,
    pub node_id: String,
}

/// Facade over the REST, GraphQL and web-UI transports.
///
/// The facade is constructed once per organization operation and shared
/// read-only across tasks afterwards; web sessions are opened on demand
/// and scoped to their caller.
#[derive(Debug, Clone)]
pub struct GitHubProvider {
    rest: RestClient,
    graphql: GraphQlClient,
    web: Option<WebClient>,
}

impl GitHubProvider {
    /// Builds a provider from a personal or installation token, with
    /// optional web-UI credentials.
    pub fn new(
        github_token: &SecretString,
        web_credentials: Option<WebCredentials>,
    ) -> Result<Self, Error> {
        let octocrab = Octocrab::builder()
            .personal_token(github_token.expose_secret().to_string())
            .build()
            .map_err(|e| Error::AuthError(format!("failed to build GitHub client: {e}")))?;

        Ok(Self::from_octocrab(octocrab, web_credentials))
    }

    /// Wraps an already configured octocrab client; used by tests to point
    /// the provider at a mock server.
    pub fn from_octocrab(octocrab: Octocrab, web_credentials: Option<WebCredentials>) -> Self {
        Self {
            rest: RestClient::new(octocrab.clone()),
            graphql: GraphQlClient::new(octocrab),
            web: web_credentials.map(WebClient::new),
        }
    }

    pub fn rest(&self) -> &RestClient {
        &self.rest
    }

    pub fn graphql(&self) -> &GraphQlClient {
        &self.graphql
    }

    /// The web client, or an auth error when no web credentials were
    /// configured for the organization.
    pub fn web(&self) -> Result<&WebClient, Error> {
        self.web.as_ref().ok_or_else(|| {
            Error::AuthError("operation requires web UI credentials (username/password)".to_string())
        })
    }

    pub fn has_web_credentials(&self) -> bool {
        self.web.is_some()
    }

    /// Fetches organization settings, merging the REST resource with the
    /// web-only screens unless `no_web_ui` is set.
    #[instrument(skip(self))]
    pub async fn get_org_settings(
        &self,
        org_id: &str,
        no_web_ui: bool,
    ) -> Result<Map<String, Value>, Error> {
        let mut merged = self.rest.get_org_settings(org_id).await?;

        if !no_web_ui {
            if let Some(web) = &self.web {
                let keys: Vec<String> = web::web_settings_keys()
                    .iter()
                    .map(|key| key.to_string())
                    .collect();
                let session = web.open_session().await?;
                let web_settings = session.get_org_settings(org_id, &keys).await?;
                merged.extend(web_settings);
            } else {
                warn!(org_id, "no web credentials configured, skipping web-only settings");
            }
        }

        Ok(merged)
    }

    /// Updates organization settings, splitting the body between the REST
    /// resource and the web-only screens.
    #[instrument(skip(self, settings))]
    pub async fn update_org_settings(
        &self,
        org_id: &str,
        settings: &Map<String, Value>,
    ) -> Result<(), Error> {
        let web_keys = web::web_settings_keys();

        let mut rest_fields = Map::new();
        let mut web_fields = Map::new();
        for (key, value) in settings {
            if web_keys.contains(&key.as_str()) {
                web_fields.insert(key.clone(), value.clone());
            } else {
                rest_fields.insert(key.clone(), value.clone());
            }
        }

        if !rest_fields.is_empty() {
            self.rest.update_org_settings(org_id, &rest_fields).await?;
        }

        if !web_fields.is_empty() {
            let session = self.web()?.open_session().await?;
            session.update_org_settings(org_id, &web_fields).await?;
        }

        Ok(())
    }

    /// Resolves actor tokens (`@user`, `@org/team`, `app-slug`) to their
    /// GraphQL node ids. Unknown actors are warned about and skipped.
    pub async fn get_actor_node_ids(&self, actor_tokens: &[String]) -> Result<Vec<String>, Error> {
        let resolved = self.resolve_actors(actor_tokens).await?;
        Ok(resolved.into_iter().map(|actor| actor.node_id).collect())
    }

    /// Resolves actor tokens to typed provider identifiers, skipping
    /// actors that do not exist.
    pub async fn resolve_actors(&self, actor_tokens: &[String]) -> Result<Vec<ResolvedActor>, Error> {
        let mut result = Vec::with_capacity(actor_tokens.len());

        for token in actor_tokens {
            let parsed = ActorToken::parse(token)?;
            let lookup = match &parsed {
                ActorToken::User(login) => self
                    .rest
                    .get_user_ids(login)
                    .await
                    .map(|(id, node_id)| ("User", id, node_id)),
                ActorToken::Team(slug) => self
                    .rest
                    .get_team_ids(slug)
                    .await
                    .map(|(id, node_id)| ("Team", id, node_id)),
                ActorToken::App(slug) => self
                    .rest
                    .get_app_ids(slug)
                    .await
                    .map(|(id, node_id)| ("App", id, node_id)),
                ActorToken::Role(_) => {
                    // roles have static ids and no node id
                    continue;
                }
            };

            match lookup {
                Ok((actor_type, id, node_id)) => result.push(ResolvedActor {
                    token: token.clone(),
                    actor_type,
                    id,
                    node_id,
                }),
                Err(Error::NotFound) => {
                    warn!(token, "actor does not exist, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        Ok(result)
    }

    /// Resolves ruleset bypass actor tokens to provider bypass objects.
    pub async fn resolve_bypass_actors(&self, tokens: &[String]) -> Result<Vec<Value>, Error> {
        let mut result = Vec::with_capacity(tokens.len());

        for token in tokens {
            let parsed = BypassActorToken::parse(token)?;
            match &parsed.actor {
                ActorToken::Role(role) => match actors::role_actor_id(role) {
                    Some((id, actor_type)) => {
                        result.push(actors::bypass_actor_value(id, actor_type, parsed.bypass_mode));
                    }
                    None => {
                        warn!(token, "unknown role, skipping bypass actor");
                    }
                },
                other => {
                    let rendered = other.render();
                    let resolved = self
                        .resolve_actors(std::slice::from_ref(&rendered))
                        .await?;
                    match resolved.first() {
                        Some(actor) => {
                            let actor_type = match actor.actor_type {
                                "App" => "Integration",
                                other => other,
                            };
                            result.push(actors::bypass_actor_value(
                                actor.id,
                                actor_type,
                                parsed.bypass_mode,
                            ));
                        }
                        None => {
                            warn!(token, "actor does not exist, skipping bypass actor");
                        }
                    }
                }
            }
        }

        Ok(result)
    }

    /// Resolves a set of app slugs to their node ids, e.g. for required
    /// status check sources.
    pub async fn get_app_node_ids(
        &self,
        app_slugs: &[String],
    ) -> Result<HashMap<String, String>, Error> {
        let mut result = HashMap::with_capacity(app_slugs.len());
        for slug in app_slugs {
            match self.rest.get_app_ids(slug).await {
                Ok((_, node_id)) => {
                    result.insert(slug.clone(), node_id);
                }
                Err(Error::NotFound) => {
                    warn!(slug, "app does not exist, skipping");
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }
}

/// Creates an octocrab client authenticated as a GitHub App.
pub async fn create_app_client(app_id: u64, private_key: &str) -> Result<Octocrab, Error> {
    let key = EncodingKey::from_rsa_pem(private_key.as_bytes())
        .map_err(|e| Error::AuthError(format!("invalid app private key: {e}")))?;

    Octocrab::builder()
        .app(app_id.into(), key)
        .build()
        .map_err(|e| Error::AuthError(format!("failed to build app client: {e}")))
}
