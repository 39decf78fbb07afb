//! Actor tokens.
//!
//! The declarative configuration refers to GitHub actors with a compact
//! token grammar that round-trips verbatim:
//!
//! - `@login`: a user
//! - `@org/team`: a team (slug contains a `/`, user logins cannot)
//! - `some-app`: a GitHub App by slug
//! - `#RoleName`: a repository role or `#OrganizationAdmin`
//!
//! A `:bypass_mode` suffix (`always` | `pull_request`) may follow any token
//! on ruleset bypass lists; `always` is the default and is omitted when
//! rendering.

use serde_json::{json, Value};

use crate::errors::Error;

#[cfg(test)]
#[path = "actors_tests.rs"]
mod tests;

/// Predefined repository role names and their provider actor ids.
const REPOSITORY_ROLES: &[(&str, i64)] = &[
    ("read", 1),
    ("triage", 3),
    ("write", 4),
    ("maintain", 2),
    ("admin", 5),
];

const ORGANIZATION_ADMIN_ROLE: &str = "OrganizationAdmin";
const ORGANIZATION_ADMIN_ID: i64 = 1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActorToken {
    User(String),
    Team(String),
    App(String),
    Role(String),
}

impl ActorToken {
    /// Parses a bare actor token (without bypass mode suffix).
    pub fn parse(token: &str) -> Result<Self, Error> {
        if let Some(name) = token.strip_prefix('@') {
            if name.is_empty() {
                return Err(Error::InvalidResponse(format!("invalid actor token '{token}'")));
            }
            if name.contains('/') {
                Ok(ActorToken::Team(name.to_string()))
            } else {
                Ok(ActorToken::User(name.to_string()))
            }
        } else if let Some(role) = token.strip_prefix('#') {
            if role.is_empty() {
                return Err(Error::InvalidResponse(format!("invalid actor token '{token}'")));
            }
            Ok(ActorToken::Role(role.to_string()))
        } else if token.is_empty() {
            Err(Error::InvalidResponse("empty actor token".to_string()))
        } else {
            Ok(ActorToken::App(token.to_string()))
        }
    }

    pub fn render(&self) -> String {
        match self {
            ActorToken::User(login) => format!("@{login}"),
            ActorToken::Team(slug) => format!("@{slug}"),
            ActorToken::App(slug) => slug.clone(),
            ActorToken::Role(role) => format!("#{role}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BypassActorToken {
    pub actor: ActorToken,
    pub bypass_mode: BypassMode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BypassMode {
    #[default]
    Always,
    PullRequest,
}

impl BypassMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            BypassMode::Always => "always",
            BypassMode::PullRequest => "pull_request",
        }
    }

    fn parse(mode: &str) -> Result<Self, Error> {
        match mode {
            "always" => Ok(BypassMode::Always),
            "pull_request" => Ok(BypassMode::PullRequest),
            other => Err(Error::InvalidResponse(format!("invalid bypass mode '{other}'"))),
        }
    }
}

impl BypassActorToken {
    /// Parses a bypass actor token with its optional `:bypass_mode` suffix.
    pub fn parse(token: &str) -> Result<Self, Error> {
        match token.rsplit_once(':') {
            Some((actor, mode)) if mode == "always" || mode == "pull_request" => {
                Ok(BypassActorToken {
                    actor: ActorToken::parse(actor)?,
                    bypass_mode: BypassMode::parse(mode)?,
                })
            }
            _ => Ok(BypassActorToken {
                actor: ActorToken::parse(token)?,
                bypass_mode: BypassMode::Always,
            }),
        }
    }

    /// Renders the token; the default `always` mode is omitted.
    pub fn render(&self) -> String {
        match self.bypass_mode {
            BypassMode::Always => self.actor.render(),
            BypassMode::PullRequest => format!("{}:{}", self.actor.render(), self.bypass_mode.as_str()),
        }
    }
}

/// Maps a `#role` token to `(actor_id, actor_type)` for rulesets.
pub fn role_actor_id(role: &str) -> Option<(i64, &'static str)> {
    if role.eq_ignore_ascii_case(ORGANIZATION_ADMIN_ROLE) {
        return Some((ORGANIZATION_ADMIN_ID, "OrganizationAdmin"));
    }
    REPOSITORY_ROLES
        .iter()
        .find(|(name, _)| role.eq_ignore_ascii_case(name))
        .map(|(_, id)| (*id, "RepositoryRole"))
}

/// Reverses a provider `(actor_id, actor_type)` role back to its token.
pub fn role_actor_token(actor_id: i64, actor_type: &str) -> Option<String> {
    match actor_type {
        "OrganizationAdmin" => Some(format!("#{ORGANIZATION_ADMIN_ROLE}")),
        "RepositoryRole" => REPOSITORY_ROLES
            .iter()
            .find(|(_, id)| *id == actor_id)
            .map(|(name, _)| format!("#{name}")),
        _ => None,
    }
}

/// Builds the provider bypass actor object for a resolved actor.
pub fn bypass_actor_value(actor_id: i64, actor_type: &str, bypass_mode: BypassMode) -> Value {
    json!({
        "actor_id": actor_id,
        "actor_type": actor_type,
        "bypass_mode": bypass_mode.as_str(),
    })
}
