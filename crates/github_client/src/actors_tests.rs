//! Tests for actor token parsing and rendering.

use super::*;

#[test]
fn test_parse_user_token() {
    assert_eq!(
        ActorToken::parse("@octocat").unwrap(),
        ActorToken::User("octocat".to_string())
    );
}

#[test]
fn test_parse_team_token() {
    assert_eq!(
        ActorToken::parse("@octo/core").unwrap(),
        ActorToken::Team("octo/core".to_string())
    );
}

#[test]
fn test_parse_app_token() {
    assert_eq!(
        ActorToken::parse("eclipse-eca-validation").unwrap(),
        ActorToken::App("eclipse-eca-validation".to_string())
    );
}

#[test]
fn test_parse_role_token() {
    assert_eq!(
        ActorToken::parse("#maintain").unwrap(),
        ActorToken::Role("maintain".to_string())
    );
}

#[test]
fn test_parse_rejects_empty_tokens() {
    assert!(ActorToken::parse("").is_err());
    assert!(ActorToken::parse("@").is_err());
    assert!(ActorToken::parse("#").is_err());
}

#[test]
fn test_round_trip_preserves_token_text() {
    for token in ["@octocat", "@octo/core", "some-app", "#OrganizationAdmin"] {
        assert_eq!(ActorToken::parse(token).unwrap().render(), token);
    }
}

#[test]
fn test_bypass_mode_suffix() {
    let parsed = BypassActorToken::parse("@octo/core:pull_request").unwrap();
    assert_eq!(parsed.actor, ActorToken::Team("octo/core".to_string()));
    assert_eq!(parsed.bypass_mode, BypassMode::PullRequest);
    assert_eq!(parsed.render(), "@octo/core:pull_request");
}

#[test]
fn test_default_bypass_mode_is_omitted_when_rendering() {
    let parsed = BypassActorToken::parse("#admin:always").unwrap();
    assert_eq!(parsed.bypass_mode, BypassMode::Always);
    assert_eq!(parsed.render(), "#admin");
}

#[test]
fn test_colon_in_app_slug_is_not_a_bypass_mode() {
    // only the two known modes terminate a token
    let parsed = BypassActorToken::parse("app:custom").unwrap();
    assert_eq!(parsed.actor, ActorToken::App("app:custom".to_string()));
    assert_eq!(parsed.bypass_mode, BypassMode::Always);
}

#[test]
fn test_role_actor_ids() {
    assert_eq!(role_actor_id("OrganizationAdmin"), Some((1, "OrganizationAdmin")));
    assert_eq!(role_actor_id("maintain"), Some((2, "RepositoryRole")));
    assert_eq!(role_actor_id("write"), Some((4, "RepositoryRole")));
    assert_eq!(role_actor_id("does-not-exist"), None);
}

#[test]
fn test_role_actor_token_round_trip() {
    let (id, actor_type) = role_actor_id("maintain").unwrap();
    assert_eq!(role_actor_token(id, actor_type).unwrap(), "#maintain");

    assert_eq!(role_actor_token(1, "OrganizationAdmin").unwrap(), "#OrganizationAdmin");
    assert_eq!(role_actor_token(99, "RepositoryRole"), None);
}
