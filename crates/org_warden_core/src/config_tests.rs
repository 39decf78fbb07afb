//! Tests for the top-level configuration file.

use std::io::Write;

use super::*;

fn write_config(content: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(DEFAULT_CONFIG_FILENAME);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(content.as_bytes()).unwrap();
    (dir, path)
}

#[test]
fn test_full_configuration_loads() {
    let (_dir, path) = write_config(
        r#"{
            "defaults": {
                "jsonnet": {
                    "base_template": "octo/org-templates#template.libsonnet@main",
                    "config_dir": "orgs"
                },
                "github": {
                    "config_repo": ".github-config",
                    "default_branch": "develop"
                }
            },
            "organizations": [
                {
                    "name": "octo",
                    "github_id": "octo-org",
                    "credentials": {"provider": "plain", "api_token": "ghp_x"}
                }
            ]
        }"#,
    );

    let config = OrgWardenConfig::load(&path).unwrap();
    assert_eq!(config.defaults.github.config_repo, ".github-config");
    assert_eq!(config.defaults.github.default_branch, "develop");
    assert_eq!(config.organizations.len(), 1);
    assert_eq!(config.organizations[0].github_id, "octo-org");
}

#[test]
fn test_github_defaults() {
    let (_dir, path) = write_config(r#"{"organizations": []}"#);
    let config = OrgWardenConfig::load(&path).unwrap();
    assert_eq!(config.defaults.github.config_repo, DEFAULT_CONFIG_REPO);
    assert_eq!(config.defaults.github.default_branch, DEFAULT_BRANCH);
}

#[test]
fn test_malformed_configuration_is_rejected() {
    let (_dir, path) = write_config("{not json");
    assert!(matches!(
        OrgWardenConfig::load(&path),
        Err(Error::Configuration(_))
    ));
}

#[test]
fn test_organization_lookup_by_name_and_github_id() {
    let (_dir, path) = write_config(
        r#"{"organizations": [{"name": "octo", "github_id": "octo-org", "credentials": {}}]}"#,
    );
    let config = OrgWardenConfig::load(&path).unwrap();

    assert!(config.organization("octo").is_ok());
    assert!(config.organization("octo-org").is_ok());
    assert!(matches!(
        config.organization("missing"),
        Err(Error::UnknownOrganization(_))
    ));
}

#[test]
fn test_selected_organizations() {
    let (_dir, path) = write_config(
        r#"{"organizations": [
            {"name": "a", "github_id": "a-org", "credentials": {}},
            {"name": "b", "github_id": "b-org", "credentials": {}}
        ]}"#,
    );
    let config = OrgWardenConfig::load(&path).unwrap();

    assert_eq!(config.selected_organizations(None).unwrap().len(), 2);
    assert_eq!(config.selected_organizations(Some("b")).unwrap().len(), 1);
}

#[tokio::test]
async fn test_missing_credential_provider_is_a_configuration_error() {
    let (_dir, path) = write_config(
        r#"{"organizations": [{"name": "octo", "github_id": "octo", "credentials": {}}]}"#,
    );
    let config = OrgWardenConfig::load(&path).unwrap();
    let error = config.organizations[0].get_credentials().await.unwrap_err();
    assert!(matches!(error, Error::Configuration(_)));
}

#[tokio::test]
async fn test_inline_credentials_resolve() {
    let (_dir, path) = write_config(
        r#"{"organizations": [{
            "name": "octo",
            "github_id": "octo",
            "credentials": {"provider": "plain", "api_token": "ghp_token"}
        }]}"#,
    );
    let config = OrgWardenConfig::load(&path).unwrap();
    let credentials = config.organizations[0].get_credentials().await.unwrap();
    assert!(credentials.username().is_none());
}

#[test]
fn test_jsonnet_paths_derive_from_config_dir() {
    let (_dir, path) = write_config(
        r#"{
            "defaults": {"jsonnet": {"config_dir": "configs"}},
            "organizations": [{"name": "octo", "github_id": "octo", "credentials": {}}]
        }"#,
    );
    let config = OrgWardenConfig::load(&path).unwrap();
    let jsonnet = config.jsonnet_config(&config.organizations[0]);

    assert!(jsonnet
        .org_config_file()
        .ends_with("configs/octo/octo.jsonnet"));
    assert!(jsonnet
        .org_config_file_with_suffix("-head")
        .ends_with("configs/octo/octo-head.jsonnet"));
}
