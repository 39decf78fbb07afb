//! Tests for the jsonnet wrapper.

use std::path::PathBuf;

use super::*;

#[test]
fn test_template_pin_parsing() {
    let pin = TemplatePin::parse("octo/org-templates#defaults.libsonnet@v1.2").unwrap();
    assert_eq!(pin.repository, "octo/org-templates");
    assert_eq!(pin.file, "defaults.libsonnet");
    assert_eq!(pin.r#ref, "v1.2");
}

#[test]
fn test_template_pin_rejects_malformed_notation() {
    for notation in [
        "no-separators",
        "repo#file-without-ref",
        "repo@ref-without-file",
        "#file@ref",
        "repo#@ref",
        "repo#file@",
    ] {
        assert!(
            TemplatePin::parse(notation).is_err(),
            "accepted '{notation}'"
        );
    }
}

#[test]
fn test_template_import_for_pinned_template() {
    let config = JsonnetConfig::new(
        PathBuf::from("/tmp/orgs"),
        "octo".to_string(),
        Some("octo/org-templates#defaults.libsonnet@main".to_string()),
    );
    assert_eq!(
        config.template_import().unwrap(),
        "local orgs = import 'vendor/org-templates/defaults.libsonnet';"
    );
}

#[test]
fn test_template_import_without_pin() {
    let config = JsonnetConfig::new(PathBuf::from("/tmp/orgs"), "octo".to_string(), None);
    assert_eq!(
        config.template_import().unwrap(),
        "local orgs = import 'template.libsonnet';"
    );
}

#[test]
fn test_config_file_paths() {
    let config = JsonnetConfig::new(PathBuf::from("/work/orgs"), "octo".to_string(), None);
    assert_eq!(
        config.org_config_file(),
        PathBuf::from("/work/orgs/octo/octo.jsonnet")
    );
    assert_eq!(
        config.org_config_file_with_suffix("-proposed"),
        PathBuf::from("/work/orgs/octo/octo-proposed.jsonnet")
    );
}

#[tokio::test]
async fn test_evaluating_a_missing_file_is_a_configuration_error() {
    let dir = tempfile::tempdir().unwrap();
    let config = JsonnetConfig::new(dir.path().to_path_buf(), "octo".to_string(), None);

    let error = config.evaluate_org_config().await.unwrap_err();
    assert!(matches!(error, crate::errors::Error::Configuration(_)));
    assert!(error.to_string().contains("fetch-config or import"));
}
