//! Tests for CLI argument parsing.

use clap::Parser;

use super::*;

#[test]
fn test_plan_flags() {
    let cli = Cli::try_parse_from([
        "org-warden",
        "plan",
        "--no-web-ui",
        "--update-webhooks",
        "--update-filter",
        "^https://ci",
        "--repo-filter",
        "^api",
    ])
    .unwrap();

    match cli.command {
        Commands::Plan { args } => {
            assert!(args.no_web_ui);
            assert!(args.update_webhooks);
            assert!(!args.update_secrets);
            assert_eq!(args.update_filter.as_deref(), Some("^https://ci"));
            assert_eq!(args.repo_filter.as_deref(), Some("^api"));
        }
        _ => panic!("expected plan command"),
    }
}

#[test]
fn test_apply_flags() {
    let cli = Cli::try_parse_from([
        "org-warden",
        "apply",
        "--force",
        "--delete-resources",
        "--continue-on-error",
    ])
    .unwrap();

    match cli.command {
        Commands::Apply {
            force,
            delete_resources,
            continue_on_error,
            ..
        } => {
            assert!(force);
            assert!(delete_resources);
            assert!(continue_on_error);
        }
        _ => panic!("expected apply command"),
    }
}

#[test]
fn test_global_options() {
    let cli = Cli::try_parse_from([
        "org-warden",
        "--config",
        "custom.json",
        "--org",
        "octo",
        "-vv",
        "validate",
    ])
    .unwrap();

    assert_eq!(cli.config, std::path::PathBuf::from("custom.json"));
    assert_eq!(cli.org.as_deref(), Some("octo"));
    assert_eq!(cli.verbose, 2);
}

#[test]
fn test_default_config_path() {
    let cli = Cli::try_parse_from(["org-warden", "validate"]).unwrap();
    assert_eq!(cli.config, std::path::PathBuf::from(DEFAULT_CONFIG_FILENAME));
}

#[test]
fn test_local_plan_requires_suffix() {
    assert!(Cli::try_parse_from(["org-warden", "local-plan"]).is_err());

    let cli = Cli::try_parse_from(["org-warden", "local-plan", "--suffix", "-head"]).unwrap();
    match cli.command {
        Commands::LocalPlan { suffix, .. } => assert_eq!(suffix, "-head"),
        _ => panic!("expected local-plan command"),
    }
}

#[test]
fn test_operational_commands_parse() {
    for args in [
        vec!["org-warden", "fetch-config", "--pull-request", "17"],
        vec!["org-warden", "push-config", "-m", "update"],
        vec!["org-warden", "import", "--force"],
        vec!["org-warden", "canonical-diff"],
        vec!["org-warden", "sync-template", "--repo", "api"],
        vec!["org-warden", "dispatch-workflow", "--repo", "api", "--workflow", "ci.yml"],
        vec!["org-warden", "web-login"],
        vec!["org-warden", "list-apps", "--json"],
        vec!["org-warden", "list-members", "--two-factor-disabled"],
        vec!["org-warden", "list-advisories", "--state", "published"],
        vec!["org-warden", "install-app", "ci-bot"],
        vec!["org-warden", "uninstall-app", "ci-bot"],
        vec!["org-warden", "review-app-permissions"],
        vec!["org-warden", "delete-file", "--repo", "api", "--path", "old.md"],
        vec![
            "org-warden",
            "open-pull-request",
            "--repo",
            "cfg",
            "--title",
            "Update",
            "--head",
            "update-config",
        ],
        vec!["org-warden", "check-token-permissions"],
        vec!["org-warden", "check-status"],
        vec!["org-warden", "list-blueprints"],
        vec!["org-warden", "approve-blueprints", "--repo-filter", "^api"],
    ] {
        assert!(
            Cli::try_parse_from(args.iter().copied()).is_ok(),
            "failed to parse {args:?}"
        );
    }
}
