//! # org-warden CLI
//!
//! Manages the configuration of GitHub organizations as code: a jsonnet
//! declaration per organization is compared against the live state and
//! the differences are reported or applied.
//!
//! ## Usage
//!
//! ```bash
//! org-warden plan --config org-warden.json
//! org-warden apply --org octo --delete-resources
//! ```

use std::path::PathBuf;
use std::process::exit;

use clap::{Parser, Subcommand};
use colored::Colorize;
use tracing::error;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use org_warden_core::applier::CancellationFlag;
use org_warden_core::operations::apply::ApplyCommandOptions;
use org_warden_core::operations::import::ImportOptions;
use org_warden_core::operations::{self, PlanOptions};
use org_warden_core::{exit_codes, IndentingPrinter, OrgWardenConfig, DEFAULT_CONFIG_FILENAME};

#[cfg(test)]
#[path = "main_tests.rs"]
mod tests;

/// org-warden: manage GitHub organizations as code
#[derive(Parser)]
#[command(name = "org-warden")]
#[command(about = "Manage the configuration of GitHub organizations as code", long_about = None)]
struct Cli {
    /// Path to the top-level configuration file
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_FILENAME)]
    config: PathBuf,

    /// Restrict the operation to one organization
    #[arg(short, long, global = true)]
    org: Option<String>,

    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

/// Shared flags of plan-like commands.
#[derive(clap::Args, Clone, Default)]
struct PlanArgs {
    /// Skip settings only accessible through the web UI
    #[arg(long)]
    no_web_ui: bool,

    /// Force update of webhooks with a configured secret
    #[arg(long)]
    update_webhooks: bool,

    /// Force update of secrets with a configured value
    #[arg(long)]
    update_secrets: bool,

    /// Restrict forced updates to matching urls / names
    #[arg(long, value_name = "REGEX")]
    update_filter: Option<String>,

    /// Restrict processing to matching repositories
    #[arg(long, value_name = "REGEX")]
    repo_filter: Option<String>,
}

impl From<PlanArgs> for PlanOptions {
    fn from(args: PlanArgs) -> Self {
        PlanOptions {
            no_web_ui: args.no_web_ui,
            update_webhooks: args.update_webhooks,
            update_secrets: args.update_secrets,
            update_filter: args.update_filter,
            repo_filter: args.repo_filter,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the declarative configuration without touching GitHub
    Validate,

    /// Render the expected configuration
    Show,

    /// Render the live configuration read from GitHub
    ShowLive {
        #[arg(long)]
        no_web_ui: bool,
    },

    /// Render the template defaults declarations patch against
    ShowDefault,

    /// Show the changes an apply would make
    Plan {
        #[command(flatten)]
        args: PlanArgs,
    },

    /// Diff the declaration against a second local declaration
    LocalPlan {
        /// Suffix of the second declaration file
        #[arg(long, allow_hyphen_values = true)]
        suffix: String,

        #[command(flatten)]
        args: PlanArgs,
    },

    /// Apply the changes between declared and live state
    Apply {
        #[command(flatten)]
        args: PlanArgs,

        /// Skip the interactive confirmation
        #[arg(long)]
        force: bool,

        /// Execute removals of live resources
        #[arg(long)]
        delete_resources: bool,

        /// Keep applying after a failed change
        #[arg(long)]
        continue_on_error: bool,
    },

    /// Fetch the declaration from the configuration repository
    FetchConfig {
        /// Fetch the state proposed by a pull request instead
        #[arg(long, value_name = "N")]
        pull_request: Option<i64>,
    },

    /// Push the local declaration to the configuration repository
    PushConfig {
        /// Commit message
        #[arg(short, long)]
        message: Option<String>,
    },

    /// Create a declaration from the live state
    Import {
        #[arg(long)]
        no_web_ui: bool,

        /// Overwrite an existing declaration
        #[arg(long)]
        force: bool,
    },

    /// Diff the on-disk declaration against its canonical rendering
    CanonicalDiff,

    /// Sync a repository from its template repository
    SyncTemplate {
        #[arg(long)]
        repo: String,
    },

    /// Trigger a workflow dispatch event
    DispatchWorkflow {
        #[arg(long)]
        repo: String,

        #[arg(long)]
        workflow: String,
    },

    /// Verify the configured web UI credentials
    WebLogin,

    /// List installed GitHub Apps
    ListApps {
        #[arg(long)]
        json: bool,
    },

    /// List organization members
    ListMembers {
        /// Only members without two-factor authentication
        #[arg(long)]
        two_factor_disabled: bool,
    },

    /// List security advisories
    ListAdvisories {
        /// Filter by advisory state
        #[arg(long)]
        state: Option<String>,
    },

    /// Install a GitHub App via the web UI
    InstallApp {
        app_slug: String,
    },

    /// Uninstall a GitHub App via the web UI
    UninstallApp {
        app_slug: String,
    },

    /// Approve pending app permission updates
    ReviewAppPermissions {
        app_slug: Option<String>,
    },

    /// Delete a file from a repository
    DeleteFile {
        #[arg(long)]
        repo: String,

        #[arg(long)]
        path: String,

        #[arg(short, long)]
        message: Option<String>,
    },

    /// Open a pull request
    OpenPullRequest {
        #[arg(long)]
        repo: String,

        #[arg(long)]
        title: String,

        #[arg(long)]
        head: String,

        #[arg(long)]
        base: Option<String>,
    },

    /// Check the scopes of the configured token
    CheckTokenPermissions,

    /// Check connectivity, credentials and rate limit headroom
    CheckStatus,

    /// List open blueprint pull requests
    ListBlueprints,

    /// Merge open blueprint pull requests
    ApproveBlueprints {
        #[arg(long, value_name = "REGEX")]
        repo_filter: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(fmt::layer().pretty())
        .with(EnvFilter::from_env("ORG_WARDEN_LOG"))
        .init();

    let cli = Cli::parse();

    let config = match OrgWardenConfig::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {e}");
            eprintln!("{} {e}", "error:".red());
            exit(exit_codes::OPERATION_FAILED);
        }
    };

    let mut printer = IndentingPrinter::stdout(cli.verbose);
    let org = cli.org.as_deref();

    // a first ctrl-c stops the applier between patches, a second one
    // terminates the process
    let cancellation = CancellationFlag::new();
    {
        let cancellation = cancellation.clone();
        tokio::spawn(async move {
            let _ = tokio::signal::ctrl_c().await;
            cancellation.cancel();
            let _ = tokio::signal::ctrl_c().await;
            exit(exit_codes::SYSTEM);
        });
    }

    let result = match cli.command {
        Commands::Validate => operations::validate::execute(&config, org, &mut printer).await,
        Commands::Show => operations::show::execute(&config, org, &mut printer).await,
        Commands::ShowLive { no_web_ui } => {
            operations::show_live::execute(&config, org, no_web_ui, &mut printer).await
        }
        Commands::ShowDefault => operations::show_default::execute(&config, org, &mut printer).await,
        Commands::Plan { args } => {
            operations::plan::execute(&config, org, &args.into(), &mut printer).await
        }
        Commands::LocalPlan { suffix, args } => {
            operations::local_plan::execute(&config, org, &suffix, &args.into(), &mut printer).await
        }
        Commands::Apply {
            args,
            force,
            delete_resources,
            continue_on_error,
        } => {
            let options = ApplyCommandOptions {
                plan: args.into(),
                force,
                delete_resources,
                continue_on_error,
            };
            operations::apply::execute(&config, org, &options, &cancellation, &mut printer).await
        }
        Commands::FetchConfig { pull_request } => {
            operations::fetch_config::execute(&config, org, pull_request, &mut printer).await
        }
        Commands::PushConfig { message } => {
            operations::push_config::execute(&config, org, message.as_deref(), &mut printer).await
        }
        Commands::Import { no_web_ui, force } => {
            let options = ImportOptions { no_web_ui, force };
            operations::import::execute(&config, org, &options, &mut printer).await
        }
        Commands::CanonicalDiff => {
            operations::canonical_diff::execute(&config, org, &mut printer).await
        }
        Commands::SyncTemplate { repo } => {
            operations::sync_template::execute(&config, org, &repo, &mut printer).await
        }
        Commands::DispatchWorkflow { repo, workflow } => {
            operations::dispatch_workflow::execute(&config, org, &repo, &workflow, &mut printer).await
        }
        Commands::WebLogin => operations::web_login::execute(&config, org, &mut printer).await,
        Commands::ListApps { json } => {
            operations::list_apps::execute(&config, org, json, &mut printer).await
        }
        Commands::ListMembers { two_factor_disabled } => {
            operations::list_members::execute(&config, org, two_factor_disabled, &mut printer).await
        }
        Commands::ListAdvisories { state } => {
            operations::list_advisories::execute(&config, org, state.as_deref(), &mut printer).await
        }
        Commands::InstallApp { app_slug } => {
            operations::install_app::execute(&config, org, &app_slug, &mut printer).await
        }
        Commands::UninstallApp { app_slug } => {
            operations::uninstall_app::execute(&config, org, &app_slug, &mut printer).await
        }
        Commands::ReviewAppPermissions { app_slug } => {
            operations::review_app_permissions::execute(&config, org, app_slug.as_deref(), &mut printer)
                .await
        }
        Commands::DeleteFile { repo, path, message } => {
            operations::delete_file::execute(&config, org, &repo, &path, message.as_deref(), &mut printer)
                .await
        }
        Commands::OpenPullRequest {
            repo,
            title,
            head,
            base,
        } => {
            operations::open_pull_request::execute(
                &config,
                org,
                &repo,
                &title,
                &head,
                base.as_deref(),
                &mut printer,
            )
            .await
        }
        Commands::CheckTokenPermissions => {
            operations::check_token_permissions::execute(&config, org, &mut printer).await
        }
        Commands::CheckStatus => operations::check_status::execute(&config, org, &mut printer).await,
        Commands::ListBlueprints => {
            operations::list_blueprints::execute(&config, org, &mut printer).await
        }
        Commands::ApproveBlueprints { repo_filter } => {
            operations::approve_blueprints::execute(&config, org, repo_filter.as_deref(), &mut printer)
                .await
        }
    };

    match result {
        Ok(code) => exit(code),
        Err(e) => {
            error!("operation failed: {e}");
            eprintln!("{} {e}", "error:".red());
            exit(exit_codes::OPERATION_FAILED);
        }
    }
}
