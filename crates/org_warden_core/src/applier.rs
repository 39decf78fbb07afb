//! The patch applier: executes a live patch stream against the provider.
//!
//! Secret references are resolved here, immediately before the patch that
//! writes them, never earlier: patches that are skipped, gated or not
//! generated at all never touch a credential provider.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use github_client::GitHubProvider;
use org_model::LivePatch;
use tracing::{error, info, warn};

use crate::printer::IndentingPrinter;

#[cfg(test)]
#[path = "applier_tests.rs"]
mod tests;

/// Cooperative cancellation: the applier stops between patches, a patch
/// already in flight runs to completion.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Options steering patch application.
#[derive(Debug, Clone, Default)]
pub struct ApplyOptions {
    /// Execute REMOVE patches; without it they are only reported.
    pub delete_resources: bool,
    /// Keep applying after a terminal patch failure.
    pub continue_on_error: bool,
}

/// Per-organization outcome counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStatus {
    pub additions: usize,
    pub differences: usize,
    pub deletions: usize,
    pub skipped_deletions: usize,
    pub failures: usize,
}

impl ApplyStatus {
    pub fn exit_code(&self) -> i32 {
        if self.failures > 0 {
            crate::errors::exit_codes::OPERATION_FAILED
        } else {
            crate::errors::exit_codes::OK
        }
    }
}

/// Applies patches strictly in the order the diff engine produced them.
///
/// Ordering dependencies (organization-level prerequisites before
/// repository children, repositories before their branch protection
/// rules) are implicit in that order.
pub async fn apply_patches(
    patches: &[LivePatch],
    org_id: &str,
    provider: &GitHubProvider,
    options: &ApplyOptions,
    cancellation: &CancellationFlag,
    printer: &mut IndentingPrinter,
) -> ApplyStatus {
    let mut status = ApplyStatus::default();
    let mut resolved_secrets: HashMap<String, String> = HashMap::new();

    for patch in patches {
        if cancellation.is_cancelled() {
            warn!(org_id, "apply cancelled, remaining patches are skipped");
            printer.print_warn("apply cancelled, remaining patches are skipped");
            break;
        }

        if patch.is_deletion() && !options.delete_resources {
            status.skipped_deletions += 1;
            printer.println(format!(
                "skipping removal of {} (run with --delete-resources to remove)",
                patch.header()
            ));
            continue;
        }

        // secret references resolve at the last safe point, just before
        // the write that carries them
        let patch = match resolve_patch_secrets(patch, &mut resolved_secrets).await {
            Ok(patch) => patch,
            Err(e) => {
                status.failures += 1;
                error!(org_id, patch = %patch.header(), error = %e, "failed to resolve secrets");
                printer.print_error(format!(
                    "failed to resolve secrets for {}: {e}",
                    patch.header()
                ));
                if !options.continue_on_error {
                    printer.print_error("aborting after failed patch");
                    break;
                }
                continue;
            }
        };
        let patch = &patch;

        match patch.apply(org_id, provider).await {
            Ok(()) => {
                match patch {
                    LivePatch::Add { .. } => {
                        status.additions += 1;
                        printer.println(format!("added {}", patch.header()));
                    }
                    LivePatch::Remove { .. } => {
                        status.deletions += 1;
                        printer.println(format!("removed {}", patch.header()));
                    }
                    LivePatch::Change { changes, .. } => {
                        status.differences += 1;
                        printer.println(format!(
                            "updated {} ({} field{})",
                            patch.header(),
                            changes.len(),
                            if changes.len() == 1 { "" } else { "s" }
                        ));
                    }
                }
                info!(org_id, patch = %patch.header(), "applied patch");
            }
            Err(e) => {
                status.failures += 1;
                error!(org_id, patch = %patch.header(), error = %e, "failed to apply patch");
                printer.print_error(format!("failed to apply {}: {e}", patch.header()));

                if !options.continue_on_error {
                    printer.print_error("aborting after failed patch");
                    break;
                }
            }
        }
    }

    printer.println(format!(
        "applied: {} addition(s), {} change(s), {} deletion(s), {} failure(s)",
        status.additions, status.differences, status.deletions, status.failures
    ));
    if status.skipped_deletions > 0 {
        printer.println(format!(
            "{} resource(s) would be deleted, run with --delete-resources to delete them",
            status.skipped_deletions
        ));
    }

    status
}

/// Resolves the secret references a patch is about to write and returns
/// the patch with plaintext substituted. Resolutions are cached for the
/// duration of one apply so shared references hit their provider once.
async fn resolve_patch_secrets(
    patch: &LivePatch,
    cache: &mut HashMap<String, String>,
) -> Result<LivePatch, auth_handler::AuthError> {
    let references = patch.secret_references();
    if references.is_empty() {
        return Ok(patch.clone());
    }

    for reference in &references {
        if !cache.contains_key(reference) {
            let plaintext = auth_handler::resolve_secret(reference).await?;
            cache.insert(reference.clone(), plaintext);
        }
    }

    Ok(patch.with_resolved_secrets(cache))
}
