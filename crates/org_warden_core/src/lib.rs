//! The engine behind the org-warden CLI: configuration loading, the
//! jsonnet evaluator wrapper, the operations (plan, apply, import, ...),
//! and the patch applier.
//!
//! The CLI crate is a thin dispatcher over [`operations`]; everything
//! driver-independent lives here.

pub mod applier;
pub mod config;
pub mod errors;
pub mod jsonnet;
pub mod operations;
pub mod printer;
pub mod render;

pub use applier::{apply_patches, ApplyOptions, ApplyStatus, CancellationFlag};
pub use config::{OrgWardenConfig, OrganizationConfig, DEFAULT_CONFIG_FILENAME};
pub use errors::{exit_codes, Error, Result};
pub use jsonnet::{JsonnetConfig, TemplatePin};
pub use printer::IndentingPrinter;
