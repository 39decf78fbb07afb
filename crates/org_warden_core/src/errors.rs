#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

/// Process exit codes shared by all operations.
pub mod exit_codes {
    pub const OK: i32 = 0;
    /// Invalid configuration, failed credentials or a GitHub error.
    pub const OPERATION_FAILED: i32 = 1;
    /// Usage or system error.
    pub const SYSTEM: i32 = 2;
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Organization '{0}' is not defined in the configuration")]
    UnknownOrganization(String),

    #[error("Credential error: {0}")]
    Credentials(#[from] auth_handler::AuthError),

    #[error(transparent)]
    Model(#[from] org_model::ModelError),

    #[error(transparent)]
    Provider(#[from] github_client::Error),

    #[error("Evaluator error: {0}")]
    Evaluator(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] regex::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
