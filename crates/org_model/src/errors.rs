#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("Invalid model data: {0}")]
    InvalidData(String),

    #[error("Failed to deserialize model data: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error(transparent)]
    Provider(#[from] github_client::Error),

    #[error("Invalid filter pattern: {0}")]
    InvalidPattern(#[from] regex::Error),

    #[error("Patch cannot be applied: {0}")]
    PatchFailed(String),
}
