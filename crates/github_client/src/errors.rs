use http::StatusCode;

#[cfg(test)]
#[path = "errors_tests.rs"]
mod tests;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// GitHub rejected the request; carries the HTTP status and the
    /// message from the response body.
    #[error("GitHub API request failed with status {status}: {message}")]
    Api { status: StatusCode, message: String },

    #[error("Failed to authenticate or initialize GitHub client: {0}")]
    AuthError(String),

    /// Error deserializing the response from GitHub.
    #[error("Failed to deserialize GitHub response: {0}")]
    Deserialization(#[from] serde_json::Error),

    #[error("Invalid response format: {0}")]
    InvalidResponse(String),

    #[error("Resource not found")]
    NotFound,

    #[error("Rate limit exceeded")]
    RateLimitExceeded,

    /// Network or protocol level failure without a GitHub status code.
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Web UI operation failed: {0}")]
    WebUi(String),
}

impl Error {
    /// Whether a retry with backoff has a chance of succeeding.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Api { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            Error::RateLimitExceeded | Error::Transport(_) => true,
            _ => false,
        }
    }

    /// Maps an octocrab error to the crate error type, distinguishing
    /// "absent" from "forbidden" and flagging rate-limit exhaustion.
    pub(crate) fn from_octocrab(error: octocrab::Error) -> Self {
        match error {
            octocrab::Error::GitHub { source, .. } => {
                let status = source.status_code;
                if status == StatusCode::NOT_FOUND {
                    return Error::NotFound;
                }

                let message = source.message.clone();
                if (status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS)
                    && message.to_lowercase().contains("rate limit")
                {
                    return Error::RateLimitExceeded;
                }

                if status == StatusCode::UNAUTHORIZED {
                    return Error::AuthError(message);
                }

                Error::Api { status, message }
            }
            octocrab::Error::Serde { source, .. } => Error::InvalidResponse(source.to_string()),
            octocrab::Error::Json { source, .. } => Error::InvalidResponse(source.to_string()),
            other => Error::Transport(other.to_string()),
        }
    }
}
