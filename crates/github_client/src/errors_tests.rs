//! Tests for error classification.

use super::*;

#[test]
fn test_server_errors_are_retryable() {
    let error = Error::Api {
        status: StatusCode::BAD_GATEWAY,
        message: "bad gateway".to_string(),
    };
    assert!(error.is_retryable());

    let error = Error::Api {
        status: StatusCode::TOO_MANY_REQUESTS,
        message: "slow down".to_string(),
    };
    assert!(error.is_retryable());
}

#[test]
fn test_client_errors_are_terminal() {
    let error = Error::Api {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        message: "validation failed".to_string(),
    };
    assert!(!error.is_retryable());

    assert!(!Error::NotFound.is_retryable());
    assert!(!Error::AuthError("bad credentials".to_string()).is_retryable());
}

#[test]
fn test_rate_limit_is_retryable() {
    assert!(Error::RateLimitExceeded.is_retryable());
    assert!(Error::Transport("connection reset".to_string()).is_retryable());
}

#[test]
fn test_error_display_includes_status() {
    let error = Error::Api {
        status: StatusCode::UNPROCESSABLE_ENTITY,
        message: "name already exists".to_string(),
    };
    let rendered = error.to_string();
    assert!(rendered.contains("422"));
    assert!(rendered.contains("name already exists"));
}
