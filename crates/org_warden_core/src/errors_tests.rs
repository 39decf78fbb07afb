//! Tests for core error plumbing.

use super::*;

#[test]
fn test_exit_codes() {
    assert_eq!(exit_codes::OK, 0);
    assert_eq!(exit_codes::OPERATION_FAILED, 1);
    assert_eq!(exit_codes::SYSTEM, 2);
}

#[test]
fn test_credential_errors_are_wrapped() {
    let error: Error = auth_handler::AuthError::UnknownProvider("vault".to_string()).into();
    assert!(matches!(error, Error::Credentials(_)));
    assert!(error.to_string().contains("vault"));
}

#[test]
fn test_model_errors_pass_through_their_message() {
    let error: Error = org_model::ModelError::InvalidData("not an object".to_string()).into();
    assert!(error.to_string().contains("not an object"));
}
