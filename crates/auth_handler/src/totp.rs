//! TOTP generation for web-UI logins.

use secrecy::{ExposeSecret, SecretString};
use totp_rs::{Algorithm, Secret, TOTP};

use crate::AuthError;

#[cfg(test)]
#[path = "totp_tests.rs"]
mod tests;

/// Generates RFC 6238 codes from a base32 seed.
///
/// Codes are computed when requested, so the web client always submits a
/// code from the current 30 second window.
pub struct TotpGenerator {
    seed: SecretString,
}

impl TotpGenerator {
    pub fn new(seed: SecretString) -> Self {
        Self { seed }
    }

    fn totp(&self) -> Result<TOTP, AuthError> {
        let seed = self.seed.expose_secret().trim().replace(' ', "");
        let bytes = Secret::Encoded(seed)
            .to_bytes()
            .map_err(|e| AuthError::InvalidConfiguration(format!("invalid TOTP seed: {e:?}")))?;

        // GitHub seeds are 80 bits, below the RFC 4226 recommended minimum
        // that TOTP::new enforces
        Ok(TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes))
    }

    pub fn generate_now(&self) -> Result<String, AuthError> {
        self.totp()?
            .generate_current()
            .map_err(|e| AuthError::ResolutionFailed(format!("failed to generate TOTP: {e}")))
    }

    #[cfg(test)]
    pub(crate) fn generate_at(&self, timestamp: u64) -> Result<String, AuthError> {
        Ok(self.totp()?.generate(timestamp))
    }
}

impl github_client::OtpSource for TotpGenerator {
    fn otp(&self) -> Result<String, github_client::Error> {
        self.generate_now()
            .map_err(|e| github_client::Error::AuthError(e.to_string()))
    }
}
