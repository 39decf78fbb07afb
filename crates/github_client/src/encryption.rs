//! Sealed-box encryption of secret values.
//!
//! GitHub never accepts secret plaintext: every secret write carries a
//! libsodium sealed box built against the public key of the target scope
//! (organization, repository or environment) together with that key's id.

use base64::{engine::general_purpose::STANDARD as B64, Engine};
use crypto_box::{aead::OsRng, PublicKey};

use crate::errors::Error;

#[cfg(test)]
#[path = "encryption_tests.rs"]
mod tests;

/// The public key of a secret scope as returned by the `.../secrets/public-key`
/// endpoints.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct SecretPublicKey {
    pub key_id: String,
    pub key: String,
}

/// Seals a plaintext secret against a base64 encoded scope public key and
/// returns the base64 encoded ciphertext.
pub fn seal_secret_value(public_key: &str, plaintext: &str) -> Result<String, Error> {
    let key_bytes = B64
        .decode(public_key)
        .map_err(|e| Error::InvalidResponse(format!("invalid secret public key: {e}")))?;

    let key_array: [u8; crypto_box::KEY_SIZE] = key_bytes
        .try_into()
        .map_err(|_| Error::InvalidResponse("secret public key has wrong length".to_string()))?;

    let public_key = PublicKey::from(key_array);

    let sealed = crypto_box::seal(&mut OsRng, &public_key, plaintext.as_bytes())
        .map_err(|e| Error::InvalidResponse(format!("failed to seal secret value: {e}")))?;

    Ok(B64.encode(sealed))
}
