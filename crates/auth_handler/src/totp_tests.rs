//! Tests for TOTP generation.

use super::*;

fn generator(seed: &str) -> TotpGenerator {
    TotpGenerator::new(SecretString::from(seed.to_string()))
}

#[test]
fn test_rfc_6238_sha1_vector() {
    // RFC 6238 test key "12345678901234567890" in base32, T = 59s
    let generator = generator("GEZDGNBVGY3TQOJQGEZDGNBVGY3TQOJQ");
    assert_eq!(generator.generate_at(59).unwrap(), "287082");
}

#[test]
fn test_short_github_seed_is_accepted() {
    // 80 bit seeds are shorter than the RFC 4226 minimum but standard
    // for GitHub two-factor setups
    let generator = generator("JBSWY3DPEHPK3PXP");
    let code = generator.generate_now().unwrap();
    assert_eq!(code.len(), 6);
    assert!(code.chars().all(|c| c.is_ascii_digit()));
}

#[test]
fn test_seed_whitespace_is_tolerated() {
    let spaced = generator("JBSW Y3DP EHPK 3PXP");
    let plain = generator("JBSWY3DPEHPK3PXP");
    assert_eq!(
        spaced.generate_at(1_000_000).unwrap(),
        plain.generate_at(1_000_000).unwrap()
    );
}

#[test]
fn test_invalid_seed_is_rejected() {
    let generator = generator("not-base32!!");
    assert!(generator.generate_now().is_err());
}

#[test]
fn test_codes_change_between_windows() {
    let generator = generator("JBSWY3DPEHPK3PXP");
    let first = generator.generate_at(0).unwrap();
    let second = generator.generate_at(30).unwrap();
    assert_ne!(first, second);
}
