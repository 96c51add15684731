//! Password hashing and policy
//!
//! Argon2id hashes in PHC string format; the salt is embedded in the hash.

use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;

use crate::{Error, Result};

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Maximum accepted password length
pub const MAX_PASSWORD_LENGTH: usize = 128;

/// Hash a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut rand::rngs::OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::Internal(format!("Failed to hash password: {}", e)))
}

/// Check a password against a stored hash
///
/// Unparseable or empty hashes (invited accounts) never verify.
pub fn verify_password(password: &str, stored_hash: &str) -> bool {
    if stored_hash.is_empty() {
        return false;
    }
    match PasswordHash::new(stored_hash) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(_) => false,
    }
}

/// Reject passwords that are too short, too long, or lack a letter and a digit
pub fn validate_password_strength(password: &str) -> Result<()> {
    let length = password.chars().count();
    if length < MIN_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "password must be at least {} characters",
            MIN_PASSWORD_LENGTH
        )));
    }
    if length > MAX_PASSWORD_LENGTH {
        return Err(Error::InvalidInput(format!(
            "password must be at most {} characters",
            MAX_PASSWORD_LENGTH
        )));
    }
    let has_letter = password.chars().any(|c| c.is_alphabetic());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !has_letter || !has_digit {
        return Err(Error::InvalidInput(
            "password must contain at least one letter and one digit".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_and_verify() {
        let hash = hash_password("correct horse 42").unwrap();
        assert!(hash.starts_with("$argon2"));
        assert!(verify_password("correct horse 42", &hash));
        assert!(!verify_password("wrong horse 42", &hash));
    }

    #[test]
    fn test_same_password_different_salts() {
        let a = hash_password("password123").unwrap();
        let b = hash_password("password123").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_empty_or_garbage_hash_never_verifies() {
        assert!(!verify_password("anything1", ""));
        assert!(!verify_password("anything1", "not-a-phc-string"));
    }

    #[test]
    fn test_password_policy() {
        assert!(validate_password_strength("abc123").is_err());
        assert!(validate_password_strength("abcdefghij").is_err());
        assert!(validate_password_strength("1234567890").is_err());
        assert!(validate_password_strength("welcome2pulse").is_ok());
        assert!(validate_password_strength(&"a1".repeat(100)).is_err());
    }
}
