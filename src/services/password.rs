//! Password hashing and password policy
//!
//! Passwords are stored as Argon2id PHC strings with a fresh random salt.
//! New passwords must also pass [`check_password_policy`].

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};

/// Minimum length of a new password
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Passwords rejected outright, compared case-insensitively
const COMMON_PASSWORDS: &[&str] = &[
    "password", "password1", "password123", "12345678", "123456789", "1234567890",
    "qwerty123", "qwertyuiop", "iloveyou", "sunshine", "princess", "football",
    "baseball", "welcome1", "letmein1", "admin123", "abc12345", "trustno1",
    "dragon123", "monkey123", "passw0rd", "superman", "starwars", "whatever",
];

/// Hash a password using Argon2id.
///
/// ```ignore
/// let hash = hash_password("correct horse")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(hash.to_string())
}

/// Verify a password against a stored hash.
///
/// A wrong password is `Ok(false)`; only a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Check a new password against the account password rules.
///
/// Returns every rule the password breaks, as user-facing messages.
pub fn check_password_policy(password: &str, username: &str) -> Vec<String> {
    let mut problems = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        problems.push("This password is entirely numeric.".to_string());
    }
    let lower = password.to_lowercase();
    let username = username.trim().to_lowercase();
    if username.len() >= 3 && lower.contains(&username) {
        problems.push("The password is too similar to the username.".to_string());
    }
    if COMMON_PASSWORDS.contains(&lower.as_str()) {
        problems.push("This password is too common.".to_string());
    }

    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("test_password").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_is_salted() {
        let a = hash_password("same").unwrap();
        let b = hash_password("same").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct horse").unwrap();
        assert!(verify_password("correct horse", &hash).unwrap());
        assert!(!verify_password("wrong horse", &hash).unwrap());
    }

    #[test]
    fn test_verify_rejects_malformed_hash() {
        assert!(verify_password("anything", "not-a-hash").is_err());
    }

    #[test]
    fn test_policy_accepts_good_password() {
        assert!(check_password_policy("tangerine-kettle-42", "ada").is_empty());
    }

    #[test]
    fn test_policy_rules() {
        assert_eq!(check_password_policy("short1", "ada").len(), 1);
        assert!(check_password_policy("9876543210", "ada")
            .iter()
            .any(|p| p.contains("numeric")));
        assert!(check_password_policy("ada-lovelace-99", "Lovelace")
            .iter()
            .any(|p| p.contains("similar")));
        assert!(check_password_policy("Password123", "ada")
            .iter()
            .any(|p| p.contains("common")));
    }

    proptest! {
        #[test]
        fn short_passwords_always_rejected(pw in "[a-z]{0,7}") {
            prop_assert!(!check_password_policy(&pw, "someone").is_empty());
        }
    }
}
