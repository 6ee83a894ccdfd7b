/// Password Hashing, Verification and Generation
///
/// Passwords are hashed with bcrypt at cost 12. Hashing is deliberately slow,
/// so request handlers go through the `*_blocking` wrappers which move the
/// work onto tokio's blocking pool.

use bcrypt::{hash, verify};
use rand::seq::SliceRandom;
use rand::{thread_rng, Rng};
use serde::Serialize;

use crate::error::AppError;

pub const BCRYPT_COST: u32 = 12;
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Capitalized words used to build initial passwords
const WORDS: [&str; 24] = [
    "Mountain", "River", "Sky", "Forest", "Ocean", "Sunset", "Breeze", "Meadow",
    "Canyon", "Harbor", "Glacier", "Valley", "Summit", "Island", "Lotus", "Cedar",
    "Willow", "Aurora", "Coral", "Falcon", "Maple", "Horizon", "Crystal", "Ember",
];

/// Outcome of a password policy check
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PasswordStrength {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Hash a password using bcrypt (cost 12)
pub fn hash_password(password: &str) -> Result<String, AppError> {
    hash(password, BCRYPT_COST)
        .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
}

/// Verify a password against its bcrypt hash.
///
/// A malformed hash counts as a mismatch.
pub fn verify_password(password: &str, hash: &str) -> bool {
    match verify(password, hash) {
        Ok(valid) => valid,
        Err(e) => {
            tracing::warn!(error = %e, "Password verification against malformed hash");
            false
        }
    }
}

/// `hash_password` on the blocking pool
pub async fn hash_password_blocking(password: String) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .map_err(|e| AppError::Internal(format!("Password hashing task failed: {}", e)))?
}

/// `verify_password` on the blocking pool
pub async fn verify_password_blocking(password: String, hash: String) -> Result<bool, AppError> {
    tokio::task::spawn_blocking(move || verify_password(&password, &hash))
        .await
        .map_err(|e| AppError::Internal(format!("Password verification task failed: {}", e)))
}

/// Generate a human-typeable initial password such as `Mountain-River-Sky-482`.
///
/// Three words drawn with repetition from a 24-word list plus a zero-padded
/// three-digit suffix: about 13.8 million combinations. Good enough for a
/// first credential sent by email, not a high-entropy secret.
pub fn generate_secure_password() -> String {
    let mut rng = thread_rng();
    let mut parts: Vec<String> = (0..3)
        .map(|_| WORDS.choose(&mut rng).copied().unwrap_or("Lotus").to_string())
        .collect();
    parts.push(format!("{:03}", rng.gen_range(0..1000)));
    parts.join("-")
}

/// Check a password against the policy and report every violated rule:
/// - Minimum 8 characters
/// - At least one uppercase letter
/// - At least one lowercase letter
/// - At least one digit
pub fn validate_password_strength(password: &str) -> PasswordStrength {
    let mut errors = Vec::new();

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(|c| c.is_uppercase()) {
        errors.push("Password must contain at least one uppercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_lowercase()) {
        errors.push("Password must contain at least one lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        errors.push("Password must contain at least one digit".to_string());
    }

    PasswordStrength {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use regex::Regex;

    #[test]
    fn test_hash_password() {
        let password = "ValidPassword123";
        let hash = hash_password(password).expect("Failed to hash password");

        assert_ne!(password, hash);
        // bcrypt identifier and cost
        assert!(hash.starts_with("$2"));
        assert!(hash.contains("$12$"));
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("ValidPassword123").expect("Failed to hash password");
        assert!(verify_password("ValidPassword123", &hash));
    }

    #[test]
    fn test_verify_wrong_password() {
        let hash = hash_password("ValidPassword123").expect("Failed to hash password");
        assert!(!verify_password("WrongPassword123", &hash));
    }

    #[test]
    fn test_verify_against_malformed_hash_is_false() {
        assert!(!verify_password("anything", "not-a-bcrypt-hash"));
        assert!(!verify_password("anything", ""));
    }

    #[tokio::test]
    async fn test_blocking_wrappers_round_trip() {
        let hash = hash_password_blocking("Blocking-Pass-1".to_string()).await.unwrap();
        assert!(verify_password_blocking("Blocking-Pass-1".to_string(), hash.clone())
            .await
            .unwrap());
        assert!(!verify_password_blocking("other".to_string(), hash).await.unwrap());
    }

    #[test]
    fn test_generated_password_shape() {
        let pattern = Regex::new(r"^[A-Z][a-z]+-[A-Z][a-z]+-[A-Z][a-z]+-\d{3}$").unwrap();
        for _ in 0..200 {
            let password = generate_secure_password();
            assert!(pattern.is_match(&password), "unexpected shape: {}", password);
        }
    }

    #[test]
    fn test_generated_password_words_come_from_list() {
        let password = generate_secure_password();
        let parts: Vec<&str> = password.split('-').collect();
        assert_eq!(parts.len(), 4);
        for word in &parts[..3] {
            assert!(WORDS.contains(word));
        }
    }

    #[test]
    fn test_generated_password_always_passes_strength_policy() {
        // Capitalized words supply upper and lower case, the suffix supplies digits,
        // and the shortest word list entry still gives 15 characters.
        for _ in 0..200 {
            let password = generate_secure_password();
            let strength = validate_password_strength(&password);
            assert!(strength.is_valid, "{} failed: {:?}", password, strength.errors);
        }
    }

    #[test]
    fn test_strength_reports_every_violation() {
        let strength = validate_password_strength("abc");
        assert!(!strength.is_valid);
        assert_eq!(strength.errors.len(), 3); // length, uppercase, digit

        let strength = validate_password_strength("");
        assert_eq!(strength.errors.len(), 4);
    }

    #[test]
    fn test_strength_single_violations() {
        assert_eq!(validate_password_strength("nouppercase1").errors.len(), 1);
        assert_eq!(validate_password_strength("NOLOWERCASE1").errors.len(), 1);
        assert_eq!(validate_password_strength("NoDigitsHere").errors.len(), 1);
        assert_eq!(validate_password_strength("Short1A").errors.len(), 1);
    }

    #[test]
    fn test_valid_password() {
        let strength = validate_password_strength("ValidPassword123");
        assert!(strength.is_valid);
        assert!(strength.errors.is_empty());
    }
}
