/// Password Reset Tokens
///
/// Reset tokens are:
/// - 32 random bytes, hex encoded (64 characters) for the emailed link
/// - Hashed with SHA-256 before storage (never store plaintext)
/// - Single-use: cleared from the user row once redeemed
/// - Short-lived (one hour by default)

use chrono::{DateTime, Duration, Utc};
use rand::{thread_rng, RngCore};
use sha2::{Digest, Sha256};

/// A freshly issued reset token. Only `hash` and `expires_at` are persisted.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token: String,
    pub hash: String,
    pub expires_at: DateTime<Utc>,
}

impl ResetToken {
    /// Issue a token valid for `expiry_seconds`
    pub fn generate(expiry_seconds: i64) -> Self {
        let mut bytes = [0u8; 32];
        thread_rng().fill_bytes(&mut bytes);
        let token = hex::encode(bytes);

        Self {
            hash: hash_reset_token(&token),
            token,
            expires_at: Utc::now() + Duration::seconds(expiry_seconds),
        }
    }
}

/// Hash a reset token using SHA-256
pub fn hash_reset_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build the link emailed to the user
pub fn reset_link(base_url: &str, token: &str) -> String {
    format!(
        "{}/academy/reset-password?token={}",
        base_url.trim_end_matches('/'),
        token
    )
}
