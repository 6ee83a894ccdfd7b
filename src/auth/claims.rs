/// JWT Claims structure
///
/// Represents the payload of a JWT token containing user information
/// and standard JWT claims (RFC 7519).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::Role;

/// Distinguishes access tokens from refresh tokens
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Identity asserted by a token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPayload {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
}

/// Claims written into every token
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (user ID as UUID string)
    pub sub: String,
    pub email: String,
    pub role: Role,
    /// Token kind
    pub typ: TokenKind,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
    /// Issuer
    pub iss: String,
}

impl Claims {
    /// Create new claims for `payload` expiring `expiry_seconds` from now
    pub fn new(payload: &TokenPayload, typ: TokenKind, expiry_seconds: i64, issuer: &str) -> Self {
        let now = chrono::Utc::now().timestamp();
        Self {
            sub: payload.user_id.to_string(),
            email: payload.email.clone(),
            role: payload.role,
            typ,
            exp: now + expiry_seconds,
            iat: now,
            iss: issuer.to_string(),
        }
    }

    /// Rebuild the payload; `None` when the subject is not a UUID
    pub fn payload(&self) -> Option<TokenPayload> {
        let user_id = Uuid::parse_str(&self.sub).ok()?;
        Some(TokenPayload {
            user_id,
            email: self.email.clone(),
            role: self.role,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> TokenPayload {
        TokenPayload {
            user_id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            role: Role::Admin,
        }
    }

    #[test]
    fn test_claims_creation() {
        let payload = payload();
        let claims = Claims::new(&payload, TokenKind::Access, 3600, "test");

        assert_eq!(claims.sub, payload.user_id.to_string());
        assert_eq!(claims.email, payload.email);
        assert_eq!(claims.iss, "test");
        assert_eq!(claims.typ, TokenKind::Access);
        assert!(claims.exp > chrono::Utc::now().timestamp());
    }

    #[test]
    fn test_payload_round_trip() {
        let payload = payload();
        let claims = Claims::new(&payload, TokenKind::Refresh, 3600, "test");

        assert_eq!(claims.payload(), Some(payload));
    }

    #[test]
    fn test_invalid_subject() {
        let mut claims = Claims::new(&payload(), TokenKind::Access, 3600, "test");
        claims.sub = "invalid-uuid".to_string();

        assert!(claims.payload().is_none());
    }

    #[test]
    fn test_negative_expiry_is_expired() {
        let claims = Claims::new(&payload(), TokenKind::Access, -10, "test");
        assert!(claims.exp < chrono::Utc::now().timestamp());
    }
}
