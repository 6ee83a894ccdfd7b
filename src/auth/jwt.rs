/// JWT Token Generation and Validation
///
/// Tokens are HS256-signed with the server secret from `JwtSettings`. They
/// are stateless: there is no revocation list, a token stays valid until its
/// signature or expiry check fails, so logging out only discards the token
/// on the client.

use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

use crate::auth::claims::{Claims, TokenKind, TokenPayload};
use crate::configuration::JwtSettings;
use crate::error::AppError;

/// Issue an access token (default lifetime 7 days)
pub fn generate_token(payload: &TokenPayload, config: &JwtSettings) -> Result<String, AppError> {
    encode_token(payload, TokenKind::Access, config.access_token_expiry, config)
}

/// Issue a refresh token (default lifetime 30 days)
pub fn generate_refresh_token(
    payload: &TokenPayload,
    config: &JwtSettings,
) -> Result<String, AppError> {
    encode_token(payload, TokenKind::Refresh, config.refresh_token_expiry, config)
}

/// Verify an access token.
///
/// Returns `None` for anything that is not a valid, unexpired access token
/// signed by this server. Callers treat `None` as unauthenticated.
pub fn verify_token(token: &str, config: &JwtSettings) -> Option<TokenPayload> {
    decode_token(token, TokenKind::Access, config)
}

/// Verify a refresh token; access tokens are rejected
pub fn verify_refresh_token(token: &str, config: &JwtSettings) -> Option<TokenPayload> {
    decode_token(token, TokenKind::Refresh, config)
}

/// Extract the token from an `Authorization: Bearer <token>` header value
pub fn extract_token_from_header(header: &str) -> Option<&str> {
    let token = header.strip_prefix("Bearer ")?.trim();
    if token.is_empty() {
        None
    } else {
        Some(token)
    }
}

fn encode_token(
    payload: &TokenPayload,
    kind: TokenKind,
    expiry_seconds: i64,
    config: &JwtSettings,
) -> Result<String, AppError> {
    let claims = Claims::new(payload, kind, expiry_seconds, &config.issuer);

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(config.secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Token generation failed: {}", e)))
}

fn decode_token(token: &str, expected: TokenKind, config: &JwtSettings) -> Option<TokenPayload> {
    if token.is_empty() {
        return None;
    }

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[&config.issuer]);

    let claims = match decode::<Claims>(
        token,
        &DecodingKey::from_secret(config.secret.as_bytes()),
        &validation,
    ) {
        Ok(data) => data.claims,
        Err(e) => {
            tracing::debug!("JWT validation error: {}", e);
            return None;
        }
    };

    if claims.typ != expected {
        tracing::debug!(expected = ?expected, actual = ?claims.typ, "JWT of wrong kind");
        return None;
    }

    claims.payload()
}
