/// Authentication module
///
/// Handles JWT token generation/validation, password hashing and generation,
/// and password-reset tokens.

mod claims;
mod jwt;
mod password;
mod reset_token;

pub use claims::{Claims, TokenKind, TokenPayload};
pub use jwt::{
    extract_token_from_header, generate_refresh_token, generate_token, verify_refresh_token,
    verify_token,
};
pub use password::{
    generate_secure_password, hash_password, hash_password_blocking, validate_password_strength,
    verify_password, verify_password_blocking, PasswordStrength, BCRYPT_COST,
    MIN_PASSWORD_LENGTH,
};
pub use reset_token::{hash_reset_token, reset_link, ResetToken};
