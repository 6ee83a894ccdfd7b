/// Account services
///
/// Provisioning, login, token refresh and the password lifecycle. Handlers
/// call these with the shared store; email delivery is best-effort and never
/// changes the outcome of an operation.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::auth::{
    generate_refresh_token, generate_secure_password, generate_token, hash_password_blocking,
    hash_reset_token, reset_link, validate_password_strength, verify_password_blocking,
    verify_refresh_token, ResetToken, TokenPayload, MIN_PASSWORD_LENGTH,
};
use crate::configuration::{AuthSettings, JwtSettings};
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError, ValidationError};
use crate::models::{NewUser, Role, User, UserUpdate};
use crate::store::AcademyStore;
use crate::validators::{is_valid_email, optional_name};

/// Input for automatic account creation after a completed payment
#[derive(Debug, Clone)]
pub struct PaymentAccountRequest {
    pub email: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Role,
}

impl PaymentAccountRequest {
    pub fn client(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            first_name: None,
            last_name: None,
            role: Role::Client,
        }
    }
}

/// A freshly created account. `password` is the only copy of the plaintext.
#[derive(Debug, Clone)]
pub struct ProvisionedAccount {
    pub id: Uuid,
    pub email: String,
    pub first_name: Option<String>,
    pub password: String,
}

/// Tokens returned by login and refresh
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub user: User,
}

/// Account creation by an administrator
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminUserInput {
    pub email: Option<String>,
    pub password: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
    pub is_active: Option<bool>,
    pub avatar_url: Option<String>,
}

/// Result of an admin account creation; `generated_password` is set only
/// when the server picked the password.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedUser {
    pub user: User,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generated_password: Option<String>,
}

/// Create an active, verified account with a generated password.
///
/// Fails with a conflict when the email is already registered; the existing
/// account is left untouched. The user row and its empty profile are written
/// together by the store.
pub async fn create_user_from_payment(
    store: &dyn AcademyStore,
    request: PaymentAccountRequest,
) -> Result<ProvisionedAccount, AppError> {
    let email = is_valid_email(&request.email)?;
    let first_name = optional_name("firstName", request.first_name.as_deref())?;
    let last_name = optional_name("lastName", request.last_name.as_deref())?;

    let password = generate_secure_password();
    let password_hash = hash_password_blocking(password.clone()).await?;

    let user = store
        .create_user(NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            role: request.role,
            is_active: true,
            email_verified: true,
        })
        .await?;

    tracing::info!(user_id = %user.id, role = %user.role, "Account provisioned after payment");

    Ok(ProvisionedAccount {
        id: user.id,
        email: user.email,
        first_name: user.first_name,
        password,
    })
}

/// Exchange credentials for a token pair.
///
/// Unknown email and wrong password give the same error.
pub async fn login(
    store: &dyn AcademyStore,
    jwt_config: &JwtSettings,
    email: &str,
    password: &str,
) -> Result<TokenPair, AppError> {
    let email = is_valid_email(email)?;

    let user = store
        .find_user_by_email(&email)
        .await?
        .ok_or(AuthError::InvalidCredentials)?;

    if !verify_password_blocking(password.to_string(), user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    if !user.is_active {
        return Err(AuthError::AccountInactive.into());
    }

    tracing::info!(user_id = %user.id, "User logged in");
    issue_tokens(user, jwt_config)
}

/// Issue a new token pair from a refresh token. The account must still
/// exist and be active.
pub async fn refresh(
    store: &dyn AcademyStore,
    jwt_config: &JwtSettings,
    refresh_token: &str,
) -> Result<TokenPair, AppError> {
    let payload = verify_refresh_token(refresh_token, jwt_config).ok_or(AuthError::TokenInvalid)?;

    let user = store
        .find_user_by_id(payload.user_id)
        .await?
        .ok_or(AuthError::TokenInvalid)?;

    if !user.is_active {
        return Err(AuthError::AccountInactive.into());
    }

    issue_tokens(user, jwt_config)
}

fn issue_tokens(user: User, jwt_config: &JwtSettings) -> Result<TokenPair, AppError> {
    let payload = TokenPayload {
        user_id: user.id,
        email: user.email.clone(),
        role: user.role,
    };

    Ok(TokenPair {
        access_token: generate_token(&payload, jwt_config)?,
        refresh_token: generate_refresh_token(&payload, jwt_config)?,
        token_type: "Bearer".to_string(),
        expires_in: jwt_config.access_token_expiry,
        user,
    })
}

/// Start a password reset.
///
/// Succeeds whether or not the address belongs to an active account so the
/// response reveals nothing. For an active account a reset token is stored
/// (hashed) and the link is mailed.
pub async fn request_password_reset(
    store: &dyn AcademyStore,
    email_client: &EmailClient,
    auth: &AuthSettings,
    base_url: &str,
    email: &str,
) -> Result<(), AppError> {
    let email = match is_valid_email(email) {
        Ok(email) => email,
        Err(_) => return Ok(()),
    };

    let user = match store.find_user_by_email(&email).await? {
        Some(user) if user.is_active => user,
        _ => {
            tracing::info!("Password reset requested for unknown or inactive account");
            return Ok(());
        }
    };

    let token = ResetToken::generate(auth.password_reset_expiry);
    store
        .set_reset_token(user.id, &token.hash, token.expires_at)
        .await?;

    // Detached: response time must not depend on whether the account exists
    let link = reset_link(base_url, &token.token);
    let email_client = email_client.clone();
    let (user_id, recipient) = (user.id, user.email);
    tokio::spawn(async move {
        if let Err(e) = email_client
            .send_password_reset_email(&recipient, &link)
            .await
        {
            tracing::warn!(user_id = %user_id, error = %e, "Password reset email not delivered");
        }
    });

    tracing::info!(user_id = %user_id, "Password reset token issued");
    Ok(())
}

/// Redeem a reset token. The token is cleared, so it works once.
pub async fn reset_password(
    store: &dyn AcademyStore,
    token: &str,
    new_password: &str,
) -> Result<(), AppError> {
    check_new_password(new_password)?;

    let invalid = || ValidationError::InvalidToken("Invalid or expired reset token".to_string());
    let token = token.trim();
    if token.is_empty() {
        return Err(invalid().into());
    }

    let user = store
        .find_user_by_reset_token(&hash_reset_token(token))
        .await?
        .ok_or_else(invalid)?;

    match user.reset_token_expiry {
        Some(expiry) if expiry > Utc::now() => {}
        _ => return Err(invalid().into()),
    }

    let password_hash = hash_password_blocking(new_password.to_string()).await?;
    store.update_password(user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password reset completed");
    Ok(())
}

/// Change the password of a signed-in user after checking the current one
pub async fn change_password(
    store: &dyn AcademyStore,
    user_id: Uuid,
    current_password: &str,
    new_password: &str,
) -> Result<(), AppError> {
    check_new_password(new_password)?;

    let user = store
        .find_user_by_id(user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    if !verify_password_blocking(current_password.to_string(), user.password_hash.clone()).await? {
        return Err(AuthError::InvalidCredentials.into());
    }

    let password_hash = hash_password_blocking(new_password.to_string()).await?;
    store.update_password(user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(())
}

fn check_new_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(ValidationError::TooShort(
            "newPassword".to_string(),
            MIN_PASSWORD_LENGTH,
        ));
    }
    Ok(())
}

/// Create an account on behalf of an administrator
pub async fn create_user(
    store: &dyn AcademyStore,
    input: AdminUserInput,
) -> Result<CreatedUser, AppError> {
    let email = is_valid_email(input.email.as_deref().unwrap_or_default())?;
    let first_name = optional_name("firstName", input.first_name.as_deref())?;
    let last_name = optional_name("lastName", input.last_name.as_deref())?;

    let (password, generated_password) = match input.password {
        Some(password) => {
            let strength = validate_password_strength(&password);
            if !strength.is_valid {
                return Err(ValidationError::WeakPassword(strength.errors).into());
            }
            (password, None)
        }
        None => {
            let password = generate_secure_password();
            (password.clone(), Some(password))
        }
    };
    let password_hash = hash_password_blocking(password).await?;

    let mut user = store
        .create_user(NewUser {
            email,
            password_hash,
            first_name,
            last_name,
            role: input.role.unwrap_or_default(),
            is_active: input.is_active.unwrap_or(true),
            email_verified: false,
        })
        .await?;

    if input.avatar_url.is_some() {
        user = store
            .update_user(
                user.id,
                UserUpdate {
                    avatar_url: input.avatar_url,
                    ..UserUpdate::default()
                },
            )
            .await?;
    }

    tracing::info!(user_id = %user.id, role = %user.role, "User created by administrator");
    Ok(CreatedUser {
        user,
        generated_password,
    })
}

/// Partial update by an administrator; email and password are not editable here
pub async fn update_user(
    store: &dyn AcademyStore,
    id: Uuid,
    input: AdminUserInput,
) -> Result<User, AppError> {
    let update = UserUpdate {
        first_name: optional_name("firstName", input.first_name.as_deref())?,
        last_name: optional_name("lastName", input.last_name.as_deref())?,
        role: input.role,
        is_active: input.is_active,
        avatar_url: input.avatar_url.filter(|url| !url.trim().is_empty()),
    };
    store.update_user(id, update).await
}
