/// Authentication Routes
///
/// Login, token refresh, the password lifecycle and current user information.

use actix_web::{web, HttpResponse};
use serde::Deserialize;

use crate::configuration::{AuthSettings, JwtSettings};
use crate::email_client::EmailClient;
use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::services::accounts;
use crate::startup::ApplicationBaseUrl;
use crate::store::AcademyStore;

const RESET_REQUESTED_MESSAGE: &str =
    "If an account exists for this email, a password reset link has been sent";

/// User login request
#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Token refresh request
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

/// POST /auth/login
///
/// Authenticate with email and password. Returns an access token, a refresh
/// token and the user record.
///
/// # Errors
/// - 400: Malformed email
/// - 401: Invalid credentials (email not found or wrong password)
/// - 403: Account is inactive
pub async fn login(
    form: web::Json<LoginRequest>,
    store: web::Data<dyn AcademyStore>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("user_login");

    let tokens = accounts::login(store.get_ref(), jwt_config.get_ref(), &form.email, &form.password)
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/refresh
///
/// Exchange a refresh token for a new token pair. Tokens are stateless, so
/// the old refresh token stays valid until it expires.
///
/// # Errors
/// - 401: Invalid or expired refresh token, or unknown user
/// - 403: Account is inactive
pub async fn refresh(
    form: web::Json<RefreshRequest>,
    store: web::Data<dyn AcademyStore>,
    jwt_config: web::Data<JwtSettings>,
) -> Result<HttpResponse, AppError> {
    let tokens =
        accounts::refresh(store.get_ref(), jwt_config.get_ref(), &form.refresh_token).await?;
    Ok(HttpResponse::Ok().json(tokens))
}

/// POST /auth/forgot-password
///
/// Always answers 200 with the same message, whether or not the email is
/// registered.
pub async fn forgot_password(
    form: web::Json<ForgotPasswordRequest>,
    store: web::Data<dyn AcademyStore>,
    email_client: web::Data<EmailClient>,
    auth: web::Data<AuthSettings>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, AppError> {
    accounts::request_password_reset(
        store.get_ref(),
        email_client.get_ref(),
        auth.get_ref(),
        &base_url.0,
        &form.email,
    )
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": RESET_REQUESTED_MESSAGE })))
}

/// POST /auth/reset-password
///
/// Redeem an emailed reset token.
///
/// # Errors
/// - 400: Unknown, used or expired token; new password under 8 characters
pub async fn reset_password(
    form: web::Json<ResetPasswordRequest>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    accounts::reset_password(store.get_ref(), &form.token, &form.new_password).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password has been reset" })))
}

/// POST /auth/change-password
///
/// **Requires a valid access token.**
///
/// # Errors
/// - 400: New password under 8 characters
/// - 401: Missing token or wrong current password
pub async fn change_password(
    user: AuthenticatedUser,
    form: web::Json<ChangePasswordRequest>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("change_password").with_user_id(user.user_id);

    accounts::change_password(
        store.get_ref(),
        user.user_id,
        &form.current_password,
        &form.new_password,
    )
    .await
    .map_err(|e| {
        context.log_error(&e);
        e
    })?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "message": "Password has been changed" })))
}

/// GET /auth/me
///
/// The caller's user record. **Requires a valid access token.**
///
/// # Errors
/// - 401: Missing or invalid token (rejected by the guard)
/// - 404: The account was deleted after the token was issued
pub async fn get_current_user(
    user: AuthenticatedUser,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let record = store
        .find_user_by_id(user.user_id)
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;

    Ok(HttpResponse::Ok().json(record))
}
