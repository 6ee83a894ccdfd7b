/// Payment completion callback
///
/// Called by the payment integration once a purchase is settled. Creates
/// the buyer's account when needed and grants the purchased formation.

use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use uuid::Uuid;

use crate::configuration::PaymentSettings;
use crate::email_client::EmailClient;
use crate::error::{AppError, AuthError, ErrorContext, ValidationError};
use crate::models::Role;
use crate::services::accounts::{self, PaymentAccountRequest, ProvisionedAccount};
use crate::startup::ApplicationBaseUrl;
use crate::store::AcademyStore;
use crate::validators::is_valid_email;

pub const WEBHOOK_SECRET_HEADER: &str = "X-Webhook-Secret";

const PAYMENT_PROCESSED_MESSAGE: &str = "Payment processed";

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentCompletedRequest {
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub formation_id: Option<Uuid>,
}

/// Same body whether the account was created or already existed
#[derive(Serialize)]
pub struct PaymentCompletedResponse {
    pub message: &'static str,
}

/// Compares SHA-256 digests in constant time, so neither the content nor
/// the length of the expected secret leaks through timing
fn secrets_match(provided: &str, expected: &str) -> bool {
    let provided = Sha256::digest(provided.as_bytes());
    let expected = Sha256::digest(expected.as_bytes());
    provided.as_slice().ct_eq(expected.as_slice()).into()
}

/// Without a configured secret the callback is open. `startup::run` only
/// allows that when authorization is not enforced.
fn check_webhook_secret(req: &HttpRequest, settings: &PaymentSettings) -> Result<(), AuthError> {
    let expected = match settings.webhook_secret.as_deref() {
        Some(secret) if !secret.is_empty() => secret,
        _ => return Ok(()),
    };

    let provided = req
        .headers()
        .get(WEBHOOK_SECRET_HEADER)
        .and_then(|h| h.to_str().ok())
        .unwrap_or_default();

    if secrets_match(provided, expected) {
        Ok(())
    } else {
        Err(AuthError::InvalidWebhookSecret)
    }
}

fn send_welcome_email(email_client: &EmailClient, account: ProvisionedAccount, login_url: String) {
    let email_client = email_client.clone();
    tokio::spawn(async move {
        if let Err(e) = email_client
            .send_welcome_email(
                &account.email,
                account.first_name.as_deref(),
                &account.password,
                &login_url,
            )
            .await
        {
            tracing::warn!(user_id = %account.id, error = %e, "Welcome email not delivered");
        }
    });
}

/// POST /payments/complete
///
/// A new buyer gets an account with a generated password, mailed to them
/// (best-effort). An existing account is left as is. When `formationId` is
/// present the account is enrolled, idempotently. The answer is the same
/// 200 in both cases and carries no account data.
///
/// # Errors
/// - 400: Missing or malformed email or name
/// - 401: Webhook secret not matched
/// - 404: Unknown formation
pub async fn payment_completed(
    req: HttpRequest,
    form: web::Json<PaymentCompletedRequest>,
    store: web::Data<dyn AcademyStore>,
    email_client: web::Data<EmailClient>,
    payments: web::Data<PaymentSettings>,
    base_url: web::Data<ApplicationBaseUrl>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("payment_completed");
    check_webhook_secret(&req, payments.get_ref()).map_err(|e| {
        let e = AppError::from(e);
        context.log_error(&e);
        e
    })?;

    let form = form.into_inner();
    let email = is_valid_email(
        form.email
            .as_deref()
            .ok_or_else(|| ValidationError::EmptyField("email".to_string()))?,
    )?;

    if let Some(formation_id) = form.formation_id {
        if store.find_formation(formation_id).await?.is_none() {
            return Err(AppError::not_found("Formation not found"));
        }
    }

    let provisioned = accounts::create_user_from_payment(
        store.get_ref(),
        PaymentAccountRequest {
            email: email.clone(),
            first_name: form.first_name,
            last_name: form.last_name,
            role: Role::Client,
        },
    )
    .await;

    let user_id = match provisioned {
        Ok(account) => {
            let user_id = account.id;
            let login_url = format!("{}/academy/login", base_url.0.trim_end_matches('/'));
            send_welcome_email(email_client.get_ref(), account, login_url);
            user_id
        }
        Err(e) if e.is_conflict() => {
            let existing = store
                .find_user_by_email(&email)
                .await?
                .ok_or_else(|| AppError::Internal("Conflicting account vanished".to_string()))?;
            tracing::info!(
                request_id = %context.request_id,
                user_id = %existing.id,
                "Payment for existing account"
            );
            existing.id
        }
        Err(e) => {
            context.log_error(&e);
            return Err(e);
        }
    };

    if let Some(formation_id) = form.formation_id {
        let enrollment = store.grant_enrollment(user_id, formation_id).await?;
        tracing::info!(
            request_id = %context.request_id,
            user_id = %user_id,
            enrollment_id = %enrollment.id,
            "Formation granted after payment"
        );
    }

    Ok(HttpResponse::Ok().json(PaymentCompletedResponse {
        message: PAYMENT_PROCESSED_MESSAGE,
    }))
}
