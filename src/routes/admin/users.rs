/// User administration (ADMIN only)

use actix_web::{web, HttpResponse};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, ErrorContext};
use crate::middleware::AuthenticatedUser;
use crate::services::accounts::{self, AdminUserInput};
use crate::store::AcademyStore;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentRequest {
    pub formation_id: Uuid,
}

/// GET /admin/users
pub async fn list_users(store: web::Data<dyn AcademyStore>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(store.list_users().await?))
}

/// GET /admin/users/{id}
pub async fn get_user(
    path: web::Path<Uuid>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let user = store
        .find_user_by_id(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("User not found"))?;
    Ok(HttpResponse::Ok().json(user))
}

/// POST /admin/users
///
/// `password` is optional. When omitted one is generated and returned once
/// as `generatedPassword`.
///
/// # Errors
/// - 400: Malformed email, weak password, or email already registered
pub async fn create_user(
    admin: AuthenticatedUser,
    form: web::Json<AdminUserInput>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let context = ErrorContext::new("admin_create_user").with_user_id(admin.user_id);

    let created = accounts::create_user(store.get_ref(), form.into_inner())
        .await
        .map_err(|e| {
            context.log_error(&e);
            e
        })?;

    Ok(HttpResponse::Created().json(created))
}

/// PUT /admin/users/{id}
pub async fn update_user(
    path: web::Path<Uuid>,
    form: web::Json<AdminUserInput>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let user = accounts::update_user(store.get_ref(), path.into_inner(), form.into_inner()).await?;
    Ok(HttpResponse::Ok().json(user))
}

/// DELETE /admin/users/{id}
///
/// Removes the profile and enrollments with the account.
pub async fn delete_user(
    admin: AuthenticatedUser,
    path: web::Path<Uuid>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    store.delete_user(id).await?;

    tracing::info!(user_id = %id, admin_id = %admin.user_id, "User deleted");
    Ok(HttpResponse::NoContent().finish())
}

/// GET /admin/users/{id}/enrollments
pub async fn list_enrollments(
    path: web::Path<Uuid>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if store.find_user_by_id(id).await?.is_none() {
        return Err(AppError::not_found("User not found"));
    }
    Ok(HttpResponse::Ok().json(store.list_enrollments(id).await?))
}

/// POST /admin/users/{id}/enrollments
///
/// Idempotent: granting an existing enrollment returns it.
pub async fn grant_enrollment(
    path: web::Path<Uuid>,
    form: web::Json<EnrollmentRequest>,
    store: web::Data<dyn AcademyStore>,
) -> Result<HttpResponse, AppError> {
    let enrollment = store
        .grant_enrollment(path.into_inner(), form.formation_id)
        .await?;
    Ok(HttpResponse::Ok().json(enrollment))
}
