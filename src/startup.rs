use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use std::net::TcpListener;
use std::sync::Arc;

use crate::configuration::{EmailClientSettings, Settings};
use crate::email_client::{EmailClient, SenderEmail};
use crate::error::{AppError, ValidationError};
use crate::logger::LoggerMiddleware;
use crate::middleware::AuthGuard;
use crate::models::Role;
use crate::routes::{
    admin, change_password, forgot_password, get_current_user, health_check, login,
    payment_completed, refresh, reset_password,
};
use crate::store::AcademyStore;

/// Public URL of the site, used in emailed links
pub struct ApplicationBaseUrl(pub String);

pub fn build_email_client(settings: &EmailClientSettings) -> Result<EmailClient, AppError> {
    let sender = SenderEmail::parse(settings.sender_email.clone())?;
    let client = EmailClient::new(settings.base_url.clone(), sender, settings.timeout())?;
    Ok(client)
}

fn json_config() -> web::JsonConfig {
    web::JsonConfig::default().error_handler(|err, _req| {
        tracing::debug!(error = %err, "Rejected request body");
        AppError::from(ValidationError::InvalidFormat("request body".to_string())).into()
    })
}

fn path_config() -> web::PathConfig {
    web::PathConfig::default()
        .error_handler(|_err, _req| AppError::not_found("Resource not found").into())
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn AcademyStore>,
    settings: Settings,
) -> Result<Server, std::io::Error> {
    let email_client = build_email_client(&settings.email_client)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string()))?;

    if !settings.auth.enforce {
        tracing::warn!("Authorization is not enforced: admin routes are open");
    }

    let webhook_unsigned = settings
        .payments
        .webhook_secret
        .as_deref()
        .map_or(true, str::is_empty);
    if webhook_unsigned {
        if settings.auth.enforce {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "payments.webhook_secret must be set while auth.enforce is on",
            ));
        }
        tracing::warn!("Payment callback accepts unsigned calls");
    }

    let store: web::Data<dyn AcademyStore> = web::Data::from(store);
    let email_client = web::Data::new(email_client);
    let jwt_config = web::Data::new(settings.jwt.clone());
    let auth_config = web::Data::new(settings.auth.clone());
    let payments = web::Data::new(settings.payments.clone());
    let base_url = web::Data::new(ApplicationBaseUrl(settings.application.base_url.clone()));

    let guard = AuthGuard::new(settings.jwt.clone(), &settings.auth);

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)

            // Shared state
            .app_data(store.clone())
            .app_data(email_client.clone())
            .app_data(jwt_config.clone())
            .app_data(auth_config.clone())
            .app_data(payments.clone())
            .app_data(base_url.clone())
            .app_data(json_config())
            .app_data(path_config())

            // Public routes
            .route("/health_check", web::get().to(health_check))
            .route("/auth/login", web::post().to(login))
            .route("/auth/refresh", web::post().to(refresh))
            .route("/auth/forgot-password", web::post().to(forgot_password))
            .route("/auth/reset-password", web::post().to(reset_password))
            .route("/payments/complete", web::post().to(payment_completed))

            // Signed-in users, whatever the enforcement toggle says
            .service(
                web::resource("/auth/me")
                    .wrap(guard.clone().always_enforced())
                    .route(web::get().to(get_current_user)),
            )
            .service(
                web::resource("/auth/change-password")
                    .wrap(guard.clone().always_enforced())
                    .route(web::post().to(change_password)),
            )

            // Administration; /admin/users must be registered before /admin
            .service(
                web::scope("/admin/users")
                    .wrap(guard.clone().roles(&[Role::Admin]))
                    .configure(admin::user_routes),
            )
            .service(
                web::scope("/admin")
                    .wrap(guard.clone().roles(&[Role::Admin, Role::Employee]))
                    .configure(admin::content_routes),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
