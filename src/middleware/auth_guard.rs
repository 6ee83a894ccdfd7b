/// Authorization middleware
///
/// `AuthGuard` validates the bearer token on every request of the scope it
/// wraps, checks the caller's role and injects an `AuthenticatedUser` into
/// request extensions for handlers to extract.
///
/// With `auth.enforce = false` requests without a usable token are admitted
/// as a synthetic development admin and a warning is logged for each one.
/// A valid token is honoured either way. Guards built with
/// `always_enforced()` ignore the toggle.

use actix_web::{
    dev::{forward_ready, Payload, Service, ServiceRequest, ServiceResponse, Transform},
    Error, FromRequest, HttpMessage, HttpRequest,
};
use futures::future::{ready, LocalBoxFuture, Ready};
use std::rc::Rc;
use uuid::Uuid;

use crate::auth::{extract_token_from_header, verify_token, TokenPayload};
use crate::configuration::{AuthSettings, JwtSettings};
use crate::error::{AppError, AuthError};
use crate::models::Role;

pub const DEV_ADMIN_EMAIL: &str = "dev-admin@localhost";

/// Caller identity available to handlers behind an `AuthGuard`
#[derive(Debug, Clone, PartialEq)]
pub struct AuthenticatedUser {
    pub user_id: Uuid,
    pub email: String,
    pub role: Role,
    /// True for the synthetic identity used when enforcement is off
    pub bypassed: bool,
}

impl AuthenticatedUser {
    fn from_token(payload: TokenPayload) -> Self {
        Self {
            user_id: payload.user_id,
            email: payload.email,
            role: payload.role,
            bypassed: false,
        }
    }

    fn development_admin() -> Self {
        Self {
            user_id: Uuid::nil(),
            email: DEV_ADMIN_EMAIL.to_string(),
            role: Role::Admin,
            bypassed: true,
        }
    }
}

impl FromRequest for AuthenticatedUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let user = req
            .extensions()
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| AppError::Auth(AuthError::MissingToken).into());
        ready(user)
    }
}

/// Which roles a guarded scope admits; empty means any authenticated user
#[derive(Clone)]
pub struct AuthGuard {
    jwt_config: JwtSettings,
    enforce: bool,
    allowed_roles: Vec<Role>,
}

impl AuthGuard {
    pub fn new(jwt_config: JwtSettings, auth: &AuthSettings) -> Self {
        Self {
            jwt_config,
            enforce: auth.enforce,
            allowed_roles: Vec::new(),
        }
    }

    /// Restrict the scope to `roles`
    pub fn roles(mut self, roles: &[Role]) -> Self {
        self.allowed_roles = roles.to_vec();
        self
    }

    /// Require a token regardless of `auth.enforce`
    pub fn always_enforced(mut self) -> Self {
        self.enforce = true;
        self
    }

    /// Resolve the caller of a request, or the error to answer with
    fn authorize(&self, req: &ServiceRequest) -> Result<AuthenticatedUser, AppError> {
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok());

        let user = match header {
            Some(value) => {
                let verified = extract_token_from_header(value)
                    .and_then(|token| verify_token(token, &self.jwt_config));
                match verified {
                    Some(payload) => AuthenticatedUser::from_token(payload),
                    None if self.enforce => {
                        tracing::warn!(path = %req.path(), "Rejected invalid bearer token");
                        return Err(AuthError::TokenInvalid.into());
                    }
                    None => self.bypass(req),
                }
            }
            None if self.enforce => {
                tracing::warn!(path = %req.path(), "Missing Authorization header");
                return Err(AuthError::MissingToken.into());
            }
            None => self.bypass(req),
        };

        if !self.allowed_roles.is_empty() && !self.allowed_roles.contains(&user.role) {
            tracing::warn!(
                user_id = %user.user_id,
                role = %user.role,
                path = %req.path(),
                "Role not allowed"
            );
            return Err(AuthError::Forbidden("Insufficient permissions".to_string()).into());
        }

        Ok(user)
    }

    fn bypass(&self, req: &ServiceRequest) -> AuthenticatedUser {
        tracing::warn!(
            method = %req.method(),
            path = %req.path(),
            "Authorization not enforced, admitting request as development admin"
        );
        AuthenticatedUser::development_admin()
    }
}

impl<S, B> Transform<S, ServiceRequest> for AuthGuard
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = AuthGuardService<S>;
    type Future = std::future::Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        std::future::ready(Ok(AuthGuardService {
            service: Rc::new(service),
            guard: self.clone(),
        }))
    }
}

pub struct AuthGuardService<S> {
    service: Rc<S>,
    guard: AuthGuard,
}

impl<S, B> Service<ServiceRequest> for AuthGuardService<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, req: ServiceRequest) -> Self::Future {
        match self.guard.authorize(&req) {
            Ok(user) => {
                tracing::debug!(user_id = %user.user_id, role = %user.role, "Request authorized");
                req.extensions_mut().insert(user);

                let service = self.service.clone();
                Box::pin(async move { service.call(req).await })
            }
            Err(e) => Box::pin(async move { Err(e.into()) }),
        }
    }
}
