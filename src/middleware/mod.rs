/// Middleware module
///
/// Authorization for guarded scopes.

mod auth_guard;

pub use auth_guard::{AuthGuard, AuthenticatedUser, DEV_ADMIN_EMAIL};
