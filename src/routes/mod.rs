pub mod admin;
mod auth;
mod health_check;
mod payments;

pub use auth::{change_password, forgot_password, get_current_user, login, refresh, reset_password};
pub use health_check::health_check;
pub use payments::{payment_completed, WEBHOOK_SECRET_HEADER};
