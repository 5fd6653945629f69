//! Application services used by the HTTP layer.

pub mod admin_bootstrap;
pub mod auth;
pub mod session;

pub use auth::{AdminAuthService, AuthError};
pub use session::SessionCookie;
