//! HTTP middleware

pub mod auth;
pub mod security;
pub mod tracing;

pub use auth::AuthenticatedUser;
pub use security::security_headers;
pub use tracing::request_tracing;
