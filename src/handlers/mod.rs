//! API handlers

pub mod catalog;
pub mod delivery;
pub mod order;
pub mod wallet;

pub use catalog::*;
pub use delivery::*;
pub use order::*;
pub use wallet::*;

// Re-export AuthenticatedUser from middleware for handler use
pub use crate::middleware::auth::AuthenticatedUser;
