//! Order domain module
//!
//! Owns the order lifecycle: state machine transitions, buyer/seller
//! permission checks, and orchestration of escrow and notifications.

mod model;
mod service;

pub use model::*;
pub use service::OrderService;
