//! Delivery code domain module
//!
//! Issues and redeems the single-use numeric codes that gate escrow release.

mod model;
mod service;

pub use model::*;
pub use service::DeliveryService;
