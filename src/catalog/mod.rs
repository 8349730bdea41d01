//! Catalog domain module
//!
//! Read-only access to users and listings consumed by the order flow.

mod model;
mod service;

pub use model::*;
pub use service::CatalogService;
