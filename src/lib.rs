//! Campus Market Backend Library
//!
//! Order, delivery-code and escrow lifecycle for the campus marketplace.

pub mod catalog;
pub mod config;
pub mod db;
pub mod delivery;
pub mod error;
pub mod escrow;
pub mod handlers;
pub mod middleware;
pub mod notifications;
pub mod order;
pub mod routes;
pub mod state;
pub mod wallet;
