//! Wallet domain module
//!
//! Append-only transaction ledger; balances are derived from the latest
//! completed entry, never stored.

mod model;
mod service;

pub use model::*;
pub use service::WalletService;
