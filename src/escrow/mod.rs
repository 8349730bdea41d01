//! Escrow gateway module
//!
//! Abstraction over the on-chain escrow program plus the background task that
//! retries fund release for orders completed while the gateway was down.

mod gateway;
mod reconciler;

pub use gateway::{EscrowCreated, EscrowGateway, EscrowReceipt, GatewayError, SolanaEscrowGateway};
pub use reconciler::{release_reconciler, sweep_pending_releases};
