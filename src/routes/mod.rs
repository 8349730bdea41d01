//! Route definitions

mod catalog;
mod delivery;
mod order;
mod wallet;

pub use catalog::catalog_routes;
pub use delivery::delivery_routes;
pub use order::order_routes;
pub use wallet::wallet_routes;
