//! Wallet route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn wallet_routes() -> Router<AppState> {
    Router::new()
        .route("/api/wallet/balance", get(get_balance))
        .route("/api/wallet/transactions", get(list_transactions))
        .route("/api/wallet/deposit", post(deposit))
        .route("/api/wallet/withdraw", post(withdraw))
        .route("/api/wallet/pay/:order_id", post(pay_order))
}
