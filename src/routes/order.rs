//! Order route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn order_routes() -> Router<AppState> {
    Router::new()
        .route("/api/orders", post(create_order))
        .route("/api/orders", get(list_orders))
        .route("/api/orders/:id", get(get_order))
        .route("/api/orders/:id/ship", post(ship_order))
        .route("/api/orders/:id/confirm-delivery", post(confirm_delivery))
        .route("/api/orders/:id/dispute", post(dispute_order))
        .route("/api/orders/:id/cancel", post(cancel_order))
}
