//! Delivery code route definitions

use axum::{routing::post, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn delivery_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/delivery/:order_id/generate-code",
            post(generate_delivery_code),
        )
        .route("/api/delivery/confirm", post(confirm_delivery_code))
}
