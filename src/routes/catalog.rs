//! Catalog route definitions

use axum::{routing::get, Router};

use crate::handlers::*;
use crate::state::AppState;

pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/api/listings/:id", get(get_listing))
        .route("/api/users/:id", get(get_user))
}
