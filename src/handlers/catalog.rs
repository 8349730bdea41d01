//! Catalog HTTP handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::catalog::{Listing, User};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/listings/:id - Get an active listing
pub async fn get_listing(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Listing>, ApiError> {
    let listing = state.catalog_service.get_listing(&id).await?;
    Ok(Json(listing))
}

/// GET /api/users/:id - Get an active user
pub async fn get_user(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<User>, ApiError> {
    let user = state.catalog_service.get_user(&id).await?;
    Ok(Json(user))
}
