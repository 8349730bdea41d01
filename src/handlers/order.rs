//! Order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::AuthenticatedUser;
use crate::order::{CreateOrderRequest, ListOrdersQuery, Order};
use crate::state::AppState;

/// POST /api/orders - Create an order against a listing
pub async fn create_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    request.validate()?;

    let order = state
        .order_service
        .create_order(user.user_id, request)
        .await?;

    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /api/orders/:id - Get one of the caller's orders
pub async fn get_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.order_service.get_order(&id).await?;

    if order.buyer_id != user.user_id && order.seller_id != user.user_id {
        return Err(ApiError::Forbidden(
            "Order belongs to another user".to_string(),
        ));
    }

    Ok(Json(order))
}

/// GET /api/orders - List the caller's orders
pub async fn list_orders(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListOrdersQuery>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let orders = state.order_service.list_orders(user.user_id, query).await?;
    Ok(Json(orders))
}

/// POST /api/orders/:id/ship - Seller marks the order shipped
pub async fn ship_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.order_service.ship_order(user.user_id, id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/confirm-delivery - Buyer confirms receipt directly
pub async fn confirm_delivery(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state
        .order_service
        .confirm_delivery(user.user_id, id)
        .await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/dispute - Buyer opens a dispute
pub async fn dispute_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.order_service.dispute_order(user.user_id, id).await?;
    Ok(Json(order))
}

/// POST /api/orders/:id/cancel - Buyer cancels a pending order
pub async fn cancel_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, ApiError> {
    let order = state.order_service.cancel_order(user.user_id, id).await?;
    Ok(Json(order))
}
