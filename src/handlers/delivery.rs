//! Delivery code HTTP handlers

use axum::{
    extract::{Path, State},
    Json,
};
use uuid::Uuid;

use crate::delivery::{GenerateCodeResponse, RedeemCodeRequest, RedeemCodeResponse};
use crate::error::ApiError;
use crate::handlers::AuthenticatedUser;
use crate::state::AppState;

/// POST /api/delivery/:order_id/generate-code - Seller requests a code
pub async fn generate_delivery_code(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<GenerateCodeResponse>, ApiError> {
    let code = state
        .delivery_service
        .generate_code(user.user_id, order_id)
        .await?;

    Ok(Json(GenerateCodeResponse {
        code: code.code,
        expires_at: code.expires_at,
    }))
}

/// POST /api/delivery/confirm - Buyer redeems a delivery code
pub async fn confirm_delivery_code(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<RedeemCodeRequest>,
) -> Result<Json<RedeemCodeResponse>, ApiError> {
    let outcome = state
        .delivery_service
        .redeem_code(user.user_id, request.delivery_code.trim())
        .await?;

    Ok(Json(outcome))
}
