//! Wallet HTTP handlers

use axum::{
    extract::{Path, Query, State},
    Json,
};
use uuid::Uuid;
use validator::Validate;

use crate::error::ApiError;
use crate::handlers::AuthenticatedUser;
use crate::state::AppState;
use crate::wallet::{
    AmountRequest, BalanceResponse, ListTransactionsQuery, PaymentResponse, WalletTransaction,
};

/// GET /api/wallet/balance - Current derived balance
pub async fn get_balance(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<Json<BalanceResponse>, ApiError> {
    let balance = state.wallet_service.balance(user.user_id).await?;
    Ok(Json(BalanceResponse { balance }))
}

/// GET /api/wallet/transactions - Ledger history, newest first
pub async fn list_transactions(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<Vec<WalletTransaction>>, ApiError> {
    let entries = state
        .wallet_service
        .transactions(
            user.user_id,
            query.page.unwrap_or(1),
            query.limit.unwrap_or(20),
        )
        .await?;
    Ok(Json(entries))
}

/// POST /api/wallet/deposit - Credit the wallet
pub async fn deposit(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AmountRequest>,
) -> Result<Json<WalletTransaction>, ApiError> {
    request.validate()?;

    let entry = state
        .wallet_service
        .deposit(user.user_id, request.amount, request.description)
        .await?;
    Ok(Json(entry))
}

/// POST /api/wallet/withdraw - Debit the wallet
pub async fn withdraw(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(request): Json<AmountRequest>,
) -> Result<Json<WalletTransaction>, ApiError> {
    request.validate()?;

    let entry = state
        .wallet_service
        .withdraw(user.user_id, request.amount, request.description)
        .await?;
    Ok(Json(entry))
}

/// POST /api/wallet/pay/:order_id - Pay for a pending order
pub async fn pay_order(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(order_id): Path<Uuid>,
) -> Result<Json<PaymentResponse>, ApiError> {
    let payment = state.wallet_service.pay(user.user_id, order_id).await?;
    Ok(Json(payment))
}
