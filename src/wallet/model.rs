//! Wallet ledger models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Ledger entry. Rows are never mutated or deleted after insertion.
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct WalletTransaction {
    pub id: Uuid,
    /// Monotonic insertion order; the latest entry per user defines the
    /// balance. Internal ordering detail, not part of the API payload.
    #[serde(skip)]
    pub seq: i64,
    pub user_id: Uuid,
    pub transaction_type: TransactionType,
    /// Always positive; the type carries the sign
    pub amount: i64,
    pub balance_before: i64,
    pub balance_after: i64,
    pub description: Option<String>,
    pub transaction_hash: Option<String>,
    pub status: TransactionStatus,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Deposit,
    Withdrawal,
    Payment,
    Refund,
}

impl TransactionType {
    /// Whether this type adds to the balance
    pub fn is_credit(&self) -> bool {
        matches!(self, TransactionType::Deposit | TransactionType::Refund)
    }

    /// Signed delta applied to the balance
    pub fn signed(&self, amount: i64) -> i64 {
        if self.is_credit() {
            amount
        } else {
            -amount
        }
    }
}

#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "transaction_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    Failed,
}

/// Request DTO for deposits and withdrawals
#[derive(Debug, Deserialize, Validate)]
pub struct AmountRequest {
    #[validate(range(min = 1, message = "amount must be positive"))]
    pub amount: i64,
    #[validate(length(max = 200))]
    pub description: Option<String>,
}

/// Response DTO for paying an order from the wallet
#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub order_id: Uuid,
    pub new_balance: i64,
    pub transaction_hash: Option<String>,
}

/// Response DTO for balance queries
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    pub balance: i64,
}

/// Query parameters for transaction history
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    pub page: Option<i32>,
    pub limit: Option<i32>,
}
