//! Delivery code models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Length of a delivery code in digits
pub const CODE_LENGTH: usize = 6;

/// Delivery code record
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct DeliveryCode {
    pub id: Uuid,
    pub order_id: Uuid,
    /// 6 ASCII digits, zero-padded
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl DeliveryCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }
}

/// Response DTO for code generation
#[derive(Debug, Serialize)]
pub struct GenerateCodeResponse {
    pub code: String,
    pub expires_at: DateTime<Utc>,
}

/// Request DTO for the confirm-by-code flow
#[derive(Debug, Deserialize)]
pub struct RedeemCodeRequest {
    pub delivery_code: String,
}

/// Result of redeeming a delivery code.
///
/// `escrow_released = false` means the order completed but the payout is
/// still pending; the reconciler will retry it.
#[derive(Debug, Serialize)]
pub struct RedeemCodeResponse {
    pub order_id: Uuid,
    pub escrow_released: bool,
    pub transaction_hash: Option<String>,
}
