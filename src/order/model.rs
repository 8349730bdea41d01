//! Order models and data structures

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;
use validator::Validate;

/// Order model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub seller_id: Uuid,
    pub listing_id: Uuid,
    pub quantity: i32,
    /// price * quantity in cents, fixed at creation
    pub total_amount: i64,
    pub delivery_address: String,
    pub notes: Option<String>,
    /// Opaque escrow account handle from the gateway
    pub escrow_account: String,
    pub escrow_tx_hash: Option<String>,
    /// FALSE on a completed order means the payout is awaiting reconciliation
    pub escrow_released: bool,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Order lifecycle status
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq)]
#[sqlx(type_name = "order_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Shipped,
    Completed,
    Cancelled,
    Disputed,
}

impl OrderStatus {
    /// Completed and cancelled orders accept no further transitions;
    /// disputed ones only through external resolution.
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }

    /// States in which delivery may be confirmed or a code issued
    pub fn is_deliverable(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Shipped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Paid => "paid",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Disputed => "disputed",
        }
    }
}

/// Request DTO for creating an order
#[derive(Debug, Deserialize, Validate)]
pub struct CreateOrderRequest {
    pub listing_id: Uuid,
    #[validate(range(min = 1, message = "quantity must be at least 1"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 500, message = "delivery address is required"))]
    pub delivery_address: String,
    #[validate(length(max = 1000))]
    pub notes: Option<String>,
}

/// Query parameters for listing orders
#[derive(Debug, Deserialize)]
pub struct ListOrdersQuery {
    /// Restrict to orders where the caller is this party
    pub role: Option<OrderRole>,
    pub status: Option<OrderStatus>,
    pub page: Option<i32>,
    pub limit: Option<i32>,
}

/// Which side of the order the caller is on
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum OrderRole {
    Buyer,
    Seller,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(OrderStatus::Completed.is_terminal());
        assert!(OrderStatus::Cancelled.is_terminal());
        assert!(!OrderStatus::Pending.is_terminal());
        assert!(!OrderStatus::Disputed.is_terminal());
    }

    #[test]
    fn test_deliverable_states() {
        assert!(OrderStatus::Paid.is_deliverable());
        assert!(OrderStatus::Shipped.is_deliverable());
        assert!(!OrderStatus::Pending.is_deliverable());
        assert!(!OrderStatus::Completed.is_deliverable());
        assert!(!OrderStatus::Disputed.is_deliverable());
    }

    #[test]
    fn test_create_order_request_validation() {
        use validator::Validate;

        let valid = CreateOrderRequest {
            listing_id: Uuid::new_v4(),
            quantity: 2,
            delivery_address: "Dorm 4, Room 212".to_string(),
            notes: None,
        };
        assert!(valid.validate().is_ok());

        let zero_quantity = CreateOrderRequest {
            quantity: 0,
            ..valid_request()
        };
        assert!(zero_quantity.validate().is_err());

        let empty_address = CreateOrderRequest {
            delivery_address: String::new(),
            ..valid_request()
        };
        assert!(empty_address.validate().is_err());
    }

    fn valid_request() -> CreateOrderRequest {
        CreateOrderRequest {
            listing_id: Uuid::new_v4(),
            quantity: 1,
            delivery_address: "Dorm 4, Room 212".to_string(),
            notes: None,
        }
    }
}
