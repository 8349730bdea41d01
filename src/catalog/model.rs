//! User and listing models

use serde::{Deserialize, Serialize};
use sqlx::types::chrono::{DateTime, Utc};
use uuid::Uuid;

/// Marketplace user
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    /// Public key used by the escrow gateway; optional until linked
    pub wallet_address: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Key the escrow gateway identifies this user by. Users without a
    /// linked wallet get a deterministic simulated key.
    pub fn escrow_key(&self) -> String {
        self.wallet_address
            .clone()
            .unwrap_or_else(|| format!("sim_{}", self.id))
    }
}

/// Marketplace listing
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone)]
pub struct Listing {
    pub id: Uuid,
    pub seller_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    /// Price per unit in cents
    pub price: i64,
    pub quantity_available: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
