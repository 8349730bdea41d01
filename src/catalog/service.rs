//! Catalog service - read-only user and listing lookups

use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::{Listing, User};
use crate::error::{MarketError, MarketResult};

/// Catalog service backing the order flow's listing/user lookups
#[derive(Clone)]
pub struct CatalogService {
    db_pool: PgPool,
}

impl CatalogService {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }

    /// Get an active user by ID
    pub async fn get_user(&self, id: &Uuid) -> MarketResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1 AND is_active")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        user.ok_or_else(|| MarketError::NotFound("User".to_string()))
    }

    /// Get an active listing by ID
    pub async fn get_listing(&self, id: &Uuid) -> MarketResult<Listing> {
        let listing =
            sqlx::query_as::<_, Listing>("SELECT * FROM listings WHERE id = $1 AND is_active")
                .bind(id)
                .fetch_optional(&self.db_pool)
                .await?;

        listing.ok_or_else(|| MarketError::NotFound("Listing".to_string()))
    }
}
