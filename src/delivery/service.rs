//! Delivery code service - issuance and redemption
//!
//! Redemption is the primary completion path: the code check, the single-use
//! flip and the order transition happen inside one database transaction, so
//! two concurrent redemptions of the same code cannot both succeed. The
//! escrow release is deliberately performed after commit; see `redeem_code`.

use chrono::{Duration, Utc};
use rand::Rng;
use sqlx::PgPool;
use std::sync::Arc;
use uuid::Uuid;

use crate::delivery::{DeliveryCode, RedeemCodeResponse};
use crate::error::{MarketError, MarketResult};
use crate::escrow::EscrowGateway;
use crate::notifications::NotificationSink;
use crate::order::{Order, OrderStatus};

/// Delivery code service
pub struct DeliveryService {
    db_pool: PgPool,
    gateway: Arc<dyn EscrowGateway>,
    sink: Arc<dyn NotificationSink>,
    code_ttl_hours: i64,
    max_attempts: u32,
}

impl DeliveryService {
    pub fn new(
        db_pool: PgPool,
        gateway: Arc<dyn EscrowGateway>,
        sink: Arc<dyn NotificationSink>,
        code_ttl_hours: i64,
        max_attempts: u32,
    ) -> Self {
        Self {
            db_pool,
            gateway,
            sink,
            code_ttl_hours,
            max_attempts,
        }
    }

    /// Seller requests a delivery code for an order.
    ///
    /// Idempotent: an existing unused, unexpired code is returned unchanged.
    /// Generation retries on collision against the set of unused codes, up to
    /// `max_attempts`.
    pub async fn generate_code(
        &self,
        seller_id: Uuid,
        order_id: Uuid,
    ) -> MarketResult<DeliveryCode> {
        let order = self.fetch_order(&order_id).await?;

        if order.seller_id != seller_id {
            return Err(MarketError::Forbidden(
                "Only the seller can generate a delivery code".to_string(),
            ));
        }
        if !order.status.is_deliverable() {
            return Err(MarketError::InvalidState(format!(
                "Delivery codes require a paid or shipped order, status is '{}'",
                order.status.as_str()
            )));
        }

        let now = Utc::now();

        if let Some(existing) = self.unused_code_for_order(&order_id).await? {
            if !existing.is_expired(now) {
                return Ok(existing);
            }
            // Expired without redemption; clear it so a fresh one can be issued
            sqlx::query("DELETE FROM delivery_codes WHERE id = $1 AND NOT is_used")
                .bind(existing.id)
                .execute(&self.db_pool)
                .await?;
        }

        let expires_at = now + Duration::hours(self.code_ttl_hours);

        for _ in 0..self.max_attempts {
            let code = {
                let mut rng = rand::thread_rng();
                format!("{:06}", rng.gen_range(0..1_000_000))
            };

            // The partial unique index on unused codes rejects collisions
            let inserted = sqlx::query_as::<_, DeliveryCode>(
                r#"
                INSERT INTO delivery_codes (id, order_id, code, expires_at, is_used, created_at)
                VALUES ($1, $2, $3, $4, FALSE, $5)
                ON CONFLICT DO NOTHING
                RETURNING *
                "#,
            )
            .bind(Uuid::new_v4())
            .bind(order_id)
            .bind(&code)
            .bind(expires_at)
            .bind(now)
            .fetch_optional(&self.db_pool)
            .await?;

            if let Some(delivery_code) = inserted {
                tracing::info!(%order_id, expires_at = %expires_at, "Delivery code issued");
                return Ok(delivery_code);
            }

            // Conflict: either the code value is in use by another order, or
            // a concurrent request issued this order's code first
            if let Some(existing) = self.unused_code_for_order(&order_id).await? {
                if !existing.is_expired(Utc::now()) {
                    return Ok(existing);
                }
            }
        }

        Err(MarketError::CodeGenerationExhausted(self.max_attempts))
    }

    /// Buyer redeems a delivery code, completing the order.
    ///
    /// If the escrow release fails after the order is completed, the order
    /// stays completed: physical delivery is confirmed even if the payout
    /// lags. The caller sees `escrow_released = false` and the release is
    /// retried by the background reconciler.
    pub async fn redeem_code(
        &self,
        buyer_id: Uuid,
        code: &str,
    ) -> MarketResult<RedeemCodeResponse> {
        let now = Utc::now();
        let mut tx = self.db_pool.begin().await?;

        let delivery_code = sqlx::query_as::<_, DeliveryCode>(
            "SELECT * FROM delivery_codes WHERE code = $1 AND NOT is_used FOR UPDATE",
        )
        .bind(code)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| MarketError::NotFound("Delivery code".to_string()))?;

        // Expired codes stay unused; the seller must issue a fresh one
        if delivery_code.is_expired(now) {
            return Err(MarketError::CodeExpired);
        }

        let order =
            sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
                .bind(delivery_code.order_id)
                .fetch_optional(&mut *tx)
                .await?
                .ok_or_else(|| MarketError::NotFound("Order".to_string()))?;

        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Only the buyer can redeem a delivery code".to_string(),
            ));
        }
        if !order.status.is_deliverable() {
            return Err(MarketError::InvalidState(format!(
                "Order cannot be completed from status '{}'",
                order.status.as_str()
            )));
        }

        // Single-use flip; the conditional guard backs up the row lock
        let marked = sqlx::query(
            "UPDATE delivery_codes SET is_used = TRUE, used_at = $1 WHERE id = $2 AND NOT is_used",
        )
        .bind(now)
        .bind(delivery_code.id)
        .execute(&mut *tx)
        .await?;

        if marked.rows_affected() != 1 {
            return Err(MarketError::NotFound("Delivery code".to_string()));
        }

        sqlx::query("UPDATE orders SET status = 'completed', updated_at = $1 WHERE id = $2")
            .bind(now)
            .bind(order.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        // Release after commit: delivery confirmation must not be rolled back
        // by a gateway outage
        let seller_key = self.escrow_key_for(&order.seller_id).await?;
        let (escrow_released, transaction_hash) = match self
            .gateway
            .release(&order.escrow_account, &seller_key, order.id)
            .await
        {
            Ok(receipt) => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET escrow_released = TRUE, escrow_tx_hash = $1, updated_at = NOW()
                    WHERE id = $2
                    "#,
                )
                .bind(&receipt.tx_hash)
                .bind(order.id)
                .execute(&self.db_pool)
                .await?;
                (true, Some(receipt.tx_hash))
            }
            Err(e) => {
                tracing::error!(
                    order_id = %order.id,
                    error = %e,
                    "Escrow release failed after delivery confirmation; queued for reconciliation"
                );
                (false, None)
            }
        };

        self.sink
            .notify(
                order.buyer_id,
                "Delivery confirmed",
                "Thanks for confirming receipt of your order",
                "delivery",
                Some(order.id),
                Some("order"),
            )
            .await;
        self.sink
            .notify(
                order.seller_id,
                "Order completed",
                if escrow_released {
                    "The buyer confirmed delivery; escrow funds were released"
                } else {
                    "The buyer confirmed delivery; escrow release is pending"
                },
                "delivery",
                Some(order.id),
                Some("order"),
            )
            .await;

        tracing::info!(order_id = %order.id, escrow_released, "Delivery code redeemed");

        Ok(RedeemCodeResponse {
            order_id: order.id,
            escrow_released,
            transaction_hash,
        })
    }

    // ===== Private helpers =====

    async fn fetch_order(&self, order_id: &Uuid) -> MarketResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(order_id)
            .fetch_optional(&self.db_pool)
            .await?;

        order.ok_or_else(|| MarketError::NotFound("Order".to_string()))
    }

    async fn unused_code_for_order(&self, order_id: &Uuid) -> MarketResult<Option<DeliveryCode>> {
        let code = sqlx::query_as::<_, DeliveryCode>(
            "SELECT * FROM delivery_codes WHERE order_id = $1 AND NOT is_used",
        )
        .bind(order_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(code)
    }

    async fn escrow_key_for(&self, user_id: &Uuid) -> MarketResult<String> {
        let (key,): (String,) = sqlx::query_as(
            "SELECT COALESCE(wallet_address, 'sim_' || id::text) FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?
        .ok_or_else(|| MarketError::NotFound("User".to_string()))?;

        Ok(key)
    }
}
