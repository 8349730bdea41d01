//! Order service layer - the order state machine
//!
//! Every transition validates the acting party and the current status before
//! touching storage. Plain transitions are guarded updates (`WHERE status IN
//! (...)`); transitions that also move escrow hold the order row lock across
//! the gateway call, so the payout and the status change settle together.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::catalog::CatalogService;
use crate::error::{MarketError, MarketResult};
use crate::escrow::EscrowGateway;
use crate::notifications::NotificationSink;
use crate::order::{CreateOrderRequest, ListOrdersQuery, Order, OrderRole, OrderStatus};

/// Order service for managing the order lifecycle
pub struct OrderService {
    db_pool: PgPool,
    catalog: CatalogService,
    gateway: Arc<dyn EscrowGateway>,
    sink: Arc<dyn NotificationSink>,
}

impl OrderService {
    pub fn new(
        db_pool: PgPool,
        catalog: CatalogService,
        gateway: Arc<dyn EscrowGateway>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            db_pool,
            catalog,
            gateway,
            sink,
        }
    }

    /// Create an order against a listing, locking funds in escrow first.
    /// If the gateway call fails no order row is persisted.
    pub async fn create_order(
        &self,
        buyer_id: Uuid,
        request: CreateOrderRequest,
    ) -> MarketResult<Order> {
        let buyer = self.catalog.get_user(&buyer_id).await?;
        let listing = self.catalog.get_listing(&request.listing_id).await?;

        if listing.seller_id == buyer_id {
            return Err(MarketError::InvalidState(
                "Cannot purchase your own listing".to_string(),
            ));
        }
        if request.quantity > listing.quantity_available {
            return Err(MarketError::InvalidState(format!(
                "Only {} available",
                listing.quantity_available
            )));
        }

        let seller = self.catalog.get_user(&listing.seller_id).await?;

        // Fixed at creation; later listing price changes do not affect it
        let total_amount = listing.price * request.quantity as i64;

        let order_id = Uuid::new_v4();
        let escrow = self
            .gateway
            .create_escrow(
                &buyer.escrow_key(),
                &seller.escrow_key(),
                total_amount,
                order_id,
            )
            .await?;

        let order = sqlx::query_as::<_, Order>(
            r#"
            INSERT INTO orders (
                id, buyer_id, seller_id, listing_id, quantity, total_amount,
                delivery_address, notes, escrow_account, escrow_tx_hash,
                escrow_released, status, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, FALSE, $11, $12, $12)
            RETURNING *
            "#,
        )
        .bind(order_id)
        .bind(buyer_id)
        .bind(listing.seller_id)
        .bind(listing.id)
        .bind(request.quantity)
        .bind(total_amount)
        .bind(&request.delivery_address)
        .bind(&request.notes)
        .bind(&escrow.escrow_account)
        .bind(&escrow.tx_hash)
        .bind(OrderStatus::Pending)
        .bind(Utc::now())
        .fetch_one(&self.db_pool)
        .await?;

        self.sink
            .notify(
                listing.seller_id,
                "New order received",
                &format!(
                    "{} ordered {} x {}",
                    buyer.username, request.quantity, listing.title
                ),
                "order",
                Some(order.id),
                Some("order"),
            )
            .await;

        tracing::info!(order_id = %order.id, total_amount, "Order created");

        Ok(order)
    }

    /// Get a single order by ID
    pub async fn get_order(&self, id: &Uuid) -> MarketResult<Order> {
        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db_pool)
            .await?;

        order.ok_or_else(|| MarketError::NotFound("Order".to_string()))
    }

    /// List the caller's orders with filtering and pagination
    pub async fn list_orders(
        &self,
        user_id: Uuid,
        query: ListOrdersQuery,
    ) -> MarketResult<Vec<Order>> {
        let page = query.page.unwrap_or(1).max(1);
        let limit = query.limit.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * limit;

        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("SELECT * FROM orders WHERE ");

        match query.role {
            Some(OrderRole::Buyer) => {
                query_builder.push("buyer_id = ");
                query_builder.push_bind(user_id);
            }
            Some(OrderRole::Seller) => {
                query_builder.push("seller_id = ");
                query_builder.push_bind(user_id);
            }
            None => {
                query_builder.push("(buyer_id = ");
                query_builder.push_bind(user_id);
                query_builder.push(" OR seller_id = ");
                query_builder.push_bind(user_id);
                query_builder.push(")");
            }
        }

        if let Some(status) = query.status {
            query_builder.push(" AND status = ");
            query_builder.push_bind(status);
        }

        query_builder.push(" ORDER BY created_at DESC LIMIT ");
        query_builder.push_bind(limit as i64);
        query_builder.push(" OFFSET ");
        query_builder.push_bind(offset as i64);

        let orders = query_builder
            .build_query_as::<Order>()
            .fetch_all(&self.db_pool)
            .await?;

        Ok(orders)
    }

    /// Seller marks the order as shipped
    pub async fn ship_order(&self, seller_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let order = self.get_order(&order_id).await?;

        if order.seller_id != seller_id {
            return Err(MarketError::Forbidden(
                "Only the seller can mark an order shipped".to_string(),
            ));
        }

        let updated = self
            .transition(
                order_id,
                &[OrderStatus::Pending, OrderStatus::Paid],
                OrderStatus::Shipped,
            )
            .await?
            .ok_or_else(|| {
                MarketError::InvalidState(format!(
                    "Order cannot be shipped from status '{}'",
                    order.status.as_str()
                ))
            })?;

        self.sink
            .notify(
                updated.buyer_id,
                "Order shipped",
                "Your order is on its way",
                "order",
                Some(updated.id),
                Some("order"),
            )
            .await;

        Ok(updated)
    }

    /// Buyer confirms receipt directly (no delivery code).
    ///
    /// The order row stays locked from the status check through the gateway
    /// release and the transition to completed. A failed release rolls the
    /// transaction back, and a concurrent transition waits on the lock and
    /// then fails its own status check; the escrow never moves for an order
    /// that does not finish in `completed`.
    pub async fn confirm_delivery(&self, buyer_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let mut tx = self.db_pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MarketError::NotFound("Order".to_string()))?;

        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Only the buyer can confirm delivery".to_string(),
            ));
        }
        if !order.status.is_deliverable() {
            return Err(MarketError::InvalidState(format!(
                "Delivery cannot be confirmed from status '{}'",
                order.status.as_str()
            )));
        }

        let seller_key = Self::escrow_key_for(&mut tx, &order.seller_id).await?;
        let receipt = self
            .gateway
            .release(&order.escrow_account, &seller_key, order.id)
            .await?;

        let updated = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'completed', escrow_released = TRUE,
                escrow_tx_hash = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&receipt.tx_hash)
        .bind(Utc::now())
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.notify_completed(&updated).await;

        tracing::info!(order_id = %updated.id, tx_hash = %receipt.tx_hash, "Delivery confirmed, escrow released");

        Ok(updated)
    }

    /// Buyer opens a dispute. No automatic refund; resolution is external.
    pub async fn dispute_order(&self, buyer_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let order = self.get_order(&order_id).await?;

        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Only the buyer can dispute an order".to_string(),
            ));
        }
        if order.status.is_terminal() || order.status == OrderStatus::Disputed {
            return Err(MarketError::InvalidState(format!(
                "Order cannot be disputed from status '{}'",
                order.status.as_str()
            )));
        }

        let updated = self
            .transition(
                order_id,
                &[OrderStatus::Pending, OrderStatus::Paid, OrderStatus::Shipped],
                OrderStatus::Disputed,
            )
            .await?
            .ok_or_else(|| {
                MarketError::InvalidState("Order state changed while disputing".to_string())
            })?;

        self.sink
            .notify(
                updated.seller_id,
                "Order disputed",
                "The buyer opened a dispute; an administrator will review it",
                "dispute",
                Some(updated.id),
                Some("order"),
            )
            .await;

        tracing::warn!(order_id = %updated.id, "Order disputed");

        Ok(updated)
    }

    /// Buyer cancels a pending order.
    ///
    /// Same lock-then-act shape as `confirm_delivery`: the row lock keeps the
    /// order pending across the refund, and a failed refund rolls back
    /// leaving the order untouched.
    pub async fn cancel_order(&self, buyer_id: Uuid, order_id: Uuid) -> MarketResult<Order> {
        let mut tx = self.db_pool.begin().await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MarketError::NotFound("Order".to_string()))?;

        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Only the buyer can cancel an order".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "Only pending orders can be cancelled, status is '{}'",
                order.status.as_str()
            )));
        }

        let buyer_key = Self::escrow_key_for(&mut tx, &order.buyer_id).await?;
        let receipt = self
            .gateway
            .refund(
                &order.escrow_account,
                &buyer_key,
                order.id,
                "buyer cancelled",
            )
            .await?;

        let updated = sqlx::query_as::<_, Order>(
            r#"
            UPDATE orders
            SET status = 'cancelled', escrow_tx_hash = $1, updated_at = $2
            WHERE id = $3
            RETURNING *
            "#,
        )
        .bind(&receipt.tx_hash)
        .bind(Utc::now())
        .bind(order_id)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;

        self.sink
            .notify(
                updated.seller_id,
                "Order cancelled",
                "The buyer cancelled the order; escrow was refunded",
                "order",
                Some(updated.id),
                Some("order"),
            )
            .await;

        Ok(updated)
    }

    /// Notify both parties that the order completed
    async fn notify_completed(&self, order: &Order) {
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
                "The buyer confirmed delivery; escrow funds are on their way",
                "delivery",
                Some(order.id),
                Some("order"),
            )
            .await;
    }

    /// Escrow key for `user_id`, read under the caller's transaction
    async fn escrow_key_for(
        tx: &mut Transaction<'_, Postgres>,
        user_id: &Uuid,
    ) -> MarketResult<String> {
        let (key,): (String,) = sqlx::query_as(
            "SELECT COALESCE(wallet_address, 'sim_' || id::text) FROM users WHERE id = $1",
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .ok_or_else(|| MarketError::NotFound("User".to_string()))?;

        Ok(key)
    }

    /// Guarded status transition; returns None if the order was no longer in
    /// one of `from` (raced by a concurrent transition).
    async fn transition(
        &self,
        order_id: Uuid,
        from: &[OrderStatus],
        to: OrderStatus,
    ) -> MarketResult<Option<Order>> {
        let mut query_builder: sqlx::QueryBuilder<sqlx::Postgres> =
            sqlx::QueryBuilder::new("UPDATE orders SET status = ");
        query_builder.push_bind(to);
        query_builder.push(", updated_at = ");
        query_builder.push_bind(Utc::now());
        query_builder.push(" WHERE id = ");
        query_builder.push_bind(order_id);
        query_builder.push(" AND status IN (");
        let mut separated = query_builder.separated(", ");
        for status in from {
            separated.push_bind(*status);
        }
        query_builder.push(") RETURNING *");

        let order = query_builder
            .build_query_as::<Order>()
            .fetch_optional(&self.db_pool)
            .await?;

        Ok(order)
    }
}
