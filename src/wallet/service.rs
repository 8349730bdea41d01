//! Wallet service layer - append-only ledger over wallet_transactions
//!
//! Every balance-affecting operation runs inside one database transaction
//! holding a per-user advisory lock, so a concurrent pair of debits cannot
//! both pass the balance check.

use chrono::Utc;
use sqlx::{PgPool, Postgres, Transaction};
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{MarketError, MarketResult};
use crate::notifications::NotificationSink;
use crate::order::{Order, OrderStatus};
use crate::wallet::{
    PaymentResponse, TransactionStatus, TransactionType, WalletTransaction,
};

/// Wallet service for the transaction ledger
pub struct WalletService {
    db_pool: PgPool,
    sink: Arc<dyn NotificationSink>,
}

impl WalletService {
    pub fn new(db_pool: PgPool, sink: Arc<dyn NotificationSink>) -> Self {
        Self { db_pool, sink }
    }

    /// Current balance: balance_after of the latest completed entry, 0 if none
    pub async fn balance(&self, user_id: Uuid) -> MarketResult<i64> {
        let balance: Option<(i64,)> = sqlx::query_as(
            r#"
            SELECT balance_after FROM wallet_transactions
            WHERE user_id = $1 AND status = 'completed'
            ORDER BY seq DESC LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.db_pool)
        .await?;

        Ok(balance.map(|(b,)| b).unwrap_or(0))
    }

    /// Deposit funds into the wallet
    pub async fn deposit(
        &self,
        user_id: Uuid,
        amount: i64,
        description: Option<String>,
    ) -> MarketResult<WalletTransaction> {
        let mut tx = self.db_pool.begin().await?;
        Self::lock_user_ledger(&mut tx, user_id).await?;

        let entry = Self::record(
            &mut tx,
            user_id,
            TransactionType::Deposit,
            amount,
            description,
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Withdraw funds from the wallet
    pub async fn withdraw(
        &self,
        user_id: Uuid,
        amount: i64,
        description: Option<String>,
    ) -> MarketResult<WalletTransaction> {
        let mut tx = self.db_pool.begin().await?;
        Self::lock_user_ledger(&mut tx, user_id).await?;

        let entry = Self::record(
            &mut tx,
            user_id,
            TransactionType::Withdrawal,
            amount,
            description,
            None,
        )
        .await?;

        tx.commit().await?;
        Ok(entry)
    }

    /// Pay for a pending order from the buyer's wallet.
    ///
    /// Balance check, payment entry and the pending -> paid transition commit
    /// atomically; on any failure neither the ledger nor the order changes.
    pub async fn pay(&self, buyer_id: Uuid, order_id: Uuid) -> MarketResult<PaymentResponse> {
        let mut tx = self.db_pool.begin().await?;
        Self::lock_user_ledger(&mut tx, buyer_id).await?;

        let order = sqlx::query_as::<_, Order>("SELECT * FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| MarketError::NotFound("Order".to_string()))?;

        if order.buyer_id != buyer_id {
            return Err(MarketError::Forbidden(
                "Only the buyer can pay for an order".to_string(),
            ));
        }
        if order.status != OrderStatus::Pending {
            return Err(MarketError::InvalidState(format!(
                "Only pending orders can be paid, status is '{}'",
                order.status.as_str()
            )));
        }

        let entry = Self::record(
            &mut tx,
            buyer_id,
            TransactionType::Payment,
            order.total_amount,
            Some(format!("Payment for order {}", order.id)),
            order.escrow_tx_hash.clone(),
        )
        .await?;

        sqlx::query("UPDATE orders SET status = 'paid', updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(order.id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        self.sink
            .notify(
                order.seller_id,
                "Order paid",
                "Payment received; you can arrange delivery",
                "payment",
                Some(order.id),
                Some("order"),
            )
            .await;

        tracing::info!(order_id = %order.id, amount = order.total_amount, "Order paid from wallet");

        Ok(PaymentResponse {
            order_id: order.id,
            new_balance: entry.balance_after,
            transaction_hash: entry.transaction_hash,
        })
    }

    /// Transaction history, newest first
    pub async fn transactions(
        &self,
        user_id: Uuid,
        page: i32,
        limit: i32,
    ) -> MarketResult<Vec<WalletTransaction>> {
        let page = page.max(1);
        let limit = limit.clamp(1, 100);
        let offset = (page - 1) * limit;

        let entries = sqlx::query_as::<_, WalletTransaction>(
            r#"
            SELECT * FROM wallet_transactions
            WHERE user_id = $1
            ORDER BY seq DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(limit as i64)
        .bind(offset as i64)
        .fetch_all(&self.db_pool)
        .await?;

        Ok(entries)
    }

    // ===== Private helpers =====

    /// Serialize balance-affecting writes per user for the duration of the
    /// enclosing transaction
    async fn lock_user_ledger(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
    ) -> MarketResult<()> {
        let bytes = user_id.as_bytes();
        let key = i64::from_be_bytes([
            bytes[0], bytes[1], bytes[2], bytes[3], bytes[4], bytes[5], bytes[6], bytes[7],
        ]);

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(key)
            .execute(&mut **tx)
            .await?;

        Ok(())
    }

    /// Append a ledger entry inside `tx`. The caller must hold the user's
    /// ledger lock. Debits exceeding the current balance fail
    /// `InsufficientFunds` without writing anything.
    async fn record(
        tx: &mut Transaction<'_, Postgres>,
        user_id: Uuid,
        transaction_type: TransactionType,
        amount: i64,
        description: Option<String>,
        transaction_hash: Option<String>,
    ) -> MarketResult<WalletTransaction> {
        if amount <= 0 {
            return Err(MarketError::InvalidState(
                "Transaction amount must be positive".to_string(),
            ));
        }

        let balance_before: i64 = sqlx::query_as(
            r#"
            SELECT balance_after FROM wallet_transactions
            WHERE user_id = $1 AND status = 'completed'
            ORDER BY seq DESC LIMIT 1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&mut **tx)
        .await?
        .map(|(b,): (i64,)| b)
        .unwrap_or(0);

        let balance_after = balance_before + transaction_type.signed(amount);

        if balance_after < 0 {
            return Err(MarketError::InsufficientFunds {
                balance: balance_before,
                required: amount,
            });
        }

        let entry = sqlx::query_as::<_, WalletTransaction>(
            r#"
            INSERT INTO wallet_transactions (
                id, user_id, transaction_type, amount, balance_before,
                balance_after, description, transaction_hash, status, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(transaction_type)
        .bind(amount)
        .bind(balance_before)
        .bind(balance_after)
        .bind(&description)
        .bind(&transaction_hash)
        .bind(TransactionStatus::Completed)
        .bind(Utc::now())
        .fetch_one(&mut **tx)
        .await?;

        Ok(entry)
    }
}
