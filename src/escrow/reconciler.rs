//! Background reconciliation of pending escrow releases
//!
//! Confirming delivery completes the order even when the escrow gateway is
//! down; those orders are left with `escrow_released = FALSE` and picked up
//! here until the release goes through.

use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use crate::escrow::EscrowGateway;

/// Row shape for orders awaiting release
#[derive(sqlx::FromRow)]
struct PendingRelease {
    id: Uuid,
    escrow_account: String,
    seller_key: String,
}

/// Background job retrying escrow release for completed orders
pub async fn release_reconciler(
    db_pool: PgPool,
    gateway: Arc<dyn EscrowGateway>,
    interval_secs: u64,
) {
    tracing::info!("Starting escrow release reconciler");

    loop {
        tokio::time::sleep(Duration::from_secs(interval_secs)).await;

        match sweep_pending_releases(&db_pool, gateway.as_ref()).await {
            Ok(0) => {}
            Ok(n) => tracing::info!("Reconciled {} pending escrow releases", n),
            Err(e) => tracing::error!("Error reconciling escrow releases: {}", e),
        }
    }
}

/// Retry release for every completed order whose payout is still pending.
/// Returns the number of orders reconciled this sweep.
pub async fn sweep_pending_releases(
    db_pool: &PgPool,
    gateway: &dyn EscrowGateway,
) -> anyhow::Result<u64> {
    let pending = sqlx::query_as::<_, PendingRelease>(
        r#"
        SELECT o.id, o.escrow_account,
               COALESCE(u.wallet_address, 'sim_' || u.id::text) AS seller_key
        FROM orders o
        JOIN users u ON u.id = o.seller_id
        WHERE o.status = 'completed' AND NOT o.escrow_released
        "#,
    )
    .fetch_all(db_pool)
    .await?;

    let mut reconciled = 0u64;

    for order in pending {
        match gateway
            .release(&order.escrow_account, &order.seller_key, order.id)
            .await
        {
            Ok(receipt) => {
                sqlx::query(
                    r#"
                    UPDATE orders
                    SET escrow_released = TRUE, escrow_tx_hash = $1, updated_at = NOW()
                    WHERE id = $2 AND NOT escrow_released
                    "#,
                )
                .bind(&receipt.tx_hash)
                .bind(order.id)
                .execute(db_pool)
                .await?;

                tracing::info!(order_id = %order.id, tx_hash = %receipt.tx_hash, "Escrow release reconciled");
                reconciled += 1;
            }
            Err(e) => {
                tracing::warn!(order_id = %order.id, error = %e, "Escrow release retry failed");
            }
        }
    }

    Ok(reconciled)
}
