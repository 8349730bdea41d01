//! Notification sink
//!
//! Fire-and-forget user-facing status messages. Delivery failure is logged and
//! otherwise ignored; nothing in the order flow depends on a notification
//! landing.

use async_trait::async_trait;
use serde::Serialize;
use sqlx::types::chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Stored notification row
#[derive(Debug, Serialize, sqlx::FromRow, Clone)]
pub struct Notification {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub message: String,
    pub category: String,
    pub related_entity_id: Option<Uuid>,
    pub related_entity_type: Option<String>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Fire-and-forget notification dispatch
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Returns whether the notification was accepted. Callers must not treat
    /// `false` as an error.
    async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        category: &str,
        related_entity_id: Option<Uuid>,
        related_entity_type: Option<&str>,
    ) -> bool;
}

/// Sink persisting notifications for in-app display
pub struct DbNotificationSink {
    db_pool: PgPool,
}

impl DbNotificationSink {
    pub fn new(db_pool: PgPool) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl NotificationSink for DbNotificationSink {
    async fn notify(
        &self,
        user_id: Uuid,
        title: &str,
        message: &str,
        category: &str,
        related_entity_id: Option<Uuid>,
        related_entity_type: Option<&str>,
    ) -> bool {
        let result = sqlx::query(
            r#"
            INSERT INTO notifications (
                id, user_id, title, message, category,
                related_entity_id, related_entity_type, is_read, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, FALSE, NOW())
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(title)
        .bind(message)
        .bind(category)
        .bind(related_entity_id)
        .bind(related_entity_type)
        .execute(&self.db_pool)
        .await;

        match result {
            Ok(_) => true,
            Err(e) => {
                tracing::warn!(%user_id, category, error = %e, "Failed to deliver notification");
                false
            }
        }
    }
}
