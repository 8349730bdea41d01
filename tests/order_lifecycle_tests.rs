//! Order lifecycle tests: creation, payment, delivery codes and redemption

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use sqlx::PgPool;
    use uuid::Uuid;
    use validator::Validate;

    use campus_market_server::catalog::CatalogService;
    use campus_market_server::delivery::DeliveryService;
    use campus_market_server::error::MarketError;
    use campus_market_server::escrow::{EscrowGateway, SolanaEscrowGateway};
    use campus_market_server::notifications::{DbNotificationSink, NotificationSink};
    use campus_market_server::order::{CreateOrderRequest, OrderService, OrderStatus};
    use campus_market_server::wallet::WalletService;

    /// Helper to create a test database pool
    async fn setup_test_db() -> PgPool {
        let database_url = std::env::var("TEST_DATABASE_URL")
            .unwrap_or_else(|_| "postgresql://localhost/campus_market_test".to_string());

        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(2)
            .connect(&database_url)
            .await
            .expect("Failed to connect to test database");

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .expect("Failed to run migrations");

        pool
    }

    fn test_gateway() -> Arc<dyn EscrowGateway> {
        Arc::new(SolanaEscrowGateway::new(
            "https://api.devnet.solana.com".to_string(),
            "CampusMarketEscrow111".to_string(),
        ))
    }

    fn order_service(pool: &PgPool, gateway: Arc<dyn EscrowGateway>) -> OrderService {
        let sink: Arc<dyn NotificationSink> = Arc::new(DbNotificationSink::new(pool.clone()));
        OrderService::new(
            pool.clone(),
            CatalogService::new(pool.clone()),
            gateway,
            sink,
        )
    }

    fn delivery_service(pool: &PgPool, gateway: Arc<dyn EscrowGateway>) -> DeliveryService {
        let sink: Arc<dyn NotificationSink> = Arc::new(DbNotificationSink::new(pool.clone()));
        DeliveryService::new(pool.clone(), gateway, sink, 24, 10)
    }

    fn wallet_service(pool: &PgPool) -> WalletService {
        let sink: Arc<dyn NotificationSink> = Arc::new(DbNotificationSink::new(pool.clone()));
        WalletService::new(pool.clone(), sink)
    }

    /// Insert a user and return its id
    async fn seed_user(pool: &PgPool) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query("INSERT INTO users (id, username, email) VALUES ($1, $2, $3)")
            .bind(id)
            .bind(format!("user_{}", id.simple()))
            .bind(format!("{}@campus.test", id.simple()))
            .execute(pool)
            .await
            .expect("Failed to seed user");
        id
    }

    /// Insert an active listing and return its id
    async fn seed_listing(pool: &PgPool, seller_id: Uuid, price: i64, quantity: i32) -> Uuid {
        let id = Uuid::new_v4();
        sqlx::query(
            "INSERT INTO listings (id, seller_id, title, price, quantity_available) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(id)
        .bind(seller_id)
        .bind("Used calculus textbook")
        .bind(price)
        .bind(quantity)
        .execute(pool)
        .await
        .expect("Failed to seed listing");
        id
    }

    fn order_request(listing_id: Uuid, quantity: i32) -> CreateOrderRequest {
        CreateOrderRequest {
            listing_id,
            quantity,
            delivery_address: "Dorm B, Room 214".to_string(),
            notes: None,
        }
    }

    #[tokio::test]
    async fn test_create_order_request_validation() {
        let mut request = order_request(Uuid::new_v4(), 2);
        assert!(request.validate().is_ok());

        // Quantity must be at least 1
        request.quantity = 0;
        assert!(request.validate().is_err());
        request.quantity = 2;

        // Delivery address is required
        request.delivery_address = String::new();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_order_status_serialization() {
        let statuses = vec![
            OrderStatus::Pending,
            OrderStatus::Paid,
            OrderStatus::Shipped,
            OrderStatus::Completed,
            OrderStatus::Cancelled,
            OrderStatus::Disputed,
        ];

        assert_eq!(statuses.len(), 6);

        for status in statuses {
            let json = serde_json::to_string(&status).unwrap();
            assert!(!json.is_empty());
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_create_order_fixes_total_amount() {
        let pool = setup_test_db().await;
        let orders = order_service(&pool, test_gateway());

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1500, 10).await;

        let order = orders
            .create_order(buyer, order_request(listing, 3))
            .await
            .expect("Order creation should succeed");

        // total = unit price * quantity, fixed at creation time
        assert_eq!(order.total_amount, 4500);
        assert_eq!(order.status, OrderStatus::Pending);
        assert!(!order.escrow_account.is_empty());

        // Later price changes must not affect the stored total
        sqlx::query("UPDATE listings SET price = 9999 WHERE id = $1")
            .bind(listing)
            .execute(&pool)
            .await
            .unwrap();

        let reloaded = orders.get_order(&order.id).await.unwrap();
        assert_eq!(reloaded.total_amount, 4500);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_self_purchase_rejected() {
        let pool = setup_test_db().await;
        let orders = order_service(&pool, test_gateway());

        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let result = orders.create_order(seller, order_request(listing, 1)).await;
        assert!(matches!(result, Err(MarketError::InvalidState(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_only_seller_can_ship() {
        let pool = setup_test_db().await;
        let orders = order_service(&pool, test_gateway());

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();

        // The buyer is not allowed to mark the order shipped
        let result = orders.ship_order(buyer, order.id).await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));

        let shipped = orders.ship_order(seller, order.id).await.unwrap();
        assert_eq!(shipped.status, OrderStatus::Shipped);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_cancel_only_while_pending() {
        let pool = setup_test_db().await;
        let orders = order_service(&pool, test_gateway());
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 2000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();

        let cancelled = orders.cancel_order(buyer, order.id).await.unwrap();
        assert_eq!(cancelled.status, OrderStatus::Cancelled);

        // A paid order can no longer be cancelled
        let order2 = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 2000, None).await.unwrap();
        wallet.pay(buyer, order2.id).await.unwrap();

        let result = orders.cancel_order(buyer, order2.id).await;
        assert!(matches!(result, Err(MarketError::InvalidState(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_delivery_code_generation_is_idempotent() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let first = delivery.generate_code(seller, order.id).await.unwrap();
        let second = delivery.generate_code(seller, order.id).await.unwrap();

        assert_eq!(first.code, second.code);
        assert_eq!(first.id, second.id);
        assert_eq!(first.code.len(), 6);
        assert!(first.code.chars().all(|c| c.is_ascii_digit()));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_code_generation_requires_paid_order() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();

        // Still pending: no code yet
        let result = delivery.generate_code(seller, order.id).await;
        assert!(matches!(result, Err(MarketError::InvalidState(_))));

        // And only the seller may generate
        let result = delivery.generate_code(buyer, order.id).await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_redeem_completes_order_and_releases_escrow() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 3000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 3000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let code = delivery.generate_code(seller, order.id).await.unwrap();

        let response = delivery.redeem_code(buyer, &code.code).await.unwrap();
        assert_eq!(response.order_id, order.id);
        assert!(response.escrow_released);
        assert!(response.transaction_hash.is_some());

        let completed = orders.get_order(&order.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_code_is_single_use() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let code = delivery.generate_code(seller, order.id).await.unwrap();
        delivery.redeem_code(buyer, &code.code).await.unwrap();

        // Second redemption finds no unused code
        let result = delivery.redeem_code(buyer, &code.code).await;
        assert!(matches!(result, Err(MarketError::NotFound(_))));
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_expired_code_leaves_state_unchanged() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        // Insert an already-expired unused code directly
        let code = "042517";
        sqlx::query(
            "INSERT INTO delivery_codes (id, order_id, code, expires_at) \
             VALUES ($1, $2, $3, NOW() - INTERVAL '1 hour')",
        )
        .bind(Uuid::new_v4())
        .bind(order.id)
        .bind(code)
        .execute(&pool)
        .await
        .unwrap();

        let result = delivery.redeem_code(buyer, code).await;
        assert!(matches!(result, Err(MarketError::CodeExpired)));

        // Neither the code nor the order was mutated
        let (is_used,): (bool,) =
            sqlx::query_as("SELECT is_used FROM delivery_codes WHERE code = $1")
                .bind(code)
                .fetch_one(&pool)
                .await
                .unwrap();
        assert!(!is_used);

        let reloaded = orders.get_order(&order.id).await.unwrap();
        assert_eq!(reloaded.status, OrderStatus::Paid);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_only_buyer_can_redeem() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let stranger = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let code = delivery.generate_code(seller, order.id).await.unwrap();

        let result = delivery.redeem_code(stranger, &code.code).await;
        assert!(matches!(result, Err(MarketError::Forbidden(_))));

        // The code survives the failed attempt
        let response = delivery.redeem_code(buyer, &code.code).await.unwrap();
        assert_eq!(response.order_id, order.id);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_redemptions_settle_once() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway.clone());
        let delivery = delivery_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let code = delivery.generate_code(seller, order.id).await.unwrap();

        // Two redemptions race on the same code; the row lock plus the
        // conditional single-use flip let exactly one through
        let (first, second) = tokio::join!(
            delivery.redeem_code(buyer, &code.code),
            delivery.redeem_code(buyer, &code.code),
        );

        assert!(
            first.is_ok() != second.is_ok(),
            "Exactly one redemption should succeed"
        );
        let loser = if first.is_ok() { second } else { first };
        assert!(matches!(loser, Err(MarketError::NotFound(_))));

        let completed = orders.get_order(&order.id).await.unwrap();
        assert_eq!(completed.status, OrderStatus::Completed);
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_ship_and_cancel_settle_once() {
        let pool = setup_test_db().await;
        let orders = order_service(&pool, test_gateway());

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();

        // Cancel holds the order row lock across the refund, so whichever
        // side loses the race observes the winner's status and backs off
        let (shipped, cancelled) = tokio::join!(
            orders.ship_order(seller, order.id),
            orders.cancel_order(buyer, order.id),
        );

        assert!(
            shipped.is_ok() != cancelled.is_ok(),
            "Exactly one transition should win"
        );

        let settled = orders.get_order(&order.id).await.unwrap();
        if shipped.is_ok() {
            // No refund happened; the escrow is still held for the order
            assert_eq!(settled.status, OrderStatus::Shipped);
            assert!(!settled.escrow_released);
        } else {
            assert_eq!(settled.status, OrderStatus::Cancelled);
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_concurrent_confirm_and_dispute_settle_once() {
        let pool = setup_test_db().await;
        let gateway = test_gateway();
        let orders = order_service(&pool, gateway);
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let (confirmed, disputed) = tokio::join!(
            orders.confirm_delivery(buyer, order.id),
            orders.dispute_order(buyer, order.id),
        );

        assert!(
            confirmed.is_ok() != disputed.is_ok(),
            "Exactly one transition should win"
        );

        let settled = orders.get_order(&order.id).await.unwrap();
        if confirmed.is_ok() {
            assert_eq!(settled.status, OrderStatus::Completed);
            assert!(settled.escrow_released);
        } else {
            // A disputed order must never have its escrow released
            assert_eq!(settled.status, OrderStatus::Disputed);
            assert!(!settled.escrow_released);
        }
    }

    #[tokio::test]
    #[ignore] // Requires database setup
    async fn test_dispute_from_active_states() {
        let pool = setup_test_db().await;
        let orders = order_service(&pool, test_gateway());
        let wallet = wallet_service(&pool);

        let buyer = seed_user(&pool).await;
        let seller = seed_user(&pool).await;
        let listing = seed_listing(&pool, seller, 1000, 5).await;

        let order = orders
            .create_order(buyer, order_request(listing, 1))
            .await
            .unwrap();
        wallet.deposit(buyer, 1000, None).await.unwrap();
        wallet.pay(buyer, order.id).await.unwrap();

        let disputed = orders.dispute_order(buyer, order.id).await.unwrap();
        assert_eq!(disputed.status, OrderStatus::Disputed);

        // Disputing twice is rejected
        let result = orders.dispute_order(buyer, order.id).await;
        assert!(matches!(result, Err(MarketError::InvalidState(_))));
    }
}
