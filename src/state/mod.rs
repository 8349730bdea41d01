//! Application state shared across handlers

use std::sync::Arc;

use axum::extract::FromRef;
use sqlx::PgPool;

use crate::catalog::CatalogService;
use crate::delivery::DeliveryService;
use crate::escrow::EscrowGateway;
use crate::order::OrderService;
use crate::wallet::WalletService;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub order_service: Arc<OrderService>,
    pub delivery_service: Arc<DeliveryService>,
    pub wallet_service: Arc<WalletService>,
    pub catalog_service: Arc<CatalogService>,
    pub escrow_gateway: Arc<dyn EscrowGateway>,
    pub db_pool: PgPool,
}

impl AppState {
    pub fn new(
        order_service: Arc<OrderService>,
        delivery_service: Arc<DeliveryService>,
        wallet_service: Arc<WalletService>,
        catalog_service: Arc<CatalogService>,
        escrow_gateway: Arc<dyn EscrowGateway>,
        db_pool: PgPool,
    ) -> Self {
        Self {
            order_service,
            delivery_service,
            wallet_service,
            catalog_service,
            escrow_gateway,
            db_pool,
        }
    }
}

impl FromRef<AppState> for Arc<OrderService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.order_service.clone()
    }
}

impl FromRef<AppState> for Arc<DeliveryService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.delivery_service.clone()
    }
}

impl FromRef<AppState> for Arc<WalletService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.wallet_service.clone()
    }
}

impl FromRef<AppState> for Arc<CatalogService> {
    fn from_ref(app_state: &AppState) -> Self {
        app_state.catalog_service.clone()
    }
}
