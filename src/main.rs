//! Campus Market Backend Server
//!
//! Order/escrow/delivery-code lifecycle service for the campus marketplace:
//! buyers lock funds in escrow at order time, sellers issue single-use
//! delivery codes, and redemption releases the escrow to the seller.

use axum::http::{HeaderValue, Method};
use axum::{routing::get, Json, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::cors::{Any, CorsLayer};

use campus_market_server::catalog::CatalogService;
use campus_market_server::config::Config;
use campus_market_server::delivery::DeliveryService;
use campus_market_server::escrow::{release_reconciler, EscrowGateway, SolanaEscrowGateway};
use campus_market_server::notifications::{DbNotificationSink, NotificationSink};
use campus_market_server::order::OrderService;
use campus_market_server::wallet::WalletService;
use campus_market_server::{db, middleware, routes, state::AppState};

#[tokio::main]
async fn main() {
    // Load configuration
    let config = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level)),
        )
        .with_target(true)
        .init();

    tracing::info!(environment = config.environment.as_str(), "Starting up");

    // Database pool + migrations
    let db_pool = match db::create_pool(&config).await {
        Ok(pool) => pool,
        Err(e) => {
            tracing::error!("Failed to connect to database: {}", e);
            std::process::exit(1);
        }
    };
    if let Err(e) = db::run_migrations(&db_pool).await {
        tracing::error!("Failed to run migrations: {}", e);
        std::process::exit(1);
    }

    // External collaborators
    let escrow_gateway: Arc<dyn EscrowGateway> = Arc::new(SolanaEscrowGateway::new(
        config.solana_rpc_url.clone(),
        config.escrow_program_id.clone(),
    ));
    let sink: Arc<dyn NotificationSink> = Arc::new(DbNotificationSink::new(db_pool.clone()));

    // Domain services
    let catalog_service = Arc::new(CatalogService::new(db_pool.clone()));
    let order_service = Arc::new(OrderService::new(
        db_pool.clone(),
        (*catalog_service).clone(),
        escrow_gateway.clone(),
        sink.clone(),
    ));
    let delivery_service = Arc::new(DeliveryService::new(
        db_pool.clone(),
        escrow_gateway.clone(),
        sink.clone(),
        config.delivery_code_ttl_hours,
        config.delivery_code_max_attempts,
    ));
    let wallet_service = Arc::new(WalletService::new(db_pool.clone(), sink.clone()));

    let app_state = AppState::new(
        order_service,
        delivery_service,
        wallet_service,
        catalog_service,
        escrow_gateway.clone(),
        db_pool.clone(),
    );

    // Retry escrow releases that failed after delivery confirmation
    let reconciler_pool = db_pool.clone();
    let reconciler_gateway = escrow_gateway.clone();
    let reconcile_interval = config.reconcile_interval_secs;
    tokio::spawn(async move {
        release_reconciler(reconciler_pool, reconciler_gateway, reconcile_interval).await;
        tracing::error!("Release reconciler task exited unexpectedly");
    });

    // Create the app router
    let app = Router::new()
        .route("/", get(root))
        .route("/health", get(health_check))
        .merge(routes::order_routes())
        .merge(routes::delivery_routes())
        .merge(routes::wallet_routes())
        .merge(routes::catalog_routes())
        .with_state(app_state)
        .layer(axum::middleware::from_fn(middleware::security_headers))
        .layer(axum::middleware::from_fn(middleware::request_tracing))
        .layer(configure_cors(&config));

    let addr = SocketAddr::from(([127, 0, 0, 1], config.port));

    tracing::info!("Server listening on {}", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!("Failed to bind {}: {}", addr, e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        tracing::error!("Server error: {}", e);
    }

    tracing::info!("Server shutdown complete");
}

async fn root() -> &'static str {
    "Campus Market API Server"
}

/// Health check response
#[derive(serde::Serialize)]
struct HealthResponse {
    status: String,
    database: String,
    escrow_rpc: String,
    version: String,
}

/// Health check endpoint: database plus escrow RPC reachability
async fn health_check(
    axum::extract::State(state): axum::extract::State<AppState>,
) -> Json<HealthResponse> {
    let database = match db::check_health(&state.db_pool).await {
        Ok(()) => "connected".to_string(),
        Err(e) => format!("error: {}", e),
    };
    let escrow_rpc = if state.escrow_gateway.healthy().await {
        "reachable".to_string()
    } else {
        "unreachable".to_string()
    };

    let status = if database == "connected" {
        "healthy"
    } else {
        "unhealthy"
    };

    Json(HealthResponse {
        status: status.to_string(),
        database,
        escrow_rpc,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn configure_cors(config: &Config) -> CorsLayer {
    let allowed = config.cors_allowed_origins.clone().unwrap_or_default();

    if allowed.is_empty() {
        tracing::warn!("CORS_ALLOWED_ORIGINS not set, allowing all origins (permissive)");
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = allowed
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating graceful shutdown...");
        }
        _ = terminate => {
            tracing::info!("Received SIGTERM, initiating graceful shutdown...");
        }
    }
}
