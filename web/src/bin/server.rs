//! Payment reconciliation server.
//!
//! Wires the Redis-backed guard, ledger, counters and cart links, the HTTP
//! clients for invoicing, issuance and notifications, and serves
//! `GET /poll/{reference}`.
//!
//! # Usage
//!
//! ```bash
//! # Start Redis
//! docker run -p 6379:6379 redis:7
//!
//! # Run server (reads .env if present)
//! cargo run --bin server
//! ```

use bus_booking_reconcile::providers::IdempotencyGuard;
use bus_booking_reconcile::stores::{
    self, FallbackIdempotencyGuard, InMemoryIdempotencyGuard, RedisCartResolver,
    RedisCounterStore, RedisIdempotencyGuard, RedisPurchaseLedger,
};
use bus_booking_reconcile::clients::{HttpInvoicingClient, HttpIssuanceClient, WebhookNotifier};
use bus_booking_reconcile::{
    BookingFinalizer, Config, InvoiceStatePoller, PurchaseDefaults, SideEffectDispatcher,
};
use bus_booking_web::{AppState, build_router};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "info,bus_booking_reconcile=debug,bus_booking_web=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting payment reconciliation server...");

    let config = Config::from_env();
    info!(
        redis = %config.redis.url,
        invoicing = %config.invoicing.base_url,
        issuance = %config.issuance.base_url,
        notifications = %config.notifications.base_url,
        "Configuration loaded"
    );

    let metrics_handle = if config.server.metrics_enabled {
        Some(bus_booking_web::metrics::install_recorder()?)
    } else {
        None
    };

    let conn = stores::connect(&config.redis.url).await?;
    let prefix = config.redis.key_prefix.as_str();

    let redis_guard = Arc::new(RedisIdempotencyGuard::new(
        conn.clone(),
        config.guard_settings(),
        prefix,
    ));
    let guard: Arc<dyn IdempotencyGuard> = if config.guard.in_memory_fallback {
        tracing::warn!(
            "In-memory guard fallback enabled: during a Redis outage mutual exclusion holds only within this instance"
        );
        Arc::new(FallbackIdempotencyGuard::new(
            redis_guard,
            InMemoryIdempotencyGuard::new(config.guard_settings()),
        ))
    } else {
        redis_guard
    };

    let invoicing = Arc::new(HttpInvoicingClient::new(
        &config.invoicing.base_url,
        config.invoicing.api_token.clone(),
        Duration::from_secs(config.invoicing.timeout_secs),
    )?);
    let issuance = Arc::new(HttpIssuanceClient::new(
        &config.issuance.base_url,
        config.issuance.api_token.clone(),
        Duration::from_secs(config.issuance.timeout_secs),
    )?);
    let notifier = Arc::new(WebhookNotifier::new(
        &config.notifications.base_url,
        Duration::from_secs(config.notifications.timeout_secs),
    )?);

    let finalizer = BookingFinalizer::new(
        InvoiceStatePoller::new(
            invoicing.clone(),
            Arc::new(RedisCartResolver::new(conn.clone(), prefix)),
        ),
        guard,
        issuance,
        Arc::new(RedisPurchaseLedger::new(
            conn.clone(),
            Duration::from_secs(config.ledger.retention_secs),
            prefix,
        )),
        SideEffectDispatcher::new(
            invoicing,
            notifier,
            Arc::new(RedisCounterStore::new(conn.clone(), prefix)),
        )
        .with_timeout(Duration::from_millis(config.effects.timeout_ms)),
    )
    .with_purchase_defaults(PurchaseDefaults {
        locale: config.issuance.default_locale.clone(),
        currency: config.issuance.default_currency.clone(),
    });
    info!("Finalizer initialized");

    let mut state = AppState::new(Arc::new(finalizer)).with_redis(conn);
    if let Some(handle) = metrics_handle {
        state = state.with_metrics(handle);
    }
    let app = build_router(state);

    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

/// Resolve on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down gracefully...");
        },
        () = terminate => {
            info!("Received SIGTERM signal, shutting down gracefully...");
        },
    }
}
