use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::info;

use storefront_api::config::{init_tracing, load_config};
use storefront_api::db::{ensure_schema, establish_connection};
use storefront_api::events::{process_events, EventSender};
use storefront_api::handlers::AppServices;
use storefront_api::payments::HttpPaymentGateway;
use storefront_api::services::{CartService, CatalogService, CheckoutService};
use storefront_api::{app_router, AppState};

const EVENT_CHANNEL_CAPACITY: usize = 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;
    init_tracing(&config.log_level, config.log_json);

    let db = Arc::new(
        establish_connection(&config)
            .await
            .context("failed to connect to database")?,
    );
    if config.auto_migrate {
        ensure_schema(&db).await.context("failed to prepare schema")?;
    }

    let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
    let event_sender = EventSender::new(tx);
    tokio::spawn(process_events(rx));

    let gateway = Arc::new(HttpPaymentGateway::new(
        config.payment_base_url.clone(),
        config.payment_key_id.clone(),
        config.payment_key_secret.clone(),
        Duration::from_secs(config.payment_timeout_secs),
    )?);

    let services = AppServices::new(
        CatalogService::new(db.clone(), event_sender.clone()),
        CartService::new(db.clone(), event_sender.clone()),
        CheckoutService::new(
            db.clone(),
            gateway,
            event_sender.clone(),
            config.currency.clone(),
            config.order_retention_days,
        ),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let state = AppState {
        db,
        config,
        event_sender,
        services,
    };
    let app = app_router(state);

    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    info!(%addr, "server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("shutdown signal received");
}
