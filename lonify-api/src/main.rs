//! # Lonify API Server
//!
//! The HTTP backend for the Lonify loan marketplace: loan catalog,
//! application lifecycle, fee payments, and user administration.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p lonify-api
//! ```

use std::sync::Arc;

use lonify_api::app::{build_router, AppState};
use lonify_api::config::Config;
use lonify_shared::db::{migrations, pool};
use lonify_shared::payments::StripeGateway;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "lonify_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Lonify API Server v{} starting...", env!("CARGO_PKG_VERSION"));

    let config = Config::from_env()?;

    let db = pool::create_pool(pool::DatabaseConfig {
        url: config.database.url.clone(),
        max_connections: config.database.max_connections,
        ..Default::default()
    })
    .await?;

    migrations::run_migrations(&db).await?;

    let payments = match &config.payment.api_base {
        Some(api_base) => Arc::new(StripeGateway::with_api_base(
            config.payment.secret_key.clone(),
            api_base.clone(),
        )),
        None => Arc::new(StripeGateway::new(config.payment.secret_key.clone())),
    };

    let bind_address = config.bind_address();
    let state = AppState::new(db.clone(), config, payments);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address).await?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    pool::close_pool(db).await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to install shutdown handler");
        return;
    }
    tracing::info!("Shutdown signal received");
}
