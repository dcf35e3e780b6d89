//! Application entry point and server initialization
//!
//! This module contains the main function that:
//! - Loads environment configuration
//! - Initializes the database and optional product seed
//! - Starts the HTTP server with graceful shutdown support

use std::error::Error;
use std::path::Path;

use axum::{extract::Request, ServiceExt};
use chrono::Duration;
use dotenvy::dotenv;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use ecommerce::auth::TokenKeys;
use ecommerce::catalog;
use ecommerce::config::Config;
use ecommerce::database::{init_db, AppState};
use ecommerce::model::Product;
use ecommerce::route::{create_app, trim_trailing_slash};

/// Application entry point
///
/// 1. Loads environment variables from a `.env` file
/// 2. Reads [`Config`] from the environment
/// 3. Initializes the embedded database and loads the product seed, if any
/// 4. Creates the application state and router
/// 5. Starts the HTTP server with graceful shutdown handling
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("ecommerce=debug,tower_http=debug")),
        )
        .init();

    let config = Config::from_env();

    let db = init_db(&config.database_path)?;
    if let Some(seed) = &config.product_seed {
        load_products(&db, seed)?;
    }

    let keys = TokenKeys::new(&config.jwt_secret, Duration::hours(config.token_ttl_hours));
    let state = AppState::new(db, keys);

    let app = trim_trailing_slash(create_app(state).layer(TraceLayer::new_for_http()));

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = TcpListener::bind(&addr).await?;

    tracing::info!(%addr, database = %config.database_path, "server listening");

    axum::serve(listener, ServiceExt::<Request>::into_make_service(app))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Upserts every product from a JSON array file
fn load_products(db: &redb::Database, path: &Path) -> Result<(), Box<dyn Error>> {
    let raw = std::fs::read_to_string(path)?;
    let products: Vec<Product> = serde_json::from_str(&raw)?;
    for product in &products {
        catalog::upsert_product(db, product)?;
    }
    tracing::info!(count = products.len(), path = %path.display(), "loaded product seed");
    Ok(())
}

/// Resolves on SIGINT (Ctrl+C) or, on Unix, SIGTERM
///
/// Open connections are allowed to finish so no write transaction is cut
/// off halfway.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("shutdown signal received, stopping server");
}
