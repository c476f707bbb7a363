use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use exobooking_api::{app, state::{AppState, AuthConfig}};
use exobooking_core::{InventoryStore, MemoryStore};
use exobooking_store::app_config::{Config, StorageBackend};
use exobooking_store::{seed, DbClient, PgInventoryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "exobooking_api=debug,exobooking_core=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().context("Failed to load config")?;
    tracing::info!("Starting ExoBooking API on port {}", config.server.port);

    let store: Arc<dyn InventoryStore> = match config.storage.backend {
        StorageBackend::Memory => {
            tracing::warn!("Using in-process storage; inventory is lost on restart");
            Arc::new(MemoryStore::new())
        }
        StorageBackend::Postgres => {
            let db = DbClient::new(&config.database, config.engine.hold_timeout())
                .await
                .context("Failed to connect to Postgres")?;
            db.migrate().await.context("Failed to run migrations")?;
            Arc::new(PgInventoryStore::new(db.pool))
        }
    };

    let app_state = AppState::new(
        store,
        config.engine.hold_timeout(),
        AuthConfig {
            secret: config.auth.jwt_secret.clone(),
        },
    );

    if config.seed.enabled {
        seed::seed_test_data(&app_state.engine)
            .await
            .context("Failed to seed demo inventory")?;
    }

    let app = app(app_state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
    tracing::info!("Shutting down");
}
