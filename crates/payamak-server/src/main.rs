//! Payamak - SMS campaign server entry point

use anyhow::Result;
use payamak_api::AppState;
use payamak_common::config::Config;
use payamak_core::{
    CampaignService, DispatchService, OkitClient, PgDispatchStore, SchedulerWorker,
};
use payamak_storage::db::DatabasePool;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first so the logging section applies
    let config = Config::load()?;
    init_logging(&config.logging.level, &config.logging.format);

    info!("Starting Payamak server...");

    // Initialize database
    let db_pool = DatabasePool::new(&config.database).await?;
    info!("Database connection established");

    // Run migrations
    db_pool.migrate().await?;
    info!("Database migrations completed");

    // Gateway client
    let gateway = Arc::new(OkitClient::new(config.gateway.clone())?);
    info!(endpoint = %config.gateway.endpoint, "Gateway client ready");

    // Dispatch engine
    let store = Arc::new(PgDispatchStore::new(&db_pool));
    let dispatch = DispatchService::new(
        Arc::clone(&store),
        gateway,
        config.dispatch.clone(),
    );

    // Scheduler worker
    let scheduler_handle = if config.scheduler.enabled {
        let worker = SchedulerWorker::new(
            Arc::clone(&store),
            dispatch.clone(),
            config.scheduler.poll_interval_secs,
        );
        Some(tokio::spawn(async move {
            worker.run().await;
        }))
    } else {
        info!("Scheduler worker disabled");
        None
    };

    // API server
    let state = Arc::new(AppState {
        db_pool: db_pool.clone(),
        campaigns: CampaignService::new(&db_pool),
        dispatch,
        auth_token: config.api.auth_token.clone(),
    });

    let api_handle = {
        let bind_address = config.server.bind_address.clone();
        let api_port = config.api.port;
        tokio::spawn(async move {
            let app = payamak_api::create_router(state);
            let listener =
                tokio::net::TcpListener::bind(format!("{}:{}", bind_address, api_port))
                    .await
                    .expect("Failed to bind API server");
            info!("Starting API server on port {}", api_port);
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!("API server error: {}", e);
            }
        })
    };

    info!("Payamak server started successfully");

    // Wait for shutdown signal
    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    // Cleanup
    api_handle.abort();
    if let Some(handle) = scheduler_handle {
        handle.abort();
    }

    info!("Payamak server shutdown complete");

    Ok(())
}

fn init_logging(level: &str, format: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("{},payamak=debug", level)));

    let registry = tracing_subscriber::registry().with(filter);

    if format == "json" {
        registry.with(fmt::layer().json()).init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_level(true))
            .init();
    }
}
