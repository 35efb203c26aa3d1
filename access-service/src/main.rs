//! Access service entry point.

use access_service::{build_router, config::AccessConfig, db, AppState};
use access_service::config::Environment;
use access_service::services::password;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio::signal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let config = AccessConfig::from_env().map_err(|e| anyhow::anyhow!(e.to_string()))?;

    service_core::observability::init_tracing(
        &config.service_name,
        &config.log_level,
        config.environment == Environment::Prod,
    );

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        environment = ?config.environment,
        "Starting access-service"
    );

    let master_pool = db::create_pool(&config.database).await?;
    db::run_migrations(&master_pool).await?;

    let port = config.port;
    let state = AppState::new(config, master_pool).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    // Background password-expiry sweep.
    password::spawn_expiry_job(state.passwords.clone());

    let router = build_router(state.clone()).map_err(|e| anyhow::anyhow!(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("HTTP server listening on {}", addr);

    axum::serve(listener, router.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    state.pools.close_all().await;
    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c().await.expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
