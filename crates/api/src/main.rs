use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{info, warn};

use coupon_dispenser_api::{
    app::{create_app, AppState},
    config::Config,
    jobs::{JobScheduler, PoolMetricsJob, RateLimitCleanupJob},
    middleware::{init_metrics, logging::init_logging},
    services::admin_bootstrap::bootstrap_admin,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;

    init_logging(&config.logging).context("failed to initialise logging")?;
    init_metrics().context("failed to install metrics recorder")?;

    info!("Starting Coupon Dispenser API v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database.pool_config()).await?;

    info!("Running database migrations...");
    persistence::db::run_migrations(&pool).await?;
    info!("Migrations completed");

    let stores = persistence::postgres_stores(pool.clone());
    let addr = config.socket_addr()?;
    let admin_config = config.admin.clone();
    let state = AppState::new(config, stores)?;

    let outcome = bootstrap_admin(&state.auth, state.stores.admins.as_ref(), &admin_config).await?;
    info!(?outcome, "Admin bootstrap finished");

    let mut scheduler = JobScheduler::new();
    scheduler.register(PoolMetricsJob::new(pool));
    if let Some(limiter) = state.rate_limiter.clone() {
        scheduler.register(RateLimitCleanupJob::new(limiter));
    }
    scheduler.start();

    let app = create_app(state);

    info!("Server listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    scheduler.shutdown(Duration::from_secs(10)).await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
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

    info!("Shutdown signal received");
}
