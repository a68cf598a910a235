mod api;
mod middleware;
mod scheduler;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use themeradar_broadcast::BroadcastHub;
use themeradar_collect::{BackoffPolicy, CancelFlag, RateGovernor};

use crate::api::{build_app, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = Arc::new(themeradar_core::load_app_config()?);
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = themeradar_db::PoolConfig::from_app_config(&config);
    let pool = themeradar_db::connect_pool(&config.database_url, pool_config).await?;
    let applied = themeradar_db::run_migrations(&pool).await?;
    if applied > 0 {
        tracing::info!(applied, "applied pending migrations");
    }

    let sources = Arc::new(themeradar_core::load_sources(&config.sources_path)?);
    let governor = Arc::new(RateGovernor::new(
        &sources,
        BackoffPolicy {
            base_ms: config.collect_backoff_base_ms,
            cap_ms: config.collect_backoff_cap_ms,
            jitter_ms: config.collect_backoff_jitter_ms,
        },
    ));
    let hub = Arc::new(BroadcastHub::default());
    let cancel = CancelFlag::new();

    let state = AppState {
        pool: pool.clone(),
        config: Arc::clone(&config),
        sources,
        governor,
        hub: Arc::clone(&hub),
        cancel: cancel.clone(),
    };

    let _scheduler = scheduler::build_scheduler(pool, Arc::clone(&config), hub).await?;

    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(cancel))
        .await?;
    Ok(())
}

async fn shutdown_signal(cancel: CancelFlag) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to listen for ctrl-c");
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
        () = ctrl_c => {},
        () = terminate => {},
    }

    // In-flight collection loops check this between attempts and drain out.
    cancel.cancel();
    tracing::info!("received shutdown signal, starting graceful shutdown");
}
