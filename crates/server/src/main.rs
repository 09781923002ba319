use anyhow::Context;
use folio_server::{
    api::{build_router, AppState},
    config::{LogFormat, ServerConfig},
    db::{migrations::run_migrations, pool::create_pg_pool},
    dispatch::Dispatcher,
    store::Store,
};
use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::from_env();
    init_tracing(&config);

    let store = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = create_pg_pool(database_url, config.pool.clone(), config.require_tls).await?;
            run_migrations(&pool).await?;
            Store::postgres(pool, config.storage_timeout)
        }
        None => {
            warn!("FOLIO_DATABASE_URL is not set; pages live in memory and vanish on restart");
            Store::memory(config.storage_timeout)
        }
    };

    let app = build_router(AppState::new(Dispatcher::new(store.clone()), config.gateway_token.clone()));
    if config.gateway_token.is_none() {
        warn!("FOLIO_GATEWAY_TOKEN is not set; the interactions endpoint accepts any caller");
    }

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind folio listener on {}", config.listen_addr))?;

    info!(
        listen_addr = %config.listen_addr,
        backend = store.backend_name(),
        storage_timeout_ms = config.storage_timeout.as_millis() as u64,
        "starting folio server"
    );

    let served = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("folio server exited unexpectedly");

    store.close().await;
    info!("folio server stopped");
    served
}

fn init_tracing(config: &ServerConfig) {
    let filter = EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(error) = tokio::signal::ctrl_c().await {
            error!(%error, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(error) => {
                error!(%error, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }

    info!("shutdown signal received");
}
