use std::net::SocketAddr;
use std::sync::Arc;

use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info;

use dearly_api::clock::SystemClock;
use dearly_api::config::Config;
use dearly_api::files::BlobStore;
use dearly_api::{AppStateInner, build_router};
use dearly_db::Database;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dearly_server=debug,dearly_api=debug,dearly_db=info,tower_http=debug".into()),
        )
        .init();

    // Config
    let config = Config::from_env(|key| std::env::var(key).ok())?;

    // Init database and image storage
    let db = Database::open(&config.db_path)?;
    let blobs = BlobStore::new(config.upload_dir.clone()).await?;

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!(
        "Letters unlock {}s after sending",
        config.delivery_delay.num_seconds()
    );

    let state = AppStateInner::new(Arc::new(db), Arc::new(SystemClock), config, blobs);

    let app = build_router(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    info!("Dearly server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm =
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("SIGTERM handler unavailable: {}", e);
                    ctrl_c.await.ok();
                    return;
                }
            };
        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, shutting down..."),
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down..."),
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
        info!("Received Ctrl+C, shutting down...");
    }
}
