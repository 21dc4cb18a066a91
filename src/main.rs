use std::path::PathBuf;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use quarters::engine::{Engine, RoomStore};
use quarters::{compactor, http, observability};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let metrics_port: Option<u16> = std::env::var("QUARTERS_METRICS_PORT")
        .ok()
        .and_then(|s| s.parse().ok());
    observability::init(metrics_port);

    let port = std::env::var("QUARTERS_PORT").unwrap_or_else(|_| "8080".into());
    let bind = std::env::var("QUARTERS_BIND").unwrap_or_else(|_| "0.0.0.0".into());
    let data_dir = std::env::var("QUARTERS_DATA_DIR").unwrap_or_else(|_| "./data".into());
    let compact_threshold: u64 = std::env::var("QUARTERS_COMPACT_THRESHOLD")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(1000);

    // Ensure data directory exists
    std::fs::create_dir_all(&data_dir)?;
    let wal_path = PathBuf::from(&data_dir).join("rooms.wal");

    let engine = Arc::new(Engine::open(RoomStore::new(), wal_path)?);
    info!("inventory loaded: {} rooms", engine.store.len());

    tokio::spawn(compactor::run_compactor(engine.clone(), compact_threshold));

    let addr = format!("{bind}:{port}");
    let listener = TcpListener::bind(&addr).await?;
    info!("quarters listening on {addr}");
    info!("  data_dir: {data_dir}");
    info!("  compact_threshold: {compact_threshold}");
    info!(
        "  metrics: {}",
        metrics_port.map_or("disabled".to_string(), |p| format!("http://0.0.0.0:{p}/metrics"))
    );

    axum::serve(listener, http::router(engine))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("quarters stopped");
    Ok(())
}

/// Resolve on SIGTERM or ctrl-c.
async fn shutdown_signal() {
    let ctrl_c = tokio::signal::ctrl_c();
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to register SIGTERM handler");
        tokio::select! {
            _ = ctrl_c => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        ctrl_c.await.ok();
    }
    info!("shutdown signal received, draining connections");
}
