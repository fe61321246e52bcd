use anyhow::Result;
use file_proxy::{
    config::AppConfig,
    routes::routes,
    services::{
        remote_store::RemoteStore, s3_store::S3RemoteStore, storage_service::StorageService,
    },
};
use std::{io::ErrorKind, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config ---
    let cfg = AppConfig::from_env_and_args()?;

    tracing::info!("Starting file-proxy with config: {:?}", cfg);

    // --- Remote tier ---
    let remote: Option<Arc<dyn RemoteStore>> = match &cfg.remote {
        Some(remote_cfg) => {
            if remote_cfg.credentials.is_none() {
                tracing::info!("No static S3 credentials configured, using the default AWS chain");
            }
            let store = S3RemoteStore::connect(remote_cfg).await;
            tracing::info!("Remote tier enabled: {}", store.describe());
            Some(Arc::new(store))
        }
        None => {
            tracing::warn!("No S3 bucket configured; running local-only");
            None
        }
    };

    // --- Ensure storage directory exists ---
    let storage = StorageService::new(cfg.storage_dir.clone(), remote);
    storage.ensure_root().await?;
    tracing::info!("Local tier at {}", cfg.storage_dir.display());

    // --- Build router ---
    let app = routes::app(storage, cfg.max_upload_bytes);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!("Server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", err);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, draining connections");
}
