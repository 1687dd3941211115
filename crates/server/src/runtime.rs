// Daemon wiring: store, catalog, job manager, both transports.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{info, warn};

use folio_core::executor::Executor;
use folio_core::jobs::JobManager;

use crate::auth::AuthState;
use crate::config::ServerConfig;
use crate::http::build_router;
use crate::ops::build_registry;
use crate::rpc::unix::serve_unix_until_shutdown;
use crate::rpc::{local_session_caller, RpcServerState};
use crate::store::PlatformStore;

pub async fn run(config: ServerConfig) -> Result<()> {
    let store = Arc::new(PlatformStore::new());

    // A duplicate operation id aborts boot here, before any socket is
    // bound.
    let registry =
        build_registry(Arc::clone(&store)).context("operation catalog failed to build")?;
    info!(operations = registry.len(), "operation catalog registered");

    let jobs = JobManager::start(config.jobs.clone());
    let executor = Executor::new(Arc::new(registry), jobs.clone());

    let (shutdown_tx, _) = broadcast::channel(4);
    let ctrl_c_tx = shutdown_tx.clone();
    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        let _ = ctrl_c_tx.send(());
    });

    // Command channel: newline-delimited JSON-RPC on the daemon socket.
    #[cfg(unix)]
    {
        let socket_path = config.socket_path();
        let listener = bind_socket(&socket_path).await?;
        let rpc_state = RpcServerState::new(executor.clone(), local_session_caller())
            .with_shutdown_notifier(shutdown_tx.clone());
        let rpc_shutdown = shutdown_tx.subscribe();
        info!(socket_path = %socket_path.display(), "command channel listening");
        tokio::spawn(async move {
            if let Err(error) = serve_unix_until_shutdown(listener, rpc_state, rpc_shutdown).await
            {
                warn!(?error, "command channel terminated unexpectedly");
            }
        });
    }

    // HTTP API. Permissive CORS: the daemon binds loopback and editor
    // webviews call from app origins.
    let auth = AuthState::new(store, config.bootstrap_token.as_deref());
    let router = build_router(executor, auth).layer(CorsLayer::permissive());
    let listener = tokio::net::TcpListener::bind(config.http_addr)
        .await
        .with_context(|| format!("failed to bind http api on {}", config.http_addr))?;
    info!(http_addr = %config.http_addr, "http api listening");

    let mut http_shutdown = shutdown_tx.subscribe();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            let _ = http_shutdown.recv().await;
        })
        .await
        .context("http api terminated unexpectedly")?;

    jobs.shutdown();
    cleanup_socket(&config);
    info!("daemon stopped");
    Ok(())
}

#[cfg(unix)]
async fn bind_socket(socket_path: &Path) -> Result<tokio::net::UnixListener> {
    if let Some(parent) = socket_path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }

    // A stale socket file from an unclean exit blocks the bind.
    if socket_path.exists() {
        std::fs::remove_file(socket_path)
            .with_context(|| format!("failed to remove stale socket {}", socket_path.display()))?;
    }

    tokio::net::UnixListener::bind(socket_path)
        .with_context(|| format!("failed to bind daemon socket {}", socket_path.display()))
}

fn cleanup_socket(config: &ServerConfig) {
    #[cfg(unix)]
    {
        let _ = std::fs::remove_file(config.socket_path());
    }
    #[cfg(not(unix))]
    {
        let _ = config;
    }
}
