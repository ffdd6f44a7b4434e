//! HTTP server lifecycle: bind, serve, drain.
//!
//! Serving stops when the hub's shutdown token is cancelled. Open
//! `WebSocket` connections are closed by the hub at the same moment; the
//! server then waits up to [`ServerConfig::shutdown_grace`] for their
//! tasks to finish before giving up on them.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tokio::task::JoinError;
use tokio::time;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::router::build_router;
use crate::state::AppState;

/// Bind the configured address and serve until shutdown.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] if the listener cannot be created and
/// [`ServerError::Serve`] if the server fails while running.
pub async fn start_server(config: &ServerConfig, state: Arc<AppState>) -> Result<(), ServerError> {
    let listener = bind(config).await?;
    serve(listener, config, state).await
}

/// Open the TCP listener for `config.host:config.port`.
pub async fn bind(config: &ServerConfig) -> Result<TcpListener, ServerError> {
    let addr = config.socket_addr_string();
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind(format!("bind failed on {addr}: {e}")))
}

/// Serve on an already-bound listener until the hub shuts down.
///
/// Returns `Ok(())` after a clean drain, and also when the grace period
/// runs out; the leftover connections are logged and abandoned.
pub async fn serve(
    listener: TcpListener,
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<(), ServerError> {
    let local = listener
        .local_addr()
        .map_err(|e| ServerError::Bind(format!("no local address: {e}")))?;

    let router = build_router(Arc::clone(&state), &config.static_dir, config.read_timeout);
    let shutdown = state.hub.shutdown_token();

    info!(
        addr = %local,
        static_dir = %config.static_dir.display(),
        "Waypost server listening"
    );

    let mut server = tokio::spawn(
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future(),
    );

    tokio::select! {
        result = &mut server => return serve_outcome(result),
        () = shutdown.cancelled() => {}
    }

    info!("Shutting down server");
    state.tracker.close();

    let drained = async {
        let served = (&mut server).await;
        state.tracker.wait().await;
        served
    };

    if let Ok(served) = time::timeout(config.shutdown_grace, drained).await {
        return serve_outcome(served);
    }

    let err = ServerError::ShutdownTimeout {
        remaining: state.tracker.len(),
        grace: config.shutdown_grace,
    };
    warn!(error = %err, "Shutdown grace period elapsed");
    server.abort();
    Ok(())
}

fn serve_outcome(result: Result<std::io::Result<()>, JoinError>) -> Result<(), ServerError> {
    match result {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(ServerError::Serve(e.to_string())),
        Err(e) => Err(ServerError::Serve(format!("server task failed: {e}"))),
    }
}

/// Resolve on Ctrl-C or, on Unix, SIGTERM.
///
/// A signal that cannot be installed is logged and never fires; the other
/// one still works.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
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
        () = ctrl_c => info!("Ctrl-C received, shutting down"),
        () = terminate => info!("SIGTERM received, shutting down"),
    }
}
