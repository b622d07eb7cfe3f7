pub mod handlers;
pub mod state;
pub mod types;

use axum::{
    Router,
    routing::{delete, get, post},
};
use std::sync::Arc;
use tokio::net::TcpListener;

use crate::persistence::Backend;
use state::AppState;

/// Build the gateway router over any backend
pub fn router<B: Backend>(state: Arc<AppState<B>>) -> Router {
    Router::new()
        // Health check
        .route("/health", get(handlers::health_check::<B>))
        // Account management
        .route(
            "/accounts",
            post(handlers::create_account::<B>).get(handlers::list_accounts::<B>),
        )
        .route("/accounts/{owner}", delete(handlers::delete_account::<B>))
        .route(
            "/accounts/{owner}/transactions",
            get(handlers::get_account_transactions::<B>),
        )
        // Transfers
        .route("/transactions", post(handlers::create_transfer::<B>))
        .with_state(state)
}

/// Serve until Ctrl-C or SIGTERM, then drain in-flight requests
pub async fn run_server<B: Backend>(
    host: &str,
    port: u16,
    state: Arc<AppState<B>>,
) -> anyhow::Result<()> {
    let backend = state.backend.name();
    let app = router(state);

    let addr = format!("{}:{}", host, port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(addr = %addr, backend, "Gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Ctrl-C received, shutting down"),
        _ = terminate => tracing::info!("SIGTERM received, shutting down"),
    }
}
