//! Atomic transfer service
//!
//! Usage:
//!   atomic_transfer [--env dev] [--port 8080]
//!
//! Environment: `DATABASE_URL`, `PORT`, `TRANSFER_BACKEND` (memory|postgres),
//! `RUST_LOG`.

use std::sync::Arc;

use anyhow::Context;
use tracing::info;

use atomic_transfer::config::{AppConfig, BackendKind};
use atomic_transfer::db::Database;
use atomic_transfer::gateway::{self, state::AppState};
use atomic_transfer::persistence::{Backend, MemoryBackend, PostgresBackend, TxOptions, schema};
use atomic_transfer::transfer::{RetryPolicy, TransferService};

// ============================================================
// COMMAND LINE
// ============================================================

fn arg_value(flags: &[&str]) -> Option<String> {
    let args: Vec<String> = std::env::args().collect();
    args.windows(2)
        .find(|pair| flags.contains(&pair[0].as_str()))
        .map(|pair| pair[1].clone())
}

fn get_env() -> String {
    arg_value(&["--env", "-e"]).unwrap_or_else(|| "dev".to_string())
}

fn get_port_override() -> Option<u16> {
    arg_value(&["--port"]).and_then(|p| p.parse().ok())
}

// ============================================================
// BOOTSTRAP
// ============================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut config =
        AppConfig::load(&env).with_context(|| format!("Failed to load config for env '{}'", env))?;
    if let Some(port) = get_port_override() {
        config.gateway.port = port;
    }
    let _log_guard = atomic_transfer::logging::init_logging(&config);

    info!(
        env = %env,
        version = env!("CARGO_PKG_VERSION"),
        git_hash = env!("GIT_HASH"),
        backend = ?config.store.backend,
        "Starting atomic transfer service"
    );

    let retry = RetryPolicy::new(config.transfer.retry_config())?;
    let options = config.transfer.tx_options();

    match config.store.backend {
        BackendKind::Memory => {
            let backend = Arc::new(MemoryBackend::with_lock_wait(config.store.lock_wait()));
            serve(&config, backend, retry, options).await
        }
        BackendKind::Postgres => {
            let url = config
                .store
                .postgres_url
                .clone()
                .context("store.postgres_url is not set")?;
            let db = Arc::new(
                Database::connect(url, config.store.max_connections, config.store.acquire_timeout())
                    .await
                    .context("Failed to connect to PostgreSQL")?,
            );
            schema::ensure_schema(db.pool().await?).await?;

            let backend = Arc::new(PostgresBackend::new(Arc::clone(&db), config.store.lock_wait()));
            let result = serve(&config, backend, retry, options).await;
            db.close().await;
            result
        }
    }
}

async fn serve<B: Backend>(
    config: &AppConfig,
    backend: Arc<B>,
    retry: RetryPolicy,
    options: TxOptions,
) -> anyhow::Result<()> {
    let service = TransferService::new(backend, retry, options);
    let state = Arc::new(AppState::new(service));
    gateway::run_server(&config.gateway.host, config.gateway.port, state).await
}
