#![doc = include_str!("../README.md")]

mod server;

use clap::Parser;
use server::auth::TokenAuth;
use server::config::{CliArgs, ServerConfig};
use server::pool::manager::WorkerPool;
use server::service::handler::{AppState, router};
use server::store::PoolStore;
use server::synth::{PolicySynthesizer, Synthesize};
use server::telemetry::init_telemetry;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ServerConfig::try_from(args)?;

    init_telemetry()?;

    let auth = Arc::new(TokenAuth::from_digests(&config.token_digests)?);
    if auth.is_disabled() {
        tracing::warn!("no token digests configured, fetch and solve run unauthenticated");
    }

    let store = Arc::new(PoolStore::open(&config.pool_path, config.lock_timeout)?);
    let synth: Arc<dyn Synthesize> = Arc::new(PolicySynthesizer);
    let pool = Arc::new(WorkerPool::new(
        &config,
        Arc::clone(&store),
        Arc::clone(&synth),
    ));

    let state = AppState {
        config: config.clone(),
        store,
        pool: Arc::clone(&pool),
        synth,
        auth,
    };

    let listener = TcpListener::bind(&config.addr).await?;
    log_startup_info(&config);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Drain the generation workers before exiting so no insert is torn off
    // mid-flight.
    pool.shutdown().await;
    tracing::info!("service shut down successfully");
    Ok(())
}

fn log_startup_info(config: &ServerConfig) {
    if cfg!(debug_assertions) {
        tracing::info!(
            "serving boards on {} with full config: {:#?}",
            config.addr,
            config
        );
    } else {
        tracing::info!(
            "serving boards on {} with {} workers",
            config.addr,
            config.num_workers
        );
    }
}

async fn shutdown_signal() {
    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("received Ctrl+C signal");
        },
        () = terminate => {
            tracing::info!("received SIGTERM signal");
        },
    }

    tracing::info!("shutdown signal received, terminating gracefully...");
}
