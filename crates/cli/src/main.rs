//! Binary entrypoint. Mirrors the teacher's `main.rs` shape (dotenv, parse,
//! telemetry, run) but this process has a single always-on job: serve the
//! HTTP/WS surface and keep the chat ingress connected, not dispatch
//! subcommands.

mod bus_task;
mod chat_task;
mod config;
mod error;
mod shutdown;
mod telemetry;
mod wiring;

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info, warn};

use config::{Cli, Config};

/// How long shutdown gives each stage to finish before moving on (§5, §6).
const SHUTDOWN_STAGE_TIMEOUT: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = match Config::from_cli(cli) {
        Ok(config) => config,
        Err(err) => {
            // Telemetry isn't up yet; this is the one place we print plainly.
            eprintln!("ttsrelay: configuration error: {err}");
            std::process::exit(1);
        }
    };

    telemetry::init(&config.log_level, config.json_logs);
    info!(version = env!("CARGO_PKG_VERSION"), "starting ttsrelay");

    match run(config).await {
        Ok(()) => {
            info!("shutdown complete");
            std::process::exit(0);
        }
        Err(err) => {
            error!(error = %err, "fatal error during startup");
            std::process::exit(1);
        }
    }
}

async fn run(config: Config) -> anyhow::Result<()> {
    let runtime = wiring::build(&config).await?;
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let chat_ingress = chat_task::spawn(
        &config,
        runtime.engine.clone(),
        runtime.bus.clone(),
        runtime.channels.clone(),
        runtime.managed_channels.clone(),
        runtime.viewer_prefs.clone(),
        runtime.lease_store.clone(),
        runtime.session_registry.clone(),
        shutdown_rx.clone(),
    );
    let bus_task_handle = bus_task::spawn(runtime.bus.clone(), runtime.engine.clone());

    let router = ttsrelay_gateway::build_router(runtime.app_state.clone(), &config.cors_origin);
    let addr: SocketAddr = format!("{}:{}", config.bind, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "listening");

    let server_shutdown_rx = shutdown_rx.clone();
    let server_task = tokio::spawn(async move {
        axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
            .with_graceful_shutdown(shutdown::wait_for_true(server_shutdown_rx))
            .await
    });

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, draining");
    let _ = shutdown_tx.send(true);

    // Stop accepting new HTTP/WS connections first.
    if tokio::time::timeout(SHUTDOWN_STAGE_TIMEOUT, server_task).await.is_err() {
        warn!("http server did not stop within the shutdown deadline");
    }

    // Stop the channel-sync/lease loops and disconnect the chat transport,
    // which also clears its outbound join/part queue on drop.
    if tokio::time::timeout(SHUTDOWN_STAGE_TIMEOUT, chat_ingress.shutdown()).await.is_err() {
        warn!("chat ingress did not disconnect within the shutdown deadline");
    }

    // Flush every channel's pending queue to the snapshot store before exit.
    runtime.engine.persist_all().await;
    runtime.engine.shutdown();

    if tokio::time::timeout(SHUTDOWN_STAGE_TIMEOUT, bus_task_handle).await.is_err() {
        warn!("bus consumer task did not stop within the shutdown deadline");
    }

    runtime.pool.close().await;
    Ok(())
}
