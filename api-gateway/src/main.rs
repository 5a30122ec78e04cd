// api-gateway/src/main.rs

//! API gateway binary.
//!
//! Runs a full replica node and exposes its committed state over HTTP:
//!
//! - `GET /health`
//! - `GET /status`
//! - `GET /balance?address=<hex>`
//! - `GET /rootHash?blockNumber=<n>` (also queried by peer replicas)
//!
//! The embedded node keeps its Prometheus exporter on `/metrics`.

mod config;
mod routes;
mod state;

use std::future::Future;
use std::sync::Arc;

use axum::Router;
use clap::Parser;
use eyre::WrapErr;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use config::ApiConfig;
use replica::{Node, NodeArgs};
use state::{AppState, SharedState};

#[derive(Parser, Debug)]
#[command(
    name = "api-gateway",
    version,
    about = "Replica node with an HTTP query facade"
)]
struct Cli {
    #[command(flatten)]
    api: ApiConfig,
    #[command(flatten)]
    node: NodeArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("api_gateway=info,replica=info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> eyre::Result<()> {
    let node_cfg = cli
        .node
        .into_config()
        .wrap_err("failed to load genesis allocations")?;
    let node = Node::open(node_cfg).wrap_err("failed to start replica")?;

    let app_state: SharedState = Arc::new(AppState {
        query: node.query(),
    });
    let app = routes::router(app_state);

    let (stop_tx, stop_rx) = watch::channel(false);
    let stop = Arc::new(stop_tx);
    tokio::spawn({
        let stop = stop.clone();
        async move {
            shutdown_signal().await;
            let _ = stop.send(true);
        }
    });

    tracing::info!("API gateway listening on http://{}", cli.api.listen_addr);

    let listener = TcpListener::bind(cli.api.listen_addr)
        .await
        .wrap_err_with(|| format!("failed to bind {}", cli.api.listen_addr))?;

    serve(listener, app, node.run(stopped(stop_rx)), stop).await
}

/// Serves `app` next to the replica until shutdown is requested or the
/// replica stops. The replica's error, if any, is returned.
async fn serve<R, E>(
    listener: TcpListener,
    app: Router,
    replica: R,
    stop: Arc<watch::Sender<bool>>,
) -> eyre::Result<()>
where
    R: Future<Output = Result<(), E>> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    let server_stop = stopped(stop.subscribe());

    let node_task = tokio::spawn(async move {
        let result = replica.await;
        if let Err(e) = &result {
            tracing::error!("replica stopped: {e}");
        }
        let _ = stop.send(true);
        result
    });

    axum::serve(listener, app)
        .with_graceful_shutdown(server_stop)
        .await
        .wrap_err("API server error")?;

    node_task
        .await
        .wrap_err("replica task panicked")?
        .wrap_err("checkpoint coordinator stopped")?;

    Ok(())
}

/// Resolves once shutdown was requested.
async fn stopped(mut rx: watch::Receiver<bool>) {
    let _ = rx.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
