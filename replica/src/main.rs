// replica/src/main.rs
//
// Headless replica node:
//
// - RocksDB or in-memory ledger, seeded from an optional genesis file
// - chain feed preloaded from an optional JSON block file
// - quorum validation against peer replicas over HTTP
// - Prometheus metrics exporter on /metrics
// - runs until Ctrl-C, then closes the ledger cleanly.

use clap::Parser;
use eyre::WrapErr;
use tracing_subscriber::EnvFilter;

use replica::{Node, NodeArgs};

#[derive(Parser, Debug)]
#[command(name = "replica", version, about = "Quorum-validated balance replica")]
struct Cli {
    #[command(flatten)]
    node: NodeArgs,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("replica=info,api_gateway=info")),
        )
        .init();

    if let Err(err) = run_node(Cli::parse()).await {
        tracing::error!("fatal error: {err:#}");
        std::process::exit(1);
    }
}

async fn run_node(cli: Cli) -> eyre::Result<()> {
    let config = cli
        .node
        .into_config()
        .wrap_err("failed to load genesis allocations")?;

    let node = Node::open(config).wrap_err("failed to start replica")?;
    node.run(shutdown_signal())
        .await
        .wrap_err("checkpoint coordinator stopped")?;

    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
