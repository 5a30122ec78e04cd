//! Prometheus-backed metrics and HTTP exporter.
//!
//! This module defines a [`MetricsRegistry`] that owns a Prometheus
//! registry and the checkpoint metrics, and an async HTTP exporter that
//! serves `/metrics` using `hyper`.

use std::{convert::Infallible, net::SocketAddr, sync::Arc};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{
    Method, Request, Response, StatusCode, body::Incoming, header, server::conn::http1,
    service::service_fn,
};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;
use tracing::{debug, error};

use prometheus::{
    self, Encoder, Histogram, HistogramOpts, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

/// Metrics updated by the checkpoint coordinator.
#[derive(Clone)]
pub struct CheckpointMetrics {
    /// Rounds whose digest was confirmed and committed.
    pub rounds_committed: IntCounter,
    /// Rounds discarded, labelled by `reason` (`quorum` or `storage`).
    pub rounds_reverted: IntCounterVec,
    /// Transactions applied to staged state.
    pub transactions_applied: IntCounter,
    /// Transactions skipped, labelled by rejection `kind`.
    pub transactions_rejected: IntCounterVec,
    /// Block number of the latest committed checkpoint.
    pub last_committed_block: IntGauge,
    /// Time from block progress to the round's decision.
    pub round_seconds: Histogram,
}

impl CheckpointMetrics {
    /// Registers checkpoint metrics into the given `Registry`.
    pub fn register(registry: &Registry) -> Result<Self, prometheus::Error> {
        let rounds_committed = IntCounter::with_opts(Opts::new(
            "checkpoint_rounds_committed_total",
            "Validation rounds that reached quorum and were committed",
        ))?;
        registry.register(Box::new(rounds_committed.clone()))?;

        let rounds_reverted = IntCounterVec::new(
            Opts::new(
                "checkpoint_rounds_reverted_total",
                "Validation rounds whose staged writes were discarded",
            ),
            &["reason"],
        )?;
        registry.register(Box::new(rounds_reverted.clone()))?;

        let transactions_applied = IntCounter::with_opts(Opts::new(
            "checkpoint_transactions_applied_total",
            "Transactions applied to the staged ledger",
        ))?;
        registry.register(Box::new(transactions_applied.clone()))?;

        let transactions_rejected = IntCounterVec::new(
            Opts::new(
                "checkpoint_transactions_rejected_total",
                "Transactions skipped by the applier",
            ),
            &["kind"],
        )?;
        registry.register(Box::new(transactions_rejected.clone()))?;

        let last_committed_block = IntGauge::with_opts(Opts::new(
            "checkpoint_last_committed_block",
            "Block number of the latest committed checkpoint",
        ))?;
        registry.register(Box::new(last_committed_block.clone()))?;

        let round_seconds = Histogram::with_opts(
            HistogramOpts::new(
                "checkpoint_round_seconds",
                "Time to apply a block and decide its checkpoint, in seconds",
            )
            .buckets(vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
        )?;
        registry.register(Box::new(round_seconds.clone()))?;

        Ok(Self {
            rounds_committed,
            rounds_reverted,
            transactions_applied,
            transactions_rejected,
            last_committed_block,
            round_seconds,
        })
    }
}

/// Wrapper around a Prometheus registry and the checkpoint metrics.
///
/// This is the main handle you pass around in the node. It can be wrapped
/// in an [`Arc`] and shared across threads/tasks.
#[derive(Clone)]
pub struct MetricsRegistry {
    registry: Registry,
    pub checkpoint: CheckpointMetrics,
}

impl MetricsRegistry {
    /// Creates a new `MetricsRegistry` with a fresh underlying `Registry`
    /// and registers the checkpoint metrics.
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new_custom(Some("replica".to_string()), None)?;
        let checkpoint = CheckpointMetrics::register(&registry)?;
        Ok(Self {
            registry,
            checkpoint,
        })
    }

    /// Encodes all metrics in this registry into the Prometheus text format.
    pub fn gather_text(&self) -> String {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            error!("failed to encode Prometheus metrics: {e}");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

/// Runs an HTTP server that exposes Prometheus metrics.
///
/// The server listens on `addr` and serves `GET /metrics` with the
/// Prometheus text exposition format. All other paths return 404.
pub async fn run_prometheus_http_server(
    metrics: Arc<MetricsRegistry>,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    serve_metrics(listener, metrics).await
}

/// Serves `/metrics` on an already bound listener.
pub async fn serve_metrics(
    listener: TcpListener,
    metrics: Arc<MetricsRegistry>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    loop {
        let (stream, peer) = listener.accept().await?;
        debug!(%peer, "metrics scrape connection");
        let io = TokioIo::new(stream);
        let metrics = metrics.clone();

        tokio::spawn(async move {
            let svc = service_fn(move |req| {
                let metrics = metrics.clone();
                handle_request(req, metrics)
            });

            if let Err(err) = http1::Builder::new().serve_connection(io, svc).await {
                error!("prometheus HTTP server error: {err}");
            }
        });
    }
}

fn plain_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, header::HeaderValue::from_static(content_type));
    response
}

async fn handle_request(
    req: Request<Incoming>,
    metrics: Arc<MetricsRegistry>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => Ok(plain_response(
            StatusCode::OK,
            "text/plain; version=0.0.4",
            metrics.gather_text(),
        )),
        _ => Ok(plain_response(
            StatusCode::NOT_FOUND,
            "text/plain",
            "not found".to_string(),
        )),
    }
}
