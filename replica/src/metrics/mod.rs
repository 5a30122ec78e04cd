//! Metrics and instrumentation for the replica.
//!
//! This module defines Prometheus-compatible metrics for the checkpoint
//! coordinator and exposes a small HTTP exporter that serves `/metrics` in
//! Prometheus text format.
//!
//! Typical usage in a node:
//!
//! ```ignore
//! use std::sync::Arc;
//! use replica::metrics::{MetricsRegistry, run_prometheus_http_server};
//!
//! let registry = Arc::new(MetricsRegistry::new()?);
//! tokio::spawn(run_prometheus_http_server(registry.clone(), addr));
//!
//! let coordinator = coordinator.with_metrics(registry.checkpoint.clone());
//! ```

pub mod prometheus;

pub use self::prometheus::{CheckpointMetrics, MetricsRegistry, run_prometheus_http_server, serve_metrics};
