//! Prometheus metrics for observability and monitoring.
//!
//! The store records through the `metrics` facade, so nothing is exported
//! until a recorder is installed. [`MetricsServer`] installs the Prometheus
//! recorder and describes every metric the runtime emits:
//! - Action throughput and reducer latency
//! - Effects started and cancelled
//! - Deliveries dropped because their effect was cancelled
//! - Shutdown progress
//!
//! # Example
//!
//! ```rust,no_run
//! use reducible_runtime::metrics::MetricsServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Prometheus can now scrape http://0.0.0.0:9090/metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinHandle;

pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus metrics endpoint.
///
/// Serves the Prometheus text format over HTTP on its address once started.
/// The listener runs on the tokio runtime and stops when the server is
/// dropped.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
    exporter: Option<JoinHandle<()>>,
}

impl MetricsServer {
    /// Create a new metrics server.
    ///
    /// # Arguments
    ///
    /// * `addr` - Address to serve metrics on (e.g., `0.0.0.0:9090`)
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            handle: None,
            exporter: None,
        }
    }

    /// Describe the runtime metrics, install the Prometheus recorder and
    /// start serving it.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if there is no tokio runtime, the address cannot be
    /// bound, or the recorder cannot be installed.
    ///
    /// # Note
    ///
    /// A recorder can only be installed once per process. A second call
    /// logs a warning and leaves this server without a handle.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|e| MetricsError::Install(e.to_string()))?;
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0,
                ],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        if let Err(e) = metrics::set_global_recorder(recorder) {
            let err_msg = e.to_string();
            if err_msg.contains("already initialized") {
                tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                return Ok(());
            }
            return Err(MetricsError::Install(err_msg));
        }

        self.exporter = Some(runtime.spawn(async move {
            // `ExporterError` implements neither `Display` nor `Debug` in 0.15.
            if exporter.await.is_err() {
                tracing::error!("Metrics endpoint stopped");
            }
        }));
        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics endpoint listening - scrape http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Address the endpoint serves on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if this server did not install the recorder.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

impl Drop for MetricsServer {
    fn drop(&mut self) {
        if let Some(exporter) = self.exporter.take() {
            exporter.abort();
        }
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!("store.actions.total", "Total number of actions reduced");
    describe_histogram!(
        "store.reducer.duration_seconds",
        "Time spent inside the reducer per action"
    );
    describe_counter!("store.effects.started", "Effects handed to the executor");
    describe_counter!(
        "store.effects.cancelled",
        "Effect executions cancelled by identity"
    );
    describe_counter!(
        "store.deliveries.dropped",
        "Effect actions discarded because their effect was cancelled"
    );
    describe_counter!("store.shutdown.initiated", "Graceful shutdowns started");
    describe_counter!(
        "store.shutdown.completed",
        "Graceful shutdowns that drained every effect"
    );
    describe_counter!(
        "store.shutdown.timeout",
        "Graceful shutdowns that timed out with effects running"
    );
    describe_counter!(
        "store.shutdown.rejected_actions",
        "Actions rejected because the store was shutting down"
    );
}

/// Store metrics recorder.
pub struct StoreMetrics;

impl StoreMetrics {
    /// Record one reducer run.
    pub fn record_action(duration: Duration) {
        counter!("store.actions.total").increment(1);
        histogram!("store.reducer.duration_seconds").record(duration.as_secs_f64());
    }

    /// Record an effect handed to the executor.
    pub fn record_effect_started() {
        counter!("store.effects.started").increment(1);
    }

    /// Record cancelled effect executions.
    pub fn record_cancelled(count: usize) {
        counter!("store.effects.cancelled").increment(count as u64);
    }

    /// Record an effect action discarded after cancellation.
    pub fn record_dropped_delivery() {
        counter!("store.deliveries.dropped").increment(1);
    }

    /// Record an action rejected during shutdown.
    pub fn record_rejected() {
        counter!("store.shutdown.rejected_actions").increment(1);
    }
}
