//! Prometheus metrics for the lottery.
//!
//! Counters are recorded through the `metrics` facade and are no-ops until a
//! recorder is installed, so tests need no setup.
//!
//! # Example
//!
//! ```rust,no_run
//! use waitlist_lottery_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Metrics available at http://localhost:9090/metrics
//! # Ok(())
//! # }
//! ```

use crate::lottery::{DrawKind, SkipReason};
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use thiserror::Error;

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
}

/// Prometheus metrics server.
///
/// Exposes metrics on an HTTP endpoint for Prometheus scraping.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server bound to `addr` once started.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Install the Prometheus exporter and its HTTP listener.
    ///
    /// Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or its listener cannot
    /// bind. An already installed recorder is tolerated with a warning.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let (recorder, exporter) = PrometheusBuilder::new()
            .with_http_listener(self.addr)
            .build()
            .map_err(|e| MetricsError::Build(e.to_string()))?;
        let handle = recorder.handle();

        // In tests a recorder may already be installed
        if metrics::set_global_recorder(recorder).is_err() {
            tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
            return Ok(());
        }

        tokio::spawn(async move {
            if exporter.await.is_err() {
                tracing::error!("Metrics exporter stopped");
            }
        });
        self.handle = Some(handle);
        tracing::info!(
            addr = %self.addr,
            "Metrics server started - available at http://{}/metrics",
            self.addr
        );
        Ok(())
    }

    /// Render current metrics in Prometheus format.
    ///
    /// Returns `None` if the server hasn't been started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
pub fn register_metrics() {
    describe_counter!("lottery_draws_total", "Draws that admitted at least one entrant");
    describe_counter!(
        "lottery_draws_skipped_total",
        "Draw requests that changed nothing, by reason"
    );
    describe_counter!(
        "lottery_entrants_selected_total",
        "Entrants admitted by draws"
    );
    describe_counter!(
        "lottery_storage_writes_total",
        "Event writes submitted by draws that completed"
    );
    describe_counter!(
        "lottery_storage_failures_total",
        "Event writes submitted by draws that failed"
    );
    describe_counter!(
        "lottery_notifications_sent_total",
        "Entrant notifications delivered"
    );
    describe_counter!(
        "lottery_notifications_failed_total",
        "Entrant notifications that could not be delivered"
    );
}

/// Lottery metrics recorder.
pub struct LotteryMetrics;

impl LotteryMetrics {
    /// Record a committed draw.
    pub fn record_draw(kind: DrawKind, selected: usize) {
        counter!("lottery_draws_total", "kind" => kind.label()).increment(1);
        counter!("lottery_entrants_selected_total", "kind" => kind.label())
            .increment(selected as u64);
    }

    /// Record a draw request that did nothing.
    pub fn record_skip(kind: DrawKind, reason: &SkipReason) {
        counter!(
            "lottery_draws_skipped_total",
            "kind" => kind.label(),
            "reason" => reason.label()
        )
        .increment(1);
    }

    /// Record the result of a storage write.
    pub fn record_write(succeeded: bool) {
        if succeeded {
            counter!("lottery_storage_writes_total").increment(1);
        } else {
            counter!("lottery_storage_failures_total").increment(1);
        }
    }

    /// Record a batch of notification deliveries.
    pub fn record_notifications(sent: usize, failed: usize) {
        counter!("lottery_notifications_sent_total").increment(sent as u64);
        counter!("lottery_notifications_failed_total").increment(failed as u64);
    }
}
