//! Write buffer metrics with Prometheus text exposition.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters and gauges tracking a write buffer's activity.
pub struct WriterMetrics {
    // === COUNTERS ===
    /// Total put operations accepted
    puts_total: AtomicU64,

    /// Total delete operations accepted
    deletes_total: AtomicU64,

    /// Buffered requests replaced by a newer request for the same key
    dedup_replaced_total: AtomicU64,

    /// Total bulk-write flushes
    flushes_total: AtomicU64,

    /// Total requests handed to the backend
    requests_sent_total: AtomicU64,

    /// Requests the backend returned as unprocessed
    unprocessed_total: AtomicU64,

    /// Bulk-write calls that failed outright
    backend_errors_total: AtomicU64,

    // === GAUGES ===
    /// Requests currently buffered
    buffered_requests: AtomicU64,
}

impl WriterMetrics {
    /// Create new metrics.
    pub fn new() -> Self {
        Self {
            puts_total: AtomicU64::new(0),
            deletes_total: AtomicU64::new(0),
            dedup_replaced_total: AtomicU64::new(0),
            flushes_total: AtomicU64::new(0),
            requests_sent_total: AtomicU64::new(0),
            unprocessed_total: AtomicU64::new(0),
            backend_errors_total: AtomicU64::new(0),
            buffered_requests: AtomicU64::new(0),
        }
    }

    // === COUNTER RECORDING ===

    /// Record an accepted put.
    pub fn record_put(&self) {
        self.puts_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an accepted delete.
    pub fn record_delete(&self) {
        self.deletes_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a buffered request displaced by a newer one.
    pub fn record_dedup_replaced(&self) {
        self.dedup_replaced_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed flush.
    pub fn record_flush(&self, sent: u64, unprocessed: u64) {
        self.flushes_total.fetch_add(1, Ordering::Relaxed);
        self.requests_sent_total.fetch_add(sent, Ordering::Relaxed);
        self.unprocessed_total
            .fetch_add(unprocessed, Ordering::Relaxed);
    }

    /// Record a failed bulk-write call.
    pub fn record_backend_error(&self) {
        self.backend_errors_total.fetch_add(1, Ordering::Relaxed);
    }

    // === GAUGE UPDATES ===

    /// Update the current buffered request count.
    pub fn set_buffered(&self, count: u64) {
        self.buffered_requests.store(count, Ordering::Relaxed);
    }

    // === GETTERS ===

    /// Get total puts.
    pub fn puts_total(&self) -> u64 {
        self.puts_total.load(Ordering::Relaxed)
    }

    /// Get total deletes.
    pub fn deletes_total(&self) -> u64 {
        self.deletes_total.load(Ordering::Relaxed)
    }

    /// Get total dedup replacements.
    pub fn dedup_replaced_total(&self) -> u64 {
        self.dedup_replaced_total.load(Ordering::Relaxed)
    }

    /// Get total flushes.
    pub fn flushes_total(&self) -> u64 {
        self.flushes_total.load(Ordering::Relaxed)
    }

    /// Get total requests sent to the backend.
    pub fn requests_sent_total(&self) -> u64 {
        self.requests_sent_total.load(Ordering::Relaxed)
    }

    /// Get total requests returned unprocessed.
    pub fn unprocessed_total(&self) -> u64 {
        self.unprocessed_total.load(Ordering::Relaxed)
    }

    /// Get total failed bulk-write calls.
    pub fn backend_errors_total(&self) -> u64 {
        self.backend_errors_total.load(Ordering::Relaxed)
    }

    /// Get the current buffered request count.
    pub fn buffered_requests(&self) -> u64 {
        self.buffered_requests.load(Ordering::Relaxed)
    }

    /// Export all metrics in Prometheus text format.
    ///
    /// Standard exposition format, suitable for serving from a scrape
    /// endpoint in the embedding application.
    pub fn export_prometheus_text(&self) -> String {
        let mut output = String::with_capacity(1024);

        output.push_str("# HELP rowsink_puts_total Total put operations accepted\n");
        output.push_str("# TYPE rowsink_puts_total counter\n");
        output.push_str(&format!("rowsink_puts_total {}\n", self.puts_total()));
        output.push('\n');

        output.push_str("# HELP rowsink_deletes_total Total delete operations accepted\n");
        output.push_str("# TYPE rowsink_deletes_total counter\n");
        output.push_str(&format!("rowsink_deletes_total {}\n", self.deletes_total()));
        output.push('\n');

        output.push_str(
            "# HELP rowsink_dedup_replaced_total Buffered requests replaced by a newer request for the same key\n",
        );
        output.push_str("# TYPE rowsink_dedup_replaced_total counter\n");
        output.push_str(&format!(
            "rowsink_dedup_replaced_total {}\n",
            self.dedup_replaced_total()
        ));
        output.push('\n');

        output.push_str("# HELP rowsink_flushes_total Total bulk-write flushes\n");
        output.push_str("# TYPE rowsink_flushes_total counter\n");
        output.push_str(&format!("rowsink_flushes_total {}\n", self.flushes_total()));
        output.push('\n');

        output.push_str("# HELP rowsink_requests_sent_total Total requests handed to the backend\n");
        output.push_str("# TYPE rowsink_requests_sent_total counter\n");
        output.push_str(&format!(
            "rowsink_requests_sent_total {}\n",
            self.requests_sent_total()
        ));
        output.push('\n');

        output.push_str(
            "# HELP rowsink_unprocessed_total Requests the backend returned as unprocessed\n",
        );
        output.push_str("# TYPE rowsink_unprocessed_total counter\n");
        output.push_str(&format!(
            "rowsink_unprocessed_total {}\n",
            self.unprocessed_total()
        ));
        output.push('\n');

        output.push_str("# HELP rowsink_backend_errors_total Bulk-write calls that failed\n");
        output.push_str("# TYPE rowsink_backend_errors_total counter\n");
        output.push_str(&format!(
            "rowsink_backend_errors_total {}\n",
            self.backend_errors_total()
        ));
        output.push('\n');

        output.push_str("# HELP rowsink_buffered_requests Requests currently buffered\n");
        output.push_str("# TYPE rowsink_buffered_requests gauge\n");
        output.push_str(&format!(
            "rowsink_buffered_requests {}\n",
            self.buffered_requests()
        ));

        output
    }
}

impl Default for WriterMetrics {
    fn default() -> Self {
        Self::new()
    }
}
