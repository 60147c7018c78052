//! The batching, deduplication, and flush/retry state machine.

use crate::backend::BulkWrite;
use crate::config::WriterConfig;
use crate::metrics::WriterMetrics;
use crate::request::{Attributes, WriteRequest};
use crate::{Error, Result};
use futures::future::BoxFuture;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Default number of requests per bulk-write call.
pub const DEFAULT_FLUSH_AMOUNT: usize = 25;

/// Accumulates row mutations for one table and writes them to a backend
/// in fixed-size bulk requests.
///
/// Requests are sent in enqueue order. When the backend reports a subset
/// of a batch as unprocessed, that subset is requeued at the back of the
/// buffer and retried by a later flush. A hard backend failure propagates
/// to the caller and the batch that was in flight is NOT restored: its
/// delivery status is unknown and the caller must decide what to do.
///
/// A writer has a single logical owner. Every mutating operation takes
/// `&mut self`, so the dedup scan, append, and flush removal are atomic
/// with respect to other callers by construction; wrap the writer in a
/// mutex or hand it to one task if several flows need to share it.
pub struct BatchWriter {
    table: String,
    backend: Arc<dyn BulkWrite>,
    buffer: VecDeque<WriteRequest>,
    flush_amount: usize,
    dedup_keys: Option<Vec<String>>,
    exit_backoff: Duration,
    metrics: Arc<WriterMetrics>,
}

impl BatchWriter {
    /// Start building a writer for one table.
    pub fn builder(table: impl Into<String>, backend: Arc<dyn BulkWrite>) -> BatchWriterBuilder {
        BatchWriterBuilder::new(table, backend)
    }

    /// Create a writer from the TOML configuration section.
    pub fn from_config(config: &WriterConfig, backend: Arc<dyn BulkWrite>) -> Result<Self> {
        BatchWriterBuilder::from_config(config, backend).build()
    }

    /// Buffer a row insert/replace.
    ///
    /// No schema validation happens here; the backend rejects malformed
    /// rows. Reaching the flush amount triggers a bulk write, and a
    /// backend failure during that flush surfaces from this call.
    pub async fn put(&mut self, item: Attributes) -> Result<()> {
        self.metrics.record_put();
        self.append_and_process(WriteRequest::Put { item }).await
    }

    /// Buffer a row deletion by key. Symmetric to [`put`](Self::put).
    pub async fn delete(&mut self, key: Attributes) -> Result<()> {
        self.metrics.record_delete();
        self.append_and_process(WriteRequest::Delete { key }).await
    }

    /// Number of requests currently buffered.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// The table this writer targets.
    pub fn table(&self) -> &str {
        &self.table
    }

    async fn append_and_process(&mut self, request: WriteRequest) -> Result<()> {
        self.remove_duplicate(&request)?;
        self.buffer.push_back(request);
        self.metrics.set_buffered(self.buffer.len() as u64);

        if self.buffer.len() >= self.flush_amount {
            self.flush().await?;
        }
        Ok(())
    }

    /// Drop the buffered request targeting the same row, if any.
    ///
    /// No-op unless dedup keys are configured. Requests are compared on
    /// extracted key values alone, so a put can displace a buffered
    /// delete and vice versa. The incoming request is appended after the
    /// removal, so the newest request always survives.
    fn remove_duplicate(&mut self, request: &WriteRequest) -> Result<()> {
        let Some(keys) = self.dedup_keys.as_deref() else {
            return Ok(());
        };
        let new_values = request.key_values(keys)?;

        let mut matched = None;
        for (idx, buffered) in self.buffer.iter().enumerate() {
            if buffered.key_values(keys)? == new_values {
                matched = Some(idx);
                break;
            }
        }

        if let Some(discarded) = matched.and_then(|idx| self.buffer.remove(idx)) {
            self.metrics.record_dedup_replaced();
            debug!(request = ?discarded, "Replacing buffered request for the same key");

            // The buffer never holds two requests for one key, so a second
            // match means the invariant was already broken before this call.
            debug_assert!(
                !self.buffer.iter().any(|buffered| {
                    buffered
                        .key_values(keys)
                        .map(|values| values == new_values)
                        .unwrap_or(false)
                }),
                "buffer held multiple requests for one key"
            );
        }
        Ok(())
    }

    /// Send the front of the buffer as one bulk write.
    ///
    /// The batch is removed before the call. On failure it is not put
    /// back: the backend may or may not have applied it. Unprocessed
    /// requests come back verbatim and are requeued at the end of the
    /// buffer without re-running dedup.
    async fn flush(&mut self) -> Result<()> {
        let count = self.flush_amount.min(self.buffer.len());
        let batch: Vec<WriteRequest> = self.buffer.drain(..count).collect();
        let sent = batch.len();

        let mut response = match self.backend.bulk_write(&self.table, batch).await {
            Ok(response) => response,
            Err(e) => {
                self.metrics.record_backend_error();
                self.metrics.set_buffered(self.buffer.len() as u64);
                return Err(e);
            }
        };

        let unprocessed = response.take_unprocessed(&self.table);
        let requeued = unprocessed.len();
        self.buffer.extend(unprocessed);

        self.metrics.record_flush(sent as u64, requeued as u64);
        self.metrics.set_buffered(self.buffer.len() as u64);
        debug!(
            sent,
            unprocessed = requeued,
            buffered = self.buffer.len(),
            "Bulk write flushed"
        );
        Ok(())
    }

    /// Flush until the buffer is empty.
    ///
    /// While the backend keeps returning unprocessed requests, drain
    /// iterations are spaced by the configured exit backoff so a
    /// throttling backend is not hammered. The interval is fixed; no
    /// growth or jitter. A backend that never accepts anything keeps the
    /// drain looping; bound that with the backend's own timeouts.
    ///
    /// A backend failure aborts the drain and surfaces here; whatever is
    /// still buffered at that point is lost to this writer.
    pub async fn close(&mut self) -> Result<()> {
        while !self.buffer.is_empty() {
            self.flush().await?;
            if !self.buffer.is_empty() && !self.exit_backoff.is_zero() {
                tokio::time::sleep(self.exit_backoff).await;
            }
        }
        Ok(())
    }

    /// Run `scope` against the writer, then drain unconditionally.
    ///
    /// The drain runs on the error path too, so buffered writes are not
    /// silently dropped when the scope fails. When both the scope and the
    /// drain fail, the scope's error is surfaced and the drain failure is
    /// logged; the undelivered requests are lost either way.
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use futures::FutureExt;
    /// # use rowsink_core::{BatchWriter, BulkWrite};
    /// # async fn example(backend: Arc<dyn BulkWrite>) -> rowsink_core::Result<()> {
    /// let writer = BatchWriter::builder("events", backend).build()?;
    /// writer
    ///     .scoped(|w| {
    ///         async move {
    ///             w.put(serde_json::Map::new()).await?;
    ///             Ok(())
    ///         }
    ///         .boxed()
    ///     })
    ///     .await
    /// # }
    /// ```
    pub async fn scoped<T, F>(mut self, scope: F) -> Result<T>
    where
        F: for<'a> FnOnce(&'a mut BatchWriter) -> BoxFuture<'a, Result<T>>,
    {
        let result = scope(&mut self).await;
        match (result, self.close().await) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(drain_err)) => Err(drain_err),
            (Err(scope_err), Ok(())) => Err(scope_err),
            (Err(scope_err), Err(drain_err)) => {
                warn!(
                    error = %drain_err,
                    "Drain failed after scope error, remaining buffered writes are lost"
                );
                Err(scope_err)
            }
        }
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        if !self.buffer.is_empty() {
            warn!(
                table = %self.table,
                buffered = self.buffer.len(),
                "BatchWriter dropped with buffered requests, call close() to drain"
            );
        }
    }
}

/// Builder for [`BatchWriter`].
pub struct BatchWriterBuilder {
    table: String,
    backend: Arc<dyn BulkWrite>,
    flush_amount: usize,
    dedup_keys: Option<Vec<String>>,
    exit_backoff: Duration,
    metrics: Option<Arc<WriterMetrics>>,
}

impl BatchWriterBuilder {
    /// Create a builder with default settings.
    pub fn new(table: impl Into<String>, backend: Arc<dyn BulkWrite>) -> Self {
        Self {
            table: table.into(),
            backend,
            flush_amount: DEFAULT_FLUSH_AMOUNT,
            dedup_keys: None,
            exit_backoff: Duration::ZERO,
            metrics: None,
        }
    }

    /// Create a builder pre-populated from the TOML configuration section.
    pub fn from_config(config: &WriterConfig, backend: Arc<dyn BulkWrite>) -> Self {
        let mut builder = Self::new(config.table.clone(), backend)
            .flush_amount(config.flush_amount)
            .exit_backoff(Duration::from_millis(config.exit_backoff_ms));
        if let Some(keys) = &config.dedup_keys {
            builder = builder.dedup_keys(keys.clone());
        }
        builder
    }

    /// Set the maximum number of requests per bulk-write call.
    pub fn flush_amount(mut self, flush_amount: usize) -> Self {
        self.flush_amount = flush_amount;
        self
    }

    /// Enable deduplication on the named primary key attributes.
    pub fn dedup_keys(mut self, keys: Vec<String>) -> Self {
        self.dedup_keys = Some(keys);
        self
    }

    /// Set the pause between drain iterations on close.
    pub fn exit_backoff(mut self, backoff: Duration) -> Self {
        self.exit_backoff = backoff;
        self
    }

    /// Attach shared metrics.
    pub fn metrics(mut self, metrics: Arc<WriterMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Build the writer.
    pub fn build(self) -> Result<BatchWriter> {
        if self.table.is_empty() {
            return Err(Error::Config("Writer table is required".into()));
        }
        if self.flush_amount == 0 {
            return Err(Error::Config(
                "flush_amount must be greater than zero".into(),
            ));
        }
        if let Some(keys) = &self.dedup_keys {
            if keys.is_empty() {
                return Err(Error::Config(
                    "dedup_keys must name at least one attribute".into(),
                ));
            }
        }

        Ok(BatchWriter {
            table: self.table,
            backend: self.backend,
            buffer: VecDeque::new(),
            flush_amount: self.flush_amount,
            dedup_keys: self.dedup_keys,
            exit_backoff: self.exit_backoff,
            metrics: self.metrics.unwrap_or_else(|| Arc::new(WriterMetrics::new())),
        })
    }
}
