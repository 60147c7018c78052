//! Integration tests for rowsink-core.
//!
//! Drives the write buffer end-to-end against in-process backends, the
//! way an embedding application would use it.

use async_trait::async_trait;
use futures::FutureExt;
use parking_lot::Mutex;
use rowsink_core::backend::BulkWriteResponse;
use rowsink_core::metrics::WriterMetrics;
use rowsink_core::{Attributes, BatchWriter, BulkWrite, Result, WriteRequest};
use serde_json::json;
use std::sync::Arc;

/// In-process backend that applies puts and deletes to a plain map,
/// optionally refusing a fixed number of requests per call.
struct TableBackend {
    rows: Mutex<std::collections::HashMap<String, Attributes>>,
    calls: Mutex<Vec<usize>>,
    refuse_per_call: usize,
    refusals_left: Mutex<usize>,
}

impl TableBackend {
    fn new() -> Self {
        Self {
            rows: Mutex::new(std::collections::HashMap::new()),
            calls: Mutex::new(Vec::new()),
            refuse_per_call: 0,
            refusals_left: Mutex::new(0),
        }
    }

    fn refusing(refuse_per_call: usize, total_refusals: usize) -> Self {
        Self {
            rows: Mutex::new(std::collections::HashMap::new()),
            calls: Mutex::new(Vec::new()),
            refuse_per_call,
            refusals_left: Mutex::new(total_refusals),
        }
    }

    fn row_key(attrs: &Attributes) -> String {
        attrs.get("pk").map(|v| v.to_string()).unwrap_or_default()
    }

    fn apply(&self, request: WriteRequest) {
        match request {
            WriteRequest::Put { item } => {
                self.rows.lock().insert(Self::row_key(&item), item);
            }
            WriteRequest::Delete { key } => {
                self.rows.lock().remove(&Self::row_key(&key));
            }
        }
    }
}

#[async_trait]
impl BulkWrite for TableBackend {
    async fn bulk_write(
        &self,
        table: &str,
        mut requests: Vec<WriteRequest>,
    ) -> Result<BulkWriteResponse> {
        self.calls.lock().push(requests.len());

        let mut refused = Vec::new();
        {
            let mut left = self.refusals_left.lock();
            let refuse = self.refuse_per_call.min(*left).min(requests.len());
            *left -= refuse;
            // Refuse from the back so accepted requests keep their order.
            for _ in 0..refuse {
                refused.push(requests.pop().expect("refuse count bounded by batch"));
            }
        }

        for request in requests {
            self.apply(request);
        }

        let mut response = BulkWriteResponse::accepted();
        if !refused.is_empty() {
            response.unprocessed.insert(table.to_string(), refused);
        }
        Ok(response)
    }
}

fn row(pk: i64, revision: i64) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("pk".into(), json!(pk));
    attrs.insert("revision".into(), json!(revision));
    attrs
}

fn key(pk: i64) -> Attributes {
    let mut attrs = Attributes::new();
    attrs.insert("pk".into(), json!(pk));
    attrs
}

#[tokio::test]
async fn test_bulk_ingest_respects_flush_amount() {
    let backend = Arc::new(TableBackend::new());
    let mut writer = BatchWriter::builder("events", backend.clone())
        .flush_amount(25)
        .build()
        .unwrap();

    for i in 0..60 {
        writer.put(row(i, 0)).await.unwrap();
    }
    writer.close().await.unwrap();

    // Two threshold flushes of 25 plus a final drain of 10.
    assert_eq!(*backend.calls.lock(), vec![25, 25, 10]);
    assert_eq!(backend.rows.lock().len(), 60);
}

#[tokio::test]
async fn test_dedup_collapses_rewrites_before_sending() {
    let backend = Arc::new(TableBackend::new());
    let metrics = Arc::new(WriterMetrics::new());
    let mut writer = BatchWriter::builder("events", backend.clone())
        .flush_amount(100)
        .dedup_keys(vec!["pk".into()])
        .metrics(metrics.clone())
        .build()
        .unwrap();

    // Ten logical rows, each rewritten five times.
    for revision in 0..5 {
        for pk in 0..10 {
            writer.put(row(pk, revision)).await.unwrap();
        }
    }
    writer.close().await.unwrap();

    // Only the newest revision of each row went over the wire.
    assert_eq!(metrics.requests_sent_total(), 10);
    assert_eq!(metrics.dedup_replaced_total(), 40);
    let rows = backend.rows.lock();
    assert_eq!(rows.len(), 10);
    assert!(rows.values().all(|r| r.get("revision") == Some(&json!(4))));
}

#[tokio::test]
async fn test_put_then_delete_leaves_no_row() {
    let backend = Arc::new(TableBackend::new());
    let mut writer = BatchWriter::builder("events", backend.clone())
        .flush_amount(100)
        .dedup_keys(vec!["pk".into()])
        .build()
        .unwrap();

    writer.put(row(1, 0)).await.unwrap();
    writer.put(row(2, 0)).await.unwrap();
    writer.delete(key(1)).await.unwrap();
    writer.close().await.unwrap();

    let rows = backend.rows.lock();
    assert_eq!(rows.len(), 1);
    assert!(rows.values().next().unwrap().get("pk") == Some(&json!(2)));
}

#[tokio::test]
async fn test_drain_retries_refused_requests_until_applied() {
    // Every call refuses two requests until eight refusals are spent.
    let backend = Arc::new(TableBackend::refusing(2, 8));
    let mut writer = BatchWriter::builder("events", backend.clone())
        .flush_amount(10)
        .build()
        .unwrap();

    for i in 0..10 {
        writer.put(row(i, 0)).await.unwrap();
    }
    writer.close().await.unwrap();

    assert_eq!(backend.rows.lock().len(), 10);
    assert_eq!(*backend.refusals_left.lock(), 0);
}

#[tokio::test]
async fn test_scoped_usage_delivers_buffered_writes_on_error() {
    let backend = Arc::new(TableBackend::new());
    let writer = BatchWriter::builder("events", backend.clone())
        .flush_amount(100)
        .build()
        .unwrap();

    let result = writer
        .scoped(|w| {
            async move {
                w.put(row(1, 0)).await?;
                w.put(row(2, 0)).await?;
                Err::<(), _>(rowsink_core::Error::Config("application failure".into()))
            }
            .boxed()
        })
        .await;

    assert!(result.is_err());
    // The drain still ran: both rows reached the backend.
    assert_eq!(backend.rows.lock().len(), 2);
}

#[tokio::test]
async fn test_metrics_exposition_reflects_activity() {
    let backend = Arc::new(TableBackend::new());
    let metrics = Arc::new(WriterMetrics::new());
    let writer = BatchWriter::builder("events", backend)
        .flush_amount(25)
        .metrics(metrics.clone())
        .build()
        .unwrap();

    writer
        .scoped(|w| {
            async move {
                for i in 0..3 {
                    w.put(row(i, 0)).await?;
                }
                w.delete(key(0)).await?;
                Ok(())
            }
            .boxed()
        })
        .await
        .unwrap();

    let text = metrics.export_prometheus_text();
    assert!(text.contains("rowsink_puts_total 3\n"));
    assert!(text.contains("rowsink_deletes_total 1\n"));
    assert!(text.contains("rowsink_requests_sent_total 4\n"));
    assert!(text.contains("rowsink_buffered_requests 0\n"));
}
