//! Backend capability for bulk writes.
//!
//! The write buffer depends on exactly one operation: hand over a bounded
//! batch of requests for a single table, learn which of them were not
//! applied. Any storage client satisfying [`BulkWrite`] can sit behind
//! the buffer; [`RestBackend`] is the HTTP implementation shipped here.

mod rest;

pub use rest::RestBackend;

use crate::request::WriteRequest;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A bulk-write capable storage backend.
#[async_trait]
pub trait BulkWrite: Send + Sync {
    /// Write a batch of requests to one table.
    ///
    /// The batch carries at most the buffer's flush amount of requests.
    /// Partial success is reported through the response's unprocessed
    /// mapping; a returned error means the delivery status of the whole
    /// batch is unknown.
    async fn bulk_write(&self, table: &str, requests: Vec<WriteRequest>)
        -> Result<BulkWriteResponse>;
}

/// Outcome of a bulk write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkWriteResponse {
    /// Requests the backend declined to apply, grouped by table. Empty or
    /// absent means the full batch was accepted.
    #[serde(default)]
    pub unprocessed: HashMap<String, Vec<WriteRequest>>,
}

impl BulkWriteResponse {
    /// A fully successful response.
    pub fn accepted() -> Self {
        Self::default()
    }

    /// Whether every request in the batch was applied.
    pub fn fully_processed(&self) -> bool {
        self.unprocessed.values().all(|requests| requests.is_empty())
    }

    /// Take the unprocessed requests for one table, leaving the rest.
    pub fn take_unprocessed(&mut self, table: &str) -> Vec<WriteRequest> {
        self.unprocessed.remove(table).unwrap_or_default()
    }
}
