//! rowsink-core - client-side batched write buffering for table storage
//!
//! This library sits between an application issuing per-row mutations and
//! a remote bulk-write operation exposed by a storage backend:
//!
//! - Fixed-size bulk requests cut per-row round-trips
//! - Optional primary-key deduplication, newest request wins
//! - Requests the backend declines to process are requeued and retried
//! - Closing a writer drains the buffer, on error paths included

pub mod backend;
pub mod buffer;
pub mod circuit_breaker;
pub mod config;
pub mod error;
pub mod metrics;
pub mod request;

// Re-export commonly used types
pub use backend::{BulkWrite, BulkWriteResponse, RestBackend};
pub use buffer::{BatchWriter, BatchWriterBuilder};
pub use config::Config;
pub use error::{BackendError, BufferError};
pub use error::{Error, Result};
pub use request::{Attributes, WriteRequest};
