//! Batched write buffering with deduplication and drain-on-close.
//!
//! The buffer accumulates row mutations, collapses redundant writes to
//! the same logical row, and sends fixed-size bulk requests to a backend.

mod writer;

pub use writer::{BatchWriter, BatchWriterBuilder, DEFAULT_FLUSH_AMOUNT};
