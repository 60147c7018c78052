//! Apply command implementation.
//!
//! Streams newline-delimited JSON mutation records through a scoped write
//! buffer, so the buffer drains even when the stream aborts mid-way.

use anyhow::{Context, Result};
use futures::FutureExt;
use rowsink_core::backend::RestBackend;
use rowsink_core::metrics::WriterMetrics;
use rowsink_core::{Attributes, BatchWriterBuilder, Config};
use serde::Deserialize;
use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

/// One line of the mutation stream.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
enum MutationRecord {
    /// `{"put": {...row attributes...}}`
    Put(Attributes),
    /// `{"delete": {...key attributes...}}`
    Delete(Attributes),
}

/// Parse a single input line. Blank lines are skipped.
fn parse_line(line: &str) -> rowsink_core::Result<Option<MutationRecord>> {
    if line.trim().is_empty() {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// Stream the mutation file into the configured table.
pub async fn run(
    mut config: Config,
    input: PathBuf,
    table: Option<String>,
    flush_amount: Option<usize>,
) -> Result<()> {
    // Apply CLI overrides
    if let Some(table) = table {
        config.writer.table = table;
    }
    if let Some(flush_amount) = flush_amount {
        config.writer.flush_amount = flush_amount;
    }
    config.validate()?;

    info!(
        table = %config.writer.table,
        flush_amount = config.writer.flush_amount,
        input = %input.display(),
        "Applying mutation stream"
    );

    let file = std::fs::File::open(&input)
        .with_context(|| format!("Failed to open {}", input.display()))?;
    let reader = BufReader::new(file);

    let backend = Arc::new(RestBackend::new(&config.backend)?);
    let metrics = Arc::new(WriterMetrics::new());
    let writer = BatchWriterBuilder::from_config(&config.writer, backend)
        .metrics(metrics.clone())
        .build()?;

    writer
        .scoped(move |w| {
            async move {
                for line in reader.lines() {
                    let line = line?;
                    match parse_line(&line)? {
                        Some(MutationRecord::Put(item)) => w.put(item).await?,
                        Some(MutationRecord::Delete(key)) => w.delete(key).await?,
                        None => {}
                    }
                }
                Ok(())
            }
            .boxed()
        })
        .await?;

    info!(
        puts = metrics.puts_total(),
        deletes = metrics.deletes_total(),
        dedup_replaced = metrics.dedup_replaced_total(),
        flushes = metrics.flushes_total(),
        requests_sent = metrics.requests_sent_total(),
        unprocessed = metrics.unprocessed_total(),
        "Mutation stream applied"
    );

    Ok(())
}
