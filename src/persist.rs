use tracing::{error, info};

use crate::model::Record;
use crate::store::{Row, Store};
use crate::{Error, Result};

/// A batch the store refused. `offset` is the index of the batch's first record.
#[derive(Debug)]
pub struct BatchError {
    pub offset: usize,
    pub rows: usize,
    pub error: Error,
}

/// Outcome of a [`BatchPersister::persist`] call.
#[derive(Debug, Default)]
pub struct PersistReport {
    pub succeeded: usize,
    pub errors: Vec<BatchError>,
}

impl PersistReport {
    pub fn failed_rows(&self) -> usize {
        self.errors.iter().map(|e| e.rows).sum()
    }
}

/// Writes records to one table in fixed size batches.
/// A failed batch is logged and counted, the remaining batches are still attempted.
pub struct BatchPersister<'s, S: Store + ?Sized> {
    store: &'s S,
    table: String,
    batch_size: usize,
}

impl<'s, S: Store + ?Sized> BatchPersister<'s, S> {
    pub fn new(store: &'s S, table: impl Into<String>, batch_size: usize) -> Self {
        Self {
            store,
            table: table.into(),
            batch_size: batch_size.max(1),
        }
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub async fn persist<R: Record>(&self, records: Vec<R>) -> PersistReport {
        let mut report = PersistReport::default();
        if records.is_empty() {
            return report;
        }

        for (i, batch) in records.chunks(self.batch_size).enumerate() {
            let offset = i * self.batch_size;
            match self.upsert_batch(batch).await {
                Ok(written) => {
                    info!(table = %self.table, offset, rows = written, "batch upserted");
                    report.succeeded += written;
                }
                Err(error) => {
                    error!(
                        table = %self.table,
                        offset,
                        rows = batch.len(),
                        "batch upsert failed: {error}"
                    );
                    report.errors.push(BatchError {
                        offset,
                        rows: batch.len(),
                        error,
                    });
                }
            }
        }
        report
    }

    async fn upsert_batch<R: Record>(&self, batch: &[R]) -> Result<usize> {
        let rows = batch.iter().map(to_row).collect::<Result<Vec<_>>>()?;
        self.store.upsert(&self.table, rows, R::CONFLICT_KEYS).await
    }
}

fn to_row<R: Record>(record: &R) -> Result<Row> {
    match serde_json::to_value(record)? {
        serde_json::Value::Object(row) => Ok(row),
        other => Err(Error::Store(format!("record is not a flat object: {other}"))),
    }
}
