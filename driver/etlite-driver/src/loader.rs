///
/// Buffered bulk loading.
///
/// `BulkLoader` queues rows for an insert statement and hands them to bulk
/// insert a batch at a time, so callers can feed rows one by one without
/// paying a boundary crossing per row.
///

use std::mem;

use tracing::{debug, warn};

use crate::batch::{Batch, Value};
use crate::error::DriverResult;
use crate::statement::Statement;

pub struct BulkLoader<'s, 'conn> {
    stmt: &'s mut Statement<'conn>,
    queued: Batch,
    rows_per_flush: usize,
    written: usize,
}

impl<'s, 'conn> BulkLoader<'s, 'conn> {
    pub(crate) fn new(stmt: &'s mut Statement<'conn>, arity: usize, rows_per_flush: usize) -> Self {
        Self {
            stmt,
            queued: Batch::with_capacity(arity, rows_per_flush),
            rows_per_flush,
            written: 0,
        }
    }

    /// Queues one row, flushing once `bulk_rows_at_once` rows are waiting.
    /// A row of the wrong width is rejected without touching the queue.
    pub fn load(&mut self, row: impl IntoIterator<Item = Value>) -> DriverResult<()> {
        self.queued.push_row(row)?;
        if self.queued.rows() >= self.rows_per_flush {
            self.flush()?;
        }
        Ok(())
    }

    /// `load` for rows of optional text.
    pub fn load_text<I, T>(&mut self, row: I) -> DriverResult<()>
    where
        I: IntoIterator<Item = Option<T>>,
        T: Into<Vec<u8>>,
    {
        let row = row
            .into_iter()
            .map(Value::from_option)
            .collect::<DriverResult<Vec<_>>>()?;
        self.load(row)
    }

    /// Rows queued but not yet inserted.
    pub fn queued_rows(&self) -> usize {
        self.queued.rows()
    }

    /// Rows inserted by flushes that succeeded.
    pub fn written_rows(&self) -> usize {
        self.written
    }

    /// Inserts every queued row now. The queue is empty afterwards even when
    /// the insert fails.
    pub fn flush(&mut self) -> DriverResult<usize> {
        if self.queued.is_empty() {
            return Ok(0);
        }
        let next = Batch::with_capacity(self.queued.arity(), self.rows_per_flush);
        let batch = mem::replace(&mut self.queued, next);
        let rows = self.stmt.bulk_insert(batch)?;
        self.written += rows;
        debug!(rows, total = self.written, "flushed bulk loader");
        Ok(rows)
    }

    /// Flushes what is left and returns the total number of rows inserted.
    pub fn finish(mut self) -> DriverResult<usize> {
        self.flush()?;
        Ok(self.written)
    }
}

impl Drop for BulkLoader<'_, '_> {
    fn drop(&mut self) {
        if !self.queued.is_empty() {
            warn!(
                rows = self.queued.rows(),
                "bulk loader dropped with unflushed rows; discarding them"
            );
        }
    }
}
