///
/// Prepared statement.
///
/// Wraps one engine statement for its whole life: the column names and bind
/// parameter count are read once at prepare time, every operation leaves the
/// statement reset, and the statement is finalized on drop.
///

use std::ffi::c_int;
use std::marker::PhantomData;

use crate::batch::Batch;
use crate::connection::Connection;
use crate::engine::OwnedStmt;
use crate::error::{DriverError, DriverResult};
use crate::loader::BulkLoader;
use crate::rows::Rows;
use crate::transfer::{self, Row};

pub struct Statement<'conn> {
    stmt: OwnedStmt,
    columns: Vec<String>,
    binds: usize,
    rows_per_flush: usize,
    _conn: PhantomData<&'conn Connection>,
}

impl<'conn> Statement<'conn> {
    pub(crate) fn prepare(conn: &'conn Connection, sql: &str) -> DriverResult<Self> {
        let stmt = unsafe { OwnedStmt::prepare(conn.handle(), sql.as_bytes())? };
        let raw = stmt.raw();
        let columns = (0..raw.column_count())
            .map(|i| raw.column_name(i as c_int))
            .collect();
        let binds = raw.bind_parameter_count();
        Ok(Self {
            stmt,
            columns,
            binds,
            rows_per_flush: conn.config().bulk_rows_at_once,
            _conn: PhantomData,
        })
    }

    /// The statement text as prepared.
    pub fn sql(&self) -> String {
        self.stmt.raw().sql()
    }

    /// Result column names; empty for statements that return no rows.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn bind_parameter_count(&self) -> usize {
        self.binds
    }

    /// Runs a statement without result columns to completion.
    pub fn exec(&mut self) -> DriverResult<()> {
        transfer::exec(self.stmt.raw_mut())
    }

    /// Runs a single-column statement and copies out the first row's value.
    /// `None` when there is no row or the value is SQL NULL.
    pub fn subquery(&mut self) -> DriverResult<Option<String>> {
        transfer::subquery(self.stmt.raw_mut())?
            .map(|bytes| String::from_utf8(bytes).map_err(|e| DriverError::Utf8(e.utf8_error())))
            .transpose()
    }

    /// Executes the statement once per row of `batch` and returns the number
    /// of rows written. Rows written before a failure stay written.
    pub fn bulk_insert(&mut self, batch: Batch) -> DriverResult<usize> {
        transfer::bulk_insert(self.stmt.raw_mut(), batch)
    }

    /// Steps once and borrows the resulting row. `Ok(None)` when done.
    ///
    /// # Panics
    ///
    /// Panics if the statement has no result columns and yet produced a row.
    pub fn bulk_read(&mut self) -> DriverResult<Option<Row<'_>>> {
        transfer::bulk_read(self.stmt.raw_mut())
    }

    /// A loader that queues rows and inserts them in batches of
    /// `bulk_rows_at_once`.
    pub fn loader(&mut self) -> DriverResult<BulkLoader<'_, 'conn>> {
        if self.binds == 0 {
            return Err(DriverError::misuse(
                "cannot create loader on statement without ? binds",
            ));
        }
        let (arity, rows_per_flush) = (self.binds, self.rows_per_flush);
        Ok(BulkLoader::new(self, arity, rows_per_flush))
    }

    /// Iterates the result rows of a parameterless query.
    pub fn rows(&mut self) -> DriverResult<Rows<'_, 'conn>> {
        if self.binds != 0 {
            return Err(DriverError::misuse(
                "cannot iterate over a statement with ? binds",
            ));
        }
        if self.columns.is_empty() {
            return Err(DriverError::misuse(
                "cannot iterate over a statement without result columns",
            ));
        }
        Ok(Rows::new(self))
    }

    pub(crate) fn reset(&mut self) -> DriverResult<()> {
        self.stmt.raw_mut().reset()
    }

    /// Finalizes the statement, reporting failure. Dropping finalizes
    /// silently.
    pub fn finalize(self) -> DriverResult<()> {
        self.stmt.finalize()
    }
}
