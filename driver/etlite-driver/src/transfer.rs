///
/// Row transfer engine.
///
/// Bulk insert binds a batch row by row through one statement; bulk read
/// steps a statement once and exposes the current row without copying.
/// `subquery` and `exec` are the single-step helpers built on the same calls.
///
/// Insert never opens a transaction: rows stepped before a failure stay
/// written, and scoping them is the caller's business.
///

use std::ffi::c_int;
use std::str;
use std::vec;

use tracing::{debug, trace, warn};

use crate::batch::{Batch, Value};
use crate::engine::{RawStmt, Step};
use crate::error::{DriverError, DriverResult};

/// Binds, steps, clears and resets `stmt` once per row of `batch`, returning
/// the number of rows written.
///
/// The batch is consumed on every path. On failure the statement is cleared
/// and reset before the first error is returned.
pub(crate) fn bulk_insert(stmt: &mut RawStmt, batch: Batch) -> DriverResult<usize> {
    let (arity, values) = batch.into_parts();
    if values.is_empty() {
        return Err(DriverError::BatchShape { len: 0, arity });
    }
    let params = stmt.bind_parameter_count();
    if arity != params {
        return Err(DriverError::misuse(format!(
            "batch rows have {arity} values but the statement takes {params} parameters"
        )));
    }

    let rows = values.len() / arity;
    let mut pending = values.into_iter();
    for row in 0..rows {
        if let Err(e) = insert_row(stmt, arity, &mut pending) {
            debug!(row, rows, error = %e, "bulk insert stopped");
            release_unbound(stmt, pending);
            return Err(e);
        }
    }
    trace!(rows, arity, "bulk insert complete");
    Ok(rows)
}

fn insert_row(stmt: &mut RawStmt, arity: usize, pending: &mut vec::IntoIter<Value>) -> DriverResult<()> {
    for (i, value) in pending.by_ref().take(arity).enumerate() {
        stmt.bind_value(i as c_int + 1, value)?;
    }
    if stmt.step()? == Step::Row {
        return Err(DriverError::misuse("bulk insert statement returned a row"));
    }
    stmt.clear_bindings()?;
    stmt.reset()
}

/// Releases the values the failed insert never reached and leaves the
/// statement clean.
fn release_unbound(stmt: &mut RawStmt, unbound: vec::IntoIter<Value>) {
    let remaining = unbound.len();
    drop(unbound);
    trace!(remaining, "released unbound values");

    if let Err(e) = stmt.clear_bindings() {
        warn!(error = %e, "failed to clear bindings after bulk insert error");
    }
    // After a failed step reset repeats that step's status, which the caller
    // already has.
    let _ = stmt.reset();
}

/// The current row of a statement. Borrows the statement, so no step or
/// reset can happen while it is alive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row<'stmt> {
    values: Vec<Option<&'stmt [u8]>>,
}

impl<'stmt> Row<'stmt> {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw text of column `idx`; `None` for SQL NULL.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a column of the row.
    pub fn get(&self, idx: usize) -> Option<&'stmt [u8]> {
        self.values[idx]
    }

    /// Column `idx` as UTF-8 text.
    ///
    /// # Panics
    ///
    /// Panics if `idx` is not a column of the row.
    pub fn get_str(&self, idx: usize) -> DriverResult<Option<&'stmt str>> {
        Ok(self.values[idx].map(str::from_utf8).transpose()?)
    }

    pub fn as_slice(&self) -> &[Option<&'stmt [u8]>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<&'stmt [u8]>> + '_ {
        self.values.iter().copied()
    }

    /// Copies the row out of the statement.
    pub fn to_owned_strings(&self) -> DriverResult<Vec<Option<String>>> {
        self.values
            .iter()
            .map(|v| Ok(v.map(str::from_utf8).transpose()?.map(str::to_owned)))
            .collect()
    }
}

/// Steps `stmt` once. `Ok(None)` once the statement is done.
///
/// # Panics
///
/// Panics if the statement produced a row with no columns.
pub(crate) fn bulk_read(stmt: &mut RawStmt) -> DriverResult<Option<Row<'_>>> {
    if stmt.step()? == Step::Done {
        return Ok(None);
    }
    let stmt = &*stmt;
    let columns = stmt.column_count();
    assert!(columns > 0, "bulk read on a statement without result columns");

    let values = (0..columns)
        .map(|i| stmt.column_text(i as c_int))
        .collect::<DriverResult<Vec<_>>>()?;
    Ok(Some(Row { values }))
}

/// First value of a single-column statement, copied out before the
/// statement is reset. `None` for no row or SQL NULL.
pub(crate) fn subquery(stmt: &mut RawStmt) -> DriverResult<Option<Vec<u8>>> {
    match stmt.column_count() {
        0 => return Err(DriverError::misuse("subquery statement has no result columns")),
        1 => {}
        n => {
            return Err(DriverError::misuse(format!(
                "a subquery can only return a single column, got {n}"
            )));
        }
    }

    let value = match stmt.step() {
        Ok(Step::Row) => stmt.column_text(0).map(|v| v.map(<[u8]>::to_vec)),
        Ok(Step::Done) => Ok(None),
        Err(e) => Err(e),
    };
    let reset = stmt.reset();
    let value = value?;
    reset?;
    Ok(value)
}

/// Runs a statement that returns no rows.
pub(crate) fn exec(stmt: &mut RawStmt) -> DriverResult<()> {
    let columns = stmt.column_count();
    if columns != 0 {
        return Err(DriverError::misuse(format!(
            "cannot exec a statement with {columns} result columns"
        )));
    }
    let stepped = stmt.step();
    let reset = stmt.reset();
    if stepped? == Step::Row {
        return Err(DriverError::misuse("exec called but statement not done"));
    }
    reset
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::OwnedStmt;
    use rusqlite::{Connection, ffi};

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (a INT NOT NULL, b TEXT, c TEXT)")
            .unwrap();
        conn
    }

    fn prepare(conn: &Connection, sql: &str) -> OwnedStmt {
        unsafe { OwnedStmt::prepare(conn.handle(), sql.as_bytes()) }.unwrap()
    }

    fn batch(arity: usize, values: &[Option<&str>]) -> Batch {
        let values = values.iter().map(|v| Value::from_option(*v).unwrap()).collect();
        Batch::from_values(arity, values).unwrap()
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM t", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_bulk_insert_writes_every_row() {
        let conn = setup();
        let mut stmt = prepare(&conn, "INSERT INTO t VALUES (?, ?, ?)");
        let rows = bulk_insert(
            stmt.raw_mut(),
            batch(3, &[Some("1"), None, Some("one"), Some("2"), Some("two"), None]),
        )
        .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(count(&conn), 2);

        let b: Option<String> = conn
            .query_row("SELECT b FROM t WHERE a = 1", [], |r| r.get(0))
            .unwrap();
        assert_eq!(b, None);
    }

    #[test]
    fn test_bulk_insert_empty_batch_is_error() {
        let conn = setup();
        let mut stmt = prepare(&conn, "INSERT INTO t VALUES (?, ?, ?)");
        let err = bulk_insert(stmt.raw_mut(), Batch::new(3)).unwrap_err();
        assert!(matches!(err, DriverError::BatchShape { len: 0, arity: 3 }));
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_bulk_insert_arity_must_match_parameters() {
        let conn = setup();
        let mut stmt = prepare(&conn, "INSERT INTO t VALUES (?, ?, ?)");
        let err = bulk_insert(stmt.raw_mut(), batch(2, &[Some("1"), Some("x")])).unwrap_err();
        assert!(matches!(err, DriverError::Misuse(_)));
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_bulk_insert_keeps_rows_before_failure() {
        let conn = setup();
        let mut stmt = prepare(&conn, "INSERT INTO t VALUES (?, ?, ?)");
        let err = bulk_insert(
            stmt.raw_mut(),
            batch(
                3,
                &[
                    Some("1"), Some("a"), None,
                    Some("2"), Some("b"), None,
                    None, Some("c"), None,
                    Some("4"), Some("d"), None,
                ],
            ),
        )
        .unwrap_err();
        match err {
            DriverError::Engine { code, message } => {
                assert_eq!(code & 0xff, ffi::SQLITE_CONSTRAINT);
                assert!(message.contains("NOT NULL"), "{message}");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(count(&conn), 2);

        // The statement is clean and reusable.
        bulk_insert(stmt.raw_mut(), batch(3, &[Some("5"), None, None])).unwrap();
        assert_eq!(count(&conn), 3);
    }

    #[test]
    fn test_bulk_insert_rejects_row_returning_statement() {
        let conn = setup();
        let mut stmt = prepare(&conn, "INSERT INTO t VALUES (?, ?, ?) RETURNING a");
        let err = bulk_insert(stmt.raw_mut(), batch(3, &[Some("1"), None, None])).unwrap_err();
        assert!(matches!(err, DriverError::Misuse(_)));
    }

    #[test]
    fn test_bulk_read_rows_then_done() {
        let conn = setup();
        conn.execute_batch("INSERT INTO t VALUES (1, 'x', NULL), (2, 'y', 'z')")
            .unwrap();
        let mut stmt = prepare(&conn, "SELECT a, b, c FROM t ORDER BY a");

        let row = bulk_read(stmt.raw_mut()).unwrap().unwrap();
        assert_eq!(row.len(), 3);
        assert_eq!(row.get(0), Some(&b"1"[..]));
        assert_eq!(row.get_str(1).unwrap(), Some("x"));
        assert_eq!(row.get(2), None);

        let row = bulk_read(stmt.raw_mut()).unwrap().unwrap();
        assert_eq!(
            row.to_owned_strings().unwrap(),
            vec![Some("2".to_string()), Some("y".to_string()), Some("z".to_string())]
        );

        assert!(bulk_read(stmt.raw_mut()).unwrap().is_none());
    }

    #[test]
    fn test_bulk_read_invalid_utf8() {
        let conn = setup();
        let mut stmt = prepare(&conn, "SELECT CAST(x'ff' AS TEXT)");
        let row = bulk_read(stmt.raw_mut()).unwrap().unwrap();
        assert!(matches!(row.get_str(0), Err(DriverError::Utf8(_))));
    }

    #[test]
    fn test_subquery() {
        let conn = setup();
        let mut stmt = prepare(&conn, "SELECT 'σ∈⁵ℝ«⌋'");
        assert_eq!(
            subquery(stmt.raw_mut()).unwrap().as_deref(),
            Some("σ∈⁵ℝ«⌋".as_bytes())
        );
        // Reset, so it can run again.
        assert!(subquery(stmt.raw_mut()).unwrap().is_some());

        let mut stmt = prepare(&conn, "SELECT b FROM t");
        assert_eq!(subquery(stmt.raw_mut()).unwrap(), None);

        let mut stmt = prepare(&conn, "SELECT 1, 2");
        assert!(matches!(subquery(stmt.raw_mut()), Err(DriverError::Misuse(_))));
    }

    #[test]
    fn test_exec() {
        let conn = setup();
        let mut stmt = prepare(&conn, "DELETE FROM t");
        exec(stmt.raw_mut()).unwrap();

        let mut stmt = prepare(&conn, "SELECT 1");
        assert!(matches!(exec(stmt.raw_mut()), Err(DriverError::Misuse(_))));
    }
}
