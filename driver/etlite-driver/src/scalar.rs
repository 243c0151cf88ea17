///
/// Assert-query helper.
///
/// Runs a query that must produce exactly one row holding exactly one integer
/// column valued 0 or 1, and reports any other shape as its own error:
///
///   prepare -> one column? -> step: row? -> integer? -> 0 or 1?
///           -> step: done? -> finalize -> Ok(value == 1)
///
/// The statement is finalized exactly once on every path, explicitly on
/// success and by drop otherwise.
///

use rusqlite::ffi;
use tracing::trace;

use crate::engine::{OwnedStmt, RawStmt, Step, type_name};
use crate::error::{DriverError, DriverResult};

/// # Safety
///
/// `db` must be an open connection handle.
pub(crate) unsafe fn assert_query(db: *mut ffi::sqlite3, sql: &[u8]) -> DriverResult<bool> {
    let mut stmt = unsafe { OwnedStmt::prepare(db, sql)? };
    let value = single_boolean(stmt.raw_mut())?;
    stmt.finalize()?;
    trace!(value, "assert query passed");
    Ok(value == 1)
}

fn single_boolean(stmt: &mut RawStmt) -> DriverResult<i64> {
    let columns = stmt.column_count();
    if columns != 1 {
        return Err(DriverError::WrongColumnCount { columns });
    }

    if stmt.step()? == Step::Done {
        return Err(DriverError::NoResult);
    }
    let column_type = stmt.column_type(0);
    if column_type != ffi::SQLITE_INTEGER {
        return Err(DriverError::WrongValueType {
            found: type_name(column_type),
        });
    }
    let value = stmt.column_i64(0);
    if !(0..=1).contains(&value) {
        return Err(DriverError::ValueOutOfRange { value });
    }

    if stmt.step()? == Step::Row {
        return Err(DriverError::TooManyResults);
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Outcome;
    use rusqlite::Connection;

    fn run(conn: &Connection, sql: &str) -> DriverResult<bool> {
        unsafe { assert_query(conn.handle(), sql.as_bytes()) }
    }

    #[test]
    fn test_boolean_values() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(run(&conn, "SELECT 1").unwrap());
        assert!(!run(&conn, "SELECT 0").unwrap());
        assert!(run(&conn, "SELECT 3 > 2").unwrap());
    }

    #[test]
    fn test_shape_errors() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("CREATE TABLE t (x INT); INSERT INTO t VALUES (1), (0)")
            .unwrap();

        let cases = [
            ("SELECT 2", Outcome::ValueOutOfRange),
            ("SELECT -1", Outcome::ValueOutOfRange),
            ("SELECT 'x'", Outcome::WrongValueType),
            ("SELECT 1.0", Outcome::WrongValueType),
            ("SELECT NULL", Outcome::WrongValueType),
            ("SELECT 1, 2", Outcome::WrongColumnCount),
            ("SELECT x FROM t WHERE x > 5", Outcome::NoResult),
            ("SELECT x FROM t", Outcome::TooManyResults),
            ("CREATE TABLE u (y)", Outcome::WrongColumnCount),
            ("SELECT nope FROM t", Outcome::EngineError),
            ("", Outcome::EngineError),
        ];
        for (sql, expected) in cases {
            let err = run(&conn, sql).unwrap_err();
            assert_eq!(err.outcome(), expected, "{sql}: {err}");
        }
    }

    #[test]
    fn test_diagnostics_name_the_offending_value() {
        let conn = Connection::open_in_memory().unwrap();
        insta::assert_snapshot!(
            run(&conn, "SELECT 1, 2, 3").unwrap_err(),
            @"assert query must have exactly one column, got 3"
        );
        insta::assert_snapshot!(
            run(&conn, "SELECT 7").unwrap_err(),
            @"assert query must return a boolean, got 7 (expected 0 or 1)"
        );
        insta::assert_snapshot!(
            run(&conn, "SELECT 'yes'").unwrap_err(),
            @"assert query must return a boolean, got a text value"
        );
    }

    #[test]
    fn test_failed_assert_leaves_no_statement_behind() {
        let conn = Connection::open_in_memory().unwrap();
        let _ = run(&conn, "SELECT 1, 2");
        let _ = run(&conn, "SELECT 5");
        let _ = run(&conn, "SELECT 1 UNION ALL SELECT 1");
        let pending = unsafe { ffi::sqlite3_next_stmt(conn.handle(), std::ptr::null_mut()) };
        assert!(pending.is_null());
    }
}
