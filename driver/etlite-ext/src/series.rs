//!
//! Numeric series generation via the eponymous `generate_series` virtual
//! table: `SELECT value FROM generate_series(start, stop, step)`.
//!

use std::ffi::{c_char, c_int, c_void};

use rusqlite::{Connection, Result, ffi, vtab};

/// Registers the `generate_series` table-valued function on `conn`.
pub fn register(conn: &Connection) -> Result<()> {
    vtab::series::load_module(conn)
}

/// Engine entry point for the series module.
///
/// # Safety
///
/// Must only be invoked by SQLite with a valid connection handle.
pub unsafe extern "C" fn etlite_series_init(
    db: *mut ffi::sqlite3,
    pz_err: *mut *mut c_char,
    _api: *const c_void,
) -> c_int {
    unsafe { crate::init_with(db, pz_err, "series", register) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_series_with_step() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let mut stmt = conn
            .prepare("SELECT value FROM generate_series(0, 10, 5)")
            .unwrap();
        let values: Vec<i64> = stmt
            .query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(values, vec![0, 5, 10]);
    }
}
