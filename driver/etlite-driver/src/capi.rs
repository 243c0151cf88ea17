///
/// C ABI for the host runtime.
///
/// Functions:
/// - Startup: etlite_startup
/// - Values: etlite_value_new, etlite_value_free
/// - Batches: etlite_batch_new, etlite_batch_free
/// - Transfer: etlite_bulk_insert, etlite_bulk_read, etlite_row_free,
///   etlite_subquery, etlite_bytes_free
/// - Assert query: etlite_assert_query
///
/// Ownership:
/// - Values and batch vectors handed to etlite_bulk_insert must come from
///   etlite_value_new and etlite_batch_new. The call takes both over on
///   every path but one; the host must not touch them afterwards. A
///   negative count is rejected before anything is read, so that batch
///   stays with the host and goes back through etlite_batch_free.
/// - Row vectors from etlite_bulk_read are released with etlite_row_free.
///   The strings they point at belong to the statement and are valid until
///   its next step or reset.
/// - Subquery results carry their length, may hold NUL bytes, and are
///   released with etlite_bytes_free.
///
/// Status codes are SQLite's; the host reads the message with
/// sqlite3_errmsg. etlite_assert_query returns an outcome code instead
/// (0 ok, -1 engine error, -2..-6 shape errors).
///

use std::ffi::{CString, c_char, c_int};
use std::ptr::{self, NonNull};
use std::slice;

use rusqlite::ffi;
use tracing::warn;

use crate::batch::{Batch, Value};
use crate::engine::RawStmt;
use crate::error::Outcome;
use crate::{registrar, scalar, transfer};

#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_startup() -> c_int {
    match registrar::startup() {
        Ok(()) => ffi::SQLITE_OK,
        Err(e) => {
            warn!(error = %e, "extension startup failed");
            e.code()
        }
    }
}

/// Copies `len` bytes into a new NUL-terminated value. Returns null when
/// `data` is null or holds a NUL byte.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_value_new(data: *const c_char, len: usize) -> *mut c_char {
    if data.is_null() {
        return ptr::null_mut();
    }
    let bytes = unsafe { slice::from_raw_parts(data.cast::<u8>(), len) };
    match CString::new(bytes) {
        Ok(value) => value.into_raw(),
        Err(e) => {
            warn!(error = %e, "rejected value with interior NUL");
            ptr::null_mut()
        }
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_value_free(value: *mut c_char) {
    if !value.is_null() {
        drop(unsafe { CString::from_raw(value) });
    }
}

/// A batch vector of `len` entries, all null (SQL NULL).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_batch_new(len: usize) -> *mut *mut c_char {
    let batch: Box<[*mut c_char]> = vec![ptr::null_mut(); len].into_boxed_slice();
    Box::into_raw(batch).cast::<*mut c_char>()
}

/// Releases a batch that was never handed to etlite_bulk_insert, values
/// included.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_batch_free(batch: *mut *mut c_char, len: usize) {
    if !batch.is_null() {
        drop(unsafe { take_batch(batch, len) });
    }
}

/// Moves a host batch and its values into Rust ownership.
unsafe fn take_batch(batch: *mut *mut c_char, len: usize) -> Vec<Value> {
    let slots = unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(batch, len)) };
    slots
        .iter()
        .map(|&p| {
            if p.is_null() {
                Value::null()
            } else {
                Value::from(unsafe { CString::from_raw(p) })
            }
        })
        .collect()
}

/// Inserts `nvars / nbind` rows through `stmt`.
///
/// Takes ownership of `vars` and every value in it, whatever the outcome,
/// except when `nvars` is negative: then nothing is touched, SQLITE_MISUSE
/// is returned, and the host still owns the batch.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_bulk_insert(
    stmt: *mut ffi::sqlite3_stmt,
    nbind: c_int,
    vars: *mut *mut c_char,
    nvars: c_int,
) -> c_int {
    let Ok(nvars) = usize::try_from(nvars) else {
        return ffi::SQLITE_MISUSE;
    };
    let values = if vars.is_null() {
        Vec::new()
    } else {
        unsafe { take_batch(vars, nvars) }
    };

    let (Some(stmt), Ok(arity)) = (NonNull::new(stmt), usize::try_from(nbind)) else {
        return ffi::SQLITE_MISUSE;
    };
    let batch = match Batch::from_values(arity, values) {
        Ok(batch) => batch,
        Err(e) => return e.code(),
    };
    let mut raw = unsafe { RawStmt::from_ptr(stmt) };
    match transfer::bulk_insert(&mut raw, batch) {
        Ok(_) => ffi::SQLITE_OK,
        Err(e) => e.code(),
    }
}

/// Steps `stmt`. On SQLITE_ROW, `*vars` receives `*ncols` pointers to the
/// row's column text (null for SQL NULL).
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_bulk_read(
    stmt: *mut ffi::sqlite3_stmt,
    vars: *mut *mut *const c_char,
    ncols: *mut c_int,
) -> c_int {
    let Some(stmt) = NonNull::new(stmt) else {
        return ffi::SQLITE_MISUSE;
    };
    if vars.is_null() || ncols.is_null() {
        return ffi::SQLITE_MISUSE;
    }
    let mut raw = unsafe { RawStmt::from_ptr(stmt) };
    match transfer::bulk_read(&mut raw) {
        Ok(None) => ffi::SQLITE_DONE,
        Ok(Some(row)) => {
            let Ok(count) = c_int::try_from(row.len()) else {
                return ffi::SQLITE_TOOBIG;
            };
            let columns: Box<[*const c_char]> = row
                .iter()
                .map(|v| v.map_or(ptr::null(), |text| text.as_ptr().cast::<c_char>()))
                .collect();
            unsafe {
                *ncols = count;
                *vars = Box::into_raw(columns).cast::<*const c_char>();
            }
            ffi::SQLITE_ROW
        }
        Err(e) => e.code(),
    }
}

#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_row_free(vars: *mut *const c_char, ncols: c_int) {
    if vars.is_null() {
        return;
    }
    let len = usize::try_from(ncols).unwrap_or(0);
    drop(unsafe { Box::from_raw(ptr::slice_from_raw_parts_mut(vars, len)) });
}

/// Runs a single-column statement once. `*out` receives a copy of the value
/// (null for no row or SQL NULL) and `*len` its length in bytes. The copy
/// keeps interior NUL bytes and is followed by one terminating NUL.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_subquery(
    stmt: *mut ffi::sqlite3_stmt,
    out: *mut *mut c_char,
    len: *mut c_int,
) -> c_int {
    let Some(stmt) = NonNull::new(stmt) else {
        return ffi::SQLITE_MISUSE;
    };
    if out.is_null() || len.is_null() {
        return ffi::SQLITE_MISUSE;
    }
    let mut raw = unsafe { RawStmt::from_ptr(stmt) };
    let value = match transfer::subquery(&mut raw) {
        Ok(value) => value,
        Err(e) => return e.code(),
    };
    let (text, length) = match value {
        None => (ptr::null_mut(), 0),
        Some(mut bytes) => {
            let Ok(length) = c_int::try_from(bytes.len()) else {
                return ffi::SQLITE_TOOBIG;
            };
            bytes.push(0);
            let buf: Box<[u8]> = bytes.into_boxed_slice();
            (Box::into_raw(buf).cast::<c_char>(), length)
        }
    };
    unsafe {
        *out = text;
        *len = length;
    }
    ffi::SQLITE_OK
}

/// Releases a subquery result. `len` is the length etlite_subquery reported.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_bytes_free(data: *mut c_char, len: c_int) {
    if data.is_null() {
        return;
    }
    let Ok(len) = usize::try_from(len) else {
        warn!(len, "refusing to free subquery buffer with negative length");
        return;
    };
    let buf = ptr::slice_from_raw_parts_mut(data.cast::<u8>(), len + 1);
    drop(unsafe { Box::from_raw(buf) });
}

/// Runs `sql` as an assert query. Returns an outcome code; on 0, `*out` is
/// 1 or 0.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn etlite_assert_query(
    db: *mut ffi::sqlite3,
    sql: *const c_char,
    len: c_int,
    out: *mut c_int,
) -> c_int {
    if db.is_null() || out.is_null() {
        return Outcome::EngineError.code();
    }
    let sql = match (sql.is_null(), usize::try_from(len)) {
        (false, Ok(len)) => unsafe { slice::from_raw_parts(sql.cast::<u8>(), len) },
        _ => &[],
    };
    match unsafe { scalar::assert_query(db, sql) } {
        Ok(value) => {
            unsafe { *out = c_int::from(value) };
            Outcome::Ok.code()
        }
        Err(e) => e.outcome().code(),
    }
}
