///
/// Raw statement access.
///
/// The only module that touches `rusqlite::ffi` statement entry points.
/// `RawStmt` is a non-owning view over a prepared statement and exposes the
/// handful of engine calls the transfer protocol needs; `OwnedStmt` adds
/// finalize-on-drop for statements this crate prepared itself.
///

use std::ffi::{CStr, CString, c_char, c_int, c_uchar, c_void};
use std::ptr::{self, NonNull};

use rusqlite::ffi;
use tracing::debug;

use crate::batch::Value;
use crate::error::{DriverError, DriverResult};

/// Result of a successful `sqlite3_step`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Step {
    Row,
    Done,
}

pub(crate) struct RawStmt {
    ptr: NonNull<ffi::sqlite3_stmt>,
}

impl RawStmt {
    /// # Safety
    ///
    /// `ptr` must be a prepared statement that stays valid, and is driven by
    /// no one else, for as long as the returned value is used.
    pub(crate) unsafe fn from_ptr(ptr: NonNull<ffi::sqlite3_stmt>) -> Self {
        Self { ptr }
    }

    pub(crate) fn as_ptr(&self) -> *mut ffi::sqlite3_stmt {
        self.ptr.as_ptr()
    }

    fn db(&self) -> *mut ffi::sqlite3 {
        unsafe { ffi::sqlite3_db_handle(self.as_ptr()) }
    }

    pub(crate) fn error(&self, rc: c_int) -> DriverError {
        engine_error(self.db(), rc)
    }

    fn check(&self, rc: c_int) -> DriverResult<()> {
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(self.error(rc))
        }
    }

    pub(crate) fn sql(&self) -> String {
        let text = unsafe { ffi::sqlite3_sql(self.as_ptr()) };
        if text.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    }

    pub(crate) fn bind_parameter_count(&self) -> usize {
        let n = unsafe { ffi::sqlite3_bind_parameter_count(self.as_ptr()) };
        usize::try_from(n).unwrap_or(0)
    }

    pub(crate) fn column_count(&self) -> usize {
        let n = unsafe { ffi::sqlite3_column_count(self.as_ptr()) };
        usize::try_from(n).unwrap_or(0)
    }

    pub(crate) fn column_name(&self, idx: c_int) -> String {
        let name = unsafe { ffi::sqlite3_column_name(self.as_ptr(), idx) };
        if name.is_null() {
            return String::new();
        }
        unsafe { CStr::from_ptr(name) }.to_string_lossy().into_owned()
    }

    /// Binds `value` to the 1-based parameter `index`, moving its buffer
    /// into the engine.
    pub(crate) fn bind_value(&mut self, index: c_int, value: Value) -> DriverResult<()> {
        let rc = match value.into_inner() {
            None => unsafe { ffi::sqlite3_bind_null(self.as_ptr(), index) },
            Some(text) => {
                let len = text.as_bytes().len() as u64;
                // The engine calls release_value exactly once for this
                // pointer, including when the bind itself fails.
                let buf = text.into_raw();
                unsafe {
                    ffi::sqlite3_bind_text64(
                        self.as_ptr(),
                        index,
                        buf,
                        len,
                        Some(release_value),
                        ffi::SQLITE_UTF8 as c_uchar,
                    )
                }
            }
        };
        self.check(rc)
    }

    pub(crate) fn step(&mut self) -> DriverResult<Step> {
        match unsafe { ffi::sqlite3_step(self.as_ptr()) } {
            ffi::SQLITE_ROW => Ok(Step::Row),
            ffi::SQLITE_DONE => Ok(Step::Done),
            rc => Err(self.error(rc)),
        }
    }

    pub(crate) fn clear_bindings(&mut self) -> DriverResult<()> {
        let rc = unsafe { ffi::sqlite3_clear_bindings(self.as_ptr()) };
        self.check(rc)
    }

    pub(crate) fn reset(&mut self) -> DriverResult<()> {
        let rc = unsafe { ffi::sqlite3_reset(self.as_ptr()) };
        self.check(rc)
    }

    pub(crate) fn column_type(&self, idx: c_int) -> c_int {
        unsafe { ffi::sqlite3_column_type(self.as_ptr(), idx) }
    }

    pub(crate) fn column_i64(&self, idx: c_int) -> i64 {
        unsafe { ffi::sqlite3_column_int64(self.as_ptr(), idx) }
    }

    /// Text of column `idx` in the current row, or `None` for SQL NULL.
    /// The slice points into the statement and dies with the next step or
    /// reset, which both need `&mut self`.
    pub(crate) fn column_text(&self, idx: c_int) -> DriverResult<Option<&[u8]>> {
        if self.column_type(idx) == ffi::SQLITE_NULL {
            return Ok(None);
        }
        let text = unsafe { ffi::sqlite3_column_text(self.as_ptr(), idx) };
        if text.is_null() {
            return Err(status_error(ffi::SQLITE_NOMEM));
        }
        // column_bytes must follow column_text so it measures the text form.
        let len = unsafe { ffi::sqlite3_column_bytes(self.as_ptr(), idx) };
        let len = usize::try_from(len).unwrap_or(0);
        Ok(Some(unsafe { std::slice::from_raw_parts(text, len) }))
    }
}

/// A statement prepared by this crate. Finalized exactly once: explicitly
/// through `finalize`, or on drop.
pub(crate) struct OwnedStmt {
    raw: RawStmt,
    finalized: bool,
}

impl OwnedStmt {
    /// Prepares the first statement in `sql`. Trailing text is ignored.
    ///
    /// # Safety
    ///
    /// `db` must be an open connection that outlives the statement.
    pub(crate) unsafe fn prepare(db: *mut ffi::sqlite3, sql: &[u8]) -> DriverResult<Self> {
        let len = c_int::try_from(sql.len()).map_err(|_| DriverError::Engine {
            code: ffi::SQLITE_TOOBIG,
            message: format!("statement text of {} bytes is too long", sql.len()),
        })?;
        let mut stmt = ptr::null_mut();
        let mut tail = ptr::null();
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, sql.as_ptr().cast::<c_char>(), len, &mut stmt, &mut tail)
        };
        if rc != ffi::SQLITE_OK {
            return Err(engine_error(db, rc));
        }
        let Some(ptr) = NonNull::new(stmt) else {
            return Err(DriverError::misuse("no query specified"));
        };

        if !tail.is_null() {
            let consumed = (tail as usize).saturating_sub(sql.as_ptr() as usize);
            let rest = sql.get(consumed..).unwrap_or_default();
            if !rest.trim_ascii().is_empty() {
                debug!(ignored = rest.len(), "ignoring SQL after the first statement");
            }
        }

        Ok(Self {
            raw: unsafe { RawStmt::from_ptr(ptr) },
            finalized: false,
        })
    }

    pub(crate) fn raw(&self) -> &RawStmt {
        &self.raw
    }

    pub(crate) fn raw_mut(&mut self) -> &mut RawStmt {
        &mut self.raw
    }

    pub(crate) fn finalize(mut self) -> DriverResult<()> {
        let db = self.raw.db();
        self.finalized = true;
        let rc = unsafe { ffi::sqlite3_finalize(self.raw.as_ptr()) };
        if rc == ffi::SQLITE_OK {
            Ok(())
        } else {
            Err(engine_error(db, rc))
        }
    }
}

impl Drop for OwnedStmt {
    fn drop(&mut self) {
        if !self.finalized {
            self.finalized = true;
            unsafe {
                ffi::sqlite3_finalize(self.raw.as_ptr());
            }
        }
    }
}

/// Destructor handed to the engine with every bound text buffer.
unsafe extern "C" fn release_value(buf: *mut c_void) {
    // Every buffer bound by bind_value came from CString::into_raw.
    drop(unsafe { CString::from_raw(buf.cast::<c_char>()) });
}

/// Error for `rc` carrying the connection's current message.
pub(crate) fn engine_error(db: *mut ffi::sqlite3, rc: c_int) -> DriverError {
    let message = if db.is_null() {
        None
    } else {
        let msg = unsafe { ffi::sqlite3_errmsg(db) };
        (!msg.is_null()).then(|| unsafe { CStr::from_ptr(msg) }.to_string_lossy().into_owned())
    };
    match message {
        Some(message) => DriverError::Engine { code: rc, message },
        None => status_error(rc),
    }
}

/// Error for `rc` with the engine's generic description of the code.
pub(crate) fn status_error(rc: c_int) -> DriverError {
    let text = unsafe { ffi::sqlite3_errstr(rc) };
    let message = if text.is_null() {
        format!("status {rc}")
    } else {
        unsafe { CStr::from_ptr(text) }.to_string_lossy().into_owned()
    };
    DriverError::Engine { code: rc, message }
}

/// Human-readable storage class, for diagnostics.
pub(crate) fn type_name(column_type: c_int) -> &'static str {
    match column_type {
        ffi::SQLITE_INTEGER => "an integer",
        ffi::SQLITE_FLOAT => "a float",
        ffi::SQLITE_TEXT => "a text",
        ffi::SQLITE_BLOB => "a blob",
        ffi::SQLITE_NULL => "a null",
        _ => "an unknown",
    }
}
