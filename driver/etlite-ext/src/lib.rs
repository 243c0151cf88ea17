//!
//! etlite-ext - SQL Extension Modules
//!
//! Four extension modules compiled into the binding layer and handed to
//! SQLite's auto-extension list by the driver's registrar:
//!
//! - `regexp`: `regexp(pattern, text)` and `regexpi(pattern, text)`
//! - `series`: the `generate_series` table-valued function
//! - `nextchar`: `next_char(prefix, table, column[, where[, collate]])`
//! - `spellfix`: `editdist3(a, b)`
//!
//! Every module exposes a safe `register(&Connection)` and an
//! `extern "C"` initializer with the engine's extension entry-point shape.
//! The initializers ignore the API-routines pointer: the engine is linked
//! statically, so the symbols are called directly.
//!

use std::borrow::Cow;
use std::ffi::{CString, c_char, c_int, c_void};

use rusqlite::functions::Context;
use rusqlite::types::ValueRef;
use rusqlite::{Connection, ffi};
use tracing::{trace, warn};

pub mod nextchar;
pub mod regexp;
pub mod series;
pub mod spellfix;

pub use nextchar::etlite_nextchar_init;
pub use regexp::etlite_regexp_init;
pub use series::etlite_series_init;
pub use spellfix::etlite_spellfix_init;

/// Extension initializer as invoked by the engine for each new connection.
pub type EntryPoint =
    unsafe extern "C" fn(db: *mut ffi::sqlite3, pz_err: *mut *mut c_char, api: *const c_void) -> c_int;

/// Wraps the raw connection handed to an initializer and runs `register`
/// against it, translating failures into an engine status plus message.
///
/// # Safety
///
/// `db` must be a valid, open connection handle. `pz_err` is either null or
/// points at a slot the engine releases with `sqlite3_free`.
pub(crate) unsafe fn init_with(
    db: *mut ffi::sqlite3,
    pz_err: *mut *mut c_char,
    name: &str,
    register: fn(&Connection) -> rusqlite::Result<()>,
) -> c_int {
    // Borrowed handle: dropping `conn` does not close the connection.
    let conn = match unsafe { Connection::from_handle(db) } {
        Ok(conn) => conn,
        Err(e) => return unsafe { report(pz_err, name, &e) },
    };
    match register(&conn) {
        Ok(()) => {
            trace!(extension = name, "extension loaded into connection");
            ffi::SQLITE_OK
        }
        Err(e) => unsafe { report(pz_err, name, &e) },
    }
}

unsafe fn report(pz_err: *mut *mut c_char, name: &str, err: &rusqlite::Error) -> c_int {
    warn!(extension = name, error = %err, "extension initializer failed");
    let code = match err {
        rusqlite::Error::SqliteFailure(e, _) => e.extended_code,
        _ => ffi::SQLITE_ERROR,
    };
    if !pz_err.is_null() {
        let message = CString::new(format!("{name}: {err}")).unwrap_or_default();
        unsafe {
            *pz_err = ffi::sqlite3_mprintf(c"%s".as_ptr(), message.as_ptr());
        }
    }
    code
}

/// Reads argument `idx` as text. Returns `None` for SQL NULL.
pub(crate) fn text_arg<'a>(ctx: &'a Context<'_>, idx: usize) -> Option<Cow<'a, str>> {
    value_text(ctx.get_raw(idx))
}

/// The text SQLite produces for `CAST(value AS TEXT)`.
pub(crate) fn value_text(value: ValueRef<'_>) -> Option<Cow<'_, str>> {
    match value {
        ValueRef::Null => None,
        ValueRef::Integer(i) => Some(Cow::Owned(i.to_string())),
        ValueRef::Real(f) => Some(Cow::Owned(real_text(f))),
        ValueRef::Text(t) | ValueRef::Blob(t) => Some(String::from_utf8_lossy(t)),
    }
}

/// Renders a REAL with the engine's `%!.15g`: fifteen significant digits,
/// trailing zeros dropped, and always a fractional part.
fn real_text(f: f64) -> String {
    if f.is_nan() {
        return String::new();
    }
    let sign = if f < 0.0 { "-" } else { "" };
    if f.is_infinite() {
        return format!("{sign}Inf");
    }

    // `{:.14e}` rounds to 15 significant digits: d.dddddddddddddde<exp>.
    let scientific = format!("{:.14e}", f.abs());
    let (mantissa, exp) = scientific.split_once('e').unwrap_or((&scientific, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let digits = digits.trim_end_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    if !(-4..15).contains(&exp) {
        let (lead, rest) = digits.split_at(1);
        let rest = if rest.is_empty() { "0" } else { rest };
        let exp_sign = if exp < 0 { '-' } else { '+' };
        return format!("{sign}{lead}.{rest}e{exp_sign}{:02}", exp.abs());
    }

    let (whole, frac) = if exp >= 0 {
        let point = exp as usize + 1;
        if digits.len() > point {
            (digits[..point].to_string(), digits[point..].to_string())
        } else {
            (format!("{digits:0<point$}"), String::new())
        }
    } else {
        let zeros = "0".repeat((-exp - 1) as usize);
        ("0".to_string(), format!("{zeros}{digits}"))
    };
    let frac = if frac.is_empty() { "0".to_string() } else { frac };
    format!("{sign}{whole}.{frac}")
}
