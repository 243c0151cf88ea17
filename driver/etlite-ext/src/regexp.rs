//!
//! Regular expression matching
//!
//! `X REGEXP Y` is rewritten by SQLite into `regexp(Y, X)`, so the pattern
//! is always the first argument. Compiled patterns are cached as auxiliary
//! data on the pattern argument and reused for every row of a statement.
//!

use std::ffi::{c_char, c_int, c_void};
use std::sync::Arc;

use regex::{Regex, RegexBuilder};
use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{Connection, Result, ffi};

use crate::{text_arg, value_text};

type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Registers `regexp` and `regexpi` on `conn`.
pub fn register(conn: &Connection) -> Result<()> {
    let flags = FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC;
    conn.create_scalar_function("regexp", 2, flags, |ctx| is_match(ctx, false))?;
    conn.create_scalar_function("regexpi", 2, flags, |ctx| is_match(ctx, true))
}

/// Engine entry point for the regexp module.
///
/// # Safety
///
/// Must only be invoked by SQLite with a valid connection handle.
pub unsafe extern "C" fn etlite_regexp_init(
    db: *mut ffi::sqlite3,
    pz_err: *mut *mut c_char,
    _api: *const c_void,
) -> c_int {
    unsafe { crate::init_with(db, pz_err, "regexp", register) }
}

fn is_match(ctx: &Context<'_>, case_insensitive: bool) -> Result<Option<bool>> {
    if text_arg(ctx, 0).is_none() {
        return Ok(None);
    }
    let Some(text) = text_arg(ctx, 1) else {
        return Ok(None);
    };
    let pattern: Arc<Regex> = ctx.get_or_create_aux(0, |raw| -> std::result::Result<_, BoxError> {
        let source = value_text(raw).ok_or("regexp pattern is NULL")?;
        Ok(RegexBuilder::new(&source)
            .case_insensitive(case_insensitive)
            .build()?)
    })?;
    Ok(Some(pattern.is_match(&text)))
}
