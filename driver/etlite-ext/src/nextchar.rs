//!
//! Next distinct character lookup
//!
//! `next_char(prefix, table, column[, where[, collate]])` returns, as one
//! string, every distinct character that immediately follows `prefix` among
//! the values of `column` in `table`, in sorted order. It is the building
//! block for incremental completion over a word list.
//!
//! `table`, `column` and `where` are spliced into the query text as given,
//! so they may be arbitrary expressions; they come from the SQL author, not
//! from row data.
//!

use std::ffi::{c_char, c_int, c_void};

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{Connection, Error, Result, ffi};

use crate::text_arg;

/// Registers `next_char` on `conn`.
pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function("next_char", -1, FunctionFlags::SQLITE_UTF8, next_char)
}

/// Engine entry point for the nextchar module.
///
/// # Safety
///
/// Must only be invoked by SQLite with a valid connection handle.
pub unsafe extern "C" fn etlite_nextchar_init(
    db: *mut ffi::sqlite3,
    pz_err: *mut *mut c_char,
    _api: *const c_void,
) -> c_int {
    unsafe { crate::init_with(db, pz_err, "nextchar", register) }
}

fn next_char(ctx: &Context<'_>) -> Result<Option<String>> {
    if !(3..=5).contains(&ctx.len()) {
        return Err(Error::UserFunctionError(
            "next_char() requires 3 to 5 arguments".into(),
        ));
    }
    let Some(prefix) = text_arg(ctx, 0) else {
        return Ok(None);
    };
    let table = required_arg(ctx, 1, "table")?;
    let column = required_arg(ctx, 2, "column")?;
    let filter = if ctx.len() > 3 { text_arg(ctx, 3) } else { None };
    let collate = if ctx.len() > 4 { text_arg(ctx, 4) } else { None };

    let sql = build_query(&table, &column, filter.as_deref(), collate.as_deref());

    // Safety: the connection is only used for this nested query, which
    // finishes before the function returns.
    let conn = unsafe { ctx.get_connection()? };
    let mut stmt = conn.prepare(&sql)?;
    let chars = stmt
        .query_map([prefix.as_ref()], |row| row.get::<_, String>(0))?
        .collect::<Result<Vec<_>>>()?;
    Ok(Some(chars.concat()))
}

fn required_arg(ctx: &Context<'_>, idx: usize, what: &str) -> Result<String> {
    text_arg(ctx, idx)
        .map(|s| s.into_owned())
        .ok_or_else(|| Error::UserFunctionError(format!("next_char() {what} must not be NULL").into()))
}

fn build_query(table: &str, column: &str, filter: Option<&str>, collate: Option<&str>) -> String {
    let mut sql = format!(
        "SELECT DISTINCT substr({column}, length(?1) + 1, 1) AS next FROM {table} \
         WHERE substr({column}, 1, length(?1)) = ?1 AND length({column}) > length(?1)"
    );
    if let Some(filter) = filter.filter(|f| !f.trim().is_empty()) {
        sql.push_str(&format!(" AND ({filter})"));
    }
    sql.push_str(" ORDER BY next");
    if let Some(collate) = collate.filter(|c| !c.trim().is_empty()) {
        sql.push_str(&format!(" COLLATE {collate}"));
    }
    sql
}
