//!
//! Fuzzy spelling match
//!
//! `editdist3(a, b)` is a weighted Levenshtein distance over characters
//! using the default spellfix costs. Smaller is closer; identical strings
//! score 0.
//!

use std::ffi::{c_char, c_int, c_void};

use rusqlite::functions::FunctionFlags;
use rusqlite::{Connection, Result, ffi};

use crate::text_arg;

pub const INSERT_COST: i64 = 100;
pub const DELETE_COST: i64 = 100;
pub const SUBSTITUTE_COST: i64 = 150;

/// Registers `editdist3` on `conn`.
pub fn register(conn: &Connection) -> Result<()> {
    conn.create_scalar_function(
        "editdist3",
        2,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            let (Some(a), Some(b)) = (text_arg(ctx, 0), text_arg(ctx, 1)) else {
                return Ok(None);
            };
            Ok(Some(edit_distance(&a, &b)))
        },
    )
}

/// Engine entry point for the spellfix module.
///
/// # Safety
///
/// Must only be invoked by SQLite with a valid connection handle.
pub unsafe extern "C" fn etlite_spellfix_init(
    db: *mut ffi::sqlite3,
    pz_err: *mut *mut c_char,
    _api: *const c_void,
) -> c_int {
    unsafe { crate::init_with(db, pz_err, "spellfix", register) }
}

/// Cost of turning `from` into `to`.
pub fn edit_distance(from: &str, to: &str) -> i64 {
    let to: Vec<char> = to.chars().collect();
    let mut prev: Vec<i64> = (0..=to.len() as i64).map(|j| j * INSERT_COST).collect();
    let mut cur = vec![0; to.len() + 1];

    for (i, a) in from.chars().enumerate() {
        cur[0] = (i as i64 + 1) * DELETE_COST;
        for (j, b) in to.iter().enumerate() {
            let substitute = prev[j] + if a == *b { 0 } else { SUBSTITUTE_COST };
            let delete = prev[j + 1] + DELETE_COST;
            let insert = cur[j] + INSERT_COST;
            cur[j + 1] = substitute.min(delete).min(insert);
        }
        std::mem::swap(&mut prev, &mut cur);
    }
    prev[to.len()]
}
