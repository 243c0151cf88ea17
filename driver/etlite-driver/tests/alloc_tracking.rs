///
/// # Allocation Tracking for Bulk Insert
///
/// Every value buffer and batch container handed to bulk insert must be
/// released exactly once, whether the insert succeeds, stops halfway, or
/// rejects the batch outright. A counting global allocator checks that the
/// number of live Rust allocations returns to its starting point after each
/// scenario. SQLite's own allocations go through its malloc and are not
/// counted.
///
/// Kept to a single test so no other test thread allocates concurrently.
///

use std::alloc::{GlobalAlloc, Layout, System};
use std::ffi::c_char;
use std::ptr;
use std::sync::atomic::{AtomicIsize, Ordering};

use rusqlite::ffi;

use etlite_driver::capi::{
    etlite_batch_free, etlite_batch_new, etlite_bulk_insert, etlite_value_new,
};
use etlite_driver::{Batch, Connection, DriverError, Statement, Value};

struct Counting;

static LIVE: AtomicIsize = AtomicIsize::new(0);

unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc(layout) };
        if !ptr.is_null() {
            LIVE.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = unsafe { System.alloc_zeroed(layout) };
        if !ptr.is_null() {
            LIVE.fetch_add(1, Ordering::SeqCst);
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        unsafe { System.dealloc(ptr, layout) };
        LIVE.fetch_sub(1, Ordering::SeqCst);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        unsafe { System.realloc(ptr, layout, new_size) }
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn live() -> isize {
    LIVE.load(Ordering::SeqCst)
}

fn batch(rows: &[[Option<&str>; 2]]) -> Batch {
    let mut batch = Batch::with_capacity(2, rows.len());
    for row in rows {
        batch
            .push_row(row.iter().map(|v| Value::from_option(*v).unwrap()))
            .unwrap();
    }
    batch
}

const GOOD: [[Option<&str>; 2]; 5] = [
    [Some("1"), Some("squid")],
    [Some("2"), None],
    [Some("3"), Some("squirrel")],
    [Some("4"), Some("σ∈⁵ℝ«⌋")],
    [Some("5"), Some("avocado")],
];

const THIRD_ROW_FAILS: [[Option<&str>; 2]; 5] = [
    [Some("1"), Some("squid")],
    [Some("2"), None],
    [None, Some("squirrel")],
    [Some("4"), Some("σ∈⁵ℝ«⌋")],
    [Some("5"), Some("avocado")],
];

/// Net live allocations left behind by `run`.
fn leaked(run: impl FnOnce()) -> isize {
    let before = live();
    run();
    live() - before
}

fn insert(stmt: &mut Statement<'_>, rows: &[[Option<&str>; 2]]) -> Result<usize, DriverError> {
    stmt.bulk_insert(batch(rows))
}

/// A host-style batch built through the C ABI allocators.
fn capi_batch(values: &[Option<&str>]) -> *mut *mut c_char {
    let vars = unsafe { etlite_batch_new(values.len()) };
    for (i, value) in values.iter().enumerate() {
        if let Some(text) = value {
            unsafe {
                *vars.add(i) = etlite_value_new(text.as_ptr().cast::<c_char>(), text.len());
            }
        }
    }
    vars
}

fn flat(rows: &[[Option<&'static str>; 2]]) -> Vec<Option<&'static str>> {
    rows.iter().flatten().copied().collect()
}

/// A raw statement handle, the way a host holds one.
fn prepare_raw(conn: &Connection, sql: &str) -> *mut ffi::sqlite3_stmt {
    let mut stmt = ptr::null_mut();
    let rc = unsafe {
        ffi::sqlite3_prepare_v2(
            conn.inner().handle(),
            sql.as_ptr().cast(),
            sql.len() as i32,
            &mut stmt,
            ptr::null_mut(),
        )
    };
    assert_eq!(rc, ffi::SQLITE_OK);
    stmt
}

#[test]
fn test_every_buffer_released_exactly_once() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch("CREATE TABLE t (n INT NOT NULL, s TEXT)")
        .unwrap();
    let mut stmt = conn.prepare("INSERT INTO t VALUES (?, ?)").unwrap();
    let raw = prepare_raw(&conn, "INSERT INTO t VALUES (?, ?)");
    let good = flat(&GOOD);
    let third_row_fails = flat(&THIRD_ROW_FAILS);

    // Warm up both paths so one-time lazy allocations are not counted.
    insert(&mut stmt, &GOOD).unwrap();
    insert(&mut stmt, &THIRD_ROW_FAILS).unwrap_err();
    unsafe { etlite_bulk_insert(raw, 2, capi_batch(&good), 10) };
    unsafe { etlite_bulk_insert(raw, 2, capi_batch(&third_row_fails), 10) };
    conn.execute_batch("DELETE FROM t").unwrap();

    assert_eq!(
        leaked(|| {
            let rows = insert(&mut stmt, &GOOD).unwrap();
            assert_eq!(rows, 5);
        }),
        0,
        "successful insert"
    );

    assert_eq!(
        leaked(|| {
            let err = insert(&mut stmt, &THIRD_ROW_FAILS).unwrap_err();
            assert!(matches!(err, DriverError::Engine { .. }));
        }),
        0,
        "insert stopped at row 3"
    );

    assert_eq!(
        leaked(|| {
            let err = stmt.bulk_insert(Batch::new(2)).unwrap_err();
            assert!(matches!(err, DriverError::BatchShape { .. }));
        }),
        0,
        "empty batch"
    );

    assert_eq!(
        leaked(|| {
            let values = vec![Value::text("7").unwrap(), Value::text("odd").unwrap(), Value::null()];
            assert!(Batch::from_values(2, values).is_err());
        }),
        0,
        "ragged batch"
    );

    assert_eq!(
        leaked(|| {
            let vars = capi_batch(&[Some("8"), Some("eight"), None]);
            let code = unsafe { etlite_bulk_insert(ptr::null_mut(), 2, vars, 3) };
            assert_eq!(code, ffi::SQLITE_MISUSE);
        }),
        0,
        "C batch rejected before binding"
    );

    assert_eq!(
        leaked(|| {
            let vars = capi_batch(&third_row_fails);
            let code = unsafe { etlite_bulk_insert(raw, 2, vars, 10) };
            assert_eq!(code & 0xff, ffi::SQLITE_CONSTRAINT);
        }),
        0,
        "C batch stopped at row 3"
    );

    assert_eq!(
        leaked(|| {
            let vars = capi_batch(&[Some("9"), Some("nine")]);
            let code = unsafe { etlite_bulk_insert(raw, 2, vars, -2) };
            assert_eq!(code, ffi::SQLITE_MISUSE);
            unsafe { etlite_batch_free(vars, 2) };
        }),
        0,
        "negative count, batch freed by the host"
    );
    unsafe { ffi::sqlite3_finalize(raw) };

    let count: i64 = conn
        .inner()
        .query_row("SELECT count(*) FROM t", [], |r| r.get(0))
        .unwrap();
    assert_eq!(count, 9);
}
