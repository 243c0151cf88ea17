///
/// Shared helpers for the etlite-driver integration tests.
///

use etlite_driver::{Batch, Connection, Value};

/// Routes driver logs to the test harness. Safe to call from every test.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

/// Rows of the `t(a, b, c)` fixture table, NULLs included.
pub fn table() -> Vec<[Option<&'static str>; 3]> {
    vec![
        [Some("1"), None, Some("squirrel")],
        [Some("2"), Some("two"), None],
        [Some("3"), None, None],
        [Some("4"), Some("avocado"), Some("σ∈⁵ℝ«⌋")],
    ]
}

pub fn batch_of(rows: &[[Option<&str>; 3]]) -> Batch {
    let mut batch = Batch::with_capacity(3, rows.len());
    for row in rows {
        let values = row
            .iter()
            .map(|v| Value::from_option(*v).expect("fixture values have no NUL"));
        batch.push_row(values).expect("fixture rows have three values");
    }
    batch
}

pub fn open_with_table() -> Connection {
    let conn = Connection::open_in_memory().expect("Failed to open in-memory database");
    conn.execute_batch("CREATE TABLE t (a INT NOT NULL, b TEXT, c TEXT)")
        .expect("Failed to create fixture table");
    conn
}

pub fn read_all(conn: &Connection, sql: &str) -> Vec<Vec<Option<String>>> {
    let mut stmt = conn.prepare(sql).expect("Failed to prepare select");
    let mut rows = stmt.rows().expect("Failed to iterate select");
    let mut out = Vec::new();
    while let Some(row) = rows.next() {
        let row = row.expect("Failed to read row");
        out.push(row.to_owned_strings().expect("Row is not UTF-8"));
    }
    out
}
