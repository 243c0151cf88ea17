///
/// etlite SQLite Bulk Transfer Binding
///
/// Moves batches of string-typed rows between a host runtime and SQLite with
/// one bind/step/reset cycle per row and a single owner for every buffer.
/// Uses rusqlite with bundled SQLite for connections and the raw C API
/// (rusqlite::ffi) for the statement-level protocol.
///
/// Architecture:
/// - engine: the only user of raw statement entry points. Bound text moves
///   into SQLite together with a destructor, so SQLite frees it.
/// - transfer: bulk insert, bulk read, subquery and exec over a raw
///   statement.
/// - scalar: the assert-query state machine.
/// - registrar: process-wide registration of the etlite-ext modules.
/// - Connection / Statement / BulkLoader / Rows: the safe surface, with
///   lifetimes tying rows to statements and statements to connections.
/// - capi: extern "C" entry points for hosts linking the static library.
///
/// Errors are DriverError values; each maps to an Outcome code and to a
/// SQLite status code for the C boundary.
///

pub mod batch;
pub mod capi;
pub mod config;
pub mod connection;
mod engine;
pub mod error;
pub mod loader;
pub mod registrar;
pub mod rows;
mod scalar;
pub mod statement;
pub mod transfer;

pub use batch::{Batch, Value};
pub use config::{DEFAULT_BULK_ROWS_AT_ONCE, DriverConfig};
pub use connection::Connection;
pub use error::{DriverError, DriverResult, Outcome};
pub use loader::BulkLoader;
pub use registrar::{Extension, startup};
pub use rows::Rows;
pub use statement::Statement;
pub use transfer::Row;
