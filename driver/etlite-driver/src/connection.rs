///
/// Database connection.
///
/// Opening and closing go through rusqlite; statements prepared here are
/// driven through the raw engine layer and borrow the connection, so the
/// connection cannot close while any of them is alive.
///

use std::path::Path;

use rusqlite::ffi;
use tracing::debug;

use crate::config::DriverConfig;
use crate::error::DriverResult;
use crate::scalar;
use crate::statement::Statement;

pub struct Connection {
    inner: rusqlite::Connection,
    config: DriverConfig,
}

impl Connection {
    pub fn open(path: impl AsRef<Path>) -> DriverResult<Self> {
        Self::open_with_config(path, DriverConfig::default())
    }

    pub fn open_with_config(path: impl AsRef<Path>, config: DriverConfig) -> DriverResult<Self> {
        config.validate()?;
        let path = path.as_ref();
        let inner = rusqlite::Connection::open_with_flags(path, config.open_flags())?;
        if let Some(timeout) = config.busy_timeout() {
            inner.busy_timeout(timeout)?;
        }
        debug!(path = %path.display(), read_only = config.read_only, "opened database");
        Ok(Self { inner, config })
    }

    pub fn open_in_memory() -> DriverResult<Self> {
        let config = DriverConfig::default();
        let inner = rusqlite::Connection::open_in_memory_with_flags(config.open_flags())?;
        debug!("opened in-memory database");
        Ok(Self { inner, config })
    }

    /// Closes the connection, reporting failure. Dropping closes silently.
    pub fn close(self) -> DriverResult<()> {
        self.inner.close().map_err(|(_, e)| e)?;
        debug!("closed database");
        Ok(())
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Runs one or more `;`-separated statements that take no parameters.
    pub fn execute_batch(&self, sql: &str) -> DriverResult<()> {
        Ok(self.inner.execute_batch(sql)?)
    }

    /// Prepares the first statement in `sql`.
    pub fn prepare(&self, sql: &str) -> DriverResult<Statement<'_>> {
        Statement::prepare(self, sql)
    }

    /// Runs a query that must yield exactly one row with one integer column
    /// holding 0 or 1, and returns it as a boolean.
    pub fn assert_query(&self, sql: &str) -> DriverResult<bool> {
        unsafe { scalar::assert_query(self.handle(), sql.as_bytes()) }
    }

    /// The underlying rusqlite connection, for anything this crate does not
    /// wrap.
    pub fn inner(&self) -> &rusqlite::Connection {
        &self.inner
    }

    pub(crate) fn handle(&self) -> *mut ffi::sqlite3 {
        unsafe { self.inner.handle() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DriverError;

    #[test]
    fn test_open_and_assert() {
        let conn = Connection::open_in_memory().unwrap();
        assert_eq!(conn.config().bulk_rows_at_once, 16);
        assert!(conn.assert_query("SELECT 1").unwrap());
        conn.close().unwrap();
    }

    #[test]
    fn test_open_read_only_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Connection::open_with_config(dir.path().join("missing.db"), DriverConfig::read_only())
            .err()
            .unwrap();
        assert!(matches!(err, DriverError::Engine { .. }));
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = DriverConfig {
            bulk_rows_at_once: 0,
            ..DriverConfig::default()
        };
        let err = Connection::open_with_config(":memory:", config).err().unwrap();
        assert!(matches!(err, DriverError::Config(_)));
    }

    #[test]
    fn test_execute_batch_reports_engine_error() {
        let conn = Connection::open_in_memory().unwrap();
        let err = conn.execute_batch("CREATE TABLE").unwrap_err();
        assert_eq!(err.outcome(), crate::error::Outcome::EngineError);
    }
}
