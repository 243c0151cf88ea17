///
/// Driver configuration.
///
/// Settings may be built in code or read from TOML:
///
/// ```toml
/// bulk_rows_at_once = 64
/// read_only = false
/// busy_timeout_ms = 5000
/// ```
///
/// Missing keys take their defaults; unknown keys are rejected.
///

use std::time::Duration;

use rusqlite::OpenFlags;
use serde::Deserialize;

use crate::error::{DriverError, DriverResult};

/// Rows a `BulkLoader` queues before flushing them in one bulk insert.
pub const DEFAULT_BULK_ROWS_AT_ONCE: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DriverConfig {
    pub bulk_rows_at_once: usize,
    pub read_only: bool,
    /// Ignored when `read_only` is set.
    pub create: bool,
    /// 0 leaves the engine's busy handling untouched.
    pub busy_timeout_ms: u64,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            bulk_rows_at_once: DEFAULT_BULK_ROWS_AT_ONCE,
            read_only: false,
            create: true,
            busy_timeout_ms: 0,
        }
    }
}

impl DriverConfig {
    pub fn from_toml_str(source: &str) -> DriverResult<Self> {
        let config: Self = toml::from_str(source).map_err(|e| DriverError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> DriverResult<()> {
        if self.bulk_rows_at_once == 0 {
            return Err(DriverError::Config(
                "bulk_rows_at_once must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn read_only() -> Self {
        Self {
            read_only: true,
            create: false,
            ..Self::default()
        }
    }

    pub(crate) fn open_flags(&self) -> OpenFlags {
        let mut flags = OpenFlags::SQLITE_OPEN_URI | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
        if self.read_only {
            flags |= OpenFlags::SQLITE_OPEN_READ_ONLY;
        } else {
            flags |= OpenFlags::SQLITE_OPEN_READ_WRITE;
            if self.create {
                flags |= OpenFlags::SQLITE_OPEN_CREATE;
            }
        }
        flags
    }

    pub(crate) fn busy_timeout(&self) -> Option<Duration> {
        (self.busy_timeout_ms > 0).then(|| Duration::from_millis(self.busy_timeout_ms))
    }
}
