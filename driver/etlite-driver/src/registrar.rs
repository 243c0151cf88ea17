///
/// Extension registrar.
///
/// Hands the etlite-ext initializers to the engine's auto-extension list so
/// that every connection opened afterwards loads them. Registration is
/// process-wide, explicit, and never undone; connections that are already
/// open are unaffected.
///

use std::fmt;

use etlite_ext::EntryPoint;
use rusqlite::ffi;
use tracing::debug;

use crate::engine::status_error;
use crate::error::DriverResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Extension {
    Regexp,
    Series,
    NextChar,
    Spellfix,
}

impl Extension {
    /// Registration order.
    pub const ALL: [Extension; 4] = [
        Extension::Regexp,
        Extension::Series,
        Extension::NextChar,
        Extension::Spellfix,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Regexp => "regexp",
            Self::Series => "series",
            Self::NextChar => "nextchar",
            Self::Spellfix => "spellfix",
        }
    }

    pub fn entry_point(self) -> EntryPoint {
        match self {
            Self::Regexp => etlite_ext::etlite_regexp_init,
            Self::Series => etlite_ext::etlite_series_init,
            Self::NextChar => etlite_ext::etlite_nextchar_init,
            Self::Spellfix => etlite_ext::etlite_spellfix_init,
        }
    }

    fn register(self) -> DriverResult<()> {
        let entry = self.entry_point();
        // The engine stores the entry point as a parameterless function
        // pointer and casts it back to the initializer shape when loading.
        let rc = unsafe { ffi::sqlite3_auto_extension(Some(std::mem::transmute(entry as *const ()))) };
        if rc != ffi::SQLITE_OK {
            return Err(status_error(rc));
        }
        debug!(extension = self.name(), "registered auto extension");
        Ok(())
    }
}

impl fmt::Display for Extension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Registers every extension, in order, for all connections opened from
/// now on. Stops at the first failure; earlier registrations stay in place.
/// Calling it again is harmless.
pub fn startup() -> DriverResult<()> {
    for ext in Extension::ALL {
        ext.register()?;
    }
    Ok(())
}
