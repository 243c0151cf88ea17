///
/// Outcome codes and driver error types.
///
/// `Outcome` is the coarse vocabulary every operation reports through, and
/// the integer codes are what the C ABI hands back to the host. `DriverError`
/// carries the detail: the engine status and message, or the exact shape
/// mismatch the assert-query helper found.
///

use std::ffi::{NulError, c_int};
use std::fmt;
use std::str::Utf8Error;

use rusqlite::ffi;
use thiserror::Error;

/// What happened, without the detail.
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Outcome {
    Ok = 0,
    EngineError = -1,
    WrongColumnCount = -2,
    NoResult = -3,
    WrongValueType = -4,
    ValueOutOfRange = -5,
    TooManyResults = -6,
}

impl Outcome {
    /// Integer code used at the C boundary.
    pub fn code(self) -> c_int {
        self as c_int
    }

    pub fn from_code(code: c_int) -> Option<Self> {
        Some(match code {
            0 => Self::Ok,
            -1 => Self::EngineError,
            -2 => Self::WrongColumnCount,
            -3 => Self::NoResult,
            -4 => Self::WrongValueType,
            -5 => Self::ValueOutOfRange,
            -6 => Self::TooManyResults,
            _ => return None,
        })
    }

    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Ok => "ok",
            Self::EngineError => "engine error",
            Self::WrongColumnCount => "wrong column count",
            Self::NoResult => "no result",
            Self::WrongValueType => "wrong value type",
            Self::ValueOutOfRange => "value out of range",
            Self::TooManyResults => "too many results",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("sqlite error {code}: {message}")]
    Engine { code: c_int, message: String },

    #[error("assert query must have exactly one column, got {columns}")]
    WrongColumnCount { columns: usize },

    #[error("assert query must have exactly one result, none returned")]
    NoResult,

    #[error("assert query must return a boolean, got {found} value")]
    WrongValueType { found: &'static str },

    #[error("assert query must return a boolean, got {value} (expected 0 or 1)")]
    ValueOutOfRange { value: i64 },

    #[error("assert query must have exactly one result, multiple returned")]
    TooManyResults,

    #[error("batch of {len} values cannot be split into rows of {arity}")]
    BatchShape { len: usize, arity: usize },

    #[error("{0}")]
    Misuse(String),

    #[error("value contains an interior NUL byte at offset {}", .0.nul_position())]
    InteriorNul(#[from] NulError),

    #[error("column value is not valid UTF-8: {0}")]
    Utf8(#[from] Utf8Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl DriverError {
    pub(crate) fn misuse(message: impl Into<String>) -> Self {
        Self::Misuse(message.into())
    }

    pub fn outcome(&self) -> Outcome {
        match self {
            Self::WrongColumnCount { .. } => Outcome::WrongColumnCount,
            Self::NoResult => Outcome::NoResult,
            Self::WrongValueType { .. } => Outcome::WrongValueType,
            Self::ValueOutOfRange { .. } => Outcome::ValueOutOfRange,
            Self::TooManyResults => Outcome::TooManyResults,
            Self::Engine { .. }
            | Self::BatchShape { .. }
            | Self::Misuse(_)
            | Self::InteriorNul(_)
            | Self::Utf8(_)
            | Self::Config(_) => Outcome::EngineError,
        }
    }

    /// Engine status code equivalent, for callers that speak SQLite codes.
    pub fn code(&self) -> c_int {
        match self {
            Self::Engine { code, .. } => *code,
            Self::BatchShape { .. } | Self::Misuse(_) | Self::InteriorNul(_) => ffi::SQLITE_MISUSE,
            _ => ffi::SQLITE_ERROR,
        }
    }
}

impl From<rusqlite::Error> for DriverError {
    fn from(e: rusqlite::Error) -> Self {
        match e {
            rusqlite::Error::SqliteFailure(err, message) => Self::Engine {
                code: err.extended_code,
                message: message.unwrap_or_else(|| err.to_string()),
            },
            other => Self::Engine {
                code: ffi::SQLITE_ERROR,
                message: other.to_string(),
            },
        }
    }
}

pub type DriverResult<T> = Result<T, DriverError>;
