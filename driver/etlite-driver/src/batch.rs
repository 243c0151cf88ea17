///
/// Owned column values and batches of rows for bulk insert.
///
/// A `Value` owns its text buffer until it is bound, at which point the
/// buffer moves into the engine and the engine releases it. Anything that
/// never reaches the engine is released by `Drop` like any other Rust value,
/// which gives the insert path one release route per buffer.
///

use std::ffi::{CStr, CString};
use std::fmt;

use crate::error::{DriverError, DriverResult};

/// A text column value or SQL NULL.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Value(Option<CString>);

impl Value {
    pub fn null() -> Self {
        Self(None)
    }

    /// Fails if `bytes` contains a NUL byte: the engine receives the buffer
    /// NUL-terminated and the release routine relies on that terminator.
    pub fn text(bytes: impl Into<Vec<u8>>) -> DriverResult<Self> {
        Ok(Self(Some(CString::new(bytes)?)))
    }

    pub fn from_option<T: Into<Vec<u8>>>(value: Option<T>) -> DriverResult<Self> {
        value.map_or_else(|| Ok(Self::null()), Self::text)
    }

    pub fn is_null(&self) -> bool {
        self.0.is_none()
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        self.0.as_deref().map(CStr::to_bytes)
    }

    pub(crate) fn into_inner(self) -> Option<CString> {
        self.0
    }
}

impl From<CString> for Value {
    fn from(s: CString) -> Self {
        Self(Some(s))
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(s) => write!(f, "{:?}", s.to_string_lossy()),
            None => f.write_str("NULL"),
        }
    }
}

/// Values for consecutive executions of one statement, `arity` per row in
/// parameter order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    arity: usize,
    values: Vec<Value>,
}

impl Batch {
    /// # Panics
    ///
    /// Panics if `arity` is zero.
    pub fn new(arity: usize) -> Self {
        Self::with_capacity(arity, 0)
    }

    /// # Panics
    ///
    /// Panics if `arity` is zero.
    pub fn with_capacity(arity: usize, rows: usize) -> Self {
        assert!(arity > 0, "batch arity must be positive");
        Self {
            arity,
            values: Vec::with_capacity(arity * rows),
        }
    }

    /// Builds a batch from a flat value list. The list is released if it does
    /// not split evenly into rows.
    pub fn from_values(arity: usize, values: Vec<Value>) -> DriverResult<Self> {
        if arity == 0 || values.len() % arity != 0 {
            return Err(DriverError::BatchShape {
                len: values.len(),
                arity,
            });
        }
        Ok(Self { arity, values })
    }

    /// Appends one row. A row of the wrong width is rejected and released.
    pub fn push_row(&mut self, row: impl IntoIterator<Item = Value>) -> DriverResult<()> {
        let start = self.values.len();
        self.values.extend(row);
        let width = self.values.len() - start;
        if width != self.arity {
            self.values.truncate(start);
            return Err(DriverError::BatchShape {
                len: width,
                arity: self.arity,
            });
        }
        Ok(())
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    /// Number of values, not rows.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn rows(&self) -> usize {
        self.values.len() / self.arity
    }

    pub(crate) fn into_parts(self) -> (usize, Vec<Value>) {
        (self.arity, self.values)
    }
}
