///
/// Row iteration.
///
/// `Rows` lends one row at a time: each row borrows the iterator, so it must
/// be dropped before the next call. Not a `std::iter::Iterator` for that
/// reason.
///

use crate::error::DriverResult;
use crate::statement::Statement;
use crate::transfer::Row;

pub struct Rows<'s, 'conn> {
    stmt: &'s mut Statement<'conn>,
    done: bool,
}

impl<'s, 'conn> Rows<'s, 'conn> {
    pub(crate) fn new(stmt: &'s mut Statement<'conn>) -> Self {
        Self { stmt, done: false }
    }

    /// The next row, `None` once the statement is exhausted. An error ends
    /// the iteration: it is returned once and `None` follows.
    #[allow(clippy::should_implement_trait)]
    pub fn next(&mut self) -> Option<DriverResult<Row<'_>>> {
        if self.done {
            return None;
        }
        match self.stmt.bulk_read() {
            Ok(Some(row)) => Some(Ok(row)),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

impl Drop for Rows<'_, '_> {
    fn drop(&mut self) {
        // Leave the statement ready to run again.
        let _ = self.stmt.reset();
    }
}
