use crate::error::Result;
use crate::traits::Connection;
use crate::types::Row;

/// A forward-only cursor over a result set, backed by an open connection.
///
/// The cursor owns the connection it reads from: ownership transfers to
/// the caller when [`DataAccess::fetch_cursor`](crate::DataAccess::fetch_cursor)
/// returns, and the connection stays open until [`close`](Cursor::close)
/// is called. Dropping the cursor without closing it leaks the
/// connection to the driver's own cleanup.
pub struct Cursor {
    connection: Box<dyn Connection>,
    columns: Vec<String>,
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("columns", &self.columns)
            .finish_non_exhaustive()
    }
}

impl Cursor {
    pub(crate) fn new(connection: Box<dyn Connection>, columns: Vec<String>) -> Self {
        Self {
            connection,
            columns,
        }
    }

    /// The result column names, in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Pulls the next row, or `None` once the result set is exhausted.
    /// An exhausted cursor still holds its connection open until closed.
    pub async fn next_row(&mut self) -> Result<Option<Row>> {
        self.connection.fetch_row().await
    }

    /// Closes the cursor and the connection it owns.
    pub async fn close(mut self) -> Result<()> {
        self.connection.close().await
    }
}
