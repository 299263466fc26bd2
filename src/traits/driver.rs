use async_trait::async_trait;

use crate::command::Command;
use crate::error::Result;
use crate::types::{IsolationLevel, RawTable, Row};

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Opening connections from an opaque connection string
/// - Converting command parameters to native types
/// - Executing commands and converting results to RawTable rows
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Open a new connection to the database.
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>>;
}

/// A single open database session.
///
/// Owned exclusively by one execution at a time; there is no sharing and
/// no pooling. `close` must be called on every path except when the
/// connection has been handed to a [`Cursor`](crate::Cursor), whose
/// caller closes it instead.
#[async_trait]
pub trait Connection: Send {
    /// Execute a command and materialize every result row.
    async fn query(&mut self, command: &Command) -> Result<RawTable>;

    /// Execute a command, discarding any result rows.
    /// Returns the number of rows affected.
    async fn execute(&mut self, command: &Command) -> Result<u64>;

    /// Start a forward-only cursor over the command's result rows.
    /// Returns the result column names; rows are pulled with `fetch_row`.
    async fn start_cursor(&mut self, command: &Command) -> Result<Vec<String>>;

    /// Fetch the next row from the open cursor, or `None` when exhausted.
    async fn fetch_row(&mut self) -> Result<Option<Row>>;

    /// Begin a transaction, optionally at the given isolation level.
    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<()>;

    /// Commit the open transaction.
    async fn commit(&mut self) -> Result<()>;

    /// Roll back the open transaction.
    async fn rollback(&mut self) -> Result<()>;

    /// Close the connection. Further calls on this connection fail.
    async fn close(&mut self) -> Result<()>;
}
