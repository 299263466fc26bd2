use std::sync::Arc;

use crate::command::Command;
use crate::cursor::Cursor;
use crate::drivers::TokioPostgresDriver;
use crate::error::Result;
use crate::traits::{Connection, DatabaseDriver};
use crate::types::{
    GeneratedId, IsolationLevel, SqlValue, Table, WriteOptions, WriteOutcome,
};

/// Main entry point for sqlrs.
/// Holds a connection string and a driver; every execution method opens
/// its own connection, runs the command, and closes the connection
/// before returning. The one exception is [`fetch_cursor`](DataAccess::fetch_cursor),
/// which hands the open connection to the caller inside the cursor.
pub struct DataAccess {
    driver: Arc<dyn DatabaseDriver>,
    connection_string: String,
}

impl DataAccess {
    /// Create a helper over a PostgreSQL data source.
    /// The connection string is taken as-is; nothing is validated until
    /// the first execution opens a connection.
    pub fn new(connection_string: impl Into<String>) -> Self {
        Self::with_driver(Arc::new(TokioPostgresDriver), connection_string)
    }

    /// Create a helper with a custom driver.
    /// Useful for testing or using alternative database drivers.
    pub fn with_driver(
        driver: Arc<dyn DatabaseDriver>,
        connection_string: impl Into<String>,
    ) -> Self {
        Self {
            driver,
            connection_string: connection_string.into(),
        }
    }

    async fn open(&self) -> Result<Box<dyn Connection>> {
        self.driver.open(&self.connection_string).await
    }

    /// Execute a command and return the fully materialized result.
    ///
    /// The connection is closed before this returns, on the error path
    /// included; errors propagate to the caller.
    pub async fn fetch_table(&self, command: &Command) -> Result<Table> {
        tracing::debug!(command = command.command_text(), "fetching table");
        let mut connection = self.open().await?;
        let result = connection.query(command).await;
        let closed = connection.close().await;
        let raw = result?;
        closed?;
        Ok(Table::from_raw(raw))
    }

    /// Execute a command and return a forward-only cursor over its rows.
    ///
    /// Ownership of the open connection transfers to the returned
    /// cursor; the caller must call [`Cursor::close`] when done.
    pub async fn fetch_cursor(&self, command: &Command) -> Result<Cursor> {
        tracing::debug!(command = command.command_text(), "opening cursor");
        let mut connection = self.open().await?;
        match connection.start_cursor(command).await {
            Ok(columns) => Ok(Cursor::new(connection, columns)),
            Err(error) => {
                if let Err(close_error) = connection.close().await {
                    tracing::warn!(%close_error, "failed to close connection after cursor error");
                }
                Err(error)
            }
        }
    }

    /// Execute a command and return the value of the first column of the
    /// first row, or [`SqlValue::Null`] when the result set is empty.
    pub async fn fetch_scalar(&self, command: &Command) -> Result<SqlValue> {
        tracing::debug!(command = command.command_text(), "fetching scalar");
        let mut connection = self.open().await?;
        let result = connection.query(command).await;
        let closed = connection.close().await;
        let raw = result?;
        closed?;
        let scalar = raw
            .rows
            .into_iter()
            .next()
            .and_then(|row| row.into_iter().next())
            .unwrap_or(SqlValue::Null);
        Ok(scalar)
    }

    /// Execute a command and discard any result, returning the number of
    /// rows affected. Inserts, updates, and deletes all go through here;
    /// they differ only in the SQL they carry.
    pub async fn execute(&self, command: &Command) -> Result<u64> {
        tracing::debug!(command = command.command_text(), "executing");
        let mut connection = self.open().await?;
        let result = connection.execute(command).await;
        let closed = connection.close().await;
        let affected = result?;
        closed?;
        Ok(affected)
    }

    /// Execute an identifier-returning insert and wrap the scalar it
    /// produces. The returned [`GeneratedId`] converts to i32 or i64.
    pub async fn insert_returning(&self, command: &Command) -> Result<GeneratedId> {
        let value = self.fetch_scalar(command).await?;
        Ok(GeneratedId::new(value))
    }

    /// Execute a write with the given options.
    ///
    /// Without a transaction this behaves like [`execute`](DataAccess::execute)
    /// and reports the affected count as a committed outcome. With a
    /// transaction, the command runs between `BEGIN` and `COMMIT`; if
    /// the command or the commit fails, the transaction is rolled back
    /// and the call returns normally with
    /// [`WriteOutcome::RolledBack`] carrying the failure. Only
    /// connectivity, begin, and rollback failures surface as `Err`. The
    /// connection is closed on every path.
    pub async fn execute_write(
        &self,
        command: &Command,
        options: WriteOptions,
    ) -> Result<WriteOutcome> {
        tracing::debug!(
            command = command.command_text(),
            transaction = options.transaction,
            "executing write"
        );
        let mut connection = self.open().await?;
        let result = if options.transaction {
            transact(connection.as_mut(), command, options.isolation).await
        } else {
            connection
                .execute(command)
                .await
                .map(|rows_affected| WriteOutcome::Committed { rows_affected })
        };
        let closed = connection.close().await;
        let outcome = result?;
        closed?;
        Ok(outcome)
    }
}

async fn transact(
    connection: &mut dyn Connection,
    command: &Command,
    isolation: Option<IsolationLevel>,
) -> Result<WriteOutcome> {
    connection.begin(isolation).await?;
    let failure = match connection.execute(command).await {
        Ok(rows_affected) => match connection.commit().await {
            Ok(()) => return Ok(WriteOutcome::Committed { rows_affected }),
            Err(error) => error,
        },
        Err(error) => error,
    };
    tracing::debug!(%failure, "write failed, rolling back");
    connection.rollback().await?;
    Ok(WriteOutcome::RolledBack { error: failure })
}
