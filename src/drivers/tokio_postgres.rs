use std::pin::Pin;

use async_trait::async_trait;
use futures::StreamExt;
use tokio_postgres::{types::ToSql, Client, NoTls, RowStream};

use crate::command::{Command, CommandKind, ParamDirection, Parameter};
use crate::error::{Error, Result};
use crate::traits::{Connection, DatabaseDriver};
use crate::types::{IsolationLevel, RawTable, Row, SqlValue};

/// PostgreSQL driver implementation using tokio-postgres.
///
/// Each `open` dials a fresh session; the helper's call pattern closes
/// it again before the call returns, so no pooling happens here.
pub struct TokioPostgresDriver;

#[async_trait]
impl DatabaseDriver for TokioPostgresDriver {
    async fn open(&self, connection_string: &str) -> Result<Box<dyn Connection>> {
        let (client, connection) = tokio_postgres::connect(connection_string, NoTls)
            .await
            .map_err(|e| Error::ConnectionFailed(e.to_string()))?;

        // The connection task finishes on its own once the client drops.
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!(error = %e, "postgres connection task failed");
            }
        });

        Ok(Box::new(PostgresConnection {
            client: Some(client),
            stream: None,
            cursor_columns: Vec::new(),
        }))
    }
}

struct PostgresConnection {
    client: Option<Client>,
    stream: Option<Pin<Box<RowStream>>>,
    cursor_columns: Vec<String>,
}

impl PostgresConnection {
    fn client(&self) -> Result<&Client> {
        self.client.as_ref().ok_or(Error::ConnectionClosed)
    }
}

#[async_trait]
impl Connection for PostgresConnection {
    async fn query(&mut self, command: &Command) -> Result<RawTable> {
        let (sql, values) = render_command(command, StatementPosition::Query)?;
        let params = to_sql_params(&values);
        let rows = self
            .client()?
            .query(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| Error::CommandFailed(e.to_string()))?;

        let columns: Vec<String> = match rows.first() {
            Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
            None => Vec::new(),
        };

        let result_rows: Vec<Vec<SqlValue>> = rows
            .iter()
            .map(|row| (0..row.len()).map(|i| cell_to_sql_value(row, i)).collect())
            .collect();

        Ok(RawTable::new(columns, result_rows))
    }

    async fn execute(&mut self, command: &Command) -> Result<u64> {
        let (sql, values) = render_command(command, StatementPosition::NonQuery)?;
        let params = to_sql_params(&values);
        self.client()?
            .execute(sql.as_str(), &param_refs(&params))
            .await
            .map_err(|e| Error::CommandFailed(e.to_string()))
    }

    async fn start_cursor(&mut self, command: &Command) -> Result<Vec<String>> {
        let (sql, values) = render_command(command, StatementPosition::Query)?;
        let client = self.client()?;
        let statement = client
            .prepare(&sql)
            .await
            .map_err(|e| Error::CommandFailed(e.to_string()))?;
        let columns: Vec<String> = statement
            .columns()
            .iter()
            .map(|c| c.name().to_string())
            .collect();

        let params = to_sql_params(&values);
        let stream = client
            .query_raw(&statement, param_refs(&params))
            .await
            .map_err(|e| Error::CommandFailed(e.to_string()))?;

        self.stream = Some(Box::pin(stream));
        self.cursor_columns = columns.clone();
        Ok(columns)
    }

    async fn fetch_row(&mut self) -> Result<Option<Row>> {
        let stream = match self.stream.as_mut() {
            Some(stream) => stream,
            None => return Ok(None),
        };
        match stream.next().await {
            Some(Ok(row)) => {
                let cells = (0..row.len()).map(|i| cell_to_sql_value(&row, i)).collect();
                Ok(Some(Row::new(&self.cursor_columns, cells)))
            }
            Some(Err(e)) => Err(Error::CommandFailed(e.to_string())),
            None => {
                self.stream = None;
                Ok(None)
            }
        }
    }

    async fn begin(&mut self, isolation: Option<IsolationLevel>) -> Result<()> {
        let sql = match isolation {
            Some(level) => format!("BEGIN ISOLATION LEVEL {}", level.as_sql()),
            None => "BEGIN".to_string(),
        };
        self.client()?
            .batch_execute(&sql)
            .await
            .map_err(|e| Error::TransactionFailed(e.to_string()))
    }

    async fn commit(&mut self) -> Result<()> {
        self.client()?
            .batch_execute("COMMIT")
            .await
            .map_err(|e| Error::TransactionFailed(e.to_string()))
    }

    async fn rollback(&mut self) -> Result<()> {
        self.client()?
            .batch_execute("ROLLBACK")
            .await
            .map_err(|e| Error::TransactionFailed(e.to_string()))
    }

    async fn close(&mut self) -> Result<()> {
        self.stream = None;
        self.client = None;
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq)]
enum StatementPosition {
    Query,
    NonQuery,
}

/// Render a command into positional-placeholder SQL plus the values to
/// bind, in placeholder order.
fn render_command(
    command: &Command,
    position: StatementPosition,
) -> Result<(String, Vec<SqlValue>)> {
    check_unique_names(command.parameters())?;
    match command.kind() {
        CommandKind::Text => render_text(command.command_text(), command.parameters()),
        CommandKind::StoredProcedure => Ok(render_procedure(command, position)),
    }
}

/// Rewrite `@name` placeholders to `$n`, assigning numbers in order of
/// first appearance. Repeated references reuse their number. Quoted
/// literals are left untouched.
fn render_text(text: &str, params: &[Parameter]) -> Result<(String, Vec<SqlValue>)> {
    let mut sql = String::with_capacity(text.len());
    let mut values: Vec<SqlValue> = Vec::new();
    let mut bound: Vec<String> = Vec::new();
    let mut chars = text.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            sql.push(c);
            if c == '\'' {
                if chars.peek() == Some(&'\'') {
                    sql.push('\'');
                    chars.next();
                } else {
                    in_string = false;
                }
            }
            continue;
        }
        match c {
            '\'' => {
                in_string = true;
                sql.push(c);
            }
            '@' => {
                let mut name = String::new();
                while let Some(&next) = chars.peek() {
                    if next.is_ascii_alphanumeric() || next == '_' {
                        name.push(next);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    sql.push('@');
                    continue;
                }
                let number = match bound.iter().position(|n| n == &name) {
                    Some(index) => index + 1,
                    None => {
                        let param = params
                            .iter()
                            .find(|p| p.name() == name)
                            .ok_or_else(|| Error::MissingParameter(name.clone()))?;
                        values.push(param.value().clone());
                        bound.push(name.clone());
                        bound.len()
                    }
                };
                sql.push('$');
                sql.push_str(&number.to_string());
            }
            _ => sql.push(c),
        }
    }

    Ok((sql, values))
}

/// Render a stored-procedure command. In query position the procedure is
/// treated as a set-returning function; in non-query position it is
/// invoked with CALL. Output-only parameters are not bound.
fn render_procedure(command: &Command, position: StatementPosition) -> (String, Vec<SqlValue>) {
    let bound: Vec<&Parameter> = command
        .parameters()
        .iter()
        .filter(|p| p.direction() != ParamDirection::Output)
        .collect();
    let placeholders = (1..=bound.len())
        .map(|i| format!("${i}"))
        .collect::<Vec<_>>()
        .join(", ");
    let sql = match position {
        StatementPosition::Query => {
            format!("SELECT * FROM {}({})", command.command_text(), placeholders)
        }
        StatementPosition::NonQuery => {
            format!("CALL {}({})", command.command_text(), placeholders)
        }
    };
    let values = bound.iter().map(|p| p.value().clone()).collect();
    (sql, values)
}

fn check_unique_names(params: &[Parameter]) -> Result<()> {
    for (i, param) in params.iter().enumerate() {
        if params[..i].iter().any(|p| p.name() == param.name()) {
            return Err(Error::DuplicateParameter(param.name().to_string()));
        }
    }
    Ok(())
}

/// Convert SqlValues to boxed ToSql trait objects.
fn to_sql_params(values: &[SqlValue]) -> Vec<Box<dyn ToSql + Sync + Send>> {
    values
        .iter()
        .map(|v| -> Box<dyn ToSql + Sync + Send> {
            match v {
                SqlValue::Null => Box::new(None::<String>),
                SqlValue::Bool(b) => Box::new(*b),
                SqlValue::Int32(i) => Box::new(*i),
                SqlValue::Int64(i) => Box::new(*i),
                SqlValue::Double(f) => Box::new(*f),
                SqlValue::Text(s) => Box::new(s.clone()),
                SqlValue::Bytes(b) => Box::new(b.clone()),
            }
        })
        .collect()
}

fn param_refs<'a>(
    params: &'a [Box<dyn ToSql + Sync + Send>],
) -> Vec<&'a (dyn ToSql + Sync)> {
    params
        .iter()
        .map(|b| b.as_ref() as &(dyn ToSql + Sync))
        .collect()
}

/// Convert a row cell at the given index to a SqlValue.
fn cell_to_sql_value(row: &tokio_postgres::Row, index: usize) -> SqlValue {
    // Probe common types; unsupported column types come back as Null.
    if let Ok(val) = row.try_get::<_, Option<i32>>(index) {
        return val.map(SqlValue::Int32).unwrap_or(SqlValue::Null);
    }
    if let Ok(val) = row.try_get::<_, Option<i64>>(index) {
        return val.map(SqlValue::Int64).unwrap_or(SqlValue::Null);
    }
    if let Ok(val) = row.try_get::<_, Option<f64>>(index) {
        return val.map(SqlValue::Double).unwrap_or(SqlValue::Null);
    }
    if let Ok(val) = row.try_get::<_, Option<bool>>(index) {
        return val.map(SqlValue::Bool).unwrap_or(SqlValue::Null);
    }
    if let Ok(val) = row.try_get::<_, Option<String>>(index) {
        return val.map(SqlValue::Text).unwrap_or(SqlValue::Null);
    }
    if let Ok(val) = row.try_get::<_, Option<Vec<u8>>>(index) {
        return val.map(SqlValue::Bytes).unwrap_or(SqlValue::Null);
    }
    SqlValue::Null
}
