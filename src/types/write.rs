use crate::error::{Error, Result};
use crate::types::SqlValue;

/// Transaction isolation level, rendered by drivers into their native syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    /// The SQL spelling of this isolation level.
    pub fn as_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// Options for a write execution.
///
/// Collapses the write variants into one configurable call: a plain
/// execute, or an execute wrapped in a transaction with an optional
/// isolation level.
#[derive(Debug, Clone, Copy, Default)]
pub struct WriteOptions {
    pub transaction: bool,
    pub isolation: Option<IsolationLevel>,
}

impl WriteOptions {
    /// Plain execution, no transaction.
    pub fn plain() -> Self {
        Self::default()
    }

    /// Execute inside a transaction at the driver's default isolation level.
    pub fn transactional() -> Self {
        Self {
            transaction: true,
            isolation: None,
        }
    }

    /// Execute inside a transaction at the given isolation level.
    pub fn with_isolation(level: IsolationLevel) -> Self {
        Self {
            transaction: true,
            isolation: Some(level),
        }
    }
}

/// Outcome of a write execution.
///
/// A transactional write that fails rolls back and reports the failure
/// here instead of returning `Err`: the call itself completes normally,
/// and the caller decides what a rollback means for them.
#[derive(Debug)]
pub enum WriteOutcome {
    /// The command was applied. For transactional writes the transaction
    /// committed; for plain writes the command simply executed.
    Committed { rows_affected: u64 },
    /// The command or the commit failed and the transaction was rolled
    /// back. Carries the underlying failure.
    RolledBack { error: Error },
}

impl WriteOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, WriteOutcome::Committed { .. })
    }

    /// Rows affected, when the write committed.
    pub fn rows_affected(&self) -> Option<u64> {
        match self {
            WriteOutcome::Committed { rows_affected } => Some(*rows_affected),
            WriteOutcome::RolledBack { .. } => None,
        }
    }
}

/// The identifier produced by an identifier-returning insert.
///
/// Wraps the scalar the database handed back and converts it on demand,
/// since callers variously want 32- and 64-bit identifiers.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedId {
    value: SqlValue,
}

impl GeneratedId {
    pub(crate) fn new(value: SqlValue) -> Self {
        Self { value }
    }

    /// The raw scalar as returned by the driver.
    pub fn value(&self) -> &SqlValue {
        &self.value
    }

    /// The identifier as an i32.
    pub fn to_i32(&self) -> Result<i32> {
        match &self.value {
            SqlValue::Int32(v) => Ok(*v),
            SqlValue::Int64(v) => i32::try_from(*v).map_err(|_| self.conversion_error("i32")),
            SqlValue::Text(s) => s.trim().parse().map_err(|_| self.conversion_error("i32")),
            _ => Err(self.conversion_error("i32")),
        }
    }

    /// The identifier as an i64.
    pub fn to_i64(&self) -> Result<i64> {
        match &self.value {
            SqlValue::Int32(v) => Ok(i64::from(*v)),
            SqlValue::Int64(v) => Ok(*v),
            SqlValue::Text(s) => s.trim().parse().map_err(|_| self.conversion_error("i64")),
            _ => Err(self.conversion_error("i64")),
        }
    }

    fn conversion_error(&self, target: &'static str) -> Error {
        Error::Conversion {
            value: self.value.clone(),
            target,
        }
    }
}
