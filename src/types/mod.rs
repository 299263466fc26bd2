mod row;
mod sql_value;
mod write;

pub use row::{RawTable, Row, Table};
pub use sql_value::SqlValue;
pub use write::{GeneratedId, IsolationLevel, WriteOptions, WriteOutcome};
