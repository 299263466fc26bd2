mod tokio_postgres;

pub use self::in_memory_test::{
    FakeResponse, InMemoryResponseBuilder, InMemoryTestDriver, RecordedCommand,
};
pub use self::tokio_postgres::TokioPostgresDriver;
