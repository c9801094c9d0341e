// Logvault Kernel
//
// Embedded log-record store: record model, schema management,
// composable query specification and its SQL compiler.

pub mod display;
pub mod export;
pub mod logger;
pub mod query;
pub mod record;
pub mod schema;
pub mod store;

pub use display::{CallerDisplay, DisplayConfig, TimestampDisplay};
pub use logger::{FatalEvent, FatalNotifier, Logger, LoggerConfig, LoggerError};
pub use query::{filters, Direction, Field, QueryOption, QuerySpec};
pub use record::{CallerInfo, Level, LogEntry, LogRecord, RecordId, TagSet};
pub use store::{QueryError, RecordStore, SqliteStore, WriteError};
