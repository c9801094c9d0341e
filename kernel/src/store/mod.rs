// Log Record Storage
//
// Defines the storage contract for log records and its SQLite
// implementation. Each call opens its own connection, runs one
// transaction (writes) or one statement (reads) and closes it.

use rusqlite::{params, params_from_iter, Connection};

use crate::query::compile::compile;
use crate::query::filters;
use crate::query::{Field, Operator, QuerySpec, SpecificationError};
use crate::record::{
    parse_timestamp, CallerInfo, Level, LogEntry, LogRecord, RecordError, RecordId, TagSet,
};
use crate::schema::{open_connection, StorageError, StoreConfig};

/// Storage backend for log records.
///
/// Implementations MUST:
/// - persist a record and its tag associations atomically
/// - return either every matching record or an error, never a partial list
/// - leave tag rows in place when a record is deleted
pub trait RecordStore: Send + Sync {
    /// Persist an entry. Returns the id assigned by the store.
    fn append(&self, entry: &LogEntry) -> Result<RecordId, WriteError>;

    /// Load the records matching a specification, in its sort order.
    fn query(&self, spec: &QuerySpec) -> Result<Vec<LogRecord>, QueryError>;

    /// Delete one record. Returns `false` if it did not exist.
    fn delete(&self, id: RecordId) -> Result<bool, WriteError>;

    /// Every tag name known to the store, sorted.
    fn tag_names(&self) -> Result<Vec<String>, QueryError>;

    /// Load a single record by id.
    fn get(&self, id: RecordId) -> Result<Option<LogRecord>, QueryError> {
        let spec = QuerySpec::from_options(&[filters::filter(Field::Id, Operator::Equal, id)]);
        Ok(self.query(&spec)?.into_iter().next())
    }
}

/// Errors raised by a write. The transaction is rolled back before the
/// error reaches the caller.
#[derive(Debug, thiserror::Error)]
pub enum WriteError {
    #[error("write: {0}")]
    Storage(#[from] StorageError),

    #[error("write: failed to begin transaction: {0}")]
    Begin(#[source] rusqlite::Error),

    #[error("write: failed to insert record: {0}")]
    Insert(#[source] rusqlite::Error),

    #[error("write: failed to commit: {0}")]
    Commit(#[source] rusqlite::Error),

    #[error("write: failed to delete record {id}: {source}")]
    Delete { id: RecordId, source: rusqlite::Error },
}

/// Errors raised while running a query or reading its rows.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("query: {0}")]
    Storage(#[from] StorageError),

    #[error("query: {0}")]
    Specification(#[from] SpecificationError),

    #[error("query: failed to execute: {0}")]
    Execute(#[source] rusqlite::Error),

    #[error("query: failed to decode row: {0}")]
    Decode(#[from] RecordError),
}

const INSERT_LOG: &str = "INSERT INTO logs (level, caller_file, caller_line, caller_function, message) \
     VALUES (?1, ?2, ?3, ?4, ?5)";

const INSERT_TAG: &str = "INSERT OR IGNORE INTO tags (name) VALUES (?1)";

const LINK_TAG: &str = "INSERT INTO log_tags (log_id, tag_id) \
     VALUES (?1, (SELECT id FROM tags WHERE name = ?2))";

const TAGS_FOR_LOG: &str = "SELECT tags.name FROM tags \
     INNER JOIN log_tags ON tags.id = log_tags.tag_id \
     WHERE log_tags.log_id = ?1 ORDER BY tags.name";

/// SQLite-backed record store.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    config: StoreConfig,
}

impl SqliteStore {
    pub fn new(config: StoreConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Open a ready connection to the underlying store.
    pub fn connect(&self) -> Result<Connection, StorageError> {
        open_connection(&self.config)
    }
}

/// Columns of one result row, before decoding.
struct RawRow {
    id: RecordId,
    level: i64,
    caller_file: String,
    caller_line: i64,
    caller_function: String,
    message: String,
    time: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            level: row.get(1)?,
            caller_file: row.get(2)?,
            caller_line: row.get(3)?,
            caller_function: row.get(4)?,
            message: row.get(5)?,
            time: row.get(6)?,
        })
    }

    fn into_record(self, tags: TagSet) -> Result<LogRecord, RecordError> {
        let line = u32::try_from(self.caller_line)
            .map_err(|_| RecordError::LineOutOfRange(self.caller_line))?;

        Ok(LogRecord {
            id: self.id,
            level: Level::try_from(self.level)?,
            tags,
            caller: CallerInfo {
                file: self.caller_file,
                line,
                function: self.caller_function,
            },
            message: self.message,
            timestamp: parse_timestamp(&self.time)?,
        })
    }
}

fn tags_for(conn: &Connection, id: RecordId) -> Result<TagSet, QueryError> {
    let mut stmt = conn.prepare_cached(TAGS_FOR_LOG).map_err(QueryError::Execute)?;
    let names = stmt
        .query_map([id], |row| row.get::<_, String>(0))
        .map_err(QueryError::Execute)?;

    let mut tags = TagSet::new();
    for name in names {
        tags.insert(name.map_err(QueryError::Execute)?);
    }
    Ok(tags)
}

impl RecordStore for SqliteStore {
    fn append(&self, entry: &LogEntry) -> Result<RecordId, WriteError> {
        let mut conn = self.connect()?;
        let tx = conn.transaction().map_err(WriteError::Begin)?;

        tx.execute(
            INSERT_LOG,
            params![
                entry.level.as_i64(),
                entry.caller.file,
                entry.caller.line,
                entry.caller.function,
                entry.message,
            ],
        )
        .map_err(WriteError::Insert)?;
        let id = tx.last_insert_rowid();

        {
            let mut insert_tag = tx.prepare_cached(INSERT_TAG).map_err(WriteError::Insert)?;
            let mut link_tag = tx.prepare_cached(LINK_TAG).map_err(WriteError::Insert)?;
            for tag in entry.tags.iter() {
                insert_tag.execute([tag]).map_err(WriteError::Insert)?;
                link_tag
                    .execute(params![id, tag])
                    .map_err(WriteError::Insert)?;
            }
        }

        // Dropping an uncommitted transaction rolls it back, so every early
        // return above leaves the store untouched.
        tx.commit().map_err(WriteError::Commit)?;
        tracing::trace!(id, level = %entry.level, tags = entry.tags.len(), "appended log record");
        Ok(id)
    }

    fn query(&self, spec: &QuerySpec) -> Result<Vec<LogRecord>, QueryError> {
        let conn = self.connect()?;
        let compiled = compile(spec);
        tracing::debug!(sql = %compiled.sql, params = compiled.params.len(), "running log query");

        let mut stmt = conn
            .prepare(&compiled.sql)
            .map_err(|err| SpecificationError::Rejected {
                statement: compiled.sql.clone(),
                reason: err.to_string(),
            })?;

        let rows = stmt
            .query_map(params_from_iter(compiled.params.iter()), RawRow::from_row)
            .map_err(QueryError::Execute)?;

        let mut records = Vec::new();
        for row in rows {
            let raw = row.map_err(QueryError::Execute)?;
            let tags = tags_for(&conn, raw.id)?;
            records.push(raw.into_record(tags)?);
        }

        Ok(records)
    }

    fn delete(&self, id: RecordId) -> Result<bool, WriteError> {
        let conn = self.connect()?;
        let removed = conn
            .execute("DELETE FROM logs WHERE id = ?1", [id])
            .map_err(|source| WriteError::Delete { id, source })?;
        Ok(removed > 0)
    }

    fn tag_names(&self) -> Result<Vec<String>, QueryError> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare("SELECT name FROM tags ORDER BY name")
            .map_err(QueryError::Execute)?;
        let names = stmt
            .query_map([], |row| row.get(0))
            .map_err(QueryError::Execute)?
            .collect::<Result<Vec<String>, _>>()
            .map_err(QueryError::Execute)?;
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filters::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, SqliteStore) {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new(StoreConfig::new(dir.path()));
        (dir, store)
    }

    fn entry(level: Level, tags: &[&str], file: &str, message: &str) -> LogEntry {
        LogEntry::new(level, tags.iter().copied().collect(), message).with_caller(CallerInfo {
            file: file.into(),
            line: 12,
            function: "handler".into(),
        })
    }

    fn count(conn: &Connection, table: &str) -> i64 {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))
            .unwrap()
    }

    #[test]
    fn round_trip_preserves_fields() {
        let (_dir, store) = store();
        let written = entry(Level::Error, &["auth"], "login.rs", "login failed");

        let id = store.append(&written).unwrap();
        let records = store.query(&QuerySpec::new()).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, id);
        assert!(records[0].matches_entry(&written));
    }

    #[test]
    fn untagged_records_are_returned() {
        let (_dir, store) = store();
        store.append(&entry(Level::Info, &[], "a.rs", "plain")).unwrap();
        store.append(&entry(Level::Info, &["x", "y"], "a.rs", "tagged")).unwrap();

        let records = store.query(&QuerySpec::from_options(&[sort_id("asc")])).unwrap();

        assert_eq!(records.len(), 2);
        assert!(records[0].tags.is_empty());
        assert_eq!(records[1].tags.len(), 2);
    }

    #[test]
    fn tag_filters_respect_multi_tag_records() {
        let (_dir, store) = store();
        store.append(&entry(Level::Info, &["a", "b"], "x.rs", "both")).unwrap();
        store.append(&entry(Level::Info, &["b"], "x.rs", "only b")).unwrap();
        store.append(&entry(Level::Info, &[], "x.rs", "none")).unwrap();

        let with_a = store.query(&QuerySpec::from_options(&[has_tag("a")])).unwrap();
        assert_eq!(with_a.len(), 1);
        assert_eq!(with_a[0].message, "both");
        assert!(with_a[0].tags.contains("b"), "all tags are resolved");

        let without_a = store
            .query(&QuerySpec::from_options(&[lacks_tag("a"), sort_id("asc")])).unwrap();
        let messages: Vec<_> = without_a.iter().map(|r| r.message.as_str()).collect();
        assert_eq!(messages, vec!["only b", "none"]);

        let any = store
            .query(&QuerySpec::from_options(&[has_any_tag(["a", "b"])]))
            .unwrap();
        assert_eq!(any.len(), 2);
    }

    #[test]
    fn delete_keeps_tag_rows() {
        let (_dir, store) = store();
        let id = store.append(&entry(Level::Warning, &["disk"], "io.rs", "full")).unwrap();

        assert!(store.delete(id).unwrap());
        assert!(!store.delete(id).unwrap());

        let conn = store.connect().unwrap();
        assert_eq!(count(&conn, "logs"), 0);
        assert_eq!(count(&conn, "log_tags"), 0);
        assert_eq!(store.tag_names().unwrap(), vec!["disk".to_string()]);
    }

    #[test]
    fn shared_tags_are_stored_once() {
        let (_dir, store) = store();
        store.append(&entry(Level::Info, &["net"], "a.rs", "one")).unwrap();
        store.append(&entry(Level::Info, &["net"], "a.rs", "two")).unwrap();

        let conn = store.connect().unwrap();
        assert_eq!(count(&conn, "tags"), 1);
        assert_eq!(count(&conn, "log_tags"), 2);
    }

    #[test]
    fn failed_write_leaves_no_rows() {
        let (_dir, store) = store();
        store
            .connect()
            .unwrap()
            .execute_batch(
                "CREATE TRIGGER reject_links BEFORE INSERT ON log_tags \
                 BEGIN SELECT RAISE(ABORT, 'rejected'); END;",
            )
            .unwrap();

        let err = store
            .append(&entry(Level::Error, &["t"], "a.rs", "doomed"))
            .unwrap_err();

        assert!(matches!(err, WriteError::Insert(_)));
        let conn = store.connect().unwrap();
        assert_eq!(count(&conn, "logs"), 0);
        assert_eq!(count(&conn, "tags"), 0);
    }

    #[test]
    fn malformed_custom_fragment_is_a_specification_error() {
        let (_dir, store) = store();

        let err = store
            .query(&QuerySpec::from_options(&[custom("level ===== nonsense (")]))
            .unwrap_err();

        assert!(matches!(err, QueryError::Specification(_)));
    }

    #[test]
    fn get_by_id() {
        let (_dir, store) = store();
        store.append(&entry(Level::Debug, &[], "a.rs", "first")).unwrap();
        let id = store.append(&entry(Level::Debug, &[], "a.rs", "second")).unwrap();

        let record = store.get(id).unwrap().unwrap();
        assert_eq!(record.message, "second");
        assert!(store.get(id + 100).unwrap().is_none());
    }

    #[test]
    fn missing_folder_surfaces_as_storage_error() {
        let dir = TempDir::new().unwrap();
        let store = SqliteStore::new(StoreConfig::new(dir.path().join("gone")));

        let err = store.query(&QuerySpec::new()).unwrap_err();
        assert!(matches!(err, QueryError::Storage(StorageError::Folder { .. })));
    }
}
