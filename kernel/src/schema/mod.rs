// Store Schema Manager
//
// Resolves the store file, opens a connection and makes sure the
// normalized schema (logs, tags, log_tags) exists.
//
// Every statement here is safe to re-run. There is no connection pool:
// each store operation opens its own connection and drops it when done.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use rusqlite::Connection;
use serde::{Deserialize, Serialize};

/// File name of the store inside the configured folder.
pub const DEFAULT_FILE_NAME: &str = "logs_data.db";

/// Idempotent DDL for the normalized schema.
pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    level INTEGER NOT NULL DEFAULT 0,
    caller_file TEXT DEFAULT '',
    caller_line INTEGER DEFAULT 0,
    caller_function TEXT DEFAULT '',
    message TEXT DEFAULT '',
    time TEXT NOT NULL DEFAULT (datetime('now', 'localtime'))
);

CREATE INDEX IF NOT EXISTS logs_level_index ON logs (level);
CREATE INDEX IF NOT EXISTS logs_caller_file_index ON logs (caller_file);
CREATE INDEX IF NOT EXISTS logs_caller_line_index ON logs (caller_line);
CREATE INDEX IF NOT EXISTS logs_caller_function_index ON logs (caller_function);
CREATE INDEX IF NOT EXISTS logs_message_index ON logs (message);
CREATE INDEX IF NOT EXISTS logs_time_index ON logs (time);

CREATE TABLE IF NOT EXISTS tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE INDEX IF NOT EXISTS tags_name_index ON tags (name);

CREATE TABLE IF NOT EXISTS log_tags (
    log_id INTEGER NOT NULL,
    tag_id INTEGER NOT NULL,
    PRIMARY KEY (log_id, tag_id),
    FOREIGN KEY (log_id) REFERENCES logs(id) ON DELETE CASCADE,
    FOREIGN KEY (tag_id) REFERENCES tags(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS lt_log_id_index ON log_tags (log_id);
CREATE INDEX IF NOT EXISTS lt_tag_id_index ON log_tags (tag_id);
"#;

/// Where the store lives on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    pub folder: PathBuf,

    #[serde(default = "default_file_name")]
    pub file_name: String,
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.into()
}

impl StoreConfig {
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            file_name: default_file_name(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    /// Full path of the store file.
    pub fn path(&self) -> PathBuf {
        self.folder.join(&self.file_name)
    }
}

/// Errors raised while preparing the store.
///
/// All of them are fatal to the call that triggered them.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage: cannot resolve folder {path}: {source}")]
    Folder { path: PathBuf, source: io::Error },

    #[error("storage: failed to check the store file {path}: {source}")]
    StatFile { path: PathBuf, source: io::Error },

    #[error("storage: failed to create the store file {path}: {source}")]
    CreateFile { path: PathBuf, source: io::Error },

    #[error("storage: failed to connect to {path}: {source}")]
    Connect {
        path: PathBuf,
        source: rusqlite::Error,
    },

    #[error("storage: failed to create the schema: {0}")]
    Schema(#[source] rusqlite::Error),
}

/// Open a ready-to-use connection to the store described by `config`.
///
/// Creates the store file when it does not exist yet.
pub fn open_connection(config: &StoreConfig) -> Result<Connection, StorageError> {
    let folder = resolve_folder(&config.folder)?;
    let path = folder.join(&config.file_name);

    ensure_file(&path)?;

    let mut conn = Connection::open(&path).map_err(|source| StorageError::Connect {
        path: path.clone(),
        source,
    })?;
    tracing::trace!(path = %path.display(), "opened log store");

    ensure_schema(&mut conn)?;
    Ok(conn)
}

/// Apply the schema to an open connection.
///
/// Foreign keys are enabled per connection, so this must run on every
/// connection before records are deleted.
pub fn ensure_schema(conn: &mut Connection) -> Result<(), StorageError> {
    conn.pragma_update(None, "foreign_keys", true)
        .map_err(StorageError::Schema)?;

    let tx = conn.transaction().map_err(StorageError::Schema)?;
    tx.execute_batch(SCHEMA).map_err(StorageError::Schema)?;
    tx.commit().map_err(StorageError::Schema)
}

fn resolve_folder(folder: &Path) -> Result<PathBuf, StorageError> {
    let resolved = folder.canonicalize().map_err(|source| StorageError::Folder {
        path: folder.to_path_buf(),
        source,
    })?;

    if !resolved.is_dir() {
        return Err(StorageError::Folder {
            path: resolved,
            source: io::Error::new(io::ErrorKind::Other, "not a directory"),
        });
    }

    Ok(resolved)
}

fn ensure_file(path: &Path) -> Result<(), StorageError> {
    match fs::metadata(path) {
        Ok(_) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::File::create(path)
                .map(drop)
                .map_err(|source| StorageError::CreateFile {
                    path: path.to_path_buf(),
                    source,
                })
        }
        Err(source) => Err(StorageError::StatFile {
            path: path.to_path_buf(),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn table_names(conn: &Connection) -> Vec<String> {
        let mut stmt = conn
            .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .unwrap();
        stmt.query_map([], |row| row.get(0))
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap()
    }

    #[test]
    fn creates_store_file_and_tables() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path());

        let conn = open_connection(&config).unwrap();

        assert!(config.path().exists());
        let tables = table_names(&conn);
        for expected in ["log_tags", "logs", "tags"] {
            assert!(tables.iter().any(|t| t == expected), "missing {expected}");
        }
    }

    #[test]
    fn opening_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path()).with_file_name("twice.db");

        drop(open_connection(&config).unwrap());
        let conn = open_connection(&config).unwrap();

        let fk: i64 = conn
            .query_row("PRAGMA foreign_keys", [], |row| row.get(0))
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[test]
    fn missing_folder_is_a_folder_error() {
        let dir = TempDir::new().unwrap();
        let config = StoreConfig::new(dir.path().join("does-not-exist"));

        let err = open_connection(&config).unwrap_err();

        assert!(matches!(err, StorageError::Folder { .. }));
        assert!(err.to_string().starts_with("storage:"));
    }

    #[test]
    fn file_as_folder_is_rejected() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("plain.txt");
        fs::write(&file, b"x").unwrap();

        let err = open_connection(&StoreConfig::new(&file)).unwrap_err();
        assert!(matches!(err, StorageError::Folder { .. }));
    }
}
