// Logger
//
// Public entry point: holds the caller configuration, turns level calls
// into persisted records and runs queries and exports against the store.
//
// The fatal path only persists and notifies. Terminating the process is
// left to whoever receives the `FatalEvent`.

use std::env;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::display::{CallerDisplay, DisplayConfig, TimestampDisplay};
use crate::export::{export_to_folder, ExportError, ExportFormat};
use crate::query::{QueryOption, QuerySpec};
use crate::record::{CallerInfo, Level, LogEntry, LogRecord, RecordId, TagSet};
use crate::schema::{StoreConfig, DEFAULT_FILE_NAME};
use crate::store::{QueryError, RecordStore, SqliteStore, WriteError};

/// Logger configuration, loadable from JSON.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggerConfig {
    /// Folder holding the store file and exports.
    pub folder: PathBuf,

    #[serde(default = "default_file_name")]
    pub file_name: String,

    /// Tags attached to every record written by the logger.
    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default = "default_fatal_title")]
    pub fatal_title: String,

    #[serde(default = "default_fatal_message")]
    pub fatal_message: String,

    /// How records are printed.
    #[serde(default)]
    pub display: DisplayConfig,
}

fn default_file_name() -> String {
    DEFAULT_FILE_NAME.into()
}

fn default_fatal_title() -> String {
    "Fatal".into()
}

fn default_fatal_message() -> String {
    "An error occurred, please check the logs for more information".into()
}

impl LoggerConfig {
    /// Built-in configuration, used if none is provided.
    pub fn default_config() -> Self {
        Self::in_folder(default_folder())
    }

    pub fn in_folder(folder: impl Into<PathBuf>) -> Self {
        Self {
            folder: folder.into(),
            file_name: default_file_name(),
            tags: Vec::new(),
            fatal_title: default_fatal_title(),
            fatal_message: default_fatal_message(),
            display: DisplayConfig::default(),
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.folder).with_file_name(&self.file_name)
    }
}

/// Folder of the running executable.
///
/// Binaries run from the temp dir (`cargo run`, test harnesses) use the
/// working directory instead. Falls back to `.`.
pub fn default_folder() -> PathBuf {
    let exe_folder = env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));

    match exe_folder {
        Some(folder) if !folder.starts_with(env::temp_dir()) => folder,
        _ => env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

/// Emitted after a fatal record has been persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FatalEvent {
    pub record_id: RecordId,
    pub title: String,
    pub message: String,
    pub error: String,
}

/// Receives fatal events, e.g. to raise an alert before exiting.
pub trait FatalNotifier: Send + Sync {
    fn notify(&self, event: &FatalEvent);
}

#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error(transparent)]
    Write(#[from] WriteError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Writes and reads log records for one configuration.
#[derive(Clone)]
pub struct Logger<S: RecordStore = SqliteStore> {
    config: LoggerConfig,
    tags: TagSet,
    store: S,
    notifiers: Vec<Arc<dyn FatalNotifier>>,
}

impl Logger<SqliteStore> {
    /// Logger backed by the SQLite store in `config.folder`.
    pub fn new(config: LoggerConfig) -> Self {
        let store = SqliteStore::new(config.store_config());
        Self::with_store(config, store)
    }
}

impl<S: RecordStore> Logger<S> {
    pub fn with_store(config: LoggerConfig, store: S) -> Self {
        let tags = config.tags.iter().cloned().collect();
        Self {
            config,
            tags,
            store,
            notifiers: Vec::new(),
        }
    }

    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn current_tags(&self) -> &TagSet {
        &self.tags
    }

    /// Add tags to the ones already attached.
    pub fn tags<I, T>(&mut self, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags.extend(tags);
    }

    /// Replace the attached tags.
    pub fn set_tags<I, T>(&mut self, tags: I)
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.tags = tags.into_iter().collect();
    }

    pub fn set_fatal(&mut self, title: impl Into<String>, message: impl Into<String>) {
        self.config.fatal_title = title.into();
        self.config.fatal_message = message.into();
    }

    pub fn add_notifier(&mut self, notifier: Arc<dyn FatalNotifier>) {
        self.notifiers.push(notifier);
    }

    pub fn display(&self) -> &DisplayConfig {
        &self.config.display
    }

    pub fn show_caller(&mut self, caller: CallerDisplay) {
        self.config.display.caller = caller;
    }

    pub fn show_timestamp(&mut self, timestamp: TimestampDisplay) {
        self.config.display.timestamp = timestamp;
    }

    pub fn show_tags(&mut self, show: bool) {
        self.config.display.show_tags = show;
    }

    pub fn inline(&mut self, inline: bool) {
        self.config.display.inline = inline;
    }

    /// Build a record attributed to the caller without persisting it.
    ///
    /// Used by front ends that print instead of storing.
    #[track_caller]
    pub fn entry(&self, level: Level, message: impl Into<String>) -> LogEntry {
        LogEntry::new(level, self.tags.clone(), message).with_caller(CallerInfo::capture())
    }

    /// Persist one record at `level`, attributed to the caller.
    #[track_caller]
    pub fn log(&self, level: Level, message: impl Into<String>) -> Result<RecordId, LoggerError> {
        let entry = self.entry(level, message);
        Ok(self.store.append(&entry)?)
    }

    /// Persist one record with explicit caller information, e.g. from
    /// [`caller!`](crate::caller).
    pub fn log_from(
        &self,
        caller: CallerInfo,
        level: Level,
        message: impl Into<String>,
    ) -> Result<RecordId, LoggerError> {
        let entry = LogEntry::new(level, self.tags.clone(), message).with_caller(caller);
        Ok(self.store.append(&entry)?)
    }

    #[track_caller]
    pub fn debug(&self, message: impl Into<String>) -> Result<RecordId, LoggerError> {
        self.log(Level::Debug, message)
    }

    #[track_caller]
    pub fn info(&self, message: impl Into<String>) -> Result<RecordId, LoggerError> {
        self.log(Level::Info, message)
    }

    #[track_caller]
    pub fn warn(&self, message: impl Into<String>) -> Result<RecordId, LoggerError> {
        self.log(Level::Warning, message)
    }

    #[track_caller]
    pub fn error(&self, message: impl Into<String>) -> Result<RecordId, LoggerError> {
        self.log(Level::Error, message)
    }

    /// Persist a fatal record, then notify every registered notifier.
    ///
    /// Notifiers only run once the record is stored.
    #[track_caller]
    pub fn fatal(&self, error: &dyn fmt::Display) -> Result<FatalEvent, LoggerError> {
        let text = error.to_string();
        let record_id = self.log(Level::Fatal, text.clone())?;

        let event = FatalEvent {
            record_id,
            title: self.config.fatal_title.clone(),
            message: self.config.fatal_message.clone(),
            error: text,
        };
        for notifier in &self.notifiers {
            notifier.notify(&event);
        }
        Ok(event)
    }

    /// Records matching `options`, applied in order.
    pub fn records(&self, options: &[QueryOption]) -> Result<Vec<LogRecord>, LoggerError> {
        let spec = QuerySpec::from_options(options);
        Ok(self.store.query(&spec)?)
    }

    /// Export the records matching `options` into the configured folder.
    pub fn export(
        &self,
        format: ExportFormat,
        options: &[QueryOption],
    ) -> Result<PathBuf, LoggerError> {
        let records = self.records(options)?;
        Ok(export_to_folder(&records, format, &self.config.folder)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::filters::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<FatalEvent>>,
    }

    impl FatalNotifier for Recorder {
        fn notify(&self, event: &FatalEvent) {
            self.events.lock().unwrap().push(event.clone());
        }
    }

    fn logger(dir: &TempDir) -> Logger {
        let mut config = LoggerConfig::in_folder(dir.path());
        config.tags = vec!["svc".into()];
        Logger::new(config)
    }

    #[test]
    fn level_calls_persist_with_configured_tags() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);

        log.debug("d").unwrap();
        log.warn("w").unwrap();

        let records = log.records(&[sort_level("asc")]).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].level, Level::Debug);
        assert_eq!(records[1].level, Level::Warning);
        assert!(records.iter().all(|r| r.tags.contains("svc")));
    }

    #[test]
    fn caller_is_the_line_that_logged() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);

        let (id, line) = (log.info("here").unwrap(), line!());

        let record = log.store().get(id).unwrap().unwrap();
        assert_eq!(record.caller.file, "logger.rs");
        assert_eq!(record.caller.line, line);
    }

    #[test]
    fn explicit_caller_keeps_the_function_name() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);

        let id = log.log_from(crate::caller!(), Level::Info, "named").unwrap();

        let record = log.store().get(id).unwrap().unwrap();
        assert_eq!(record.caller.file, "logger.rs");
        assert!(record
            .caller
            .function
            .ends_with("tests::explicit_caller_keeps_the_function_name"));
    }

    #[test]
    fn entry_is_built_but_not_stored() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);

        let (entry, line) = (log.entry(Level::Warning, "console only"), line!());

        assert_eq!(entry.level, Level::Warning);
        assert!(entry.tags.contains("svc"));
        assert_eq!(entry.caller.line, line);
        assert!(log.records(&[]).unwrap().is_empty());
    }

    #[test]
    fn display_setters_update_the_config() {
        let dir = TempDir::new().unwrap();
        let mut log = logger(&dir);
        assert_eq!(*log.display(), DisplayConfig::default());

        log.show_caller(CallerDisplay::Function);
        log.show_timestamp(TimestampDisplay::Hide);
        log.show_tags(true);
        log.inline(true);

        let display = log.display();
        assert_eq!(display.caller, CallerDisplay::Function);
        assert_eq!(display.timestamp, TimestampDisplay::Hide);
        assert!(display.show_tags && display.inline);
    }

    #[test]
    fn tags_append_and_set_replaces() {
        let dir = TempDir::new().unwrap();
        let mut log = logger(&dir);

        log.tags(["extra"]);
        assert_eq!(log.current_tags().len(), 2);

        log.set_tags(["only"]);
        assert_eq!(log.current_tags().join(","), "only");
    }

    #[test]
    fn fatal_persists_before_notifying() {
        let dir = TempDir::new().unwrap();
        let mut log = logger(&dir);
        let recorder = Arc::new(Recorder::default());
        log.add_notifier(recorder.clone());
        log.set_fatal("Boom", "see logs");

        let event = log.fatal(&"disk on fire").unwrap();

        assert_eq!(event.title, "Boom");
        assert_eq!(event.error, "disk on fire");
        assert_eq!(recorder.events.lock().unwrap().as_slice(), &[event.clone()]);

        let stored = log.store().get(event.record_id).unwrap().unwrap();
        assert_eq!(stored.level, Level::Fatal);
        assert_eq!(stored.message, "disk on fire");
    }

    #[test]
    fn failed_fatal_write_does_not_notify() {
        let dir = TempDir::new().unwrap();
        let mut log = Logger::new(LoggerConfig::in_folder(dir.path().join("missing")));
        let recorder = Arc::new(Recorder::default());
        log.add_notifier(recorder.clone());

        assert!(log.fatal(&"lost").is_err());
        assert!(recorder.events.lock().unwrap().is_empty());
    }

    #[test]
    fn export_lands_in_the_configured_folder() {
        let dir = TempDir::new().unwrap();
        let log = logger(&dir);
        log.error("exported").unwrap();

        let path = log.export(ExportFormat::Json, &[]).unwrap();

        assert_eq!(path.parent().unwrap(), dir.path());
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.contains("exported"));
    }

    #[test]
    fn config_loads_from_json_with_defaults() {
        let config: LoggerConfig =
            serde_json::from_str(r#"{ "folder": "/var/log/app", "tags": ["api"] }"#).unwrap();

        assert_eq!(config.file_name, DEFAULT_FILE_NAME);
        assert_eq!(config.fatal_title, "Fatal");
        assert_eq!(config.tags, vec!["api".to_string()]);
        assert_eq!(config.display, DisplayConfig::default());
    }

    #[test]
    fn display_options_load_from_json() {
        let config: LoggerConfig = serde_json::from_str(
            r#"{ "folder": ".", "display": { "caller": "line", "timestamp": "full", "inline": true } }"#,
        )
        .unwrap();

        assert_eq!(config.display.caller, CallerDisplay::Line);
        assert_eq!(config.display.timestamp, TimestampDisplay::Full);
        assert!(config.display.inline);
        assert!(!config.display.show_tags);
    }
}
