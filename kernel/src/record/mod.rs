// Log Record Model
//
// The values persisted by the store and handed back by queries.
// A record is created once, written once and never mutated.

use std::collections::BTreeSet;
use std::fmt;
use std::panic::Location;
use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Store-assigned identity of a record.
pub type RecordId = i64;

/// Textual layout of timestamps, both in the store and in exports.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Layout used by date-only comparisons.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Placeholder for caller fields that could not be captured.
pub const UNKNOWN_CALLER: &str = "unknown";

/// Severity of a record.
///
/// Backed by the integer stored in the `level` column; the derived
/// ordering follows that integer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
#[repr(u8)]
pub enum Level {
    Debug = 0,
    Info = 1,
    Warning = 2,
    Error = 3,
    Fatal = 4,
}

impl Level {
    pub const ALL: [Level; 5] = [
        Level::Debug,
        Level::Info,
        Level::Warning,
        Level::Error,
        Level::Fatal,
    ];

    /// Integer representation used by the store.
    pub fn as_i64(self) -> i64 {
        self as i64
    }

    pub fn label(self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warning => "WARNING",
            Level::Error => "ERROR",
            Level::Fatal => "FATAL",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("record: unknown level value {0}")]
    UnknownLevel(i64),

    #[error("record: unknown level name `{0}`")]
    UnknownLevelName(String),

    #[error("record: caller line {0} out of range")]
    LineOutOfRange(i64),

    #[error("record: malformed timestamp `{0}`")]
    MalformedTimestamp(String),
}

impl TryFrom<i64> for Level {
    type Error = RecordError;

    fn try_from(value: i64) -> Result<Self, RecordError> {
        Level::ALL
            .into_iter()
            .find(|level| level.as_i64() == value)
            .ok_or(RecordError::UnknownLevel(value))
    }
}

impl FromStr for Level {
    type Err = RecordError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warning),
            "error" => Ok(Level::Error),
            "fatal" => Ok(Level::Fatal),
            _ => Err(RecordError::UnknownLevelName(s.to_string())),
        }
    }
}

/// Set of tag names attached to a record.
///
/// Names are case-sensitive and kept verbatim. Iteration is sorted, so
/// the order tags were added in never matters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TagSet(BTreeSet<String>);

impl TagSet {
    pub fn new() -> Self {
        Self(BTreeSet::new())
    }

    /// Returns `false` if the tag was already present.
    pub fn insert(&mut self, tag: impl Into<String>) -> bool {
        self.0.insert(tag.into())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn join(&self, separator: &str) -> String {
        self.iter().collect::<Vec<_>>().join(separator)
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<S: Into<String>> Extend<S> for TagSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        self.0.extend(iter.into_iter().map(Into::into));
    }
}

/// Originating call site of a record. Best-effort.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallerInfo {
    pub file: String,
    pub line: u32,
    pub function: String,
}

impl Default for CallerInfo {
    fn default() -> Self {
        Self {
            file: UNKNOWN_CALLER.into(),
            line: 0,
            function: UNKNOWN_CALLER.into(),
        }
    }
}

impl CallerInfo {
    /// Capture the location of the outermost `#[track_caller]` frame.
    ///
    /// Every wrapper between the public API and this call must itself be
    /// `#[track_caller]`, otherwise the wrapper's own location is recorded.
    /// Only the file name is kept, without its directories. The function
    /// name cannot be recovered this way and stays unknown; use
    /// [`caller!`](crate::caller) where it matters.
    #[track_caller]
    pub fn capture() -> Self {
        let location = Location::caller();
        Self {
            file: base_name(location.file()).to_string(),
            line: location.line(),
            function: UNKNOWN_CALLER.into(),
        }
    }

    pub fn with_function(mut self, function: impl Into<String>) -> Self {
        self.function = function.into();
        self
    }

    /// File name without its directories.
    pub fn file_name(&self) -> &str {
        base_name(&self.file)
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit(['/', '\\']).next().unwrap_or(path)
}

/// Caller information for the invocation site, function name included.
///
/// ```
/// fn main() {
///     let caller = logvault_kernel::caller!();
///     assert!(caller.function.ends_with("main"));
/// }
/// ```
#[macro_export]
macro_rules! caller {
    () => {{
        fn here() {}
        fn name_of<T>(_: T) -> &'static str {
            ::std::any::type_name::<T>()
        }
        let name = name_of(here);
        let function = name.strip_suffix("::here").unwrap_or(name);
        $crate::record::CallerInfo::capture().with_function(function)
    }};
}

/// A record that has not been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub tags: TagSet,
    pub caller: CallerInfo,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, tags: TagSet, message: impl Into<String>) -> Self {
        Self {
            level,
            tags,
            caller: CallerInfo::default(),
            message: message.into(),
        }
    }

    pub fn with_caller(mut self, caller: CallerInfo) -> Self {
        self.caller = caller;
        self
    }
}

/// A persisted record, as returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: RecordId,
    pub level: Level,
    pub tags: TagSet,
    pub caller: CallerInfo,
    pub message: String,
    #[serde(with = "timestamp_text")]
    pub timestamp: NaiveDateTime,
}

impl LogRecord {
    /// Whether this record carries the same content as `entry`.
    ///
    /// Ignores the store-owned fields (id and timestamp).
    pub fn matches_entry(&self, entry: &LogEntry) -> bool {
        self.level == entry.level
            && self.tags == entry.tags
            && self.caller == entry.caller
            && self.message == entry.message
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} {}:{} - {}",
            self.level,
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.caller.file_name(),
            self.caller.line,
            self.caller.function,
        )?;
        if !self.tags.is_empty() {
            write!(f, " [{}]", self.tags.join(", "))?;
        }
        write!(f, " | {}", self.message)
    }
}

/// Parse a timestamp as written by the store.
pub fn parse_timestamp(text: &str) -> Result<NaiveDateTime, RecordError> {
    NaiveDateTime::parse_from_str(text, TIMESTAMP_FORMAT)
        .map_err(|_| RecordError::MalformedTimestamp(text.to_string()))
}

mod timestamp_text {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TIMESTAMP_FORMAT;

    pub fn serialize<S: Serializer>(value: &NaiveDateTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.format(TIMESTAMP_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDateTime, D::Error> {
        let text = String::deserialize(deserializer)?;
        super::parse_timestamp(&text).map_err(serde::de::Error::custom)
    }
}
