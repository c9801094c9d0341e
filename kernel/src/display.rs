// Display Configuration
//
// How much of a record is shown when it is printed: caller detail,
// timestamp detail, tags and the single-line layout. Rendering itself
// is left to the front end; this module only decides the text of each
// optional part.

use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::record::{CallerInfo, DATE_FORMAT, TIMESTAMP_FORMAT};

/// Layout of `TimestampDisplay::Full`.
pub const FULL_TIMESTAMP_FORMAT: &str = "%A %Y-%m-%d %H:%M:%S";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DisplayError {
    #[error("display: unknown caller display `{0}` (expected hide, file, line or function)")]
    UnknownCaller(String),

    #[error("display: unknown timestamp display `{0}` (expected hide, date, datetime or full)")]
    UnknownTimestamp(String),
}

/// Caller detail shown next to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CallerDisplay {
    Hide,
    /// `main.rs`
    #[default]
    File,
    /// `main.rs:10`
    Line,
    /// `main.rs:10 - app::main`
    Function,
}

impl FromStr for CallerDisplay {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hide" | "none" => Ok(CallerDisplay::Hide),
            "file" => Ok(CallerDisplay::File),
            "line" => Ok(CallerDisplay::Line),
            "function" => Ok(CallerDisplay::Function),
            _ => Err(DisplayError::UnknownCaller(s.to_string())),
        }
    }
}

/// Timestamp detail shown next to a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimestampDisplay {
    Hide,
    /// `2024-03-01`
    Date,
    /// `2024-03-01 08:30:00`
    #[default]
    DateTime,
    /// `Friday 2024-03-01 08:30:00`
    Full,
}

impl FromStr for TimestampDisplay {
    type Err = DisplayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "hide" | "none" => Ok(TimestampDisplay::Hide),
            "date" => Ok(TimestampDisplay::Date),
            "datetime" | "date_time" => Ok(TimestampDisplay::DateTime),
            "full" => Ok(TimestampDisplay::Full),
            _ => Err(DisplayError::UnknownTimestamp(s.to_string())),
        }
    }
}

/// Printing options, part of the logger configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub caller: CallerDisplay,
    pub timestamp: TimestampDisplay,
    pub show_tags: bool,
    /// One line per record instead of a header and an indented message.
    pub inline: bool,
}

impl DisplayConfig {
    /// Caller text, or `None` when hidden.
    pub fn caller_text(&self, caller: &CallerInfo) -> Option<String> {
        match self.caller {
            CallerDisplay::Hide => None,
            CallerDisplay::File => Some(caller.file_name().to_string()),
            CallerDisplay::Line => Some(format!("{}:{}", caller.file_name(), caller.line)),
            CallerDisplay::Function => Some(format!(
                "{}:{} - {}",
                caller.file_name(),
                caller.line,
                caller.function
            )),
        }
    }

    /// Timestamp text, or `None` when hidden.
    pub fn timestamp_text(&self, timestamp: &NaiveDateTime) -> Option<String> {
        let layout = match self.timestamp {
            TimestampDisplay::Hide => return None,
            TimestampDisplay::Date => DATE_FORMAT,
            TimestampDisplay::DateTime => TIMESTAMP_FORMAT,
            TimestampDisplay::Full => FULL_TIMESTAMP_FORMAT,
        };
        Some(timestamp.format(layout).to_string())
    }
}
