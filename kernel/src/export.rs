// Record Export
//
// Writes query results as JSON, CSV or plain-text log files.

use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use chrono::Local;

use crate::record::{LogRecord, TIMESTAMP_FORMAT};

const CSV_HEADER: [&str; 7] = [
    "level",
    "tags",
    "timestamp",
    "caller_file",
    "caller_line",
    "caller_function",
    "message",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Json,
    Csv,
    /// One line of plain text per record.
    Log,
}

impl ExportFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ExportFormat::Json => "json",
            ExportFormat::Csv => "csv",
            ExportFormat::Log => "log",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "json" => Ok(ExportFormat::Json),
            "csv" => Ok(ExportFormat::Csv),
            "log" | "text" | "txt" => Ok(ExportFormat::Log),
            _ => Err(ExportError::UnknownFormat(s.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("export: unknown format `{0}`")]
    UnknownFormat(String),

    #[error("export: failed to serialize records: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("export: failed to write {path}: {source}")]
    Io { path: PathBuf, source: io::Error },
}

/// Render records in the given format.
pub fn render(records: &[LogRecord], format: ExportFormat) -> Result<String, ExportError> {
    match format {
        ExportFormat::Json => Ok(serde_json::to_string_pretty(records)?),
        ExportFormat::Csv => Ok(render_csv(records)),
        ExportFormat::Log => Ok(records
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("\n")),
    }
}

/// Write records to `<folder>/<YYYYmmddHHMMSS>_logs.<ext>`.
///
/// An existing file with the same name is replaced. Returns the path
/// written.
pub fn export_to_folder(
    records: &[LogRecord],
    format: ExportFormat,
    folder: &Path,
) -> Result<PathBuf, ExportError> {
    let contents = render(records, format)?;
    let name = format!(
        "{}_logs.{}",
        Local::now().format("%Y%m%d%H%M%S"),
        format.extension()
    );
    let path = folder.join(name);

    fs::write(&path, contents).map_err(|source| ExportError::Io {
        path: path.clone(),
        source,
    })?;
    tracing::debug!(path = %path.display(), records = records.len(), "exported log records");

    Ok(path)
}

fn render_csv(records: &[LogRecord]) -> String {
    let mut out = String::new();
    push_csv_row(&mut out, CSV_HEADER.iter().map(|h| h.to_string()));

    for record in records {
        push_csv_row(
            &mut out,
            [
                record.level.to_string(),
                record.tags.join("|"),
                record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
                record.caller.file.clone(),
                record.caller.line.to_string(),
                record.caller.function.clone(),
                record.message.clone(),
            ],
        );
    }
    out
}

fn push_csv_row(out: &mut String, fields: impl IntoIterator<Item = String>) {
    for (i, field) in fields.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        if field.contains([',', '"', '\n', '\r']) {
            let _ = write!(out, "\"{}\"", field.replace('"', "\"\""));
        } else {
            out.push_str(&field);
        }
    }
    out.push('\n');
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{parse_timestamp, CallerInfo, Level};
    use tempfile::TempDir;

    fn record(message: &str) -> LogRecord {
        LogRecord {
            id: 7,
            level: Level::Warning,
            tags: ["db", "auth"].into_iter().collect(),
            caller: CallerInfo {
                file: "src/db.rs".into(),
                line: 42,
                function: "connect".into(),
            },
            message: message.into(),
            timestamp: parse_timestamp("2024-02-10 12:00:01").unwrap(),
        }
    }

    #[test]
    fn empty_json_export_is_an_empty_array() {
        assert_eq!(render(&[], ExportFormat::Json).unwrap(), "[]");
    }

    #[test]
    fn json_export_round_trips_through_serde() {
        let records = vec![record("slow query")];
        let json = render(&records, ExportFormat::Json).unwrap();

        let back: Vec<LogRecord> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, records);
    }

    #[test]
    fn csv_export_has_header_and_quotes_fields() {
        let csv = render(&[record("a, \"quoted\"\nvalue")], ExportFormat::Csv).unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "level,tags,timestamp,caller_file,caller_line,caller_function,message"
        );
        assert!(csv.contains("WARNING,auth|db,2024-02-10 12:00:01,src/db.rs,42,connect,"));
        assert!(csv.contains("\"a, \"\"quoted\"\"\nvalue\""));
    }

    #[test]
    fn log_export_is_one_line_per_record() {
        let text = render(&[record("one"), record("two")], ExportFormat::Log).unwrap();

        let lines: Vec<_> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[WARNING] 2024-02-10 12:00:01 db.rs:42 - connect"));
        assert!(lines[1].ends_with("| two"));
    }

    #[test]
    fn export_writes_a_timestamped_file() {
        let dir = TempDir::new().unwrap();

        let path = export_to_folder(&[record("x")], ExportFormat::Csv, dir.path()).unwrap();

        assert!(path.exists());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.ends_with("_logs.csv"));
    }

    #[test]
    fn format_names_parse() {
        assert_eq!("JSON".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Log);
        assert!("xml".parse::<ExportFormat>().is_err());
    }
}
