// Terminal rendering of log records.

use chrono::NaiveDateTime;
use colored::{ColoredString, Colorize};

use logvault_kernel::{
    CallerInfo, DisplayConfig, FatalEvent, FatalNotifier, Level, LogEntry, LogRecord, RecordId,
    TagSet,
};

/// The printable parts of a stored record or of a console-only entry.
struct View<'a> {
    id: Option<RecordId>,
    level: Level,
    tags: &'a TagSet,
    caller: &'a CallerInfo,
    message: &'a str,
    timestamp: NaiveDateTime,
}

impl<'a> From<&'a LogRecord> for View<'a> {
    fn from(record: &'a LogRecord) -> Self {
        Self {
            id: Some(record.id),
            level: record.level,
            tags: &record.tags,
            caller: &record.caller,
            message: &record.message,
            timestamp: record.timestamp,
        }
    }
}

fn level_label(level: Level) -> ColoredString {
    let label = format!("{:<7}", level.label());
    match level {
        Level::Debug => label.blue(),
        Level::Info => label.cyan(),
        Level::Warning => label.yellow(),
        Level::Error => label.red(),
        Level::Fatal => label.magenta().bold(),
    }
}

fn render(view: &View<'_>, config: &DisplayConfig) -> String {
    let mut parts = Vec::new();
    if let Some(id) = view.id {
        parts.push(format!("#{id}").dimmed().to_string());
    }
    parts.push(level_label(view.level).to_string());
    if let Some(timestamp) = config.timestamp_text(&view.timestamp) {
        parts.push(timestamp.dimmed().to_string());
    }
    if let Some(caller) = config.caller_text(view.caller) {
        parts.push(format!("at {caller}").dimmed().to_string());
    }
    if config.show_tags && !view.tags.is_empty() {
        parts.push(format!("[{}]", view.tags.join(" · ")).bright_black().to_string());
    }

    let header = parts.join(" ");
    if config.inline {
        format!("{header} {}", view.message)
    } else {
        format!("{header}\n    {}", view.message)
    }
}

pub fn print_record(record: &LogRecord, config: &DisplayConfig) {
    println!("{}", render(&View::from(record), config));
}

/// Print an entry that was never stored, stamped with `at`.
pub fn print_entry(entry: &LogEntry, at: NaiveDateTime, config: &DisplayConfig) {
    let view = View {
        id: None,
        level: entry.level,
        tags: &entry.tags,
        caller: &entry.caller,
        message: &entry.message,
        timestamp: at,
    };
    println!("{}", render(&view, config));
}

pub fn print_records(records: &[LogRecord], config: &DisplayConfig) {
    if records.is_empty() {
        println!("{}", "No records.".dimmed());
        return;
    }
    for record in records {
        print_record(record, config);
    }
    println!("{}", format!("{} record(s)", records.len()).bold());
}

pub fn success(msg: &str) {
    println!("{} {}", "✓".green().bold(), msg);
}

/// Alerts on stderr; the caller exits afterwards.
pub struct StderrNotifier;

impl FatalNotifier for StderrNotifier {
    fn notify(&self, event: &FatalEvent) {
        eprintln!(
            "{} {}\n  {}\n  {} (record #{})",
            "✗".red().bold(),
            event.title.red().bold(),
            event.message,
            event.error.dimmed(),
            event.record_id
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_kernel::record::parse_timestamp;
    use logvault_kernel::{CallerDisplay, TimestampDisplay};

    fn record() -> LogRecord {
        LogRecord {
            id: 7,
            level: Level::Warning,
            tags: ["db", "auth"].into_iter().collect(),
            caller: CallerInfo {
                file: "src/main.rs".into(),
                line: 42,
                function: "app::run".into(),
            },
            message: "slow query".into(),
            timestamp: parse_timestamp("2024-03-01 08:30:00").unwrap(),
        }
    }

    #[test]
    fn default_layout_is_a_header_and_an_indented_message() {
        colored::control::set_override(false);
        let record = record();

        let text = render(&View::from(&record), &DisplayConfig::default());

        assert_eq!(
            text,
            "#7 WARNING 2024-03-01 08:30:00 at main.rs\n    slow query"
        );
    }

    #[test]
    fn inline_layout_honours_every_option() {
        colored::control::set_override(false);
        let record = record();
        let config = DisplayConfig {
            caller: CallerDisplay::Function,
            timestamp: TimestampDisplay::Hide,
            show_tags: true,
            inline: true,
        };

        let text = render(&View::from(&record), &config);

        assert_eq!(text, "#7 WARNING at main.rs:42 - app::run [auth · db] slow query");
    }

    #[test]
    fn hidden_parts_leave_no_trace() {
        colored::control::set_override(false);
        let record = record();
        let config = DisplayConfig {
            caller: CallerDisplay::Hide,
            timestamp: TimestampDisplay::Date,
            show_tags: false,
            inline: true,
        };

        let text = render(&View::from(&record), &config);

        assert_eq!(text, "#7 WARNING 2024-03-01 slow query");
    }
}
