use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::{Args, Parser, Subcommand};

use logvault_kernel::export::{render, ExportFormat};
use logvault_kernel::filters;
use logvault_kernel::query::Operator;
use logvault_kernel::{
    CallerDisplay, Direction, Field, Level, Logger, LoggerConfig, QueryOption, RecordStore,
    TimestampDisplay,
};

mod display;

/// Logvault CLI
#[derive(Parser, Debug)]
#[command(name = "logvault")]
#[command(about = "Embedded log-record store", long_about = None)]
struct Cli {
    /// Path to logger config JSON
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Folder holding the store (overrides the config)
    #[arg(long, global = true)]
    folder: Option<PathBuf>,

    /// Increase verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(flatten)]
    display: DisplayArgs,

    #[command(subcommand)]
    command: Command,
}

/// Printing options, each overriding the config when given.
#[derive(Args, Debug, Default)]
struct DisplayArgs {
    /// Caller detail: hide, file, line or function
    #[arg(long, global = true)]
    caller: Option<CallerDisplay>,

    /// Timestamp detail: hide, date, datetime or full
    #[arg(long, global = true)]
    timestamp: Option<TimestampDisplay>,

    /// Show record tags
    #[arg(long, global = true)]
    show_tags: bool,

    /// One line per record
    #[arg(long, global = true)]
    inline: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Persist one record
    Write {
        #[arg(long, default_value = "info")]
        level: Level,

        /// Extra tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        message: String,
    },

    /// Print one record without storing it. A fatal record exits with status 1
    Print {
        #[arg(long, default_value = "info")]
        level: Level,

        /// Extra tag (repeatable)
        #[arg(long = "tag")]
        tags: Vec<String>,

        message: String,
    },

    /// Print the records matching the filters
    Query {
        #[command(flatten)]
        filters: FilterArgs,

        /// Print JSON instead of formatted records
        #[arg(long)]
        json: bool,
    },

    /// Export the records matching the filters into the store folder
    Export {
        /// json, csv or log
        #[arg(long, default_value = "log")]
        format: ExportFormat,

        #[command(flatten)]
        filters: FilterArgs,
    },

    /// Delete one record by id
    Delete { id: i64 },

    /// List every stored tag
    Tags,

    /// Persist a fatal record, raise an alert and exit with status 1
    Fatal { message: String },
}

#[derive(Args, Debug, Default)]
struct FilterArgs {
    /// Only records at this level
    #[arg(long)]
    level: Option<Level>,

    /// Only records at or above this level
    #[arg(long)]
    min_level: Option<Level>,

    /// Only records carrying one of these tags (repeatable)
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Caller file contains
    #[arg(long)]
    file: Option<String>,

    /// Caller function contains
    #[arg(long)]
    function: Option<String>,

    /// Message contains
    #[arg(long)]
    message: Option<String>,

    /// Only records from this date (YYYY-MM-DD)
    #[arg(long)]
    date: Option<NaiveDate>,

    /// Raw SQL condition, ANDed with the other filters. Qualify columns
    /// with their table (`logs.id`, `tags.name`); a bare `id` is ambiguous
    #[arg(long = "where")]
    raw: Option<String>,

    /// Sort key as FIELD[:asc|desc] (repeatable, first has priority)
    #[arg(long = "sort")]
    sorts: Vec<String>,

    #[arg(long)]
    limit: Option<u64>,

    #[arg(long, requires = "limit")]
    offset: Option<u64>,
}

impl FilterArgs {
    fn options(&self) -> Result<Vec<QueryOption>> {
        let mut options = Vec::new();

        if let Some(level) = self.level {
            options.push(filters::level_equal(level));
        }
        if let Some(level) = self.min_level {
            options.push(filters::filter(
                Field::Level,
                Operator::GreaterOrEqual,
                level.as_i64(),
            ));
        }
        if !self.tags.is_empty() {
            options.push(filters::has_any_tag(&self.tags));
        }
        if let Some(file) = &self.file {
            options.push(filters::caller_file_like(file));
        }
        if let Some(function) = &self.function {
            options.push(filters::caller_function_like(function));
        }
        if let Some(message) = &self.message {
            options.push(filters::message_like(message));
        }
        if let Some(date) = self.date {
            options.push(filters::date_equal(date));
        }
        if let Some(raw) = &self.raw {
            options.push(filters::custom(raw.clone()));
        }
        for sort in &self.sorts {
            let (field, direction) = parse_sort(sort)?;
            options.push(filters::sort_by(field, direction));
        }
        if let Some(limit) = self.limit {
            let mut page = vec![limit];
            page.extend(self.offset);
            options.push(filters::paginate(&page));
        }

        Ok(options)
    }
}

fn parse_sort(text: &str) -> Result<(Field, Direction)> {
    let (name, direction) = match text.split_once(':') {
        Some((name, direction)) => (name, Direction::parse(direction)),
        None => (text, Direction::Asc),
    };

    let field = match name.to_ascii_lowercase().as_str() {
        "id" => Field::Id,
        "level" => Field::Level,
        "file" | "caller_file" => Field::CallerFile,
        "line" | "caller_line" => Field::CallerLine,
        "function" | "caller_function" => Field::CallerFunction,
        "message" => Field::Message,
        "time" | "timestamp" => Field::Timestamp,
        "date" => Field::Date,
        other => bail!("unknown sort field `{other}`"),
    };

    Ok((field, direction))
}

fn setup_logging(verbose: u8) {
    let filter = match verbose {
        0 => "warn",
        1 => "logvault_kernel=debug,info",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(cli: &Cli) -> Result<LoggerConfig> {
    let mut config = if let Some(path) = &cli.config {
        let data = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str::<LoggerConfig>(&data)?
    } else {
        LoggerConfig::default_config()
    };

    if let Some(folder) = &cli.folder {
        config.folder = folder.clone();
    }
    if let Some(caller) = cli.display.caller {
        config.display.caller = caller;
    }
    if let Some(timestamp) = cli.display.timestamp {
        config.display.timestamp = timestamp;
    }
    config.display.show_tags |= cli.display.show_tags;
    config.display.inline |= cli.display.inline;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    // ----------------------------
    // Load configuration
    // ----------------------------
    let config = load_config(&cli)?;
    tracing::debug!(folder = %config.folder.display(), "using log store");
    let mut logger = Logger::new(config);

    // ----------------------------
    // Run command
    // ----------------------------
    match cli.command {
        Command::Write {
            level,
            tags,
            message,
        } => {
            logger.tags(tags);
            let id = logger.log(level, message)?;
            display::success(&format!("stored record #{id}"));
        }

        Command::Print {
            level,
            tags,
            message,
        } => {
            logger.tags(tags);
            let entry = logger.entry(level, message);
            display::print_entry(&entry, Local::now().naive_local(), logger.display());
            if level == Level::Fatal {
                std::process::exit(1);
            }
        }

        Command::Query { filters, json } => {
            let records = logger.records(&filters.options()?)?;
            if json {
                println!("{}", render(&records, ExportFormat::Json)?);
            } else {
                display::print_records(&records, logger.display());
            }
        }

        Command::Export { format, filters } => {
            let path = logger.export(format, &filters.options()?)?;
            display::success(&format!("exported to {}", path.display()));
        }

        Command::Delete { id } => {
            if logger.store().delete(id)? {
                display::success(&format!("deleted record #{id}"));
            } else {
                bail!("no record #{id}");
            }
        }

        Command::Tags => {
            for tag in logger.store().tag_names()? {
                println!("{tag}");
            }
        }

        Command::Fatal { message } => {
            logger.add_notifier(Arc::new(display::StderrNotifier));
            logger.fatal(&message)?;
            std::process::exit(1);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use logvault_kernel::QuerySpec;

    #[test]
    fn sort_arguments_parse() {
        assert_eq!(parse_sort("level:DESC").unwrap(), (Field::Level, Direction::Desc));
        assert_eq!(parse_sort("time").unwrap(), (Field::Timestamp, Direction::Asc));
        assert_eq!(parse_sort("file:up").unwrap(), (Field::CallerFile, Direction::Asc));
        assert!(parse_sort("color:asc").is_err());
    }

    #[test]
    fn filter_flags_become_options() {
        let cli = Cli::parse_from([
            "logvault",
            "query",
            "--min-level",
            "warn",
            "--tag",
            "db",
            "--sort",
            "level:desc",
            "--limit",
            "10",
            "--offset",
            "5",
        ]);

        let Command::Query { filters, .. } = cli.command else {
            panic!("expected query command");
        };
        let spec = QuerySpec::from_options(&filters.options().unwrap());

        assert_eq!(spec.predicates().len(), 2);
        assert_eq!(spec.sorts().len(), 1);
        let page = spec.pagination().unwrap();
        assert_eq!((page.limit, page.offset), (10, Some(5)));
    }

    #[test]
    fn display_flags_override_the_config() {
        let cli = Cli::parse_from([
            "logvault",
            "--folder",
            ".",
            "print",
            "--caller",
            "function",
            "--timestamp",
            "hide",
            "--inline",
            "hello",
        ]);

        let config = load_config(&cli).unwrap();

        assert_eq!(config.display.caller, CallerDisplay::Function);
        assert_eq!(config.display.timestamp, TimestampDisplay::Hide);
        assert!(config.display.inline);
        assert!(!config.display.show_tags);
    }

    #[test]
    fn unknown_display_level_is_rejected() {
        assert!(Cli::try_parse_from(["logvault", "print", "--caller", "loud", "x"]).is_err());
    }

    #[test]
    fn offset_requires_limit() {
        assert!(Cli::try_parse_from(["logvault", "query", "--offset", "3"]).is_err());
    }
}
