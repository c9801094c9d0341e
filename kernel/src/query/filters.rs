// Convenience Query Options
//
// Field-specific filters and sorts. Every filter is sugar over
// `QuerySpec::add_predicate`, every sort over `QuerySpec::add_sort`.

use chrono::{NaiveDate, NaiveDateTime};

use super::{Direction, Field, Operator, Predicate, QueryOption, Value};
use crate::record::{Level, DATE_FORMAT, TIMESTAMP_FORMAT};

/// Tag subquery: ids of the records carrying a tag that matches `condition`.
const TAGGED_RECORDS: &str = "SELECT log_tags.log_id FROM log_tags \
     INNER JOIN tags ON tags.id = log_tags.tag_id WHERE ";

fn predicate(predicate: Predicate) -> QueryOption {
    QueryOption::new(move |spec| {
        spec.add_predicate(predicate.clone());
    })
}

fn sort(field: Field, order: &str) -> QueryOption {
    let direction = Direction::parse(order);
    QueryOption::new(move |spec| {
        spec.add_sort(field, direction);
    })
}

fn timestamp_value(timestamp: NaiveDateTime) -> Value {
    Value::Text(timestamp.format(TIMESTAMP_FORMAT).to_string())
}

fn date_value(date: NaiveDate) -> Value {
    Value::Text(date.format(DATE_FORMAT).to_string())
}

fn text_value(text: &str) -> Value {
    Value::Text(text.to_string())
}

// ----------------------------
// Generic
// ----------------------------

/// `field <op> value` for any field.
pub fn filter(field: Field, op: Operator, value: impl Into<Value>) -> QueryOption {
    predicate(Predicate::compare(field, op, value))
}

/// Append a raw fragment, ANDed with every other predicate.
///
/// The fragment is not validated; a malformed one is reported when the
/// store rejects the compiled statement. The base query joins `logs`,
/// `log_tags` and `tags`, so columns must be qualified: `logs.id > 1`,
/// not `id > 1`, which the store rejects as ambiguous.
pub fn custom(fragment: impl Into<String>) -> QueryOption {
    predicate(Predicate::raw(fragment))
}

/// Append a sort key for any field.
pub fn sort_by(field: Field, direction: Direction) -> QueryOption {
    QueryOption::new(move |spec| {
        spec.add_sort(field, direction);
    })
}

/// Limit the number of records returned. Replaces any previous limit.
pub fn limit(count: u64) -> QueryOption {
    QueryOption::new(move |spec| {
        spec.set_limit(count, None);
    })
}

/// Limit with an offset. Replaces any previous limit.
pub fn limit_offset(count: u64, offset: u64) -> QueryOption {
    QueryOption::new(move |spec| {
        spec.set_limit(count, Some(offset));
    })
}

/// Pagination from a list of values.
///
/// - `[]` leaves the specification untouched
/// - `[n]` sets a limit of `n`
/// - `[n, m, ..]` sets a limit of `n` and an offset of `m`
pub fn paginate(values: &[u64]) -> QueryOption {
    match values {
        [] => QueryOption::new(|_| {}),
        [count] => limit(*count),
        [count, offset, ..] => limit_offset(*count, *offset),
    }
}

// ----------------------------
// Level
// ----------------------------

pub fn level_equal(level: Level) -> QueryOption {
    filter(Field::Level, Operator::Equal, level.as_i64())
}

pub fn level_not_equal(level: Level) -> QueryOption {
    filter(Field::Level, Operator::NotEqual, level.as_i64())
}

pub fn level_greater_than(level: Level) -> QueryOption {
    filter(Field::Level, Operator::GreaterThan, level.as_i64())
}

pub fn level_less_than(level: Level) -> QueryOption {
    filter(Field::Level, Operator::LessThan, level.as_i64())
}

/// Levels from `start` to `end`, both included.
pub fn level_between(start: Level, end: Level) -> QueryOption {
    predicate(Predicate::between(
        Field::Level,
        start.as_i64(),
        end.as_i64(),
    ))
}

// ----------------------------
// Tags
// ----------------------------

/// Records carrying exactly this tag.
pub fn has_tag(tag: &str) -> QueryOption {
    predicate(Predicate::with_params(
        format!("logs.id IN ({TAGGED_RECORDS}tags.name = ?)"),
        vec![text_value(tag)],
    ))
}

/// Records carrying at least one of `tags`. An empty list matches nothing.
pub fn has_any_tag<I, S>(tags: I) -> QueryOption
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let params: Vec<Value> = tags.into_iter().map(|t| text_value(t.as_ref())).collect();
    if params.is_empty() {
        return custom("1 = 0");
    }

    let placeholders = vec!["?"; params.len()].join(", ");
    predicate(Predicate::with_params(
        format!("logs.id IN ({TAGGED_RECORDS}tags.name IN ({placeholders}))"),
        params,
    ))
}

/// Records carrying a tag whose name contains `needle`.
pub fn tag_like(needle: &str) -> QueryOption {
    predicate(Predicate::with_params(
        format!("logs.id IN ({TAGGED_RECORDS}tags.name LIKE ? ESCAPE '\\')"),
        vec![Value::Text(format!("%{}%", super::escape_like(needle)))],
    ))
}

/// Records not carrying this tag, including untagged records.
pub fn lacks_tag(tag: &str) -> QueryOption {
    predicate(Predicate::with_params(
        format!("logs.id NOT IN ({TAGGED_RECORDS}tags.name = ?)"),
        vec![text_value(tag)],
    ))
}

// ----------------------------
// Caller
// ----------------------------

pub fn caller_file_like(file: &str) -> QueryOption {
    filter(Field::CallerFile, Operator::Like, text_value(file))
}

pub fn caller_file_not_like(file: &str) -> QueryOption {
    filter(Field::CallerFile, Operator::NotLike, text_value(file))
}

pub fn caller_line_equal(line: u32) -> QueryOption {
    filter(Field::CallerLine, Operator::Equal, i64::from(line))
}

pub fn caller_line_not_equal(line: u32) -> QueryOption {
    filter(Field::CallerLine, Operator::NotEqual, i64::from(line))
}

pub fn caller_line_greater_than(line: u32) -> QueryOption {
    filter(Field::CallerLine, Operator::GreaterThan, i64::from(line))
}

pub fn caller_line_less_than(line: u32) -> QueryOption {
    filter(Field::CallerLine, Operator::LessThan, i64::from(line))
}

pub fn caller_line_between(start: u32, end: u32) -> QueryOption {
    predicate(Predicate::between(
        Field::CallerLine,
        i64::from(start),
        i64::from(end),
    ))
}

pub fn caller_function_like(function: &str) -> QueryOption {
    filter(Field::CallerFunction, Operator::Like, text_value(function))
}

pub fn caller_function_not_like(function: &str) -> QueryOption {
    filter(Field::CallerFunction, Operator::NotLike, text_value(function))
}

// ----------------------------
// Message
// ----------------------------

pub fn message_like(message: &str) -> QueryOption {
    filter(Field::Message, Operator::Like, text_value(message))
}

pub fn message_not_like(message: &str) -> QueryOption {
    filter(Field::Message, Operator::NotLike, text_value(message))
}

// ----------------------------
// Timestamp (date and time)
// ----------------------------

pub fn timestamp_equal(timestamp: NaiveDateTime) -> QueryOption {
    filter(Field::Timestamp, Operator::Equal, timestamp_value(timestamp))
}

pub fn timestamp_not_equal(timestamp: NaiveDateTime) -> QueryOption {
    filter(Field::Timestamp, Operator::NotEqual, timestamp_value(timestamp))
}

pub fn timestamp_greater_than(timestamp: NaiveDateTime) -> QueryOption {
    filter(Field::Timestamp, Operator::GreaterThan, timestamp_value(timestamp))
}

pub fn timestamp_less_than(timestamp: NaiveDateTime) -> QueryOption {
    filter(Field::Timestamp, Operator::LessThan, timestamp_value(timestamp))
}

pub fn timestamp_between(start: NaiveDateTime, end: NaiveDateTime) -> QueryOption {
    predicate(Predicate::between(
        Field::Timestamp,
        timestamp_value(start),
        timestamp_value(end),
    ))
}

// ----------------------------
// Date (time ignored)
// ----------------------------

pub fn date_equal(date: NaiveDate) -> QueryOption {
    filter(Field::Date, Operator::Equal, date_value(date))
}

pub fn date_not_equal(date: NaiveDate) -> QueryOption {
    filter(Field::Date, Operator::NotEqual, date_value(date))
}

pub fn date_greater_than(date: NaiveDate) -> QueryOption {
    filter(Field::Date, Operator::GreaterThan, date_value(date))
}

pub fn date_less_than(date: NaiveDate) -> QueryOption {
    filter(Field::Date, Operator::LessThan, date_value(date))
}

pub fn date_between(start: NaiveDate, end: NaiveDate) -> QueryOption {
    predicate(Predicate::between(
        Field::Date,
        date_value(start),
        date_value(end),
    ))
}

// ----------------------------
// Sorts
// ----------------------------
//
// Each takes "asc"/"desc" in any case; anything else sorts ascending.

pub fn sort_id(order: &str) -> QueryOption {
    sort(Field::Id, order)
}

pub fn sort_level(order: &str) -> QueryOption {
    sort(Field::Level, order)
}

pub fn sort_caller_file(order: &str) -> QueryOption {
    sort(Field::CallerFile, order)
}

pub fn sort_caller_line(order: &str) -> QueryOption {
    sort(Field::CallerLine, order)
}

pub fn sort_caller_function(order: &str) -> QueryOption {
    sort(Field::CallerFunction, order)
}

pub fn sort_message(order: &str) -> QueryOption {
    sort(Field::Message, order)
}

pub fn sort_timestamp(order: &str) -> QueryOption {
    sort(Field::Timestamp, order)
}
