// Query Specification
//
// Structured, order-independent description of a log query.
// Options may be applied in any order; the statement text is only
// produced once, by `compile`, from the final state.
//
// User-supplied values never become SQL text. Every predicate carries
// its operands as bound parameters.

use std::fmt;
use std::sync::Arc;

pub use rusqlite::types::Value;

pub mod compile;
pub mod filters;

/// Queryable columns of the `logs` table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Id,
    Level,
    CallerFile,
    CallerLine,
    CallerFunction,
    Message,
    /// Date and time of the record.
    Timestamp,
    /// Calendar date of the record, time ignored.
    Date,
}

impl Field {
    /// Expression used inside `WHERE`, qualified by table.
    pub fn expression(self) -> &'static str {
        match self {
            Field::Id => "logs.id",
            Field::Level => "logs.level",
            Field::CallerFile => "logs.caller_file",
            Field::CallerLine => "logs.caller_line",
            Field::CallerFunction => "logs.caller_function",
            Field::Message => "logs.message",
            Field::Timestamp => "logs.time",
            Field::Date => "DATE(logs.time)",
        }
    }

    /// Expression used inside `ORDER BY`, in terms of the projected columns.
    pub fn sort_expression(self) -> &'static str {
        match self {
            Field::Id => "id",
            Field::Level => "level",
            Field::CallerFile => "caller_file",
            Field::CallerLine => "caller_line",
            Field::CallerFunction => "caller_function",
            Field::Message => "message",
            Field::Timestamp => "time",
            Field::Date => "DATE(time)",
        }
    }
}

/// Comparison vocabulary of the convenience filters.
///
/// `BETWEEN` takes two operands and is built with [`Predicate::between`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Equal,
    NotEqual,
    GreaterThan,
    GreaterOrEqual,
    LessThan,
    LessOrEqual,
    /// Substring match.
    Like,
    /// Substring exclusion.
    NotLike,
}

impl Operator {
    pub fn sql(self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessOrEqual => "<=",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT LIKE",
        }
    }

    pub fn is_substring(self) -> bool {
        matches!(self, Operator::Like | Operator::NotLike)
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    /// Parse `asc`/`desc` in any case. Anything else is ascending.
    pub fn parse(text: &str) -> Self {
        if text.trim().eq_ignore_ascii_case("desc") {
            Direction::Desc
        } else {
            Direction::Asc
        }
    }

    pub fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

impl From<&str> for Direction {
    fn from(text: &str) -> Self {
        Direction::parse(text)
    }
}

/// One ANDed condition: a SQL fragment with `?` placeholders and the
/// values bound to them, in placeholder order.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    fragment: String,
    params: Vec<Value>,
}

impl Predicate {
    /// A fragment without parameters, used verbatim.
    pub fn raw(fragment: impl Into<String>) -> Self {
        Self {
            fragment: fragment.into(),
            params: Vec::new(),
        }
    }

    pub fn with_params(fragment: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            fragment: fragment.into(),
            params,
        }
    }

    /// `field <op> ?`. Substring operators wrap the operand in `%…%`.
    pub fn compare(field: Field, op: Operator, value: impl Into<Value>) -> Self {
        let value = value.into();
        if op.is_substring() {
            let pattern = format!("%{}%", escape_like(&value_text(&value)));
            return Self::with_params(
                format!("{} {} ? ESCAPE '\\'", field.expression(), op.sql()),
                vec![Value::Text(pattern)],
            );
        }

        Self::with_params(
            format!("{} {} ?", field.expression(), op.sql()),
            vec![value],
        )
    }

    /// `field BETWEEN ? AND ?`, both ends inclusive.
    pub fn between(field: Field, low: impl Into<Value>, high: impl Into<Value>) -> Self {
        Self::with_params(
            format!("{} BETWEEN ? AND ?", field.expression()),
            vec![low.into(), high.into()],
        )
    }

    pub fn fragment(&self) -> &str {
        &self.fragment
    }

    pub fn params(&self) -> &[Value] {
        &self.params
    }
}

/// Escape `LIKE` wildcards so the operand matches literally.
pub fn escape_like(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn value_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Integer(i) => i.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Text(s) => s.clone(),
        Value::Blob(b) => String::from_utf8_lossy(b).into_owned(),
    }
}

/// One `ORDER BY` key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: Field,
    pub direction: Direction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub limit: u64,
    pub offset: Option<u64>,
}

/// The query being built.
///
/// Predicates and sort keys accumulate in application order; pagination
/// is overwritten by every new limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QuerySpec {
    predicates: Vec<Predicate>,
    sorts: Vec<SortKey>,
    pagination: Option<Pagination>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply every option, in order, to an empty specification.
    pub fn from_options<'a, I>(options: I) -> Self
    where
        I: IntoIterator<Item = &'a QueryOption>,
    {
        let mut spec = Self::new();
        for option in options {
            option.apply(&mut spec);
        }
        spec
    }

    pub fn apply(&mut self, option: &QueryOption) -> &mut Self {
        option.apply(self);
        self
    }

    /// Append one ANDed condition.
    pub fn add_predicate(&mut self, predicate: Predicate) -> &mut Self {
        self.predicates.push(predicate);
        self
    }

    /// Append one sort key. Earlier keys take priority.
    pub fn add_sort(&mut self, field: Field, direction: Direction) -> &mut Self {
        self.sorts.push(SortKey { field, direction });
        self
    }

    /// Replace any previous limit and offset.
    pub fn set_limit(&mut self, limit: u64, offset: Option<u64>) -> &mut Self {
        self.pagination = Some(Pagination { limit, offset });
        self
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn sorts(&self) -> &[SortKey] {
        &self.sorts
    }

    pub fn pagination(&self) -> Option<Pagination> {
        self.pagination
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty() && self.sorts.is_empty() && self.pagination.is_none()
    }
}

/// A composable query option: a function the specification is passed
/// through.
#[derive(Clone)]
pub struct QueryOption(Arc<dyn Fn(&mut QuerySpec) + Send + Sync>);

impl QueryOption {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&mut QuerySpec) + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn apply(&self, spec: &mut QuerySpec) {
        (self.0)(spec)
    }
}

impl fmt::Debug for QueryOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("QueryOption(..)")
    }
}

/// Raised when the store refuses a compiled statement.
///
/// Custom fragments are not validated up front; a malformed one is only
/// detected here.
#[derive(Debug, thiserror::Error)]
pub enum SpecificationError {
    #[error("specification: statement rejected by the store: {reason}\n  {statement}")]
    Rejected { statement: String, reason: String },
}
