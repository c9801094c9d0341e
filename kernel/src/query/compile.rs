// Query Compiler
//
// Renders a `QuerySpec` into one executable statement.
// Pure and deterministic: same specification, same text, same params.

use super::{QuerySpec, Value};

/// Fixed projection and join over the normalized schema.
///
/// The left joins keep untagged records and let custom fragments refer
/// to `tags.name`; `DISTINCT` collapses the per-tag duplicates.
pub const BASE_QUERY: &str = "SELECT DISTINCT logs.id AS id, logs.level AS level, \
logs.caller_file AS caller_file, logs.caller_line AS caller_line, \
logs.caller_function AS caller_function, logs.message AS message, logs.time AS time \
FROM logs \
LEFT JOIN log_tags ON logs.id = log_tags.log_id \
LEFT JOIN tags ON log_tags.tag_id = tags.id";

/// Statement text plus the positional parameters it binds.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

/// Compile a specification.
///
/// Clauses always come out in `WHERE`, `ORDER BY`, `LIMIT` order, each
/// emitted only when the matching part of the specification is set.
pub fn compile(spec: &QuerySpec) -> CompiledQuery {
    let mut sql = String::from(BASE_QUERY);
    let mut params = Vec::new();

    if !spec.predicates().is_empty() {
        sql.push_str(" WHERE ");
        for (i, predicate) in spec.predicates().iter().enumerate() {
            if i > 0 {
                sql.push_str(" AND ");
            }
            // Parenthesized so an OR inside a fragment stays local to it.
            sql.push('(');
            sql.push_str(predicate.fragment());
            sql.push(')');
            params.extend_from_slice(predicate.params());
        }
    }

    if !spec.sorts().is_empty() {
        let keys: Vec<String> = spec
            .sorts()
            .iter()
            .map(|key| format!("{} {}", key.field.sort_expression(), key.direction.sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&keys.join(", "));
    }

    if let Some(page) = spec.pagination() {
        sql.push_str(&format!(" LIMIT {}", page.limit));
        if let Some(offset) = page.offset {
            sql.push_str(&format!(" OFFSET {offset}"));
        }
    }

    CompiledQuery { sql, params }
}
