//! Translates filter predicates into parameterized SQL.
//!
//! Values are only ever bound as numbered parameters (`?1`, `?2`, ...).
//! Column names come from `'static` identifiers declared by each resource's
//! filter enum, never from caller input.

use rusqlite::Connection;
use rusqlite::functions::FunctionFlags;
use rusqlite::types::{Value, ValueRef};

use crate::core::sql::{SqlField, format_date, format_instant};

use super::params::{Comparator, DateParam, NumberParam};

/// A fragment of SQL with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFragment {
    /// The SQL clause.
    pub sql: String,
    /// Bound parameter values, in placeholder order.
    pub params: Vec<Value>,
}

impl SqlFragment {
    /// Creates a new SQL fragment.
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    /// Adds a parameter and returns its placeholder.
    pub fn add_param(&mut self, param: Value) -> String {
        self.params.push(param);
        format!("?{}", self.params.len())
    }

    /// Returns true if this fragment is empty.
    pub fn is_empty(&self) -> bool {
        self.sql.is_empty()
    }
}

/// A single filter condition on one resource table.
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// Exact match.
    Eq { column: &'static str, value: Value },
    /// Case-insensitive substring match against any of the columns.
    Text {
        columns: &'static [&'static str],
        needle: String,
    },
    /// Prefix comparison on an instant column.
    Instant {
        column: &'static str,
        param: DateParam,
    },
    /// Prefix comparison on a calendar date column.
    CalendarDate {
        column: &'static str,
        param: DateParam,
    },
    /// Prefix comparison on a numeric column.
    Number {
        column: &'static str,
        param: NumberParam,
    },
}

impl Predicate {
    pub fn eq(column: &'static str, value: impl SqlField) -> Self {
        Predicate::Eq {
            column,
            value: value.to_sql_value(),
        }
    }

    pub fn text(columns: &'static [&'static str], needle: impl Into<String>) -> Self {
        Predicate::Text {
            columns,
            needle: needle.into(),
        }
    }

    pub fn instant(column: &'static str, param: DateParam) -> Self {
        Predicate::Instant { column, param }
    }

    pub fn calendar_date(column: &'static str, param: DateParam) -> Self {
        Predicate::CalendarDate { column, param }
    }

    pub fn number(column: &'static str, param: NumberParam) -> Self {
        Predicate::Number { column, param }
    }
}

/// Builds WHERE clauses from predicates.
pub struct SearchTranslator;

impl SearchTranslator {
    /// Returns `WHERE (p1) AND (p2) ...`, or an empty fragment when there are
    /// no predicates.
    pub fn where_clause(predicates: &[Predicate]) -> SqlFragment {
        let mut fragment = SqlFragment::default();
        let clauses: Vec<String> = predicates
            .iter()
            .map(|predicate| Self::render(predicate, &mut fragment))
            .collect();
        if !clauses.is_empty() {
            fragment.sql = format!("WHERE ({})", clauses.join(") AND ("));
        }
        fragment
    }

    fn render(predicate: &Predicate, fragment: &mut SqlFragment) -> String {
        match predicate {
            Predicate::Eq { column, value } => {
                if matches!(value, Value::Null) {
                    return format!("{column} IS NULL");
                }
                let p = fragment.add_param(value.clone());
                format!("{column} = {p}")
            }
            Predicate::Text { columns, needle } => {
                let p = fragment.add_param(Value::Text(like_pattern(needle)));
                columns
                    .iter()
                    .map(|column| format!("{FOLD_FUNCTION}({column}) LIKE {p} ESCAPE '\\'"))
                    .collect::<Vec<_>>()
                    .join(" OR ")
            }
            Predicate::Instant { column, param } => render_range(
                fragment,
                column,
                param.comparator,
                format_instant(&param.start),
                format_instant(&param.end),
            ),
            Predicate::CalendarDate { column, param } => {
                let (start, end) = param.date_range();
                render_range(
                    fragment,
                    column,
                    param.comparator,
                    format_date(&start),
                    format_date(&end),
                )
            }
            Predicate::Number { column, param } => {
                let p = fragment.add_param(Value::Real(param.value));
                format!("{column} {} {p}", param.comparator.operator())
            }
        }
    }
}

/// Renders a comparison against the half-open interval `[start, end)`.
fn render_range(
    fragment: &mut SqlFragment,
    column: &str,
    comparator: Comparator,
    start: String,
    end: String,
) -> String {
    match comparator {
        Comparator::Eq => {
            let s = fragment.add_param(Value::Text(start));
            let e = fragment.add_param(Value::Text(end));
            format!("{column} >= {s} AND {column} < {e}")
        }
        Comparator::Ne => {
            let s = fragment.add_param(Value::Text(start));
            let e = fragment.add_param(Value::Text(end));
            format!("{column} < {s} OR {column} >= {e}")
        }
        Comparator::Gt => {
            let e = fragment.add_param(Value::Text(end));
            format!("{column} >= {e}")
        }
        Comparator::Ge => {
            let s = fragment.add_param(Value::Text(start));
            format!("{column} >= {s}")
        }
        Comparator::Lt => {
            let s = fragment.add_param(Value::Text(start));
            format!("{column} < {s}")
        }
        Comparator::Le => {
            let e = fragment.add_param(Value::Text(end));
            format!("{column} < {e}")
        }
    }
}

/// Name of the SQL function that case-folds text the same way as
/// [`fold_case`]. SQLite's built-in `lower()` only folds ASCII.
pub(crate) const FOLD_FUNCTION: &str = "cdr_fold";

/// Unicode-aware case folding shared by stored text and search needles.
pub(crate) fn fold_case(text: &str) -> String {
    text.to_lowercase()
}

/// Registers [`FOLD_FUNCTION`] on `conn`. Non-text values pass through.
pub(crate) fn register_functions(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        FOLD_FUNCTION,
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        |ctx| {
            Ok(match ctx.get_raw(0) {
                ValueRef::Text(bytes) => Value::Text(fold_case(&String::from_utf8_lossy(bytes))),
                other => Value::from(other),
            })
        },
    )
}

/// Case-folds `needle` and wraps it for a `LIKE ... ESCAPE '\'` substring
/// match.
pub(crate) fn like_pattern(needle: &str) -> String {
    format!("%{}%", escape_like(needle))
}

/// Case-folds `needle` and escapes the LIKE wildcards in it.
pub(crate) fn escape_like(needle: &str) -> String {
    let mut escaped = String::with_capacity(needle.len());
    for c in fold_case(needle).chars() {
        if matches!(c, '\\' | '%' | '_') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_where_clause() {
        let fragment = SearchTranslator::where_clause(&[]);
        assert!(fragment.is_empty());
        assert!(fragment.params.is_empty());
    }

    #[test]
    fn test_predicates_are_anded_with_numbered_params() {
        let fragment = SearchTranslator::where_clause(&[
            Predicate::eq("status", "active"),
            Predicate::text(&["family_name", "given_name"], "Sm"),
        ]);
        assert_eq!(
            fragment.sql,
            "WHERE (status = ?1) AND (cdr_fold(family_name) LIKE ?2 ESCAPE '\\' OR cdr_fold(given_name) LIKE ?2 ESCAPE '\\')"
        );
        assert_eq!(
            fragment.params,
            vec![Value::Text("active".into()), Value::Text("%sm%".into())]
        );
    }

    #[test]
    fn test_values_never_reach_sql_text() {
        let hostile = "x'); DROP TABLE flags; --";
        let fragment = SearchTranslator::where_clause(&[Predicate::eq("code_code", hostile)]);
        assert!(!fragment.sql.contains("DROP"));
        assert_eq!(fragment.params, vec![Value::Text(hostile.into())]);
    }

    #[test]
    fn test_like_wildcards_are_escaped() {
        assert_eq!(like_pattern("50%_A\\b"), "%50\\%\\_a\\\\b%");
    }

    #[test]
    fn test_needles_fold_non_ascii_capitals() {
        assert_eq!(like_pattern("ÅNGSTRÖM"), "%ångström%");
        assert_eq!(escape_like("Émile"), "émile");
    }

    #[test]
    fn test_fold_function_matches_needle_folding() {
        let conn = Connection::open_in_memory().unwrap();
        register_functions(&conn).unwrap();

        let folded: String = conn
            .query_row("SELECT cdr_fold('Émile ÅNGSTRÖM')", [], |row| row.get(0))
            .unwrap();
        assert_eq!(folded, fold_case("Émile ÅNGSTRÖM"));

        let matched: bool = conn
            .query_row(
                "SELECT cdr_fold('Émile Registry') LIKE ?1 ESCAPE '\\'",
                [like_pattern("ÉMILE")],
                |row| row.get(0),
            )
            .unwrap();
        assert!(matched);

        let passthrough: Option<i64> = conn
            .query_row("SELECT cdr_fold(NULL)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(passthrough, None);
        let number: i64 = conn
            .query_row("SELECT cdr_fold(42)", [], |row| row.get(0))
            .unwrap();
        assert_eq!(number, 42);
    }

    #[test]
    fn test_date_ranges() {
        let param = DateParam::parse("2024-03-01").unwrap();
        let fragment = SearchTranslator::where_clause(&[Predicate::instant("period_start", param)]);
        assert_eq!(
            fragment.sql,
            "WHERE (period_start >= ?1 AND period_start < ?2)"
        );
        assert_eq!(
            fragment.params,
            vec![
                Value::Text("2024-03-01T00:00:00.000000000Z".into()),
                Value::Text("2024-03-02T00:00:00.000000000Z".into()),
            ]
        );

        let param = DateParam::parse("lt1990").unwrap();
        let fragment =
            SearchTranslator::where_clause(&[Predicate::calendar_date("birth_date", param)]);
        assert_eq!(fragment.sql, "WHERE (birth_date < ?1)");
        assert_eq!(fragment.params, vec![Value::Text("1990-01-01".into())]);
    }

    #[test]
    fn test_number_comparison() {
        let param = NumberParam::parse("ge0.5").unwrap();
        let fragment = SearchTranslator::where_clause(&[Predicate::number("probability", param)]);
        assert_eq!(fragment.sql, "WHERE (probability >= ?1)");
        assert_eq!(fragment.params, vec![Value::Real(0.5)]);
    }
}
