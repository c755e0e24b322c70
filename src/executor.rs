//! Read-only query execution against the business store.
//!
//! [`QueryExecutor::execute`] is the boundary between untrusted generated
//! SQL and the database. It never returns an error: every failure is
//! folded into an unsuccessful [`ExecutionResult`] carrying a message.
//!
//! Two layers keep the store read-only:
//!
//! 1. [`check_read_only`] rejects anything that is not a single
//!    `SELECT`/`WITH` statement, or that mentions a writing keyword outside
//!    string literals and comments.
//! 2. The pool is expected to come from [`crate::db::connect_read_only`],
//!    whose connections SQLite itself refuses to write through.

use serde_json::{Number, Value};
use sqlx::sqlite::SqliteRow;
use sqlx::{Column, Executor, Row, SqlitePool, TypeInfo, ValueRef};
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, warn};

use crate::models::{ExecutionResult, Row as ResultRow};

#[derive(Debug, Error)]
pub enum ExecutionError {
    #[error("Only read-only queries are allowed: {0}")]
    Rejected(String),

    #[error("Database connection failed: {0}")]
    Connection(#[source] sqlx::Error),

    #[error("{0}")]
    Query(#[source] sqlx::Error),
}

/// Keywords that may change the database or its attachment state.
const WRITE_KEYWORDS: &[&str] = &[
    "INSERT", "UPDATE", "DELETE", "REPLACE", "UPSERT", "DROP", "CREATE", "ALTER", "TRUNCATE",
    "ATTACH", "DETACH", "PRAGMA", "VACUUM", "REINDEX", "ANALYZE", "BEGIN", "COMMIT", "ROLLBACK",
    "SAVEPOINT", "RELEASE", "GRANT", "REVOKE",
];

pub struct QueryExecutor {
    pool: SqlitePool,
}

impl QueryExecutor {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Runs `sql` and captures its rows in column order.
    pub async fn execute(&self, sql: &str) -> ExecutionResult {
        let started = Instant::now();
        match self.try_execute(sql).await {
            Ok(result) => {
                debug!(
                    rows = result.row_count(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "query executed"
                );
                result
            }
            Err(e) => {
                warn!(error = %e, query = sql, "query execution failed");
                ExecutionResult::failure(e.to_string())
            }
        }
    }

    async fn try_execute(&self, sql: &str) -> Result<ExecutionResult, ExecutionError> {
        check_read_only(sql)?;

        // Returned to the pool when dropped, on every exit path.
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(ExecutionError::Connection)?;

        let rows = sqlx::query(sql)
            .fetch_all(&mut *conn)
            .await
            .map_err(ExecutionError::Query)?;

        let columns: Vec<String> = match rows.first() {
            Some(first) => first
                .columns()
                .iter()
                .map(|c| c.name().to_string())
                .collect(),
            // An empty result set has no row to read names from.
            None => match (&mut *conn).describe(sql).await {
                Ok(described) => described
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
                Err(_) => Vec::new(),
            },
        };

        let data = rows
            .iter()
            .map(|row| {
                let mut out = ResultRow::new();
                for (idx, name) in columns.iter().enumerate() {
                    out.insert(name.clone(), decode_value(row, idx));
                }
                out
            })
            .collect();

        Ok(ExecutionResult::success(columns, data))
    }
}

/// Converts one SQLite cell into JSON according to its runtime storage class.
fn decode_value(row: &SqliteRow, idx: usize) -> Value {
    let raw = match row.try_get_raw(idx) {
        Ok(raw) => raw,
        Err(_) => return Value::Null,
    };
    if raw.is_null() {
        return Value::Null;
    }
    let type_name = raw.type_info().name().to_string();

    match type_name.as_str() {
        "INTEGER" | "BOOLEAN" => row
            .try_get_unchecked::<i64, _>(idx)
            .map(Value::from)
            .unwrap_or(Value::Null),
        "REAL" | "NUMERIC" => row
            .try_get_unchecked::<f64, _>(idx)
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        "BLOB" => row
            .try_get_unchecked::<Vec<u8>, _>(idx)
            .map(|bytes| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
            .unwrap_or(Value::Null),
        _ => row
            .try_get_unchecked::<String, _>(idx)
            .map(Value::String)
            .unwrap_or(Value::Null),
    }
}

/// Accepts only a single retrieval statement.
///
/// String literals, quoted identifiers and comments are blanked before
/// keywords are inspected, so `WHERE note = 'delete me'` is allowed while
/// `SELECT 1; DROP TABLE x` is not.
pub fn check_read_only(sql: &str) -> Result<(), ExecutionError> {
    let code = strip_literals_and_comments(sql);
    let trimmed = code.trim();
    let body = trimmed.strip_suffix(';').unwrap_or(trimmed).trim_end();

    if body.is_empty() {
        return Err(ExecutionError::Rejected("query is empty".to_string()));
    }

    if body.contains(';') {
        return Err(ExecutionError::Rejected(
            "multiple statements are not allowed".to_string(),
        ));
    }

    let words = words_of(body);

    match words.first().map(|w| w.text.as_str()) {
        Some("SELECT") | Some("WITH") => {}
        Some(other) => {
            return Err(ExecutionError::Rejected(format!(
                "statement starts with {}",
                other
            )))
        }
        None => return Err(ExecutionError::Rejected("query is empty".to_string())),
    }

    // A keyword followed by `(` is a function call, e.g. `REPLACE(name, '-', ' ')`.
    if let Some(word) = words
        .iter()
        .find(|w| !w.called && WRITE_KEYWORDS.contains(&w.text.as_str()))
    {
        return Err(ExecutionError::Rejected(format!(
            "{} is not permitted",
            word.text
        )));
    }

    Ok(())
}

/// An upper-cased identifier or keyword of the statement.
struct Word {
    text: String,
    /// The next non-space character is `(`.
    called: bool,
}

fn words_of(code: &str) -> Vec<Word> {
    let is_word_char = |c: char| c.is_ascii_alphanumeric() || c == '_';
    let mut words = Vec::new();
    let mut rest = code;

    while let Some(start) = rest.find(is_word_char) {
        let tail = &rest[start..];
        let end = tail.find(|c: char| !is_word_char(c)).unwrap_or(tail.len());
        let after = tail[end..].trim_start();
        words.push(Word {
            text: tail[..end].to_ascii_uppercase(),
            called: after.starts_with('('),
        });
        rest = &tail[end..];
    }

    words
}

fn strip_literals_and_comments(sql: &str) -> String {
    let mut out = String::with_capacity(sql.len());
    let mut chars = sql.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '\'' | '"' | '`' => {
                let close = c;
                // Doubled quote is an escaped quote inside the literal.
                while let Some(n) = chars.next() {
                    if n == close {
                        if chars.peek() == Some(&close) {
                            chars.next();
                            continue;
                        }
                        break;
                    }
                }
                out.push(' ');
            }
            '[' => {
                for n in chars.by_ref() {
                    if n == ']' {
                        break;
                    }
                }
                out.push(' ');
            }
            '-' if chars.peek() == Some(&'-') => {
                for n in chars.by_ref() {
                    if n == '\n' {
                        break;
                    }
                }
                out.push(' ');
            }
            '/' if chars.peek() == Some(&'*') => {
                chars.next();
                let mut prev = '\0';
                for n in chars.by_ref() {
                    if prev == '*' && n == '/' {
                        break;
                    }
                    prev = n;
                }
                out.push(' ');
            }
            _ => out.push(c),
        }
    }

    out
}
