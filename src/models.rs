//! Core data models used throughout the question pipeline.
//!
//! These types carry a question's translation, its execution outcome, and
//! the final answer between the translator chain, the executor, the
//! formatter and the HTTP/streaming surfaces.

use serde::Serialize;
use serde_json::{Map, Value};

/// One result row: column name → value, in result-set column order.
///
/// `serde_json` is built with `preserve_order`, so iteration and
/// serialization follow insertion order.
pub type Row = Map<String, Value>;

/// Which translator tier produced a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Hosted generative model (first priority).
    Hosted,
    /// Locally reachable model server (second priority).
    Local,
    /// Deterministic keyword patterns (terminal fallback).
    Pattern,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Hosted => "hosted",
            Tier::Local => "local",
            Tier::Pattern => "pattern",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output of the translator chain for one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranslationResult {
    pub query: String,
    pub tier: Tier,
}

/// Immutable snapshot of one query execution.
///
/// Built only through [`ExecutionResult::success`] or
/// [`ExecutionResult::failure`]: a result either carries rows or an error,
/// never both.
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionResult {
    success: bool,
    rows: Vec<Row>,
    columns: Vec<String>,
    error: Option<String>,
}

impl ExecutionResult {
    pub fn success(columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            success: true,
            rows,
            columns,
            error: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            rows: Vec::new(),
            columns: Vec::new(),
            error: Some(message.into()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }
}

/// Non-streaming answer to one question, as returned by `POST /ask`.
#[derive(Debug, Clone, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub data: Vec<Row>,
    pub query: String,
    pub success: bool,
    /// Locator of the rendered chart, or an empty string.
    pub chart_url: String,
    pub tier: Tier,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_failure_has_no_rows() {
        let result = ExecutionResult::failure("no such table: nope");
        assert!(!result.is_success());
        assert!(result.rows().is_empty());
        assert!(result.columns().is_empty());
        assert_eq!(result.error(), Some("no such table: nope"));
    }

    #[test]
    fn test_row_preserves_column_order() {
        let mut row = Row::new();
        row.insert("zeta".to_string(), json!(1));
        row.insert("alpha".to_string(), json!(2));
        let keys: Vec<&String> = row.keys().collect();
        assert_eq!(keys, vec!["zeta", "alpha"]);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"zeta":1,"alpha":2}"#);
    }

    #[test]
    fn test_tier_serializes_snake_case() {
        assert_eq!(serde_json::to_value(Tier::Pattern).unwrap(), json!("pattern"));
        assert_eq!(Tier::Hosted.to_string(), "hosted");
    }
}
