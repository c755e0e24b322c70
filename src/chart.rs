//! Chart collaborator.
//!
//! Charts are a side output of a question: a [`ChartRenderer`] receives
//! the result rows and the question and returns a locator the client can
//! fetch. Failures are the caller's to swallow; they never fail a request.
//!
//! [`ChartKind::for_question`] picks the chart layout. It is deliberately
//! separate from [`crate::intent`]: the chart keywords overlap with the
//! intent table ("performance" vs "top performing") without matching it.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;

use crate::models::Row;

#[async_trait]
pub trait ChartRenderer: Send + Sync {
    /// Renders `rows` for `question` and returns the chart's locator.
    async fn render(&self, rows: &[Row], question: &str) -> Result<String>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChartKind {
    Sales,
    Roas,
    Cpc,
    Performance,
    Table,
}

impl ChartKind {
    pub fn for_question(question: &str) -> Self {
        let q = question.to_lowercase();
        if q.contains("sales") && q.contains("product") {
            ChartKind::Sales
        } else if q.contains("roas") {
            ChartKind::Roas
        } else if q.contains("cpc") || q.contains("cost per click") {
            ChartKind::Cpc
        } else if q.contains("performance") {
            ChartKind::Performance
        } else {
            ChartKind::Table
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            ChartKind::Sales => "sales",
            ChartKind::Roas => "roas",
            ChartKind::Cpc => "cpc",
            ChartKind::Performance => "performance",
            ChartKind::Table => "table",
        }
    }

    fn title(&self) -> &'static str {
        match self {
            ChartKind::Sales => "Product Sales Performance",
            ChartKind::Roas => "Return on Ad Spend",
            ChartKind::Cpc => "Cost Per Click by Product",
            ChartKind::Performance => "Product Performance",
            ChartKind::Table => "Query Results",
        }
    }

    /// Preferred (x, y) columns, in order of preference.
    fn axes(&self) -> (&'static [&'static str], &'static [&'static str]) {
        match self {
            ChartKind::Sales => (&["product_name", "product_id"], &["total_sales"]),
            ChartKind::Roas => (&["product_id"], &["roas", "total_ad_sales"]),
            ChartKind::Cpc => (&["product_id", "product_name"], &["cpc"]),
            ChartKind::Performance => (
                &["product_id", "product_name"],
                &["total_sales", "ad_sales", "clicks"],
            ),
            ChartKind::Table => (&[], &[]),
        }
    }
}

/// Chart document written by [`JsonChartRenderer`].
#[derive(Debug, Serialize)]
struct ChartDocument<'a> {
    kind: ChartKind,
    title: String,
    x: Option<String>,
    y: Option<String>,
    columns: Vec<String>,
    rows: &'a [Row],
    created_at: String,
}

/// Writes a JSON chart description to a directory served at `/charts`.
///
/// Drawing is left to the client; the document names the chart kind, the
/// axis columns and carries the rows.
pub struct JsonChartRenderer {
    dir: PathBuf,
}

impl JsonChartRenderer {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl ChartRenderer for JsonChartRenderer {
    async fn render(&self, rows: &[Row], question: &str) -> Result<String> {
        if rows.is_empty() {
            anyhow::bail!("no rows to chart");
        }

        let kind = ChartKind::for_question(question);
        let columns: Vec<String> = rows[0].keys().cloned().collect();
        let (x_candidates, y_candidates) = kind.axes();
        let pick = |candidates: &[&str]| {
            candidates
                .iter()
                .find(|c| columns.iter().any(|col| col == *c))
                .map(|c| c.to_string())
        };

        let title = match kind {
            ChartKind::Table => {
                let short: String = question.chars().take(50).collect();
                if question.chars().count() > 50 {
                    format!("Data Table: {}...", short)
                } else {
                    format!("Data Table: {}", short)
                }
            }
            other => other.title().to_string(),
        };

        let now = chrono::Utc::now();
        let doc = ChartDocument {
            kind,
            title,
            x: pick(x_candidates),
            y: pick(y_candidates),
            columns: columns.clone(),
            rows,
            created_at: now.to_rfc3339(),
        };

        let id = uuid::Uuid::new_v4().simple().to_string();
        let filename = format!(
            "{}_{}_{}.json",
            kind.as_str(),
            now.format("%Y%m%d_%H%M%S"),
            &id[..8]
        );

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create chart directory {}", self.dir.display()))?;
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, serde_json::to_vec_pretty(&doc)?)
            .await
            .with_context(|| format!("Failed to write chart {}", path.display()))?;

        Ok(format!("/charts/{}", filename))
    }
}
