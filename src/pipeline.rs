//! Question → answer pipeline.
//!
//! A [`Pipeline`] is built once at startup and shared (behind an `Arc`) by
//! every request. It holds only read-only state: the translator chain with
//! its startup probe results, the schema descriptor, the executor's pool
//! and an optional chart renderer.
//!
//! ```text
//! question ─▶ TranslatorChain ─▶ QueryExecutor ─▶ format_answer ─▶ answer
//!                  ▲                                  ▲
//!           SchemaDescriptor                    intent::classify
//! ```

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::chart::{ChartRenderer, JsonChartRenderer};
use crate::config::Config;
use crate::db;
use crate::executor::QueryExecutor;
use crate::format::format_answer;
use crate::intent::{classify, Intent};
use crate::models::{AskResponse, ExecutionResult, Row, TranslationResult};
use crate::schema::{describe_store, SchemaDescriptor};
use crate::translate::TranslatorChain;

/// Translation and execution of one question, before formatting.
#[derive(Debug, Clone)]
pub struct Outcome {
    pub translation: TranslationResult,
    pub result: ExecutionResult,
    pub intent: Intent,
}

impl Outcome {
    pub fn answer(&self) -> String {
        format_answer(&self.result, self.intent)
    }
}

pub struct Pipeline {
    chain: TranslatorChain,
    schema: SchemaDescriptor,
    executor: QueryExecutor,
    charts: Option<Arc<dyn ChartRenderer>>,
}

impl Pipeline {
    pub fn new(chain: TranslatorChain, schema: SchemaDescriptor, executor: QueryExecutor) -> Self {
        Self {
            chain,
            schema,
            executor,
            charts: None,
        }
    }

    pub fn with_charts(mut self, renderer: Arc<dyn ChartRenderer>) -> Self {
        self.charts = Some(renderer);
        self
    }

    /// Connects read-only to the store, reads its catalog and probes the
    /// remote translator tiers.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let pool = db::connect_read_only(config).await?;
        let schema = describe_store(&pool)
            .await
            .context("Failed to read the store catalog")?;
        if schema.is_empty() {
            warn!("store has no tables; run `shopq init` and load data first");
        }

        let chain = TranslatorChain::from_config(&config.translator).await;
        info!(
            tiers = ?chain.active_tiers(),
            tables = schema.tables().len(),
            "pipeline ready"
        );

        let mut pipeline = Self::new(chain, schema, QueryExecutor::new(pool));
        if config.charts.enabled {
            pipeline = pipeline.with_charts(Arc::new(JsonChartRenderer::new(&config.charts.dir)));
        }
        Ok(pipeline)
    }

    pub fn schema(&self) -> &SchemaDescriptor {
        &self.schema
    }

    pub fn chain(&self) -> &TranslatorChain {
        &self.chain
    }

    pub fn charts_enabled(&self) -> bool {
        self.charts.is_some()
    }

    /// Translates and executes `question`. Runs to completion once started.
    pub async fn run(&self, question: &str) -> Outcome {
        let translation = self.chain.translate(question, &self.schema).await;
        info!(tier = %translation.tier, query = %translation.query, "question translated");

        let result = self.executor.execute(&translation.query).await;
        Outcome {
            translation,
            result,
            intent: classify(question),
        }
    }

    /// Attempts a chart; failures are logged and yield `None`.
    pub async fn render_chart(&self, rows: &[Row], question: &str) -> Option<String> {
        let renderer = self.charts.as_ref()?;
        if rows.is_empty() {
            return None;
        }
        match renderer.render(rows, question).await {
            Ok(url) => Some(url),
            Err(e) => {
                warn!(error = %e, "chart generation failed");
                None
            }
        }
    }

    /// Full non-streaming answer to `question`.
    pub async fn ask(&self, question: &str, include_chart: bool) -> AskResponse {
        let outcome = self.run(question).await;
        self.respond(outcome, question, include_chart).await
    }

    /// Formats `outcome` and, when asked for and successful, attaches a chart.
    pub async fn respond(
        &self,
        outcome: Outcome,
        question: &str,
        include_chart: bool,
    ) -> AskResponse {
        let answer = outcome.answer();

        let chart_url = if include_chart && outcome.result.is_success() {
            self.render_chart(outcome.result.rows(), question).await
        } else {
            None
        };

        AskResponse {
            answer,
            success: outcome.result.is_success(),
            query: outcome.translation.query,
            tier: outcome.translation.tier,
            data: outcome.result.into_rows(),
            chart_url: chart_url.unwrap_or_default(),
        }
    }
}
