//! Tiered question → SQL translation.
//!
//! Defines the [`Translator`] trait and the [`TranslatorChain`] that walks
//! the tiers in priority order:
//! - **[`HostedTranslator`]**: a hosted generative model (Gemini REST API).
//! - **[`OllamaTranslator`]**: a model served by a local Ollama instance.
//! - **[`PatternTranslator`]**: deterministic keyword templates from
//!   [`crate::intent`]; always present, never skipped.
//!
//! # Tier Selection
//!
//! Remote tier availability is decided once, by [`TranslatorChain::from_config`]
//! at startup: the hosted tier needs its API key in the environment, the
//! local tier must answer a reachability probe. Tiers that fail these checks
//! are left out of the chain for the life of the process.
//!
//! Per request, a remote tier is passed over when it:
//! - does not answer within `translator.timeout_secs`
//! - returns an error (transport failure, non-2xx status, bad payload)
//! - returns nothing but whitespace or an empty code fence
//!
//! Tiers are tried one after another, never raced. The pattern tier ends
//! the walk, so [`TranslatorChain::translate`] always yields a query.

mod hosted;
mod ollama;

pub use hosted::HostedTranslator;
pub use ollama::OllamaTranslator;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::TranslatorConfig;
use crate::intent::match_rule;
use crate::models::{Tier, TranslationResult};
use crate::schema::SchemaDescriptor;

/// One tier of the translator chain.
///
/// Implementations return the raw model text; the chain strips code fences
/// and labels with [`clean_sql`] before use.
#[async_trait]
pub trait Translator: Send + Sync {
    /// Short display name (e.g. `"gemini-2.0-flash"`).
    fn name(&self) -> &str;

    fn tier(&self) -> Tier;

    async fn translate(&self, question: &str, schema: &SchemaDescriptor) -> Result<String>;
}

/// Startup availability of one configured tier.
#[derive(Debug, Clone, Serialize)]
pub struct TierStatus {
    pub tier: Tier,
    pub name: String,
    pub available: bool,
    pub detail: String,
}

pub struct TranslatorChain {
    remotes: Vec<Box<dyn Translator>>,
    fallback: PatternTranslator,
    timeout: Duration,
    statuses: Vec<TierStatus>,
}

impl TranslatorChain {
    /// A chain with only the pattern tier.
    pub fn new(timeout: Duration) -> Self {
        Self {
            remotes: Vec::new(),
            fallback: PatternTranslator,
            timeout,
            statuses: vec![TierStatus {
                tier: Tier::Pattern,
                name: PatternTranslator.name().to_string(),
                available: true,
                detail: "built-in".to_string(),
            }],
        }
    }

    /// Appends a remote tier after those already added.
    pub fn with_tier(mut self, translator: Box<dyn Translator>) -> Self {
        let status = TierStatus {
            tier: translator.tier(),
            name: translator.name().to_string(),
            available: true,
            detail: "registered".to_string(),
        };
        let at = self.statuses.len() - 1;
        self.statuses.insert(at, status);
        self.remotes.push(translator);
        self
    }

    /// Builds the chain from configuration, probing each remote tier once.
    pub async fn from_config(config: &TranslatorConfig) -> Self {
        let mut chain = Self::new(Duration::from_secs(config.timeout_secs));

        if let Some(hosted_cfg) = &config.hosted {
            match HostedTranslator::new(hosted_cfg, chain.timeout) {
                Ok(translator) => {
                    info!(tier = %Tier::Hosted, model = translator.name(), "translator tier available");
                    chain = chain.with_tier(Box::new(translator));
                }
                Err(e) => {
                    warn!(tier = %Tier::Hosted, error = %e, "translator tier unavailable");
                    chain.record_unavailable(Tier::Hosted, &hosted_cfg.model, &e.to_string());
                }
            }
        }

        if let Some(local_cfg) = &config.local {
            match OllamaTranslator::new(local_cfg, chain.timeout) {
                Ok(translator) => match translator.probe().await {
                    Ok(()) => {
                        info!(tier = %Tier::Local, model = translator.name(), "translator tier available");
                        chain = chain.with_tier(Box::new(translator));
                    }
                    Err(e) => {
                        warn!(tier = %Tier::Local, error = %e, "translator tier unavailable");
                        chain.record_unavailable(Tier::Local, &local_cfg.model, &e.to_string());
                    }
                },
                Err(e) => {
                    warn!(tier = %Tier::Local, error = %e, "translator tier unavailable");
                    chain.record_unavailable(Tier::Local, &local_cfg.model, &e.to_string());
                }
            }
        }

        chain
    }

    fn record_unavailable(&mut self, tier: Tier, name: &str, detail: &str) {
        let at = self.statuses.len() - 1;
        self.statuses.insert(
            at,
            TierStatus {
                tier,
                name: name.to_string(),
                available: false,
                detail: detail.to_string(),
            },
        );
    }

    /// Configured tiers in priority order, including ones left out at startup.
    pub fn statuses(&self) -> &[TierStatus] {
        &self.statuses
    }

    /// Tiers that will actually be tried, in order.
    pub fn active_tiers(&self) -> Vec<Tier> {
        self.remotes
            .iter()
            .map(|t| t.tier())
            .chain(std::iter::once(Tier::Pattern))
            .collect()
    }

    /// Translates `question`, falling through tiers until one yields a query.
    pub async fn translate(&self, question: &str, schema: &SchemaDescriptor) -> TranslationResult {
        for translator in &self.remotes {
            let tier = translator.tier();
            let started = Instant::now();

            match tokio::time::timeout(self.timeout, translator.translate(question, schema)).await
            {
                Ok(Ok(raw)) => {
                    let query = clean_sql(&raw);
                    if query.is_empty() {
                        warn!(%tier, reason = "empty", "translator tier skipped");
                        continue;
                    }
                    debug!(
                        %tier,
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "translated question"
                    );
                    return TranslationResult { query, tier };
                }
                Ok(Err(e)) => {
                    warn!(%tier, reason = "error", error = %e, "translator tier skipped");
                }
                Err(_) => {
                    warn!(
                        %tier,
                        reason = "timeout",
                        timeout_ms = self.timeout.as_millis() as u64,
                        "translator tier skipped"
                    );
                }
            }
        }

        TranslationResult {
            query: self.fallback.generate(question).to_string(),
            tier: Tier::Pattern,
        }
    }
}

// ============ Pattern Translator ============

/// Terminal tier: picks the query template of the first matching intent rule.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternTranslator;

impl PatternTranslator {
    pub fn generate(&self, question: &str) -> &'static str {
        match_rule(question).query
    }
}

#[async_trait]
impl Translator for PatternTranslator {
    fn name(&self) -> &str {
        "keyword patterns"
    }

    fn tier(&self) -> Tier {
        Tier::Pattern
    }

    async fn translate(&self, question: &str, _schema: &SchemaDescriptor) -> Result<String> {
        Ok(self.generate(question).to_string())
    }
}

// ============ Prompt and output helpers ============

/// Prompt shared by the remote tiers.
pub fn build_prompt(question: &str, schema: &SchemaDescriptor) -> String {
    format!(
        "You are an expert SQL assistant for an e-commerce database. \
Convert the user's question into a single SQLite query.\n\n\
{}\n\
Important notes:\n\
- RoAS (Return on Ad Spend) = ad_sales / ad_spend\n\
- CPC (Cost Per Click) = ad_spend / clicks\n\
- Only use tables and columns that exist in the schema\n\
- Only write read-only SELECT queries\n\
- Use meaningful aliases for calculated columns\n\
- Return ONLY the SQL query, no explanations or markdown\n\n\
User Question: {}\n\n\
SQL Query:",
        schema.render(),
        question
    )
}

/// Strips code fences, leading labels and surrounding whitespace from
/// model output.
pub fn clean_sql(raw: &str) -> String {
    let mut text = raw.trim();

    if let Some(start) = text.find("```") {
        let after = &text[start + 3..];
        // Skip the info string (e.g. "sql") up to the end of the fence line.
        let body = match after.find('\n') {
            Some(nl) if !after[..nl].trim().contains(' ') => &after[nl + 1..],
            _ => strip_fence_language(after),
        };
        text = match body.find("```") {
            Some(end) => &body[..end],
            None => body,
        };
        text = text.trim();
    }

    for label in ["sql query:", "query:"] {
        if text.len() >= label.len()
            && text.is_char_boundary(label.len())
            && text[..label.len()].eq_ignore_ascii_case(label)
        {
            text = text[label.len()..].trim();
            break;
        }
    }

    text.to_string()
}

/// Drops a leading `sql`/`sqlite` info word from a fence opened on the
/// same line as the query.
fn strip_fence_language(body: &str) -> &str {
    let trimmed = body.trim_start();
    for word in ["sqlite", "sql"] {
        if let Some(head) = trimmed.get(..word.len()) {
            let rest = &trimmed[word.len()..];
            if head.eq_ignore_ascii_case(word) && rest.starts_with(char::is_whitespace) {
                return rest;
            }
        }
    }
    body
}
