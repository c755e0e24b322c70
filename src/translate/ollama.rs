//! Local model tier using an Ollama server.
//!
//! Probed at startup with `GET /api/tags`; translation calls
//! `POST /api/generate` with streaming disabled.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{build_prompt, Translator};
use crate::config::LocalTierConfig;
use crate::models::Tier;
use crate::schema::SchemaDescriptor;

pub struct OllamaTranslator {
    model: String,
    url: String,
    probe_timeout: Duration,
    client: reqwest::Client,
}

impl OllamaTranslator {
    pub fn new(config: &LocalTierConfig, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            probe_timeout: Duration::from_secs(config.probe_timeout_secs),
            client,
        })
    }

    /// Reachability check run once at startup.
    pub async fn probe(&self) -> Result<()> {
        let response = self
            .client
            .get(format!("{}/api/tags", self.url))
            .timeout(self.probe_timeout)
            .send()
            .await
            .map_err(|e| {
                anyhow::anyhow!(
                    "Ollama connection error (is Ollama running at {}?): {}",
                    self.url,
                    e
                )
            })?;

        if !response.status().is_success() {
            bail!("Ollama probe returned {}", response.status());
        }
        Ok(())
    }
}

#[async_trait]
impl Translator for OllamaTranslator {
    fn name(&self) -> &str {
        &self.model
    }

    fn tier(&self) -> Tier {
        Tier::Local
    }

    async fn translate(&self, question: &str, schema: &SchemaDescriptor) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": build_prompt(question, schema),
            "stream": false,
            "options": { "temperature": 0.1 }
        });

        let response = self
            .client
            .post(format!("{}/api/generate", self.url))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Ollama API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_ollama_response(&json)
    }
}

fn parse_ollama_response(json: &serde_json::Value) -> Result<String> {
    json.get("response")
        .and_then(|r| r.as_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("Invalid Ollama response: missing response field"))
}
