//! Hosted generative-model tier (Google Gemini REST API).
//!
//! Calls `POST {url}/v1beta/models/{model}:generateContent` with the API key
//! read from the environment variable named by `translator.hosted.api_key_env`.

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::time::Duration;

use super::{build_prompt, Translator};
use crate::config::HostedTierConfig;
use crate::models::Tier;
use crate::schema::SchemaDescriptor;

pub struct HostedTranslator {
    model: String,
    url: String,
    api_key: String,
    client: reqwest::Client,
}

impl HostedTranslator {
    /// Create the hosted tier from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the API key variable is unset or empty; the tier
    /// is then treated as unavailable for the life of the process.
    pub fn new(config: &HostedTierConfig, timeout: Duration) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).unwrap_or_default();
        if api_key.trim().is_empty() {
            bail!("{} environment variable not set", config.api_key_env);
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            model: config.model.clone(),
            url: config.url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl Translator for HostedTranslator {
    fn name(&self) -> &str {
        &self.model
    }

    fn tier(&self) -> Tier {
        Tier::Hosted
    }

    async fn translate(&self, question: &str, schema: &SchemaDescriptor) -> Result<String> {
        let body = serde_json::json!({
            "contents": [
                { "parts": [ { "text": build_prompt(question, schema) } ] }
            ],
            "generationConfig": { "temperature": 0.1 }
        });

        let response = self
            .client
            .post(format!(
                "{}/v1beta/models/{}:generateContent",
                self.url, self.model
            ))
            .header("x-goog-api-key", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: serde_json::Value = response.json().await?;
        parse_gemini_response(&json)
    }
}

/// Concatenates the text parts of the first candidate.
fn parse_gemini_response(json: &serde_json::Value) -> Result<String> {
    let parts = json
        .pointer("/candidates/0/content/parts")
        .and_then(|p| p.as_array())
        .ok_or_else(|| anyhow::anyhow!("Invalid Gemini response: missing candidate parts"))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(|t| t.as_str()))
        .collect();

    Ok(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_gemini_response_joins_parts() {
        let json = json!({
            "candidates": [{
                "content": { "parts": [ { "text": "SELECT " }, { "text": "1" } ] }
            }]
        });
        assert_eq!(parse_gemini_response(&json).unwrap(), "SELECT 1");
    }

    #[test]
    fn test_parse_gemini_response_missing_candidates() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        assert!(parse_gemini_response(&json).is_err());
    }

    #[test]
    fn test_missing_key_is_unavailable() {
        let config = HostedTierConfig {
            model: "gemini-2.0-flash".to_string(),
            url: "http://127.0.0.1:9".to_string(),
            api_key_env: "SHOPQ_HOSTED_KEY_THAT_IS_NEVER_SET".to_string(),
        };
        let err = HostedTranslator::new(&config, Duration::from_secs(1))
            .err()
            .unwrap();
        assert!(err.to_string().contains("SHOPQ_HOSTED_KEY_THAT_IS_NEVER_SET"));
    }
}
