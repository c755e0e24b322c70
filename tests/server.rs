//! HTTP surface tests: start the server on a free port and call it with reqwest.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

use shop_analyst::config::Config;
use shop_analyst::db;
use shop_analyst::executor::QueryExecutor;
use shop_analyst::migrate;
use shop_analyst::models::Tier;
use shop_analyst::pipeline::Pipeline;
use shop_analyst::schema::{describe_store, SchemaDescriptor};
use shop_analyst::server::{run_server, run_server_with_pipeline};
use shop_analyst::translate::{Translator, TranslatorChain};

// ─── Helpers ────────────────────────────────────────────────────────

fn find_free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn wait_for_server(port: u16) {
    let client = reqwest::Client::new();
    let url = format!("http://127.0.0.1:{}/health", port);
    for _ in 0..50 {
        tokio::time::sleep(Duration::from_millis(100)).await;
        if let Ok(resp) = client.get(&url).send().await {
            if resp.status().is_success() {
                return;
            }
        }
    }
    panic!("Server did not become ready within 5 seconds");
}

/// Seeds a store whose total sales sum to 12,500 and returns a config
/// bound to a free port.
async fn seeded_config(tmp: &TempDir) -> Config {
    let mut config = Config::minimal(tmp.path().join("shop.db"));
    config.charts.dir = tmp.path().join("charts");
    config.server.bind = format!("127.0.0.1:{}", find_free_port());

    migrate::run_migrations(&config).await.unwrap();
    let pool = db::connect(&config).await.unwrap();
    sqlx::query(
        "INSERT INTO product_eligibility (product_id, product_name, is_eligible_for_ads) \
         VALUES ('P1', 'Trail Shoe', 1), ('P2', 'Rain Jacket', 0)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO product_total_sales (product_id, total_sales, total_orders) \
         VALUES ('P1', 7500.0, 70), ('P2', 5000.0, 20)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query(
        "INSERT INTO product_ad_sales (product_id, ad_spend, clicks, cpc, ad_sales) \
         VALUES ('P1', 2000.0, 1000, 2.0, 4000.0)",
    )
    .execute(&pool)
    .await
    .unwrap();
    pool.close().await;

    config
}

fn port_of(config: &Config) -> u16 {
    config
        .server
        .bind
        .rsplit(':')
        .next()
        .and_then(|p| p.parse().ok())
        .unwrap()
}

async fn start(config: &Config) -> tokio::task::JoinHandle<()> {
    let cfg = config.clone();
    let handle = tokio::spawn(async move {
        run_server(&cfg).await.unwrap();
    });
    wait_for_server(port_of(config)).await;
    handle
}

/// Splits an event-stream body into its `data:` payloads.
fn payloads(body: &str) -> Vec<String> {
    body.split("\n\n")
        .filter(|chunk| !chunk.trim().is_empty())
        .map(|chunk| {
            chunk
                .strip_prefix("data: ")
                .or_else(|| chunk.strip_prefix("data:"))
                .unwrap_or(chunk)
                .to_string()
        })
        .collect()
}

struct Fixed(&'static str);

#[async_trait]
impl Translator for Fixed {
    fn name(&self) -> &str {
        "fixed"
    }
    fn tier(&self) -> Tier {
        Tier::Hosted
    }
    async fn translate(&self, _question: &str, _schema: &SchemaDescriptor) -> Result<String> {
        Ok(self.0.to_string())
    }
}

// ─── Tests ──────────────────────────────────────────────────────────

#[tokio::test]
async fn test_health_and_stats() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;
    let handle = start(&config).await;
    let base = format!("http://{}", config.server.bind);
    let client = reqwest::Client::new();

    let health: Value = client
        .get(format!("{}/health", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(health["status"], "ok");
    assert_eq!(health["database"], "connected");
    assert_eq!(health["products"], 2);
    assert_eq!(health["tiers"][0]["tier"], "pattern");

    let stats: Value = client
        .get(format!("{}/stats", base))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stats["tables"]["product_total_sales"], 2);
    assert_eq!(stats["metrics"]["total_sales"], 12500.0);
    assert_eq!(stats["metrics"]["estimated_roas"], 6.25);

    handle.abort();
}

#[tokio::test]
async fn test_ask_total_sales() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;
    let handle = start(&config).await;
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("http://{}/ask", config.server.bind))
        .json(&serde_json::json!({ "question": "What is my total sales?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["answer"], "The total sales amount is $12,500.00");
    assert_eq!(body["success"], true);
    assert_eq!(body["chart_url"], "");
    assert_eq!(body["tier"], "pattern");
    assert_eq!(body["data"][0]["total_sales"], 12500.0);

    handle.abort();
}

#[tokio::test]
async fn test_ask_with_chart_serves_document() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;
    let handle = start(&config).await;
    let base = format!("http://{}", config.server.bind);
    let client = reqwest::Client::new();

    let body: Value = client
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({
            "question": "Show me the top performing products",
            "include_chart": true
        }))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let chart_url = body["chart_url"].as_str().unwrap();
    assert!(chart_url.starts_with("/charts/"), "chart_url: {}", chart_url);

    let chart = client
        .get(format!("{}{}", base, chart_url))
        .send()
        .await
        .unwrap();
    assert_eq!(chart.status(), 200);
    let doc: Value = chart.json().await.unwrap();
    assert_eq!(doc["rows"].as_array().unwrap().len(), 2);

    let missing = client
        .get(format!("{}/charts/nope.json", base))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), 404);

    handle.abort();
}

#[tokio::test]
async fn test_ask_blank_question_is_bad_request() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;
    let handle = start(&config).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{}/ask", config.server.bind))
        .json(&serde_json::json!({ "question": "  " }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "bad_request");

    handle.abort();
}

#[tokio::test]
async fn test_failed_query_is_reported() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;

    let pool = db::connect_read_only(&config).await.unwrap();
    let schema = describe_store(&pool).await.unwrap();
    let chain = TranslatorChain::new(Duration::from_secs(5))
        .with_tier(Box::new(Fixed("DELETE FROM product_total_sales")));
    let pipeline = Arc::new(Pipeline::new(chain, schema, QueryExecutor::new(pool)));

    let cfg = config.clone();
    let handle = tokio::spawn(async move {
        run_server_with_pipeline(&cfg, pipeline).await.unwrap();
    });
    wait_for_server(port_of(&config)).await;
    let base = format!("http://{}", config.server.bind);
    let client = reqwest::Client::new();

    let resp = client
        .post(format!("{}/ask", base))
        .json(&serde_json::json!({ "question": "What is my total sales?" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"]["code"], "query_failed");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());

    let stream_body = client
        .post(format!("{}/ask/stream", base))
        .json(&serde_json::json!({ "question": "What is my total sales?" }))
        .send()
        .await
        .unwrap()
        .text()
        .await
        .unwrap();
    let events = payloads(&stream_body);
    assert_eq!(events.len(), 3, "events: {:?}", events);
    let error: Value = serde_json::from_str(&events[1]).unwrap();
    assert_eq!(error["type"], "error");
    assert_eq!(events[2], "[DONE]");

    handle.abort();
}

#[tokio::test]
async fn test_stream_replays_answer() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;
    let handle = start(&config).await;
    let base = format!("http://{}", config.server.bind);
    let client = reqwest::Client::new();
    let question = serde_json::json!({ "question": "Calculate the RoAS" });

    let answer: Value = client
        .post(format!("{}/ask", base))
        .json(&question)
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();

    let resp = client
        .post(format!("{}/ask/stream", base))
        .json(&question)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let content_type = resp
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"));

    let events = payloads(&resp.text().await.unwrap());
    assert_eq!(events.last().map(String::as_str), Some("[DONE]"));

    let parsed: Vec<Value> = events[..events.len() - 1]
        .iter()
        .map(|e| serde_json::from_str(e).unwrap())
        .collect();
    assert_eq!(parsed[0]["type"], "status");
    assert_eq!(parsed[1]["type"], "sql");
    assert_eq!(parsed[2]["type"], "answer_start");

    let replayed: String = parsed
        .iter()
        .filter(|e| e["type"] == "token")
        .map(|e| e["content"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(replayed, answer["answer"].as_str().unwrap());
    assert!(replayed.contains("2.00"));

    let complete = parsed.last().unwrap();
    assert_eq!(complete["type"], "complete");
    assert!(complete.get("chart_url").is_none());

    handle.abort();
}

#[tokio::test]
async fn test_sample_questions_and_cors() {
    let tmp = TempDir::new().unwrap();
    let config = seeded_config(&tmp).await;
    let handle = start(&config).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{}/sample-questions", config.server.bind))
        .header("Origin", "http://example.com")
        .send()
        .await
        .unwrap();
    assert_eq!(
        resp.headers()
            .get("access-control-allow-origin")
            .and_then(|v| v.to_str().ok()),
        Some("*")
    );
    let body: Value = resp.json().await.unwrap();
    let questions = body["sample_questions"].as_array().unwrap();
    assert_eq!(questions.len(), 8);
    assert_eq!(questions[0], "What is my total sales?");

    handle.abort();
}
