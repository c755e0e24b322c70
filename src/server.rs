//! HTTP server.
//!
//! A thin dispatch layer over the shared [`Pipeline`]: every route either
//! answers a question or reports on the store.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Store connectivity, product count and translator tiers |
//! | `GET`  | `/stats` | Table counts and sales/advertising totals |
//! | `POST` | `/ask` | Answer a question in one JSON response |
//! | `POST` | `/ask/stream` | Answer a question as a `text/event-stream` |
//! | `GET`  | `/sample-questions` | Example questions |
//! | `GET`  | `/charts/{file}` | Chart documents written by `include_chart` |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "query_failed", "message": "no such column: foo" } }
//! ```
//!
//! Error codes: `bad_request` (400), `query_failed` (400), `internal` (500).
//!
//! A streamed question that fails still answers 200; the failure arrives
//! as an `error` event followed by `[DONE]`.
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted to support browser-based
//! clients.

use anyhow::Context;
use axum::{
    extract::State,
    http::StatusCode,
    response::{
        sse::{Event, Sse},
        IntoResponse, Response,
    },
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{error, info};

use crate::config::Config;
use crate::db;
use crate::models::AskResponse;
use crate::pipeline::Pipeline;
use crate::stats::{self, StoreStats};
use crate::stream::answer_stream;
use crate::translate::TierStatus;

pub const SAMPLE_QUESTIONS: &[&str] = &[
    "What is my total sales?",
    "Calculate the RoAS (Return on Ad Spend)",
    "Which product had the highest CPC (Cost Per Click)?",
    "Show me the top performing products by sales",
    "What is the average conversion rate?",
    "Which products are eligible for advertising?",
    "What is the total ad spend across all campaigns?",
    "Show me products with high clicks but low conversions",
];

/// Shared application state passed to all route handlers via Axum's `State` extractor.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<Pipeline>,
    /// Read-only pool for health and stats.
    pool: SqlitePool,
    token_delay: Duration,
}

/// Starts the HTTP server on `[server].bind`.
///
/// Builds the [`Pipeline`] (store catalog, translator tier probes) first;
/// runs until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config).await?;
    run_server_with_pipeline(config, Arc::new(pipeline)).await
}

/// Starts the HTTP server around an already-built pipeline.
///
/// Used by embedders and tests that assemble their own translator chain.
pub async fn run_server_with_pipeline(
    config: &Config,
    pipeline: Arc<Pipeline>,
) -> anyhow::Result<()> {
    let pool = db::connect_read_only(config).await?;
    let app = router(config, pipeline, pool);

    let bind_addr = &config.server.bind;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", bind_addr))?;

    info!(bind = %bind_addr, "server listening");
    println!("shopq server listening on http://{}", bind_addr);

    axum::serve(listener, app).await?;
    Ok(())
}

/// Builds the route table.
pub fn router(config: &Config, pipeline: Arc<Pipeline>, pool: SqlitePool) -> Router {
    let state = AppState {
        pipeline,
        pool,
        token_delay: Duration::from_millis(config.streaming.token_delay_ms),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/stats", get(handle_stats))
        .route("/ask", post(handle_ask))
        .route("/ask/stream", post(handle_ask_stream))
        .route("/sample-questions", get(handle_sample_questions))
        .nest_service("/charts", ServeDir::new(&config.charts.dir))
        .layer(cors)
        .with_state(state)
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

/// Internal error type that converts into an Axum HTTP response.
struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// The generated query was rejected or failed against the store.
fn query_failed(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "query_failed".to_string(),
        message: message.into(),
    }
}

fn internal(context: &str, err: anyhow::Error) -> AppError {
    error!(error = %err, "{}", context);
    AppError {
        status: StatusCode::INTERNAL_SERVER_ERROR,
        code: "internal".to_string(),
        message: format!("{}: {}", context, err),
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    database: String,
    products: i64,
    tiers: Vec<TierStatus>,
}

async fn handle_health(State(state): State<AppState>) -> Result<Json<HealthResponse>, AppError> {
    let products: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM product_eligibility")
        .fetch_one(&state.pool)
        .await
        .map_err(|e| internal("Health check failed", e.into()))?;

    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        database: "connected".to_string(),
        products,
        tiers: state.pipeline.chain().statuses().to_vec(),
    }))
}

// ============ GET /stats ============

async fn handle_stats(State(state): State<AppState>) -> Result<Json<StoreStats>, AppError> {
    stats::collect(&state.pool)
        .await
        .map(Json)
        .map_err(|e| internal("Failed to get stats", e))
}

// ============ POST /ask ============

#[derive(Debug, Deserialize)]
struct AskRequest {
    question: String,
    #[serde(default)]
    include_chart: bool,
}

impl AskRequest {
    fn validated(self) -> Result<Self, AppError> {
        if self.question.trim().is_empty() {
            return Err(bad_request("question must not be empty"));
        }
        Ok(self)
    }
}

/// Returns `400 query_failed` when the generated query does not execute.
async fn handle_ask(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<Json<AskResponse>, AppError> {
    let req = req.validated()?;
    let outcome = state.pipeline.run(&req.question).await;

    if let Some(message) = outcome.result.error() {
        return Err(query_failed(message));
    }

    let response = state
        .pipeline
        .respond(outcome, &req.question, req.include_chart)
        .await;
    Ok(Json(response))
}

// ============ POST /ask/stream ============

async fn handle_ask_stream(
    State(state): State<AppState>,
    Json(req): Json<AskRequest>,
) -> Result<impl IntoResponse, AppError> {
    let req = req.validated()?;

    let frames = answer_stream(
        state.pipeline.clone(),
        req.question,
        req.include_chart,
        state.token_delay,
    );
    let events = frames.map(|frame| Ok::<_, Infallible>(Event::default().data(frame.data())));

    Ok(Sse::new(events))
}

// ============ GET /sample-questions ============

#[derive(Serialize)]
struct SampleQuestions {
    sample_questions: Vec<&'static str>,
}

async fn handle_sample_questions() -> Json<SampleQuestions> {
    Json(SampleQuestions {
        sample_questions: SAMPLE_QUESTIONS.to_vec(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_question_is_bad_request() {
        let req = AskRequest {
            question: "   ".to_string(),
            include_chart: false,
        };
        let err = req.validated().err().unwrap();
        assert_eq!(err.status, StatusCode::BAD_REQUEST);
        assert_eq!(err.code, "bad_request");
    }

    #[test]
    fn test_include_chart_defaults_to_false() {
        let req: AskRequest = serde_json::from_str(r#"{"question":"What is my total sales?"}"#).unwrap();
        assert!(!req.include_chart);
    }

    #[test]
    fn test_sample_questions_cover_intents() {
        use crate::intent::{classify, Intent};
        assert_eq!(classify(SAMPLE_QUESTIONS[0]), Intent::TotalSales);
        assert_eq!(classify(SAMPLE_QUESTIONS[1]), Intent::Roas);
        assert_eq!(classify(SAMPLE_QUESTIONS[2]), Intent::HighestCpc);
    }
}
