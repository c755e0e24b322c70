//! Event stream replaying a computed answer.
//!
//! The pipeline is synchronous: the whole answer exists before the first
//! token is sent. [`answer_stream`] emits milestones and then replays the
//! formatted answer one character at a time so clients can render it
//! progressively.
//!
//! # Event Order
//!
//! ```text
//! status ─▶ (translate + execute) ─▶ sql ─▶ answer_start ─▶ token × N
//!        ─▶ [status ─▶ chart attempt] ─▶ complete ─▶ [DONE]
//! ```
//!
//! An unsuccessful execution emits a single `error` event followed by
//! `[DONE]`. Chart failures are logged and never become `error` events.
//!
//! # Wire Format
//!
//! Each frame is one line `data: <json>` followed by a blank line; the JSON
//! carries a `type` of `status`, `sql`, `answer_start`, `token`, `complete`
//! or `error`. The stream ends with the literal `data: [DONE]`.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio_stream::Stream;
use tracing::error;

use crate::models::Row;
use crate::pipeline::Pipeline;

pub const STATUS_PROCESSING: &str = "Processing your question...";
pub const STATUS_CHART: &str = "Generating chart...";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Status {
        content: String,
    },
    Sql {
        content: String,
    },
    AnswerStart,
    Token {
        content: String,
        position: usize,
    },
    Complete {
        data: Vec<Row>,
        query: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        chart_url: Option<String>,
    },
    Error {
        content: String,
    },
}

/// One frame of the stream: an event or the terminal sentinel.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamFrame {
    Event(StreamEvent),
    Done,
}

impl StreamFrame {
    /// Payload after `data: `.
    pub fn data(&self) -> String {
        match self {
            StreamFrame::Event(event) => serde_json::to_string(event).unwrap_or_else(|e| {
                error!(error = %e, "failed to serialize stream event");
                r#"{"type":"error","content":"internal serialization error"}"#.to_string()
            }),
            StreamFrame::Done => "[DONE]".to_string(),
        }
    }

    /// Full wire line, including the blank separator line.
    pub fn to_line(&self) -> String {
        format!("data: {}\n\n", self.data())
    }

    pub fn is_done(&self) -> bool {
        matches!(self, StreamFrame::Done)
    }
}

impl From<StreamEvent> for StreamFrame {
    fn from(event: StreamEvent) -> Self {
        StreamFrame::Event(event)
    }
}

/// Streams the answer to `question`.
///
/// Translation and execution run on a spawned task, so they finish even if
/// the consumer drops the stream while waiting; dropping it afterwards only
/// stops further frames.
pub fn answer_stream(
    pipeline: Arc<Pipeline>,
    question: String,
    include_chart: bool,
    token_delay: Duration,
) -> impl Stream<Item = StreamFrame> + Send + 'static {
    async_stream::stream! {
        yield StreamEvent::Status { content: STATUS_PROCESSING.to_string() }.into();

        let task = {
            let pipeline = pipeline.clone();
            let question = question.clone();
            tokio::spawn(async move { pipeline.run(&question).await })
        };

        let outcome = match task.await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(error = %e, "pipeline task failed");
                yield StreamEvent::Error { content: format!("internal error: {}", e) }.into();
                yield StreamFrame::Done;
                return;
            }
        };

        if !outcome.result.is_success() {
            let message = outcome.result.error().unwrap_or("unknown error").to_string();
            yield StreamEvent::Error { content: message }.into();
            yield StreamFrame::Done;
            return;
        }

        yield StreamEvent::Sql { content: outcome.translation.query.clone() }.into();

        let answer = outcome.answer();
        yield StreamEvent::AnswerStart.into();

        for (position, ch) in answer.chars().enumerate() {
            if !token_delay.is_zero() {
                tokio::time::sleep(token_delay).await;
            }
            yield StreamEvent::Token { content: ch.to_string(), position }.into();
        }

        let mut chart_url = None;
        if include_chart {
            yield StreamEvent::Status { content: STATUS_CHART.to_string() }.into();
            chart_url = pipeline.render_chart(outcome.result.rows(), &question).await;
        }

        yield StreamEvent::Complete {
            data: outcome.result.into_rows(),
            query: outcome.translation.query,
            chart_url,
        }
        .into();
        yield StreamFrame::Done;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_json_shapes() {
        let status: StreamFrame = StreamEvent::Status {
            content: "hi".to_string(),
        }
        .into();
        assert_eq!(status.data(), r#"{"type":"status","content":"hi"}"#);

        let start: StreamFrame = StreamEvent::AnswerStart.into();
        assert_eq!(start.data(), r#"{"type":"answer_start"}"#);

        let token: StreamFrame = StreamEvent::Token {
            content: "T".to_string(),
            position: 0,
        }
        .into();
        assert_eq!(token.data(), r#"{"type":"token","content":"T","position":0}"#);
    }

    #[test]
    fn test_complete_omits_missing_chart() {
        let mut row = Row::new();
        row.insert("total_sales".to_string(), json!(1.5));
        let frame: StreamFrame = StreamEvent::Complete {
            data: vec![row],
            query: "SELECT 1".to_string(),
            chart_url: None,
        }
        .into();
        let value: serde_json::Value = serde_json::from_str(&frame.data()).unwrap();
        assert_eq!(value["type"], "complete");
        assert_eq!(value["data"][0]["total_sales"], 1.5);
        assert!(value.get("chart_url").is_none());
    }

    #[test]
    fn test_status_texts() {
        assert_eq!(STATUS_PROCESSING, "Processing your question...");
        assert_eq!(STATUS_CHART, "Generating chart...");
    }

    #[test]
    fn test_done_sentinel_line() {
        assert_eq!(StreamFrame::Done.to_line(), "data: [DONE]\n\n");
        assert!(StreamFrame::Done.is_done());
    }

    #[test]
    fn test_newlines_stay_on_one_line() {
        let frame: StreamFrame = StreamEvent::Token {
            content: "\n".to_string(),
            position: 3,
        }
        .into();
        let line = frame.to_line();
        assert_eq!(line.matches('\n').count(), 2);
        assert!(line.starts_with("data: {"));
    }
}
