use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::core::backend::{AnswerBackend, NO_ANSWER_PLACEHOLDER};
use crate::core::error::RequestError;

/// Longest slice of an error body kept in `RequestError::Status`.
const MAX_ERROR_BODY_CHARS: usize = 200;

#[derive(Serialize)]
struct QueryRequest<'a> {
    question: &'a str,
}

/// POSTs `{"question": ...}` to a single endpoint and reads `{"answer": ...}`.
pub struct HttpBackend {
    client: Client,
    endpoint: String,
}

impl HttpBackend {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: Client::new(),
            endpoint,
        }
    }

    async fn send(&self, question: &str) -> Result<String, RequestError> {
        let resp = self
            .client
            .post(&self.endpoint)
            .header("Content-Type", "application/json")
            .json(&QueryRequest { question })
            .send()
            .await
            .map_err(|e| RequestError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(RequestError::Status {
                status: status.as_u16(),
                message: text.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| RequestError::Decode(e.to_string()))?;
        Ok(extract_answer(&body))
    }
}

#[async_trait]
impl AnswerBackend for HttpBackend {
    async fn ask(
        &self,
        question: &str,
        cancel: &CancellationToken,
    ) -> Result<String, RequestError> {
        if cancel.is_cancelled() {
            return Err(RequestError::Cancelled);
        }

        tracing::debug!(endpoint = %self.endpoint, "sending question");
        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(RequestError::Cancelled),
            result = self.send(question) => result,
        }
    }

    fn describe(&self) -> &str {
        &self.endpoint
    }
}

/// The `answer` field as display text. Missing, null, empty or falsy
/// answers become the placeholder warning.
fn extract_answer(body: &serde_json::Value) -> String {
    use serde_json::Value;

    match body.get("answer") {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) if n.as_f64() != Some(0.0) => n.to_string(),
        Some(Value::Bool(true)) => "true".into(),
        Some(v @ (Value::Array(_) | Value::Object(_))) => v.to_string(),
        _ => NO_ANSWER_PLACEHOLDER.into(),
    }
}
