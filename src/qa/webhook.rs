//! HTTP client for the external question-answering webhook.

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::WebhookConfig;

/// Header carrying the shared webhook key.
pub const WEBHOOK_KEY_HEADER: &str = "X-Webhook-Key";

/// Response fields that may hold the answer, in order of preference.
const ANSWER_FIELDS: [&str; 3] = ["answer", "output", "text"];

/// Errors talking to the webhook.
#[derive(Debug, Error)]
pub enum QaError {
    #[error("webhook request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("webhook returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("webhook returned an empty answer")]
    EmptyAnswer,
}

/// Something that can answer a free-text question.
#[async_trait]
pub trait QaBackend: Send + Sync {
    async fn ask(&self, chat_id: i64, question: &str) -> Result<String, QaError>;
}

#[derive(Debug, Serialize)]
struct QaRequest<'a> {
    chat_id: i64,
    question: &'a str,
}

/// Posts questions as JSON and reads the answer back.
#[derive(Debug, Clone)]
pub struct WebhookClient {
    http: reqwest::Client,
    url: String,
    key: String,
}

impl WebhookClient {
    /// Creates a client for the configured webhook.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: &WebhookConfig) -> Result<Self, QaError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("uml-student-bot/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            url: config.url.clone(),
            key: config.key.clone(),
        })
    }
}

#[async_trait]
impl QaBackend for WebhookClient {
    async fn ask(&self, chat_id: i64, question: &str) -> Result<String, QaError> {
        debug!("Forwarding question from chat {} to webhook", chat_id);

        let response = self
            .http
            .post(&self.url)
            .header(WEBHOOK_KEY_HEADER, &self.key)
            .json(&QaRequest { chat_id, question })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(QaError::Status {
                status: status.as_u16(),
                body,
            });
        }

        extract_answer(&body).ok_or(QaError::EmptyAnswer)
    }
}

/// Pulls the answer out of a webhook response body.
///
/// JSON objects are searched for a known answer field; a JSON array is
/// read through its first element. A body that is not JSON is the answer
/// itself. The answer is returned verbatim; whitespace-only counts as empty.
fn extract_answer(body: &str) -> Option<String> {
    let answer = match serde_json::from_str::<Value>(body) {
        Ok(value) => answer_from_value(&value)?,
        Err(_) => body.to_owned(),
    };
    (!answer.trim().is_empty()).then_some(answer)
}

fn answer_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.clone()),
        Value::Object(map) => ANSWER_FIELDS
            .iter()
            .find_map(|field| map.get(*field).and_then(Value::as_str))
            .map(str::to_owned),
        Value::Array(items) => items.first().and_then(answer_from_value),
        _ => None,
    }
}
