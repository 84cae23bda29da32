//! Bounded-time relay of free-text questions.

use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use super::QaBackend;
use crate::commands::format;

/// Asks the backend and always produces exactly one answer.
///
/// A call that outlives the timeout is dropped, so a late response can
/// never reach the chat after the fallback was sent.
pub struct QaForwarder {
    backend: Arc<dyn QaBackend>,
    timeout: Duration,
}

impl QaForwarder {
    #[must_use]
    pub fn new(backend: Arc<dyn QaBackend>, timeout: Duration) -> Self {
        Self { backend, timeout }
    }

    /// Returns the backend's answer, or the fallback text on error or timeout.
    pub async fn answer(&self, chat_id: i64, question: &str) -> String {
        match tokio::time::timeout(self.timeout, self.backend.ask(chat_id, question)).await {
            Ok(Ok(answer)) => {
                info!("Answered question from chat {}", chat_id);
                answer
            }
            Ok(Err(e)) => {
                warn!("Q&A webhook failed for chat {}: {}", chat_id, e);
                format::qa_fallback()
            }
            Err(_) => {
                warn!(
                    "Q&A webhook timed out after {:?} for chat {}",
                    self.timeout, chat_id
                );
                format::qa_fallback()
            }
        }
    }
}

impl std::fmt::Debug for QaForwarder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QaForwarder")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
