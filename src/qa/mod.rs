//! Q&A forwarding module.
//!
//! Free-text questions go to an external webhook; the answer, or a
//! fallback when the webhook fails or is too slow, is relayed back.

mod forwarder;
mod webhook;

pub use forwarder::QaForwarder;
pub use webhook::{QaBackend, QaError, WEBHOOK_KEY_HEADER, WebhookClient};
