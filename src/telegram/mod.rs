//! Telegram transport module.
//!
//! Wires the Bot API to the command handler and the Q&A forwarder, and
//! delivers paced proactive messages for the reminder scheduler.

mod bot;
mod notifier;
mod rate_limiter;

pub use bot::run_dispatcher;
pub use notifier::{Notifier, NotifyError, TelegramNotifier};
pub use rate_limiter::RateLimiter;
