//! Command handling module.
//!
//! Parses slash commands and button presses, answers them from the
//! knowledge cache and renders the Spanish replies. Free text that is not
//! part of a pending flow is handed back for the Q&A forwarder.

mod flow;
pub mod format;
mod handler;
mod types;

pub use flow::{ConversationFlows, FlowState};
pub use handler::{CommandHandler, EVENTS_WINDOW_DAYS, Inbound};
pub use types::{BotCommand, Button, ButtonAction, MAX_CALLBACK_DATA_BYTES, Reply, Turn};
