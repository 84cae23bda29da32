//! Per-chat interactive flow state.

use std::collections::HashMap;

use parking_lot::Mutex;

/// Where a chat is in the admission selection flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FlowState {
    #[default]
    Idle,
    /// Categories were listed; the next free text or button is the choice.
    AwaitingCategoryChoice,
}

/// Flow state keyed by chat id. Idle chats have no entry.
#[derive(Debug, Default)]
pub struct ConversationFlows {
    states: Mutex<HashMap<i64, FlowState>>,
}

impl ConversationFlows {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self, chat_id: i64) -> FlowState {
        self.states
            .lock()
            .get(&chat_id)
            .copied()
            .unwrap_or_default()
    }

    pub fn await_category(&self, chat_id: i64) {
        self.states
            .lock()
            .insert(chat_id, FlowState::AwaitingCategoryChoice);
    }

    /// Returns the current state and resets the chat to idle.
    pub fn take(&self, chat_id: i64) -> FlowState {
        self.states
            .lock()
            .remove(&chat_id)
            .unwrap_or_default()
    }

    /// Drops any pending flow; returns whether one was pending.
    pub fn cancel(&self, chat_id: i64) -> bool {
        self.take(chat_id) != FlowState::Idle
    }
}
