//! Outbound proactive messages.

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::{ApiError, RequestError};
use thiserror::Error;
use tracing::debug;

use super::RateLimiter;
use crate::commands::format::{MAX_MESSAGE_CHARS, split_message};

/// Errors delivering a proactive message.
#[derive(Debug, Error)]
pub enum NotifyError {
    /// The bot was blocked, kicked or the chat no longer exists.
    #[error("chat {0} can no longer be reached")]
    Unreachable(i64),

    #[error("still rate limited after waiting {0:?}")]
    RateLimited(std::time::Duration),

    #[error("telegram request failed: {0}")]
    Request(String),
}

/// Sends a text message to a chat.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), NotifyError>;
}

/// Notifier backed by the Telegram Bot API, paced by a [`RateLimiter`].
#[derive(Debug)]
pub struct TelegramNotifier {
    bot: Bot,
    limiter: RateLimiter,
}

impl TelegramNotifier {
    #[must_use]
    pub fn new(bot: Bot, limiter: RateLimiter) -> Self {
        Self { bot, limiter }
    }

    /// Sends one chunk, retrying once when Telegram asks to slow down.
    async fn send_chunk(&self, chat_id: i64, chunk: &str) -> Result<(), NotifyError> {
        self.limiter.wait_and_acquire().await;
        match self.bot.send_message(ChatId(chat_id), chunk).await {
            Ok(_) => Ok(()),
            Err(RequestError::RetryAfter(seconds)) => {
                self.limiter.back_off(seconds.duration()).await;
                self.limiter.wait_and_acquire().await;
                self.bot
                    .send_message(ChatId(chat_id), chunk)
                    .await
                    .map(|_| ())
                    .map_err(|e| classify(chat_id, e))
            }
            Err(e) => Err(classify(chat_id, e)),
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn notify(&self, chat_id: i64, text: &str) -> Result<(), NotifyError> {
        for chunk in split_message(text, MAX_MESSAGE_CHARS) {
            self.send_chunk(chat_id, &chunk).await?;
        }
        debug!("Notified chat {}", chat_id);
        Ok(())
    }
}

fn classify(chat_id: i64, err: RequestError) -> NotifyError {
    match err {
        RequestError::Api(
            ApiError::BotBlocked
            | ApiError::BotKicked
            | ApiError::BotKickedFromSupergroup
            | ApiError::ChatNotFound
            | ApiError::UserDeactivated,
        ) => NotifyError::Unreachable(chat_id),
        RequestError::RetryAfter(seconds) => NotifyError::RateLimited(seconds.duration()),
        other => NotifyError::Request(other.to_string()),
    }
}
