//! Update dispatching: Telegram messages in, replies out.
//!
//! The dispatcher processes updates of one chat sequentially and different
//! chats concurrently, so a slow Q&A call only holds up its own chat.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use teloxide::prelude::*;
use teloxide::types::{
    BotCommand as MenuCommand, ChatAction, InlineKeyboardButton, InlineKeyboardMarkup,
};
use tracing::{debug, info, warn};

use crate::commands::format::{self, MAX_MESSAGE_CHARS};
use crate::commands::{BotCommand, CommandHandler, Inbound, Reply, Turn};
use crate::qa::QaForwarder;

/// Telegram shows a chat action for about five seconds.
const TYPING_REFRESH: Duration = Duration::from_secs(4);

/// Runs the long-polling dispatcher until Ctrl-C.
pub async fn run_dispatcher(
    bot: Bot,
    handler: Arc<CommandHandler>,
    forwarder: Arc<QaForwarder>,
) {
    register_command_menu(&bot).await;

    let schema = dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback));

    info!("Listening for Telegram updates");
    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handler, forwarder])
        .default_handler(|update| async move {
            debug!("Ignoring update {}", update.id.0);
        })
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;
    info!("Dispatcher stopped");
}

/// Publishes the public commands in the client's command menu.
async fn register_command_menu(bot: &Bot) {
    let commands: Vec<MenuCommand> = BotCommand::all_commands()
        .into_iter()
        .filter_map(|(usage, description)| {
            let name = usage.trim_start_matches('/').split_whitespace().next()?;
            Some(MenuCommand::new(name, description))
        })
        .collect();

    if let Err(e) = bot.set_my_commands(commands).await {
        warn!("Failed to register the command menu: {}", e);
    }
}

async fn on_message(
    bot: Bot,
    msg: Message,
    handler: Arc<CommandHandler>,
    forwarder: Arc<QaForwarder>,
) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        debug!("Ignoring non-text message in chat {}", msg.chat.id);
        return Ok(());
    };

    let inbound = Inbound {
        chat_id: msg.chat.id.0,
        user_id: msg.from().map(|user| user.id.0),
        first_name: msg.from().map(|user| user.first_name.clone()),
        text: text.to_owned(),
    };

    match handler.handle_message(&inbound, Local::now().date_naive()).await {
        Turn::Reply(reply) => send_reply(&bot, msg.chat.id, &reply).await,
        Turn::Forward(question) => {
            let typing = tokio::spawn(keep_typing(bot.clone(), msg.chat.id));
            let answer = forwarder.answer(inbound.chat_id, &question).await;
            typing.abort();
            send_reply(&bot, msg.chat.id, &Reply::text(answer)).await
        }
    }
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    handler: Arc<CommandHandler>,
) -> ResponseResult<()> {
    bot.answer_callback_query(q.id.clone()).await?;

    let (Some(data), Some(message)) = (q.data.as_deref(), q.message.as_ref()) else {
        return Ok(());
    };

    let reply = handler
        .handle_button(
            message.chat().id.0,
            Some(q.from.id.0),
            data,
            Local::now().date_naive(),
        )
        .await;
    send_reply(&bot, message.chat().id, &reply).await
}

async fn keep_typing(bot: Bot, chat_id: ChatId) {
    loop {
        if let Err(e) = bot.send_chat_action(chat_id, ChatAction::Typing).await {
            debug!("Typing action failed for chat {}: {}", chat_id, e);
            return;
        }
        tokio::time::sleep(TYPING_REFRESH).await;
    }
}

fn keyboard(reply: &Reply) -> Option<InlineKeyboardMarkup> {
    if reply.keyboard.is_empty() {
        return None;
    }
    Some(InlineKeyboardMarkup::new(reply.keyboard.iter().map(|row| {
        row.iter()
            .map(|button| InlineKeyboardButton::callback(button.label.clone(), button.action.to_data()))
            .collect::<Vec<_>>()
    })))
}

/// Sends a reply, split to Telegram's size limit; buttons go on the last part.
async fn send_reply(bot: &Bot, chat_id: ChatId, reply: &Reply) -> ResponseResult<()> {
    let chunks = format::split_message(&reply.text, MAX_MESSAGE_CHARS);
    let last = chunks.len().saturating_sub(1);

    for (i, chunk) in chunks.into_iter().enumerate() {
        let request = bot.send_message(chat_id, chunk);
        if i == last
            && let Some(markup) = keyboard(reply)
        {
            request.reply_markup(markup).await?;
        } else {
            request.await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::{Button, ButtonAction};

    #[test]
    fn test_keyboard_rows() {
        let reply = Reply::text("hola").with_buttons([
            Button::new("Pagos", ButtonAction::Payments),
            Button::new("León", ButtonAction::Site("León".to_owned())),
        ]);
        let markup = keyboard(&reply).unwrap();
        assert_eq!(markup.inline_keyboard.len(), 2);
        assert_eq!(markup.inline_keyboard[1][0].text, "León");
    }

    #[test]
    fn test_no_keyboard_for_plain_text() {
        assert!(keyboard(&Reply::text("hola")).is_none());
    }
}
