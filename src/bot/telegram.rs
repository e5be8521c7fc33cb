//! Telegram long-polling adapter.

use std::sync::Arc;

use teloxide::prelude::*;
use tracing::{info, warn};

use crate::bot::commands::BotHandler;

/// Conversation and subject keys for a Telegram message.
///
/// Sessions are bound per chat but owned by the sender, so a student keeps
/// their history across group and private chats.
pub fn conversation_keys(chat_id: i64, user_id: Option<u64>) -> (String, String) {
    let conversation = format!("tg:{chat_id}");
    let subject = match user_id {
        Some(id) => format!("tg:{id}"),
        None => conversation.clone(),
    };
    (conversation, subject)
}

/// Poll Telegram until Ctrl+C.
pub async fn run(bot: Bot, handler: Arc<BotHandler>) {
    match bot.get_me().await {
        Ok(me) => info!("🤖 Telegram bot @{} online", me.username()),
        Err(e) => warn!("Failed to get bot info: {e}"),
    }

    let schema = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    Dispatcher::builder(bot, schema)
        .dependencies(dptree::deps![handler])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("Telegram dispatcher stopped");
}

async fn handle_message(bot: Bot, msg: Message, handler: Arc<BotHandler>) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        return Ok(());
    };

    let user_id = msg.from.as_ref().map(|u| u.id.0);
    let (conversation, subject) = conversation_keys(msg.chat.id.0, user_id);

    let preview: String = text.chars().take(50).collect();
    info!("📨 Telegram {}: \"{}\"", subject, preview);

    let reply = handler.handle(&conversation, &subject, text);
    if let Err(e) = bot.send_message(msg.chat.id, reply).await {
        warn!("Failed to reply in chat {}: {}", msg.chat.id, e);
    }
    Ok(())
}
