//! [`Chat`] implementation backed by the Telegram Bot API.
#![allow(deprecated)]

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId, ParseMode};
use teloxide::RequestError;

use crate::chat::{Chat, MessageRef};
use crate::dispatch::Decision;
use crate::error::Result;
use crate::format::{truncate, TELEGRAM_LIMIT};

/// Sends and edits Markdown messages. When Telegram rejects the Markdown
/// (user text with a stray `_` or `*`), the same text is retried unformatted.
/// Text past Telegram's length cap is cut before sending.
#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

fn confirm_keyboard(action_id: &str) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![vec![
        InlineKeyboardButton::callback("✅ Confirm", Decision::Confirm.callback_data(action_id)),
        InlineKeyboardButton::callback("❌ Cancel", Decision::Cancel.callback_data(action_id)),
    ]])
}

fn is_markdown_rejection(e: &RequestError) -> bool {
    matches!(e, RequestError::Api(_)) && e.to_string().to_lowercase().contains("parse entities")
}

#[async_trait]
impl Chat for TelegramChat {
    async fn send(&self, chat: i64, text: &str) -> Result<MessageRef> {
        let text = truncate(text, TELEGRAM_LIMIT);
        let sent = match self
            .bot
            .send_message(ChatId(chat), text.clone())
            .parse_mode(ParseMode::Markdown)
            .await
        {
            Err(e) if is_markdown_rejection(&e) => {
                tracing::debug!("Markdown rejected, resending plain: {}", e);
                self.bot.send_message(ChatId(chat), text.clone()).await?
            }
            other => other?,
        };
        Ok(MessageRef(sent.id.0))
    }

    async fn send_confirm(&self, chat: i64, text: &str, action_id: &str) -> Result<MessageRef> {
        let text = truncate(text, TELEGRAM_LIMIT);
        let sent = match self
            .bot
            .send_message(ChatId(chat), text.clone())
            .parse_mode(ParseMode::Markdown)
            .reply_markup(confirm_keyboard(action_id))
            .await
        {
            Err(e) if is_markdown_rejection(&e) => {
                tracing::debug!("Markdown rejected, resending plain: {}", e);
                self.bot
                    .send_message(ChatId(chat), text.clone())
                    .reply_markup(confirm_keyboard(action_id))
                    .await?
            }
            other => other?,
        };
        Ok(MessageRef(sent.id.0))
    }

    async fn edit(&self, chat: i64, message: MessageRef, text: &str) -> Result<()> {
        let text = truncate(text, TELEGRAM_LIMIT);
        let result = self
            .bot
            .edit_message_text(ChatId(chat), MessageId(message.0), text.clone())
            .parse_mode(ParseMode::Markdown)
            .await;
        match result {
            Ok(_) => Ok(()),
            Err(e) if is_markdown_rejection(&e) => {
                tracing::debug!("Markdown rejected, editing plain: {}", e);
                self.bot
                    .edit_message_text(ChatId(chat), MessageId(message.0), text.clone())
                    .await?;
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
