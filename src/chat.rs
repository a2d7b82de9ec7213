//! Transport-neutral chat surface.
//!
//! The dispatcher and the mail poller only talk to chats through [`Chat`], so
//! they run the same against Telegram, stdout, or a test recorder.

use async_trait::async_trait;
use std::sync::atomic::{AtomicI32, Ordering};

use crate::error::Result;

/// Handle of a sent message, used to edit it in place later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MessageRef(pub i32);

#[async_trait]
pub trait Chat: Send + Sync {
    /// Send a new Markdown message.
    async fn send(&self, chat: i64, text: &str) -> Result<MessageRef>;

    /// Send a message carrying Confirm / Cancel buttons bound to `action_id`.
    async fn send_confirm(&self, chat: i64, text: &str, action_id: &str) -> Result<MessageRef>;

    /// Replace the text of a previously sent message.
    async fn edit(&self, chat: i64, message: MessageRef, text: &str) -> Result<()>;
}

/// Prints messages to stdout. Used by one-shot CLI commands.
#[derive(Debug, Default)]
pub struct ConsoleChat {
    next_id: AtomicI32,
}

impl ConsoleChat {
    pub fn new() -> Self {
        Self::default()
    }

    fn next(&self) -> MessageRef {
        MessageRef(self.next_id.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

#[async_trait]
impl Chat for ConsoleChat {
    async fn send(&self, chat: i64, text: &str) -> Result<MessageRef> {
        println!("[{}] {}", chat, text);
        Ok(self.next())
    }

    async fn send_confirm(&self, chat: i64, text: &str, action_id: &str) -> Result<MessageRef> {
        println!("[{}] {}\n  (confirm:{} | cancel:{})", chat, text, action_id, action_id);
        Ok(self.next())
    }

    async fn edit(&self, chat: i64, message: MessageRef, text: &str) -> Result<()> {
        println!("[{} #{}] {}", chat, message.0, text);
        Ok(())
    }
}
