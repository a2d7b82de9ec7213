//! Test doubles for the runner and chat seams.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

use crate::chat::{Chat, MessageRef};
use crate::error::{Error, Result};
use crate::exec::{CommandResult, Runner};

/// Replays canned outputs and records every argv it is asked to run.
/// The last output repeats once the queue is drained.
pub struct FakeRunner {
    outputs: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<String>>>,
}

impl FakeRunner {
    pub fn with_output(output: &str) -> Self {
        Self::with_outputs([output])
    }

    pub fn with_outputs<'a>(outputs: impl IntoIterator<Item = &'a str>) -> Self {
        Self {
            outputs: Mutex::new(outputs.into_iter().map(ToString::to_string).collect()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Runner for FakeRunner {
    async fn run(&self, argv: &[String]) -> CommandResult {
        self.calls.lock().unwrap().push(argv.to_vec());
        let mut outputs = self.outputs.lock().unwrap();
        let text = if outputs.len() > 1 {
            outputs.pop_front().unwrap_or_default()
        } else {
            outputs.front().cloned().unwrap_or_default()
        };
        CommandResult {
            failed: text.starts_with("Error:"),
            timed_out: false,
            text,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sent {
    Message { chat: i64, text: String },
    Confirm { chat: i64, text: String, action_id: String },
    Edit { chat: i64, message: i32, text: String },
}

/// Records everything sent through it.
#[derive(Default)]
pub struct RecordingChat {
    log: Mutex<Vec<Sent>>,
    next_id: Mutex<i32>,
    fail_chat: Option<i64>,
}

impl RecordingChat {
    /// A chat whose sends to `chat` always fail.
    pub fn failing_for(chat: i64) -> Self {
        Self {
            fail_chat: Some(chat),
            ..Default::default()
        }
    }

    pub fn log(&self) -> Vec<Sent> {
        self.log.lock().unwrap().clone()
    }

    /// `(chat, text)` of plain messages.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Message { chat, text } => Some((chat, text)),
                _ => None,
            })
            .collect()
    }

    /// Action ids attached to confirmation prompts.
    pub fn confirm_ids(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Confirm { action_id, .. } => Some(action_id),
                _ => None,
            })
            .collect()
    }

    /// Texts of edits, in order.
    pub fn edits(&self) -> Vec<String> {
        self.log()
            .into_iter()
            .filter_map(|s| match s {
                Sent::Edit { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    fn next(&self, chat: i64) -> Result<MessageRef> {
        if self.fail_chat == Some(chat) {
            return Err(Error::Telegram(format!("chat {} blocked the bot", chat)));
        }
        let mut id = self.next_id.lock().unwrap();
        *id += 1;
        Ok(MessageRef(*id))
    }
}

#[async_trait]
impl Chat for RecordingChat {
    async fn send(&self, chat: i64, text: &str) -> Result<MessageRef> {
        let id = self.next(chat)?;
        self.log.lock().unwrap().push(Sent::Message {
            chat,
            text: text.to_string(),
        });
        Ok(id)
    }

    async fn send_confirm(&self, chat: i64, text: &str, action_id: &str) -> Result<MessageRef> {
        let id = self.next(chat)?;
        self.log.lock().unwrap().push(Sent::Confirm {
            chat,
            text: text.to_string(),
            action_id: action_id.to_string(),
        });
        Ok(id)
    }

    async fn edit(&self, chat: i64, message: MessageRef, text: &str) -> Result<()> {
        self.log.lock().unwrap().push(Sent::Edit {
            chat,
            message: message.0,
            text: text.to_string(),
        });
        Ok(())
    }
}
