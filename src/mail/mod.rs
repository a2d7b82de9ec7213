//! Inbox polling and new-mail notifications.

pub mod poller;
pub mod state;

use serde_json::Value;

use crate::format::{field, flag};

pub use poller::{MailPoller, PollOutcome};
pub use state::BotState;

/// One entry of `gt mail inbox --json`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MailItem {
    pub id: String,
    pub from: String,
    pub subject: String,
    pub read: bool,
}

impl MailItem {
    /// Lenient conversion; non-object entries yield `None`.
    ///
    /// Each field is read on its own: null or missing text is empty,
    /// scalars are stringified, and anything but `true` counts as unread.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        Some(Self {
            id: field(value, "id"),
            from: field(value, "from"),
            subject: field(value, "subject"),
            read: flag(value, "read"),
        })
    }

    pub fn display_id(&self) -> String {
        or_placeholder(&self.id, "?")
    }

    pub fn display_from(&self) -> String {
        or_placeholder(&self.from, "?")
    }

    pub fn display_subject(&self) -> String {
        or_placeholder(&self.subject, "(no subject)")
    }
}

fn or_placeholder(value: &str, placeholder: &str) -> String {
    if value.is_empty() {
        placeholder.to_string()
    } else {
        value.to_string()
    }
}
