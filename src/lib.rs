//! townbot library root.

pub mod chat;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod exec;
pub mod format;
pub mod logging;
pub mod mail;
pub mod parse;
pub mod pending;
pub mod telegram;

#[cfg(test)]
pub(crate) mod testing;

pub use chat::{Chat, MessageRef};
pub use config::Settings;
pub use dispatch::CommandDispatcher;
pub use error::{Error, Result};
pub use exec::{CommandResult, Executor, Runner};
pub use mail::{BotState, MailPoller};
pub use pending::{PendingAction, PendingActions};
