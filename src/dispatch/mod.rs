//! Routing of chat commands and button presses.
//!
//! Read-only commands run immediately behind a "⏳" placeholder that is edited
//! in place with the result. Mutating commands are registered as pending
//! actions and only run after an explicit Confirm press.

pub mod actions;

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::chat::{Chat, MessageRef};
use crate::error::Result;
use crate::exec::{CommandResult, Runner};
use crate::format::{self, code, mono, mono_within, preview, utf16_len, MESSAGE_LIMIT};
use crate::pending::{action_id, PendingAction, PendingActions};

use actions::Deferred;

pub const UNAUTHORIZED: &str = "Unauthorized.";
pub const EXPIRED: &str = "⚠️ Action expired or not found.";
pub const CANCELLED: &str = "❌ Cancelled.";

pub const HELP_TEXT: &str = "*Gas Town Bot Commands*

*Read-only:*
  /status — Town overview
  /mail — Show inbox
  /read `<id>` — Read a message
  /rigs — List rigs
  /polecats — List polecats
  /ready — Issues ready to work
  /hook — Check what's hooked
  /convoys — Convoy dashboard
  /version — Gas Town version
  /pending — Actions awaiting confirmation

*Actions (with confirmation):*
  /sling `<bead> <rig>` — Spawn polecat
  /nudge `<target> <msg>` — Nudge agent
  /send `<addr> <msg>` — Send mail
  /markread `<id>` — Mark mail read
  /mayor `<msg>` — Mail the mayor
  /crew `<name> <msg>` — Mail a crew member

Plain text is mailed to the mayor after confirmation.";

/// Which button was pressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Confirm,
    Cancel,
}

impl Decision {
    pub fn callback_data(self, action_id: &str) -> String {
        match self {
            Decision::Confirm => format!("confirm:{}", action_id),
            Decision::Cancel => format!("cancel:{}", action_id),
        }
    }
}

/// Split `confirm:<id>` / `cancel:<id>` callback data.
pub fn parse_callback(data: &str) -> Option<(Decision, &str)> {
    let (decision, id) = data.split_once(':')?;
    let decision = match decision {
        "confirm" => Decision::Confirm,
        "cancel" => Decision::Cancel,
        _ => return None,
    };
    if id.is_empty() {
        return None;
    }
    Some((decision, id))
}

/// What a button press led to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackOutcome {
    Executed(CommandResult),
    Cancelled,
    Expired,
    Unauthorized,
    Ignored,
}

/// Split `/cmd@bot rest` into `("cmd", "rest")`.
pub fn parse_command(text: &str) -> Option<(String, &str)> {
    let text = text.trim();
    let body = text.strip_prefix('/')?;
    let (head, rest) = match body.find(char::is_whitespace) {
        Some(idx) => (&body[..idx], body[idx..].trim()),
        None => (body, ""),
    };
    let name = head.split('@').next().unwrap_or(head).to_lowercase();
    if name.is_empty() {
        return None;
    }
    Some((name, rest))
}

/// Take `n` leading words; the remainder keeps its inner spacing.
fn take_words(text: &str, n: usize) -> Option<(Vec<&str>, &str)> {
    let mut words = Vec::with_capacity(n);
    let mut rest = text.trim_start();
    for _ in 0..n {
        if rest.is_empty() {
            return None;
        }
        let end = rest.find(char::is_whitespace).unwrap_or(rest.len());
        words.push(&rest[..end]);
        rest = rest[end..].trim_start();
    }
    Some((words, rest.trim_end()))
}

/// Executables the bot drives.
#[derive(Debug, Clone)]
pub struct Tools {
    pub gt: String,
    pub bd: String,
}

pub struct CommandDispatcher {
    runner: Arc<dyn Runner>,
    chat: Arc<dyn Chat>,
    pending: Arc<PendingActions>,
    allowed: BTreeSet<i64>,
    tools: Tools,
}

impl CommandDispatcher {
    pub fn new(
        runner: Arc<dyn Runner>,
        chat: Arc<dyn Chat>,
        pending: Arc<PendingActions>,
        allowed: impl IntoIterator<Item = i64>,
        tools: Tools,
    ) -> Self {
        Self {
            runner,
            chat,
            pending,
            allowed: allowed.into_iter().collect(),
            tools,
        }
    }

    pub fn is_authorized(&self, chat: i64) -> bool {
        self.allowed.contains(&chat)
    }

    fn gt(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.tools.gt.as_str())
            .chain(args.iter().copied())
            .map(ToString::to_string)
            .collect()
    }

    fn bd(&self, args: &[&str]) -> Vec<String> {
        std::iter::once(self.tools.bd.as_str())
            .chain(args.iter().copied())
            .map(ToString::to_string)
            .collect()
    }

    /// Handle an inbound text message or command.
    pub async fn handle_text(&self, chat: i64, text: &str) -> Result<()> {
        if !self.is_authorized(chat) {
            tracing::warn!("Rejected message from unauthorized chat {}", chat);
            self.chat.send(chat, UNAUTHORIZED).await?;
            return Ok(());
        }

        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let Some((cmd, rest)) = parse_command(text) else {
            return self.propose(chat, actions::mayor(&self.tools.gt, text)).await;
        };
        tracing::info!("Command /{} from chat {}", cmd, chat);

        match cmd.as_str() {
            "start" => {
                let text = format!(
                    "🏭 Gas Town Bot ready.\n\nYour chat ID: {}\n\nUse /help to see available commands.",
                    code(&chat.to_string())
                );
                self.chat.send(chat, &text).await?;
            }
            "help" => {
                self.chat.send(chat, HELP_TEXT).await?;
            }
            "status" => {
                let argv = self.gt(&["status", "--json"]);
                self.query(chat, "⏳ Fetching status…", argv, format::status).await?;
            }
            "mail" => {
                let argv = self.gt(&["mail", "inbox", "--json"]);
                self.query(chat, "⏳ Checking mail…", argv, format::inbox).await?;
            }
            "read" => match take_words(rest, 1) {
                Some((words, _)) => {
                    let loading = format!("⏳ Reading {}…", preview(words[0]));
                    let argv = self.gt(&["mail", "read", words[0]]);
                    self.query(chat, &loading, argv, mono).await?;
                }
                None => self.usage(chat, "/read <mail-id>").await?,
            },
            "rigs" => {
                let argv = self.gt(&["rig", "list"]);
                self.query(chat, "⏳ Listing rigs…", argv, mono).await?;
            }
            "polecats" => {
                let argv = self.gt(&["polecat", "list", "--all", "--json"]);
                self.query(chat, "⏳ Listing polecats…", argv, format::polecats).await?;
            }
            "ready" => {
                let argv = self.bd(&["ready", "--json"]);
                self.query(chat, "⏳ Checking ready issues…", argv, format::ready).await?;
            }
            "hook" => {
                let argv = self.gt(&["hook"]);
                self.query(chat, "⏳ Checking hook…", argv, mono).await?;
            }
            "convoys" => {
                let argv = self.gt(&["convoy", "list", "--json"]);
                self.query(chat, "⏳ Loading convoys…", argv, format::convoys).await?;
            }
            "version" => {
                let result = self.runner.run(&self.gt(&["version"])).await;
                let version = format::truncate(&result.text, MESSAGE_LIMIT);
                self.chat.send(chat, &code(&version)).await?;
            }
            "pending" => {
                let n = self.pending.len().await;
                self.chat
                    .send(chat, &format!("⏳ {} action(s) awaiting confirmation.", n))
                    .await?;
            }
            "sling" => match take_words(rest, 2) {
                Some((words, _)) => {
                    self.propose(chat, actions::sling(&self.tools.gt, words[0], words[1]))
                        .await?
                }
                None => self.usage(chat, "/sling <bead-id> <rig>").await?,
            },
            "nudge" => match take_words(rest, 1) {
                Some((words, msg)) if !msg.is_empty() => {
                    self.propose(chat, actions::nudge(&self.tools.gt, words[0], msg))
                        .await?
                }
                _ => self.usage(chat, "/nudge <target> <message>").await?,
            },
            "send" => match take_words(rest, 1) {
                Some((words, msg)) if !msg.is_empty() => {
                    self.propose(chat, actions::send(&self.tools.gt, words[0], msg))
                        .await?
                }
                _ => self.usage(chat, "/send <address> <message>").await?,
            },
            "markread" => match take_words(rest, 1) {
                Some((words, _)) => {
                    self.propose(chat, actions::mark_read(&self.tools.gt, words[0]))
                        .await?
                }
                None => self.usage(chat, "/markread <mail-id>").await?,
            },
            "mayor" => {
                if rest.is_empty() {
                    self.usage(chat, "/mayor <message>\n\nOr just type without a command.")
                        .await?;
                } else {
                    self.propose(chat, actions::mayor(&self.tools.gt, rest)).await?;
                }
            }
            "crew" => match take_words(rest, 1) {
                Some((words, msg)) if !msg.is_empty() => {
                    self.crew(chat, words[0], msg).await?
                }
                _ => self.usage(chat, "/crew <name> <message>").await?,
            },
            _ => {
                self.chat
                    .send(chat, "Unknown command. Use /help, or just type a message for the mayor.")
                    .await?;
            }
        }
        Ok(())
    }

    /// Handle a Confirm / Cancel press on message `message` in `chat`.
    pub async fn handle_callback(
        &self,
        chat: i64,
        message: MessageRef,
        data: &str,
    ) -> Result<CallbackOutcome> {
        if !self.is_authorized(chat) {
            tracing::warn!("Rejected callback from unauthorized chat {}", chat);
            return Ok(CallbackOutcome::Unauthorized);
        }
        let Some((decision, id)) = parse_callback(data) else {
            tracing::debug!("Ignoring callback data {:?}", data);
            return Ok(CallbackOutcome::Ignored);
        };

        let Some(action) = self.pending.pop(id).await else {
            tracing::info!("{:?} for unknown or consumed action {}", decision, id);
            self.chat.edit(chat, message, EXPIRED).await?;
            return Ok(CallbackOutcome::Expired);
        };

        match decision {
            Decision::Cancel => {
                tracing::info!("Cancelled {}", action.id);
                self.chat.edit(chat, message, CANCELLED).await?;
                Ok(CallbackOutcome::Cancelled)
            }
            Decision::Confirm => {
                tracing::info!("Executing {}: {:?}", action.id, action.command);
                let executing = format!("⏳ Executing: {}…", action.description);
                if let Err(e) = self.chat.edit(chat, message, &executing).await {
                    tracing::warn!("Failed to show progress for {}: {}", action.id, e);
                }

                let result = self.runner.run(&action.command).await;
                let verdict = if result.failed { "❌ Failed" } else { "✅ Done" };
                let header = format!("{}: {}\n\n", verdict, action.description);
                let budget = MESSAGE_LIMIT.saturating_sub(utf16_len(&header));
                let text = format!("{}{}", header, mono_within(&result.text, budget));
                self.chat.edit(chat, message, &text).await?;
                Ok(CallbackOutcome::Executed(result))
            }
        }
    }

    /// Send `loading`, run `argv`, and replace the placeholder with `render`ed output.
    async fn query(
        &self,
        chat: i64,
        loading: &str,
        argv: Vec<String>,
        render: fn(&str) -> String,
    ) -> Result<()> {
        let placeholder = self.chat.send(chat, loading).await?;
        let result = self.runner.run(&argv).await;
        self.chat.edit(chat, placeholder, &render(&result.text)).await
    }

    /// Register `deferred` and ask the user to confirm it.
    async fn propose(&self, chat: i64, deferred: Deferred) -> Result<()> {
        let id = action_id(deferred.kind, &deferred.subject);
        self.pending
            .register(PendingAction::new(id.clone(), deferred.command, deferred.description))
            .await;
        self.chat.send_confirm(chat, &deferred.prompt, &id).await?;
        Ok(())
    }

    async fn usage(&self, chat: i64, usage: &str) -> Result<()> {
        self.chat.send(chat, &format!("Usage: {}", usage)).await?;
        Ok(())
    }

    /// Resolve a crew member's rig, then propose mailing them.
    async fn crew(&self, chat: i64, name: &str, message: &str) -> Result<()> {
        let placeholder = self
            .chat
            .send(chat, &format!("🔎 Looking up {}…", code(&preview(name))))
            .await?;
        let status = self.runner.run(&self.gt(&["status", "--json"])).await;

        match format::find_crew(&status.text, name) {
            Some(address) => {
                let found = format!("👷 {} is {}", code(name), code(&address));
                self.chat.edit(chat, placeholder, &found).await?;
                self.propose(chat, actions::crew(&self.tools.gt, &address, message))
                    .await
            }
            None => {
                let missing = format!(
                    "❌ Crew member {} not found in any rig.",
                    code(&preview(name))
                );
                self.chat.edit(chat, placeholder, &missing).await
            }
        }
    }
}
