//! CLI commands for townbot using clap.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use crate::chat::{Chat, ConsoleChat};
use crate::config::{ConfigArgs, Settings};
use crate::exec::{Executor, Runner};
use crate::mail::{BotState, MailPoller, PollOutcome};
use crate::telegram::{run_telegram_daemon, TelegramChat};

/// townbot - Telegram remote control for Gas Town.
#[derive(Parser)]
#[command(name = "townbot")]
#[command(version)]
#[command(about = "Telegram remote control for the gt/bd town CLIs", long_about = None)]
pub struct Commands {
    #[command(flatten)]
    pub config: ConfigArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand)]
pub enum Command {
    /// Run the bot and the mail poller (default)
    Run,

    /// Run one mail poll cycle
    ///
    /// Without --notify this is a dry run: new mail is printed to stdout and
    /// the state file is not touched, so the daemon still sends its own
    /// notifications.
    Poll {
        /// Send notifications to the allowed Telegram chats and record them in the state file
        #[arg(long)]
        notify: bool,
    },

    /// Show the persisted poller state
    State,
}

impl Commands {
    /// Run the command.
    pub async fn run(&self) -> Result<()> {
        let settings = Settings::from_args(&self.config)?;

        match self.command.as_ref().unwrap_or(&Command::Run) {
            Command::Run => cmd_run(settings).await,
            Command::Poll { notify } => cmd_poll(settings, *notify).await,
            Command::State => cmd_state(&settings),
        }
    }
}

async fn cmd_run(settings: Settings) -> Result<()> {
    run_telegram_daemon(settings).await?;
    Ok(())
}

async fn cmd_poll(settings: Settings, notify: bool) -> Result<()> {
    let runner: Arc<dyn Runner> = Arc::new(Executor::new(
        settings.town_root.clone(),
        settings.command_timeout,
    ));

    let chat: Arc<dyn Chat> = if notify {
        let token = settings.require_token()?;
        settings.require_chats()?;
        Arc::new(TelegramChat::new(teloxide::Bot::new(token)))
    } else {
        Arc::new(ConsoleChat::new())
    };
    let mut chats: Vec<i64> = settings.allowed_chats.iter().copied().collect();
    if chats.is_empty() {
        chats.push(0);
    }

    let mut poller =
        MailPoller::new(runner, chat, chats, settings.state_file.clone(), &settings.gt_bin);
    if !notify {
        poller = poller.dry_run();
    }
    match poller.poll_once().await {
        PollOutcome::Skipped => {
            println!("Inbox output was not a JSON list; state left unchanged.");
        }
        PollOutcome::Checked {
            unread,
            new,
            delivered,
        } => {
            println!(
                "{} unread, {} new, {} notification(s) delivered.",
                unread,
                new.len(),
                delivered
            );
        }
    }
    Ok(())
}

fn cmd_state(settings: &Settings) -> Result<()> {
    let state = BotState::load(&settings.state_file);

    println!("State file: {}", settings.state_file.display());
    let last_check = chrono::DateTime::from_timestamp(state.last_check, 0)
        .filter(|_| state.last_check > 0)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| "never".to_string());
    println!("Last check: {}", last_check);
    println!("Seen unread: {}", state.seen_unread_ids.len());
    for id in &state.seen_unread_ids {
        println!("  {}", id);
    }
    Ok(())
}
