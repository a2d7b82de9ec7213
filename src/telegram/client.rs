//! Telegram bot daemon: update dispatch plus the background mail poller.

use std::sync::Arc;

use std::future::Future;

use teloxide::dispatching::{ShutdownToken, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::RequestError;
use tokio::sync::watch;

use crate::chat::{Chat, MessageRef};
use crate::config::Settings;
use crate::dispatch::{CommandDispatcher, Tools, UNAUTHORIZED};
use crate::error::Result;
use crate::exec::{Executor, Runner};
use crate::mail::MailPoller;
use crate::pending::PendingActions;

use super::commands;
use super::handler::TelegramChat;

/// Run the bot until Ctrl-C or SIGTERM.
pub async fn run_telegram_daemon(settings: Settings) -> Result<()> {
    let token = settings.require_token()?.to_string();
    settings.require_chats()?;

    tracing::info!("Starting Telegram bot...");
    let bot = Bot::new(token);

    let me = bot.get_me().await?;
    tracing::info!(
        "Authorized as @{} (allowed chats: {:?})",
        me.username(),
        settings.allowed_chats
    );

    if let Err(e) = bot.delete_webhook().drop_pending_updates(true).await {
        tracing::warn!("Failed to drop pending updates: {}", e);
    }
    if let Err(e) = bot.set_my_commands(commands::menu()).await {
        tracing::warn!("Failed to set commands: {}", e);
    }

    let runner: Arc<dyn Runner> = Arc::new(Executor::new(
        settings.town_root.clone(),
        settings.command_timeout,
    ));
    let chat: Arc<dyn Chat> = Arc::new(TelegramChat::new(bot.clone()));
    let pending = Arc::new(PendingActions::new(settings.pending_ttl));
    let dispatcher = Arc::new(CommandDispatcher::new(
        runner.clone(),
        chat.clone(),
        pending,
        settings.allowed_chats.iter().copied(),
        Tools {
            gt: settings.gt_bin.clone(),
            bd: settings.bd_bin.clone(),
        },
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let poller_task = if settings.poll_enabled() {
        let poller = MailPoller::new(
            runner,
            chat,
            settings.allowed_chats.iter().copied(),
            settings.state_file.clone(),
            &settings.gt_bin,
        );
        tracing::info!(
            "Mail polling enabled every {}s (state: {})",
            settings.poll_interval.as_secs(),
            settings.state_file.display()
        );
        Some(tokio::spawn(poller.run(settings.poll_interval, shutdown_rx)))
    } else {
        tracing::info!("Mail polling disabled");
        None
    };

    let mut updates = Dispatcher::builder(bot, schema())
        .dependencies(dptree::deps![dispatcher])
        .default_handler(|_| async {})
        .enable_ctrlc_handler()
        .build();
    spawn_sigterm_listener(updates.shutdown_token());
    updates.dispatch().await;

    tracing::info!("Shutting down…");
    let _ = shutdown_tx.send(true);
    if let Some(task) = poller_task {
        if let Err(e) = task.await {
            tracing::warn!("Mail poller ended abnormally: {}", e);
        }
    }
    Ok(())
}

fn schema() -> UpdateHandler<RequestError> {
    dptree::entry()
        .branch(Update::filter_message().endpoint(on_message))
        .branch(Update::filter_callback_query().endpoint(on_callback))
}

#[cfg(unix)]
fn spawn_sigterm_listener(token: ShutdownToken) {
    use tokio::signal::unix::{signal, SignalKind};

    let mut term = match signal(SignalKind::terminate()) {
        Ok(term) => term,
        Err(e) => {
            tracing::warn!("Failed to install SIGTERM handler: {}", e);
            return;
        }
    };
    tokio::spawn(stop_dispatcher_on(
        async move {
            term.recv().await;
        },
        token,
    ));
}

#[cfg(not(unix))]
fn spawn_sigterm_listener(_token: ShutdownToken) {}

/// Wait for `signal`, then ask the dispatcher to stop. Returns false if it
/// was not running.
async fn stop_dispatcher_on(signal: impl Future<Output = ()>, token: ShutdownToken) -> bool {
    signal.await;
    tracing::info!("Termination requested, stopping dispatcher");
    match token.shutdown() {
        Ok(_) => true,
        Err(e) => {
            tracing::warn!("Dispatcher was not running: {:?}", e);
            false
        }
    }
}

async fn on_message(msg: Message, app: Arc<CommandDispatcher>) -> std::result::Result<(), RequestError> {
    let Some(text) = msg.text() else {
        return Ok(());
    };
    if let Err(e) = app.handle_text(msg.chat.id.0, text).await {
        tracing::error!("Failed to handle message in chat {}: {}", msg.chat.id, e);
    }
    Ok(())
}

async fn on_callback(
    bot: Bot,
    q: CallbackQuery,
    app: Arc<CommandDispatcher>,
) -> std::result::Result<(), RequestError> {
    let Some(message) = q.message.as_ref() else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };
    let chat = message.chat().id.0;
    let message_ref = MessageRef(message.id().0);

    if !app.is_authorized(chat) {
        tracing::warn!("Rejected callback from unauthorized chat {}", chat);
        bot.answer_callback_query(q.id.clone()).text(UNAUTHORIZED).await?;
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).await?;

    let data = q.data.as_deref().unwrap_or("");
    match app.handle_callback(chat, message_ref, data).await {
        Ok(outcome) => tracing::debug!("Callback {:?} -> {:?}", data, outcome),
        Err(e) => tracing::error!("Failed to handle callback in chat {}: {}", chat, e),
    }
    Ok(())
}
