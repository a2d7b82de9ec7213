//! Telegram bot integration.

pub mod client;
pub mod commands;
pub mod handler;

pub use client::run_telegram_daemon;
pub use handler::TelegramChat;
