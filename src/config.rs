//! Configuration loading for townbot.
//!
//! Every setting comes from a command-line flag or its environment variable.
//! A `.env` file in the working directory is loaded before parsing.

use clap::Args;
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Error;
pub type Result<T> = std::result::Result<T, Error>;

/// Name of the poller state file placed in the home directory by default.
pub const STATE_FILE_NAME: &str = ".gt-bot-state.json";

/// Load `.env` from the current directory. A missing file is `Ok(None)`.
///
/// Runs before logging is set up, so the caller reports the outcome.
pub fn load_dotenv() -> std::result::Result<Option<PathBuf>, dotenvy::Error> {
    match dotenvy::dotenv() {
        Ok(path) => Ok(Some(path)),
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

/// Raw configuration flags shared by all subcommands.
#[derive(Args, Debug, Clone)]
pub struct ConfigArgs {
    /// Telegram bot token
    #[arg(long, global = true, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Comma-separated chat ids allowed to use the bot
    #[arg(long, global = true, env = "TELEGRAM_CHAT_ID", default_value = "")]
    pub chat_ids: String,

    /// Working directory for gt/bd invocations
    #[arg(long, global = true, env = "GT_TOWN_ROOT", default_value = "/home/gastown/antik")]
    pub town_root: PathBuf,

    /// gt executable
    #[arg(long, global = true, env = "GT_BIN", default_value = "gt")]
    pub gt_bin: String,

    /// bd executable
    #[arg(long, global = true, env = "BD_BIN", default_value = "bd")]
    pub bd_bin: String,

    /// Seconds between mail checks (0 disables polling)
    #[arg(long, global = true, env = "POLL_INTERVAL", default_value_t = 120)]
    pub poll_interval: u64,

    /// Poller state file [default: ~/.gt-bot-state.json]
    #[arg(long, global = true, env = "STATE_FILE")]
    pub state_file: Option<PathBuf>,

    /// Seconds before a gt/bd invocation is killed
    #[arg(long, global = true, env = "COMMAND_TIMEOUT", default_value_t = 30)]
    pub command_timeout: u64,

    /// Seconds a confirmation stays valid (0 = until restart)
    #[arg(long, global = true, env = "PENDING_TTL", default_value_t = 600)]
    pub pending_ttl: u64,
}

/// Validated runtime settings.
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: Option<String>,
    pub allowed_chats: BTreeSet<i64>,
    pub town_root: PathBuf,
    pub gt_bin: String,
    pub bd_bin: String,
    pub poll_interval: Duration,
    pub state_file: PathBuf,
    pub command_timeout: Duration,
    pub pending_ttl: Option<Duration>,
}

impl Settings {
    /// Build settings from parsed flags.
    pub fn from_args(args: &ConfigArgs) -> Result<Self> {
        let allowed_chats = parse_chat_ids(&args.chat_ids)?;

        if args.command_timeout == 0 {
            return Err(Error::Config(
                "COMMAND_TIMEOUT must be at least 1 second".to_string(),
            ));
        }

        let state_file = match &args.state_file {
            Some(path) => path.clone(),
            None => default_state_file()?,
        };

        let bot_token = args
            .token
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .map(ToString::to_string);

        Ok(Self {
            bot_token,
            allowed_chats,
            town_root: args.town_root.clone(),
            gt_bin: args.gt_bin.clone(),
            bd_bin: args.bd_bin.clone(),
            poll_interval: Duration::from_secs(args.poll_interval),
            state_file,
            command_timeout: Duration::from_secs(args.command_timeout),
            pending_ttl: (args.pending_ttl > 0).then(|| Duration::from_secs(args.pending_ttl)),
        })
    }

    /// The bot token, or a fatal configuration error.
    pub fn require_token(&self) -> Result<&str> {
        self.bot_token
            .as_deref()
            .ok_or_else(|| Error::Config("TELEGRAM_BOT_TOKEN not set".to_string()))
    }

    /// Fails unless at least one chat is allowed.
    pub fn require_chats(&self) -> Result<()> {
        if self.allowed_chats.is_empty() {
            return Err(Error::Config("TELEGRAM_CHAT_ID not set".to_string()));
        }
        Ok(())
    }

    pub fn poll_enabled(&self) -> bool {
        !self.poll_interval.is_zero()
    }
}

/// Parse a comma-separated chat id list. Blank entries are skipped.
pub fn parse_chat_ids(raw: &str) -> Result<BTreeSet<i64>> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| Error::Config(format!("Invalid chat id '{}' in TELEGRAM_CHAT_ID", s)))
        })
        .collect()
}

/// `~/.gt-bot-state.json`
pub fn default_state_file() -> Result<PathBuf> {
    let home = directories::UserDirs::new()
        .ok_or_else(|| Error::Config("Could not determine home directory".to_string()))?;

    Ok(home.home_dir().join(STATE_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        config: ConfigArgs,
    }

    #[test]
    fn chat_ids_skip_blanks() {
        let ids = parse_chat_ids(" 12, ,-100345 ,").unwrap();
        assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![-100345, 12]);
        assert!(parse_chat_ids("").unwrap().is_empty());
    }

    #[test]
    fn malformed_chat_id_is_config_error() {
        let err = parse_chat_ids("12,abc").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn zero_values_disable_polling_and_expiry() {
        let cli = TestCli::parse_from([
            "townbot",
            "--token",
            "t",
            "--chat-ids",
            "1",
            "--poll-interval",
            "0",
            "--pending-ttl",
            "0",
            "--state-file",
            "/tmp/state.json",
        ]);
        let settings = Settings::from_args(&cli.config).unwrap();
        assert!(!settings.poll_enabled());
        assert_eq!(settings.pending_ttl, None);
        assert_eq!(settings.state_file, PathBuf::from("/tmp/state.json"));
        assert!(settings.require_chats().is_ok());
    }

    #[test]
    fn blank_token_is_missing() {
        let cli = TestCli::parse_from([
            "townbot",
            "--token",
            "  ",
            "--chat-ids",
            "",
            "--state-file",
            "/tmp/state.json",
        ]);
        let settings = Settings::from_args(&cli.config).unwrap();
        assert!(settings.require_token().is_err());
        assert!(settings.require_chats().is_err());
    }
}
