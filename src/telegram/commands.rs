//! Telegram command menu.

use teloxide::types::BotCommand;

/// Commands shown in the Telegram client's menu.
pub fn menu() -> Vec<BotCommand> {
    [
        ("help", "Show commands"),
        ("status", "Town overview"),
        ("mail", "Show inbox"),
        ("read", "Read a message"),
        ("rigs", "List rigs"),
        ("polecats", "List polecats"),
        ("ready", "Issues ready to work"),
        ("hook", "Check what's hooked"),
        ("convoys", "Convoy dashboard"),
        ("version", "Gas Town version"),
        ("pending", "Actions awaiting confirmation"),
        ("sling", "Spawn polecat (confirm)"),
        ("nudge", "Nudge agent (confirm)"),
        ("send", "Send mail (confirm)"),
        ("markread", "Mark mail read (confirm)"),
        ("mayor", "Mail the mayor (confirm)"),
        ("crew", "Mail a crew member (confirm)"),
    ]
    .into_iter()
    .map(|(command, description)| BotCommand::new(command, description))
    .collect()
}
