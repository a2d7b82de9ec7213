//! Mutating gt commands that need confirmation before they run.

use crate::format::{code, preview};

/// A command built from chat arguments but not yet registered or run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deferred {
    pub kind: &'static str,
    pub subject: String,
    pub command: Vec<String>,
    pub description: String,
    pub prompt: String,
}

/// User-supplied word as shown back in chat.
fn shown(word: &str) -> String {
    code(&preview(word))
}

fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// `gt sling <bead> <rig>`: spawn a polecat on a bead.
pub fn sling(gt: &str, bead: &str, rig: &str) -> Deferred {
    Deferred {
        kind: "sling",
        subject: bead.to_string(),
        command: argv(&[gt, "sling", bead, rig]),
        description: format!("Sling {} to {}", shown(bead), shown(rig)),
        prompt: format!("⚠️ Confirm: sling {} → {}?", shown(bead), shown(rig)),
    }
}

/// `gt nudge <target> <message>`
pub fn nudge(gt: &str, target: &str, message: &str) -> Deferred {
    Deferred {
        kind: "nudge",
        subject: target.to_string(),
        command: argv(&[gt, "nudge", target, message]),
        description: format!("Nudge {}: {}", shown(target), preview(message)),
        prompt: format!(
            "⚠️ Confirm: nudge {} with message?\n\n_{}_",
            shown(target),
            preview(message)
        ),
    }
}

/// `gt mail send <address> -s "Via Telegram" -m <message>`
pub fn send(gt: &str, address: &str, message: &str) -> Deferred {
    Deferred {
        kind: "send",
        subject: address.to_string(),
        command: argv(&[gt, "mail", "send", address, "-s", "Via Telegram", "-m", message]),
        description: format!("Send mail to {}", shown(address)),
        prompt: format!("⚠️ Confirm: send mail to {}?\n\n_{}_", shown(address), preview(message)),
    }
}

/// `gt mail mark-read <id>`
pub fn mark_read(gt: &str, mail_id: &str) -> Deferred {
    Deferred {
        kind: "markread",
        subject: mail_id.to_string(),
        command: argv(&[gt, "mail", "mark-read", mail_id]),
        description: format!("Mark {} as read", shown(mail_id)),
        prompt: format!("⚠️ Confirm: mark {} as read?", shown(mail_id)),
    }
}

/// Mail the mayor. Plain chat text ends up here.
pub fn mayor(gt: &str, message: &str) -> Deferred {
    Deferred {
        kind: "mayor",
        subject: "mayor".to_string(),
        command: argv(&[gt, "mail", "send", "mayor/", "-s", "📱 Telegram", "-m", message]),
        description: "Send to mayor".to_string(),
        prompt: format!("⚠️ Confirm: send to mayor?\n\n_{}_", preview(message)),
    }
}

/// Mail a task to a crew member at `<rig>/<name>`.
pub fn crew(gt: &str, address: &str, message: &str) -> Deferred {
    Deferred {
        kind: "crew",
        subject: address.to_string(),
        command: argv(&[
            gt, "mail", "send", address, "-s", "📱 Telegram", "-m", message, "--type", "task",
        ]),
        description: format!("Send task to {}", shown(address)),
        prompt: format!(
            "⚠️ Confirm: send task to {}?\n\n_{}_",
            shown(address),
            preview(message)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_stays_one_argument() {
        let action = nudge("gt", "abp/witness", "check the  merge queue");
        assert_eq!(action.command, vec!["gt", "nudge", "abp/witness", "check the  merge queue"]);
    }

    #[test]
    fn send_uses_fixed_subject() {
        let action = send("/usr/bin/gt", "mayor/", "hello");
        assert_eq!(
            action.command,
            vec!["/usr/bin/gt", "mail", "send", "mayor/", "-s", "Via Telegram", "-m", "hello"]
        );
        assert_eq!(action.description, "Send mail to `mayor/`");
    }

    #[test]
    fn long_messages_are_cut_in_prompts_only() {
        let message = "y".repeat(3000);
        let action = nudge("gt", "abp/witness", &message);
        assert_eq!(action.command[3], message);
        assert!(action.description.chars().count() < 600);
        assert!(action.prompt.chars().count() < 600);
        assert!(action.prompt.contains('…'));
    }

    #[test]
    fn crew_mail_is_a_task() {
        let action = crew("gt", "abp/bender", "merge open PRs");
        assert_eq!(action.command.last().map(String::as_str), Some("task"));
        assert_eq!(action.kind, "crew");
    }
}
