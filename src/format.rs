//! Telegram Markdown rendering for gt/bd output.
//!
//! Every formatter takes the raw command output and falls back to a monospace
//! block when it does not contain the expected JSON.

use serde_json::Value;
use std::fmt::Write;

use crate::mail::MailItem;
use crate::parse::extract_json;

/// Telegram rejects messages over 4096 characters.
pub const MESSAGE_LIMIT: usize = 4000;

const TRUNCATED: &str = "\n\n… (truncated)";
const INBOX_LIMIT: usize = 15;
const READY_LIMIT: usize = 20;
const CONVOY_LIMIT: usize = 15;
const POLECAT_LIMIT: usize = 20;

/// Maximum entries listed in a new-mail notification.
pub const NOTIFY_LIMIT: usize = 10;

/// Hard cap Telegram puts on one message, in UTF-16 code units.
pub const TELEGRAM_LIMIT: usize = 4096;

/// Longest excerpt of user text echoed back in prompts and descriptions.
pub const PREVIEW_LIMIT: usize = 500;

/// Length as Telegram counts it.
pub fn utf16_len(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Longest prefix of `text` that fits in `units` UTF-16 code units.
fn prefix_utf16(text: &str, units: usize) -> &str {
    let mut used = 0;
    for (idx, ch) in text.char_indices() {
        used += ch.len_utf16();
        if used > units {
            return &text[..idx];
        }
    }
    text
}

/// Cut `text` to at most `limit` UTF-16 units, marking the cut.
pub fn truncate(text: &str, limit: usize) -> String {
    if utf16_len(text) <= limit {
        return text.to_string();
    }
    let keep = limit.saturating_sub(utf16_len(TRUNCATED));
    let mut out = prefix_utf16(text, keep).to_string();
    out.push_str(TRUNCATED);
    out
}

/// Single-line excerpt of user text, ending in `…` when cut.
pub fn preview(text: &str) -> String {
    if utf16_len(text) <= PREVIEW_LIMIT {
        return text.to_string();
    }
    format!("{}…", prefix_utf16(text, PREVIEW_LIMIT - 1))
}

/// Wrap text in a Markdown code block.
pub fn mono(text: &str) -> String {
    mono_within(text, MESSAGE_LIMIT)
}

/// Code block whose total length, fences included, stays within `limit`.
pub fn mono_within(text: &str, limit: usize) -> String {
    const FENCES: usize = 8;
    let body = truncate(&text.replace('`', "'"), limit.saturating_sub(FENCES));
    format!("```\n{}\n```", body)
}

/// Inline code span.
pub fn code(text: &str) -> String {
    format!("`{}`", text.replace('`', "'"))
}

pub(crate) fn field(value: &Value, key: &str) -> String {
    match value.get(key) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

fn field_or(value: &Value, key: &str, fallback: &str) -> String {
    let s = field(value, key);
    if s.is_empty() {
        fallback.to_string()
    } else {
        s
    }
}

fn count(value: &Value, key: &str) -> u64 {
    match value.get(key) {
        Some(v) => v
            .as_u64()
            .or_else(|| v.as_f64().map(|f| f.max(0.0) as u64))
            .unwrap_or(0),
        None => 0,
    }
}

pub(crate) fn flag(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn running_icon(value: &Value) -> &'static str {
    if flag(value, "running") {
        "🟢"
    } else {
        "⚫"
    }
}

fn unread_badge(value: &Value) -> String {
    match count(value, "unread_mail") {
        0 => String::new(),
        n => format!(" 📬{}", n),
    }
}

/// `gt status --json`
pub fn status(raw: &str) -> String {
    let data = match extract_json(raw) {
        Some(v @ Value::Object(_)) => v,
        _ => return mono(raw),
    };

    let mut out = format!("🏭 *{}*\n", field_or(&data, "name", "?"));

    if let Some(overseer) = data.get("overseer") {
        let unread = count(overseer, "unread_mail");
        if unread > 0 {
            let _ = writeln!(out, "📬 Overseer unread: {}", unread);
        }
    }

    if let Some(agents) = data.get("agents").and_then(Value::as_array) {
        if !agents.is_empty() {
            out.push_str("\n*Agents:*\n");
            for a in agents.iter().filter(|a| a.is_object()) {
                let _ = writeln!(
                    out,
                    "  {} {} — {}{}",
                    running_icon(a),
                    code(&field(a, "name")),
                    field_or(a, "state", "?"),
                    unread_badge(a)
                );
            }
        }
    }

    if let Some(rigs) = data.get("rigs").and_then(Value::as_array) {
        if !rigs.is_empty() {
            out.push_str("\n*Rigs:*\n");
            for r in rigs.iter().filter(|r| r.is_object()) {
                let _ = writeln!(
                    out,
                    "  🔧 {} — {} polecats, {} crew",
                    code(&field(r, "name")),
                    count(r, "polecat_count"),
                    count(r, "crew_count")
                );
                let crew = r
                    .get("agents")
                    .and_then(Value::as_array)
                    .into_iter()
                    .flatten()
                    .filter(|a| field(a, "role") == "crew");
                for a in crew {
                    let work = if flag(a, "has_work") { " 🔨" } else { "" };
                    let _ = writeln!(
                        out,
                        "    {} 👷 {}{}{}",
                        running_icon(a),
                        code(&field(a, "name")),
                        work,
                        unread_badge(a)
                    );
                }
            }
        }
    }

    truncate(&out, MESSAGE_LIMIT)
}

fn mail_items(items: &[Value]) -> Vec<MailItem> {
    items.iter().filter_map(MailItem::from_value).collect()
}

fn mail_line(item: &MailItem) -> String {
    format!(
        "{} from {}\n    {}",
        code(&item.display_id()),
        code(&item.display_from()),
        item.display_subject()
    )
}

/// `gt mail inbox --json`
pub fn inbox(raw: &str) -> String {
    let items = match extract_json(raw) {
        Some(Value::Array(items)) => mail_items(&items),
        _ => return mono(raw),
    };
    if items.is_empty() {
        return "📭 Inbox empty.".to_string();
    }

    let mut out = format!("📬 *Inbox* ({} messages)\n\n", items.len());
    for item in items.iter().take(INBOX_LIMIT) {
        let icon = if item.read { "  " } else { "🔴" };
        let _ = writeln!(out, "{} {}", icon, mail_line(item));
    }
    if items.len() > INBOX_LIMIT {
        let _ = write!(out, "\n… and {} more", items.len() - INBOX_LIMIT);
    }
    truncate(&out, MESSAGE_LIMIT)
}

/// Push notification for newly unread mail. Lists at most [`NOTIFY_LIMIT`].
pub fn new_mail(items: &[MailItem]) -> String {
    let mut out = format!("📬 *{} new message(s):*\n\n", items.len());
    for item in items.iter().take(NOTIFY_LIMIT) {
        let _ = writeln!(out, "  {}", mail_line(item));
    }
    if items.len() > NOTIFY_LIMIT {
        let _ = write!(out, "\n… and {} more", items.len() - NOTIFY_LIMIT);
    }
    truncate(&out, MESSAGE_LIMIT)
}

/// `bd ready --json`
pub fn ready(raw: &str) -> String {
    let issues = match extract_json(raw) {
        Some(Value::Array(items)) => items,
        _ => return mono(raw),
    };
    if issues.is_empty() {
        return "✅ No issues ready — all clear.".to_string();
    }

    let mut out = format!("📋 *Ready issues* ({})\n\n", issues.len());
    for issue in issues.iter().take(READY_LIMIT) {
        let _ = writeln!(
            out,
            "  {} P{} — {}",
            code(&field_or(issue, "id", "?")),
            field_or(issue, "priority", "?"),
            field_or(issue, "title", "(untitled)")
        );
    }
    if issues.len() > READY_LIMIT {
        let _ = write!(out, "\n… and {} more", issues.len() - READY_LIMIT);
    }
    truncate(&out, MESSAGE_LIMIT)
}

/// `gt convoy list --json`
pub fn convoys(raw: &str) -> String {
    let convoys = match extract_json(raw) {
        Some(Value::Array(items)) => items,
        _ => return mono(raw),
    };
    if convoys.is_empty() {
        return "🚚 No active convoys.".to_string();
    }

    let mut out = format!("🚚 *Convoys* ({})\n\n", convoys.len());
    for c in convoys.iter().take(CONVOY_LIMIT) {
        let _ = writeln!(
            out,
            "  {} [{}] {}",
            code(&field_or(c, "id", "?")),
            field_or(c, "status", "?"),
            field_or(c, "title", "(untitled)")
        );
    }
    truncate(&out, MESSAGE_LIMIT)
}

/// `gt polecat list --all --json`. gt prints `null` when none exist.
pub fn polecats(raw: &str) -> String {
    let polecats = match extract_json(raw) {
        Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items,
        _ => return mono(raw),
    };
    if polecats.is_empty() {
        return "🐾 No active polecats.".to_string();
    }

    let mut out = format!("🐾 *Polecats* ({})\n\n", polecats.len());
    for p in polecats.iter().take(POLECAT_LIMIT) {
        let bead = field(p, "bead");
        let bead = if bead.is_empty() {
            String::new()
        } else {
            format!(" → {}", code(&bead))
        };
        let _ = writeln!(
            out,
            "  {} [{}]{}",
            code(&format!("{}/{}", field_or(p, "rig", "?"), field_or(p, "name", "?"))),
            field_or(p, "status", "?"),
            bead
        );
    }
    truncate(&out, MESSAGE_LIMIT)
}

/// Find the `<rig>/<name>` address of a crew member in `gt status --json`.
pub fn find_crew(raw: &str, name: &str) -> Option<String> {
    let data = extract_json(raw)?;
    data.get("rigs")?
        .as_array()?
        .iter()
        .find(|rig| {
            rig.get("crews")
                .and_then(Value::as_array)
                .is_some_and(|crews| crews.iter().any(|c| c.as_str() == Some(name)))
        })
        .map(|rig| format!("{}/{}", field(rig, "name"), name))
}
