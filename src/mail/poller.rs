//! Periodic inbox check with unread-set deduplication.

use std::collections::{BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::chat::Chat;
use crate::exec::Runner;
use crate::format;
use crate::parse::extract_json;

use super::state::BotState;
use super::MailItem;

/// Result of one poll cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// Inbox output was not a JSON array; nothing was changed.
    Skipped,
    Checked {
        unread: usize,
        new: Vec<String>,
        delivered: usize,
    },
}

/// Unread items whose ids were not unread at the previous poll, in inbox order.
pub fn new_messages(unread: &[MailItem], seen: &BTreeSet<String>) -> Vec<MailItem> {
    let mut emitted = HashSet::new();
    unread
        .iter()
        .filter(|m| !seen.contains(&m.id) && emitted.insert(m.id.clone()))
        .cloned()
        .collect()
}

pub struct MailPoller {
    runner: Arc<dyn Runner>,
    chat: Arc<dyn Chat>,
    chats: Vec<i64>,
    state_file: PathBuf,
    inbox_cmd: Vec<String>,
    save_state: bool,
}

impl MailPoller {
    pub fn new(
        runner: Arc<dyn Runner>,
        chat: Arc<dyn Chat>,
        chats: impl IntoIterator<Item = i64>,
        state_file: impl Into<PathBuf>,
        gt_bin: &str,
    ) -> Self {
        Self {
            runner,
            chat,
            chats: chats.into_iter().collect(),
            state_file: state_file.into(),
            inbox_cmd: vec![
                gt_bin.to_string(),
                "mail".to_string(),
                "inbox".to_string(),
                "--json".to_string(),
            ],
            save_state: true,
        }
    }

    /// Report what is new without recording it in the state file.
    pub fn dry_run(mut self) -> Self {
        self.save_state = false;
        self
    }

    /// Run one poll cycle.
    pub async fn poll_once(&self) -> PollOutcome {
        let result = self.runner.run(&self.inbox_cmd).await;
        let items = match extract_json(&result.text) {
            Some(Value::Array(items)) => items,
            _ => {
                tracing::debug!("Inbox check skipped: {}", result.text.lines().next().unwrap_or(""));
                return PollOutcome::Skipped;
            }
        };

        let unread: Vec<MailItem> = items
            .iter()
            .filter_map(MailItem::from_value)
            .filter(|m| !m.read && !m.id.is_empty())
            .collect();
        let unread_ids: BTreeSet<String> = unread.iter().map(|m| m.id.clone()).collect();

        let mut state = BotState::load(&self.state_file);
        let fresh = new_messages(&unread, &state.seen_unread_ids);

        let mut delivered = 0;
        if !fresh.is_empty() {
            tracing::info!("{} new message(s) in inbox", fresh.len());
            let text = format::new_mail(&fresh);
            for &chat in &self.chats {
                match self.chat.send(chat, &text).await {
                    Ok(_) => delivered += 1,
                    Err(e) => tracing::warn!("Failed to send notification to {}: {}", chat, e),
                }
            }
        }

        state.seen_unread_ids = unread_ids;
        state.last_check = chrono::Utc::now().timestamp();
        if !self.save_state {
            tracing::debug!("Dry run, state file left as is");
        } else if let Err(e) = state.save(&self.state_file) {
            tracing::warn!("Failed to save state {}: {}", self.state_file.display(), e);
        }

        PollOutcome::Checked {
            unread: state.seen_unread_ids.len(),
            new: fresh.into_iter().map(|m| m.id).collect(),
            delivered,
        }
    }

    /// Poll every `period` until `shutdown` changes or its sender is dropped.
    /// The first cycle runs immediately.
    pub async fn run(self, period: Duration, mut shutdown: watch::Receiver<bool>) {
        if period.is_zero() {
            return;
        }
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.poll_once().await;
                }
                _ = shutdown.changed() => {
                    tracing::info!("Mail poller stopping");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeRunner, RecordingChat};
    use tempfile::TempDir;

    const INBOX: &str = r#"[{"id":"m1","read":false},{"id":"m2","read":true}]"#;

    fn poller(runner: Arc<FakeRunner>, chat: Arc<RecordingChat>, dir: &TempDir) -> MailPoller {
        MailPoller::new(runner, chat, [10, 20], dir.path().join("state.json"), "gt")
    }

    fn item(id: &str) -> MailItem {
        MailItem {
            id: id.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn new_is_set_difference() {
        let unread = vec![item("a"), item("b"), item("c")];
        let seen: BTreeSet<String> = ["b".to_string(), "z".to_string()].into_iter().collect();
        let ids: Vec<String> = new_messages(&unread, &seen).into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "c"]);

        let all: BTreeSet<String> = unread.iter().map(|m| m.id.clone()).collect();
        assert!(new_messages(&unread, &all).is_empty());
    }

    #[tokio::test]
    async fn notifies_only_unread_and_persists_current_set() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::with_output(INBOX));
        let chat = Arc::new(RecordingChat::default());
        let poller = poller(runner.clone(), chat.clone(), &dir);

        let outcome = poller.poll_once().await;
        assert_eq!(
            outcome,
            PollOutcome::Checked {
                unread: 1,
                new: vec!["m1".to_string()],
                delivered: 2,
            }
        );
        assert_eq!(runner.calls(), vec![vec!["gt", "mail", "inbox", "--json"]]);

        let sent = chat.sent();
        assert_eq!(sent.len(), 2);
        assert!(sent[0].1.contains("`m1`"));
        assert!(!sent[0].1.contains("`m2`"));

        let state = BotState::load(&dir.path().join("state.json"));
        assert_eq!(state.seen_unread_ids.into_iter().collect::<Vec<_>>(), vec!["m1"]);
        assert!(state.last_check > 0);
    }

    #[tokio::test]
    async fn null_fields_still_count_as_unread() {
        let dir = TempDir::new().unwrap();
        let inbox = r#"[{"id":"m1","read":false,"subject":null},{"id":"m2","read":null}]"#;
        let chat = Arc::new(RecordingChat::default());
        let poller = poller(Arc::new(FakeRunner::with_output(inbox)), chat.clone(), &dir);

        let outcome = poller.poll_once().await;
        assert_eq!(
            outcome,
            PollOutcome::Checked {
                unread: 2,
                new: vec!["m1".to_string(), "m2".to_string()],
                delivered: 2,
            }
        );
        assert!(chat.sent()[0].1.contains("(no subject)"));

        let state = BotState::load(&dir.path().join("state.json"));
        assert_eq!(
            state.seen_unread_ids.into_iter().collect::<Vec<_>>(),
            vec!["m1", "m2"]
        );
    }

    #[tokio::test]
    async fn dry_run_leaves_state_untouched() {
        let dir = TempDir::new().unwrap();
        let chat = Arc::new(RecordingChat::default());
        let runner = Arc::new(FakeRunner::with_output(INBOX));
        let poller = poller(runner, chat.clone(), &dir).dry_run();

        for _ in 0..2 {
            let outcome = poller.poll_once().await;
            assert!(matches!(outcome, PollOutcome::Checked { ref new, .. } if new == &["m1"]));
        }
        assert_eq!(chat.sent().len(), 4);
        assert!(!dir.path().join("state.json").exists());
    }

    #[tokio::test]
    async fn same_inbox_twice_notifies_once() {
        let dir = TempDir::new().unwrap();
        let chat = Arc::new(RecordingChat::default());
        let poller = poller(Arc::new(FakeRunner::with_output(INBOX)), chat.clone(), &dir);

        poller.poll_once().await;
        let second = poller.poll_once().await;
        assert!(matches!(second, PollOutcome::Checked { ref new, .. } if new.is_empty()));
        assert_eq!(chat.sent().len(), 2);
    }

    #[tokio::test]
    async fn reunread_message_is_new_again() {
        let dir = TempDir::new().unwrap();
        let chat = Arc::new(RecordingChat::default());
        let runner = Arc::new(FakeRunner::with_outputs([
            r#"[{"id":"m1","read":false}]"#,
            r#"[{"id":"m1","read":true}]"#,
            r#"[{"id":"m1","read":false}]"#,
        ]));
        let poller = MailPoller::new(runner, chat.clone(), [10], dir.path().join("s.json"), "gt");

        poller.poll_once().await;
        poller.poll_once().await;
        let third = poller.poll_once().await;
        assert!(matches!(third, PollOutcome::Checked { ref new, .. } if new == &vec!["m1".to_string()]));
        assert_eq!(chat.sent().len(), 2);
    }

    #[tokio::test]
    async fn non_array_output_leaves_state_alone() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        let before = BotState {
            seen_unread_ids: ["m9".to_string()].into_iter().collect(),
            last_check: 42,
        };
        before.save(&path).unwrap();

        let chat = Arc::new(RecordingChat::default());
        let poller = poller(
            Arc::new(FakeRunner::with_output("Error: command timed out")),
            chat.clone(),
            &dir,
        );
        assert_eq!(poller.poll_once().await, PollOutcome::Skipped);
        assert!(chat.sent().is_empty());
        assert_eq!(BotState::load(&path), before);

        let poller = MailPoller::new(
            Arc::new(FakeRunner::with_output(r#"{"error": "no inbox"}"#)),
            chat.clone(),
            [10],
            &path,
            "gt",
        );
        assert_eq!(poller.poll_once().await, PollOutcome::Skipped);
        assert_eq!(BotState::load(&path), before);
    }

    #[tokio::test]
    async fn failed_delivery_does_not_block_others() {
        let dir = TempDir::new().unwrap();
        let chat = Arc::new(RecordingChat::failing_for(10));
        let poller = poller(Arc::new(FakeRunner::with_output(INBOX)), chat.clone(), &dir);

        let outcome = poller.poll_once().await;
        assert!(matches!(outcome, PollOutcome::Checked { delivered: 1, .. }));
        assert_eq!(chat.sent().len(), 1);
        assert_eq!(chat.sent()[0].0, 20);

        let state = BotState::load(&dir.path().join("state.json"));
        assert!(state.seen_unread_ids.contains("m1"));
    }

    #[tokio::test]
    async fn unwritable_state_is_not_fatal() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, "x").unwrap();
        let chat = Arc::new(RecordingChat::default());
        let poller = MailPoller::new(
            Arc::new(FakeRunner::with_output(INBOX)),
            chat.clone(),
            [10],
            blocker.join("state.json"),
            "gt",
        );

        // Without persisted state every cycle treats unread mail as new.
        poller.poll_once().await;
        poller.poll_once().await;
        assert_eq!(chat.sent().len(), 2);
    }

    #[tokio::test]
    async fn run_stops_on_shutdown() {
        let dir = TempDir::new().unwrap();
        let runner = Arc::new(FakeRunner::with_output("[]"));
        let chat = Arc::new(RecordingChat::default());
        let poller = poller(runner.clone(), chat, &dir);
        let (tx, rx) = watch::channel(false);

        let handle = tokio::spawn(poller.run(Duration::from_secs(3600), rx));
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("poller did not stop")
            .unwrap();
        assert_eq!(runner.calls().len(), 1);
    }
}
