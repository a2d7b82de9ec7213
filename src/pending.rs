//! Pending actions awaiting Confirm / Cancel.
//!
//! A mutating command is registered here instead of being run. The only way to
//! read an entry back is [`PendingActions::pop`], which removes it in the same
//! critical section, so one registration can drive at most one execution.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;

/// Telegram's limit on inline button callback data.
pub const CALLBACK_DATA_LIMIT: usize = 64;

/// Longest callback prefix, `confirm:`.
const CALLBACK_PREFIX_LEN: usize = "confirm:".len();

/// A deferred command and how to describe it to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub id: String,
    pub command: Vec<String>,
    pub description: String,
    created_at: Instant,
}

impl PendingAction {
    pub fn new(id: impl Into<String>, command: Vec<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            command,
            description: description.into(),
            created_at: Instant::now(),
        }
    }

    fn is_expired(&self, ttl: Option<Duration>, now: Instant) -> bool {
        ttl.is_some_and(|ttl| now.duration_since(self.created_at) >= ttl)
    }
}

/// Build an action id `<kind>-<subject>-<unix millis>`.
///
/// The subject is shortened so `confirm:<id>` fits in callback data.
pub fn action_id(kind: &str, subject: &str) -> String {
    let millis = chrono::Utc::now().timestamp_millis().to_string();
    let fixed = CALLBACK_PREFIX_LEN + kind.len() + millis.len() + 2;
    let budget = CALLBACK_DATA_LIMIT.saturating_sub(fixed);

    let mut subject_part = String::new();
    for ch in subject.chars().filter(|c| !c.is_whitespace() && *c != ':') {
        if subject_part.len() + ch.len_utf8() > budget {
            break;
        }
        subject_part.push(ch);
    }

    format!("{}-{}-{}", kind, subject_part, millis)
}

/// In-memory registry of pending actions.
#[derive(Debug, Default)]
pub struct PendingActions {
    actions: Mutex<HashMap<String, PendingAction>>,
    ttl: Option<Duration>,
}

impl PendingActions {
    /// A store whose entries expire after `ttl`; `None` keeps them until popped.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            actions: Mutex::new(HashMap::new()),
            ttl,
        }
    }

    /// Insert `action` under its id. Returns the entry it replaced, if any.
    pub async fn register(&self, action: PendingAction) -> Option<PendingAction> {
        let mut actions = self.actions.lock().await;
        let now = Instant::now();
        let ttl = self.ttl;
        actions.retain(|_, a| !a.is_expired(ttl, now));

        tracing::debug!("Registered pending action {}: {:?}", action.id, action.command);
        let replaced = actions.insert(action.id.clone(), action);
        if let Some(old) = &replaced {
            tracing::warn!("Pending action {} overwritten", old.id);
        }
        replaced
    }

    /// Remove and return the action for `id`. Expired entries are dropped and
    /// reported as absent.
    pub async fn pop(&self, id: &str) -> Option<PendingAction> {
        let action = self.actions.lock().await.remove(id)?;
        if action.is_expired(self.ttl, Instant::now()) {
            tracing::info!("Pending action {} expired", id);
            return None;
        }
        Some(action)
    }

    /// Number of live entries.
    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.actions
            .lock()
            .await
            .values()
            .filter(|a| !a.is_expired(self.ttl, now))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn sling() -> PendingAction {
        PendingAction::new(
            "sling-bead7-1000",
            vec!["gt".into(), "sling".into(), "bead7".into(), "rigA".into()],
            "sling bead7 → rigA",
        )
    }

    #[tokio::test]
    async fn pop_consumes_entry() {
        let store = PendingActions::new(None);
        assert!(store.register(sling()).await.is_none());
        assert_eq!(store.len().await, 1);

        let popped = store.pop("sling-bead7-1000").await.unwrap();
        assert_eq!(popped.description, "sling bead7 → rigA");
        assert!(store.pop("sling-bead7-1000").await.is_none());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn collision_overwrites() {
        let store = PendingActions::new(None);
        store.register(sling()).await;
        let mut second = sling();
        second.description = "again".to_string();
        let replaced = store.register(second).await.unwrap();
        assert_eq!(replaced.description, "sling bead7 → rigA");
        assert_eq!(store.pop("sling-bead7-1000").await.unwrap().description, "again");
    }

    #[tokio::test]
    async fn concurrent_pops_yield_exactly_one_winner() {
        for _ in 0..20 {
            let store = Arc::new(PendingActions::new(None));
            store.register(sling()).await;

            let handles: Vec<_> = (0..16)
                .map(|_| {
                    let store = store.clone();
                    tokio::spawn(async move { store.pop("sling-bead7-1000").await })
                })
                .collect();

            let mut winners = 0;
            for handle in handles {
                if handle.await.unwrap().is_some() {
                    winners += 1;
                }
            }
            assert_eq!(winners, 1);
        }
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let store = PendingActions::new(Some(Duration::from_millis(20)));
        store.register(sling()).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert_eq!(store.len().await, 0);
        assert!(store.pop("sling-bead7-1000").await.is_none());
    }

    #[tokio::test]
    async fn register_purges_expired_entries() {
        let store = PendingActions::new(Some(Duration::from_millis(20)));
        store.register(sling()).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        store.register(PendingAction::new("nudge-x-1", vec![], "nudge")).await;
        assert_eq!(store.actions.lock().await.len(), 1);
    }

    #[test]
    fn action_ids_fit_callback_data() {
        let id = action_id("nudge", &"witness/".repeat(20));
        assert!(id.starts_with("nudge-witness/"));
        assert!(format!("confirm:{}", id).len() <= CALLBACK_DATA_LIMIT);

        let id = action_id("sling", "bead7");
        let parts: Vec<&str> = id.splitn(3, '-').collect();
        assert_eq!(parts[..2], ["sling", "bead7"]);
        assert!(parts[2].parse::<i64>().is_ok());
    }

    #[test]
    fn action_id_strips_separators() {
        let id = action_id("send", "a b:c");
        assert!(id.starts_with("send-abc-"));
    }
}
