//! Persisted poller state.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::io::Write;
use std::path::Path;

use crate::error::Result;

/// What the poller remembers between cycles.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotState {
    /// Every unread id seen by the last successful poll.
    #[serde(default)]
    pub seen_unread_ids: BTreeSet<String>,

    /// Unix seconds of the last successful poll.
    #[serde(default)]
    pub last_check: i64,
}

impl BotState {
    /// Read state from `path`. Missing or unreadable files give empty state.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => {
                if e.kind() != std::io::ErrorKind::NotFound {
                    tracing::debug!("Could not read state {}: {}", path.display(), e);
                }
                return Self::default();
            }
        };

        serde_json::from_str(&content).unwrap_or_else(|e| {
            tracing::warn!("Ignoring corrupt state file {}: {}", path.display(), e);
            Self::default()
        })
    }

    /// Write state to `path` via a temp file in the same directory and rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir)?;

        let mut temp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer(&mut temp, self)?;
        temp.flush()?;
        temp.as_file().sync_all()?;
        temp.persist(path).map_err(|e| e.error)?;

        tracing::debug!(
            "Saved poller state ({} unread) to {}",
            self.seen_unread_ids.len(),
            path.display()
        );
        Ok(())
    }
}
