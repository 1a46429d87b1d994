//! Configuration for catalog Repositories (§3 `Repository`).
//!
//! Generalizes the teacher's `IndexConfig` (a single index, secure flag
//! plus a dependency list of other indices) into a list of independently
//! enabled/prioritized repositories, each mirrored into its own directory
//! under the Catalog Store.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_derive::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Repository {
    pub name: String,
    pub url: String,
    #[serde(default = "default_branch")]
    pub branch: String,
    #[serde(default)]
    pub local_path: Option<String>,
    #[serde(default)]
    pub priority: i32,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub last_sync: u64,
    #[serde(default)]
    pub last_commit: Option<String>,
}

fn default_branch() -> String {
    "master".to_owned()
}

fn default_true() -> bool {
    true
}

impl Repository {
    /// §4.1 `needs_sync`: true iff `now - last_sync > interval` or
    /// `last_sync == 0`.
    pub fn needs_sync(&self, interval_secs: u64) -> bool {
        if self.last_sync == 0 {
            return true;
        }
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        now.saturating_sub(self.last_sync) > interval_secs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn needs_sync_when_never_synced() {
        let repo = Repository {
            name: "main".into(),
            url: "https://example.com/catalog.git".into(),
            branch: "master".into(),
            local_path: None,
            priority: 0,
            enabled: true,
            last_sync: 0,
            last_commit: None,
        };
        assert!(repo.needs_sync(3600));
    }

    #[test]
    fn does_not_need_sync_when_recent() {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap()
            .as_secs();
        let repo = Repository {
            name: "main".into(),
            url: "https://example.com/catalog.git".into(),
            branch: "master".into(),
            local_path: None,
            priority: 0,
            enabled: true,
            last_sync: now,
            last_commit: None,
        };
        assert!(!repo.needs_sync(3600));
    }
}
