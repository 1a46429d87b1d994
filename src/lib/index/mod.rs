//! The Catalog Store (§4.1): a local mirror of one or more configured
//! Repositories, searched in descending priority order to locate a single
//! package's catalog entry.

pub mod config;
pub mod sync;

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use slog::Logger;

pub use self::config::Repository;
use util::errors::{ErrorKind, Res};

#[derive(Debug)]
pub struct Catalog {
    root: PathBuf,
    repositories: Vec<Repository>,
    log: Logger,
}

impl Catalog {
    pub fn new(root: PathBuf, repositories: Vec<Repository>, log: Logger) -> Self {
        Catalog {
            root,
            repositories,
            log,
        }
    }

    pub fn repositories(&self) -> &[Repository] {
        &self.repositories
    }

    /// §4.1 `sync()`. A single repository's failure does not abort the
    /// others, but the aggregate result is an error unless all succeeded.
    pub fn sync(&mut self) -> Res<()> {
        let mut failures = Vec::new();

        for repo in self.repositories.iter_mut().filter(|r| r.enabled) {
            match sync::sync_one(repo, &self.root, &self.log) {
                Ok(result) => {
                    repo.local_path = Some(result.local_path.display().to_string());
                    repo.last_commit = Some(result.commit);
                    repo.last_sync = now();
                }
                Err(e) => {
                    error!(self.log, "sync failed"; "repository" => &repo.name, "error" => format!("{}", e));
                    failures.push(format!("{}: {}", repo.name, e));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ErrorKind::Network(format!(
                "sync failed for {} of {} repositories: {}",
                failures.len(),
                self.repositories.iter().filter(|r| r.enabled).count(),
                failures.join("; ")
            ))
            .into())
        }
    }

    /// §4.1 `needs_sync(repo)`.
    pub fn needs_sync(&self, repo_name: &str, interval_secs: u64) -> bool {
        self.repositories
            .iter()
            .find(|r| r.name == repo_name)
            .map(|r| r.needs_sync(interval_secs))
            .unwrap_or(true)
    }

    /// §4.1 `locate(package_name)`: searches enabled repositories in
    /// descending priority order, returning the first filesystem path that
    /// contains a catalog entry for `package_name`.
    pub fn locate(&self, package_name: &str) -> Option<PathBuf> {
        let mut enabled: Vec<&Repository> = self.repositories.iter().filter(|r| r.enabled).collect();
        enabled.sort_by(|a, b| b.priority.cmp(&a.priority));

        for repo in enabled {
            if let Some(local_path) = &repo.local_path {
                let entry = Path::new(local_path).join(format!("{}.toml", package_name));
                if entry.is_file() {
                    return Some(entry);
                }
            }
        }
        None
    }

    /// Supplemented feature (§10 `search`): substring match on name across
    /// all enabled repositories' catalog entries, deduplicated by the
    /// highest-priority hit.
    pub fn search(&self, pattern: &str) -> Vec<String> {
        let mut names = Vec::new();
        let mut enabled: Vec<&Repository> = self.repositories.iter().filter(|r| r.enabled).collect();
        enabled.sort_by(|a, b| b.priority.cmp(&a.priority));

        for repo in enabled {
            let local_path = match &repo.local_path {
                Some(p) => p,
                None => continue,
            };
            let entries = match ::std::fs::read_dir(local_path) {
                Ok(e) => e,
                Err(_) => continue,
            };
            for entry in entries.filter_map(|e| e.ok()) {
                let file_name = entry.file_name();
                let file_name = file_name.to_string_lossy();
                if let Some(name) = file_name.strip_suffix(".toml") {
                    if name.contains(pattern) && !names.contains(&name.to_owned()) {
                        names.push(name.to_owned());
                    }
                }
            }
        }
        names
    }
}

fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn test_log() -> Logger {
        Logger::root(slog::Discard, o!())
    }

    #[test]
    fn locate_prefers_higher_priority_repo() {
        let dir = ::tempfile::tempdir().unwrap();
        let low = dir.path().join("low");
        let high = dir.path().join("high");
        fs::create_dir_all(&low).unwrap();
        fs::create_dir_all(&high).unwrap();
        fs::write(low.join("vim.toml"), "low").unwrap();
        fs::write(high.join("vim.toml"), "high").unwrap();

        let repos = vec![
            Repository {
                name: "low".into(),
                url: "".into(),
                branch: "master".into(),
                local_path: Some(low.display().to_string()),
                priority: 1,
                enabled: true,
                last_sync: 0,
                last_commit: None,
            },
            Repository {
                name: "high".into(),
                url: "".into(),
                branch: "master".into(),
                local_path: Some(high.display().to_string()),
                priority: 10,
                enabled: true,
                last_sync: 0,
                last_commit: None,
            },
        ];

        let catalog = Catalog::new(dir.path().to_path_buf(), repos, test_log());
        let found = catalog.locate("vim").unwrap();
        assert_eq!(fs::read_to_string(found).unwrap(), "high");
    }

    #[test]
    fn locate_returns_none_when_absent() {
        let dir = ::tempfile::tempdir().unwrap();
        let catalog = Catalog::new(dir.path().to_path_buf(), vec![], test_log());
        assert!(catalog.locate("nonexistent").is_none());
    }

    #[test]
    fn disabled_repository_is_skipped() {
        let dir = ::tempfile::tempdir().unwrap();
        let repo_dir = dir.path().join("repo");
        fs::create_dir_all(&repo_dir).unwrap();
        fs::write(repo_dir.join("vim.toml"), "x").unwrap();

        let repos = vec![Repository {
            name: "repo".into(),
            url: "".into(),
            branch: "master".into(),
            local_path: Some(repo_dir.display().to_string()),
            priority: 0,
            enabled: false,
            last_sync: 0,
            last_commit: None,
        }];

        let catalog = Catalog::new(dir.path().to_path_buf(), repos, test_log());
        assert!(catalog.locate("vim").is_none());
    }
}
