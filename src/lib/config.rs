//! The configuration record consumed by the core (§6 "Configuration
//! inputs"). Argument parsing and the on-disk config file format are
//! out-of-scope external collaborators; this module is their output
//! contract, populated either by `from_str`/`from_file` or by a caller that
//! already has a fully formed record (e.g. the CLI binary, after merging
//! flags over file defaults).
//!
//! Grounded on the teacher's `IndexConfig`/`Manifest` `FromStr` +
//! `toml::from_str` idiom in `index::config`.

use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use index::Repository;
use util::errors::{ErrorKind, Res, ResultExt};

#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_install_prefix")]
    pub install_prefix: String,
    #[serde(default = "default_parallel_jobs")]
    pub parallel_jobs: u32,
    #[serde(default = "default_build_timeout")]
    pub build_timeout: u64,
    #[serde(default)]
    pub debug_symbols: bool,
    #[serde(default)]
    pub keep_build_dir: bool,
    #[serde(default)]
    pub force_mode: bool,
    #[serde(default)]
    pub skip_dependencies: bool,
    #[serde(default = "default_true")]
    pub verify_checksums: bool,
    #[serde(default = "default_sync_interval")]
    pub sync_interval: u64,
    #[serde(default = "default_root_dir")]
    pub root_dir: String,
    #[serde(default)]
    pub repositories: Vec<Repository>,
}

fn default_install_prefix() -> String {
    "/usr/local".to_owned()
}

fn default_parallel_jobs() -> u32 {
    1
}

fn default_build_timeout() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

fn default_sync_interval() -> u64 {
    86400
}

fn default_root_dir() -> String {
    "/".to_owned()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            install_prefix: default_install_prefix(),
            parallel_jobs: default_parallel_jobs(),
            build_timeout: default_build_timeout(),
            debug_symbols: false,
            keep_build_dir: false,
            force_mode: false,
            skip_dependencies: false,
            verify_checksums: true,
            sync_interval: default_sync_interval(),
            root_dir: default_root_dir(),
            repositories: Vec::new(),
        }
    }
}

impl FromStr for Config {
    type Err = ::failure::Error;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        ::toml::from_str(raw)
            .ctx(ErrorKind::Parse("invalid configuration".into()))
            .map_err(Into::into)
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Res<Config> {
        let raw = fs::read_to_string(path)
            .ctx(ErrorKind::Io(format!("reading config file at {}", path.display())))?;
        Config::from_str(&raw).map_err(|e| ErrorKind::Parse(format!("{}", e)).into())
    }

    /// `/var/cache/<pkg>/sources/`, relative to `root_dir`.
    pub fn sources_dir(&self) -> PathBuf {
        Path::new(&self.root_dir).join("var/cache/pkgctl/sources")
    }

    /// `/var/cache/<pkg>/builds/`, relative to `root_dir`.
    pub fn builds_dir(&self) -> PathBuf {
        Path::new(&self.root_dir).join("var/cache/pkgctl/builds")
    }

    /// `/var/lib/<pkg>/repo/`, relative to `root_dir`.
    pub fn catalog_dir(&self) -> PathBuf {
        Path::new(&self.root_dir).join("var/lib/pkgctl/repo")
    }

    /// `/var/lib/<pkg>/installed.txt`, relative to `root_dir`.
    pub fn database_path(&self) -> PathBuf {
        Path::new(&self.root_dir).join("var/lib/pkgctl/installed.txt")
    }

    /// Advisory instance lock directory (§5), under the library directory.
    pub fn lock_dir(&self) -> PathBuf {
        Path::new(&self.root_dir).join("var/lib/pkgctl")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec() {
        let cfg = Config::default();
        assert_eq!(cfg.install_prefix, "/usr/local");
        assert_eq!(cfg.parallel_jobs, 1);
        assert!(cfg.verify_checksums);
        assert!(!cfg.force_mode);
    }

    #[test]
    fn parses_partial_toml_with_defaults() {
        let cfg = Config::from_str("force_mode = true\n").unwrap();
        assert!(cfg.force_mode);
        assert_eq!(cfg.install_prefix, "/usr/local");
    }

    #[test]
    fn parses_repositories_list() {
        let raw = r#"
[[repositories]]
name = "main"
url = "https://example.com/main.git"
"#;
        let cfg = Config::from_str(raw).unwrap();
        assert_eq!(cfg.repositories.len(), 1);
        assert_eq!(cfg.repositories[0].name, "main");
    }
}
