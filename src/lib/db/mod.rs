//! The Installed-Packages Database (§4.8): persists installed entries and
//! supports add/remove/find/reverse-lookup.
//!
//! Grounded on the teacher's `FromStr`/`toml::from_str` manifest-parsing
//! shape (`Manifest`, `IndexConfig`), generalized from TOML to the flat,
//! tab-separated grammar spec §6 fixes for this file: a `FromStr`-style
//! line parser paired with a serializer, validated by round-trip tests,
//! same shape as the teacher's config types, different concrete grammar.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use slog::Logger;

use util::errors::Res;

/// §3 `InstalledEntry::state` / §6 state ordinals.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Unknown,
    Available,
    Downloading,
    Building,
    Installing,
    Installed,
    Failed,
    Broken,
}

impl State {
    pub fn ordinal(self) -> u8 {
        match self {
            State::Unknown => 0,
            State::Available => 1,
            State::Downloading => 2,
            State::Building => 3,
            State::Installing => 4,
            State::Installed => 5,
            State::Failed => 6,
            State::Broken => 7,
        }
    }

    pub fn from_ordinal(n: u8) -> State {
        match n {
            1 => State::Available,
            2 => State::Downloading,
            3 => State::Building,
            4 => State::Installing,
            5 => State::Installed,
            6 => State::Failed,
            7 => State::Broken,
            _ => State::Unknown,
        }
    }
}

/// §3 `InstalledEntry`.
#[derive(Clone, Debug, PartialEq)]
pub struct InstalledEntry {
    pub name: String,
    pub version: String,
    pub description: String,
    pub installed_at: u64,
    pub installed_size: u64,
    pub state: State,
    pub file_list: Vec<String>,
}

impl InstalledEntry {
    fn to_line(&self) -> String {
        format!(
            "{}\t{}\t{}\t{}\t{}\t{}",
            self.name,
            self.version,
            self.description,
            self.installed_at,
            self.installed_size,
            self.state.ordinal()
        )
    }

    /// Tolerant line parser: lines with three or more tab-separated
    /// fields are accepted, with defaults for anything missing.
    fn from_line(line: &str) -> Option<InstalledEntry> {
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < 3 {
            return None;
        }
        let name = fields[0].to_owned();
        if name.is_empty() {
            return None;
        }
        let version = fields.get(1).unwrap_or(&"").to_string();
        let description = fields.get(2).unwrap_or(&"").to_string();
        let installed_at = fields.get(3).and_then(|s| s.parse().ok()).unwrap_or(0);
        let installed_size = fields.get(4).and_then(|s| s.parse().ok()).unwrap_or(0);
        let state = fields
            .get(5)
            .and_then(|s| s.parse::<u8>().ok())
            .map(State::from_ordinal)
            .unwrap_or(State::Unknown);

        Some(InstalledEntry {
            name,
            version,
            description,
            installed_at,
            installed_size,
            state,
            file_list: Vec::new(),
        })
    }
}

/// §4.8 Installed-Packages Database. Loaded lazily on first access,
/// mutated in memory, persisted after every mutation so the on-disk file
/// always reflects the in-memory state exactly.
#[derive(Debug)]
pub struct Database {
    path: PathBuf,
    entries: Vec<InstalledEntry>,
    log: Logger,
}

impl Database {
    /// §4.8: if the file is absent, the Database is empty (not an error).
    pub fn load(path: PathBuf, log: Logger) -> Res<Database> {
        let entries = if path.exists() {
            let raw = fs::read_to_string(&path)?;
            parse(&raw)
        } else {
            Vec::new()
        };
        Ok(Database { path, entries, log })
    }

    pub fn all(&self) -> &[InstalledEntry] {
        &self.entries
    }

    pub fn find(&self, name: &str) -> Option<&InstalledEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Overwrites any existing row with the same name; persists.
    pub fn add(&mut self, entry: InstalledEntry) -> Res<()> {
        self.entries.retain(|e| e.name != entry.name);
        self.entries.push(entry);
        self.persist()
    }

    /// Removes the row if present; persists; a missing row is not an
    /// error.
    pub fn remove(&mut self, name: &str) -> Res<()> {
        self.entries.retain(|e| e.name != name);
        self.persist()
    }

    pub fn set_state(&mut self, name: &str, state: State) -> Res<()> {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.state = state;
        }
        self.persist()
    }

    /// Supplemented feature (§10 `list`): substring filter over installed
    /// names.
    pub fn list(&self, pattern: Option<&str>) -> Vec<&InstalledEntry> {
        self.entries
            .iter()
            .filter(|e| pattern.map(|p| e.name.contains(p)).unwrap_or(true))
            .collect()
    }

    fn persist(&self) -> Res<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = String::from("# pkgctl installed-packages database\n");
        for entry in &self.entries {
            out.push_str(&entry.to_line());
            out.push('\n');
        }
        fs::write(&self.path, out)?;
        debug!(self.log, "persisted database"; "entries" => self.entries.len());
        Ok(())
    }
}

fn parse(raw: &str) -> Vec<InstalledEntry> {
    raw.lines()
        .filter(|line| !line.trim().is_empty() && !line.trim_start().starts_with('#'))
        .filter_map(InstalledEntry::from_line)
        .collect()
}

pub fn now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
