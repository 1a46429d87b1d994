//! The Lifecycle Orchestrator (§4.9): glues every other component together
//! into `install`/`remove`/`update`/`update_all`.
//!
//! Grounded on `68c687d3` (vrdhn's package-installer, `execute_build`/
//! `execute_sorted_pipelines`): resolve, topologically sort, then iterate a
//! per-package pipeline while threading accumulated state (here, the
//! Database) forward — the same control flow steps 4-7 of `install()`
//! need. The nearest teacher analogue is `cli::new::new`/`init`, the only
//! place the teacher drives a multi-step filesystem operation end to end
//! and reports a single typed error for the whole sequence.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use slog::Logger;

use build::Runner;
use config::Config;
use db::{now, Database, InstalledEntry, State as DbState};
use index::Catalog;
use package::manifest::{Loader, PackageDefinition};
use package::version::{is_newer, parse_version};
use resolve::{find_dependents, resolve};
use util::errors::{ErrorKind, Res};
use util::lock::DirLock;

pub struct UpdateSummary {
    pub succeeded: usize,
    pub failed: usize,
}

pub struct Orchestrator {
    config: Config,
    catalog: Catalog,
    db: Database,
    runner: Runner,
    log: Logger,
    cancelled: Arc<AtomicBool>,
    _lock: DirLock,
}

impl Orchestrator {
    /// Acquires the crate-wide advisory instance lock (§5), loads the
    /// Database, and installs the SIGINT/SIGTERM handler that flips the
    /// cancellation flag checked between phases.
    pub fn new(config: Config, catalog: Catalog, log: Logger) -> Res<Orchestrator> {
        let lock = DirLock::acquire(&config.lock_dir())?;
        let db = Database::load(config.database_path(), log.clone())?;
        let runner = Runner::new(config.clone(), log.clone());
        let cancelled = Arc::new(AtomicBool::new(false));

        let flag = cancelled.clone();
        ctrlc::set_handler(move || flag.store(true, Ordering::SeqCst))
            .map_err(|e| ErrorKind::Io(format!("could not install signal handler: {}", e)))?;

        Ok(Orchestrator {
            config,
            catalog,
            db,
            runner,
            log,
            cancelled,
            _lock: lock,
        })
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    fn check_cancelled(&self) -> Res<()> {
        if self.cancelled.load(Ordering::SeqCst) {
            Err(ErrorKind::Cancelled.into())
        } else {
            Ok(())
        }
    }

    fn loader(&self) -> Loader {
        Loader::new(&self.catalog, self.log.clone())
    }

    fn record_state(&mut self, package: &PackageDefinition, state: DbState) -> Res<()> {
        if self.db.find(package.name.as_str()).is_some() {
            self.db.set_state(package.name.as_str(), state)
        } else {
            self.db.add(InstalledEntry {
                name: package.name.as_str().to_owned(),
                version: package.version.to_string(),
                description: package.description.clone().unwrap_or_default(),
                installed_at: 0,
                installed_size: 0,
                state,
                file_list: Vec::new(),
            })
        }
    }

    /// §4.9 `install(name)`.
    pub fn install(&mut self, name: &str, force: bool) -> Res<()> {
        // Step 1.
        if self.db.find(name).is_some() && !force {
            return Ok(());
        }
        self.check_cancelled()?;

        // Step 2.
        let package = self.loader().load(name)?;
        for conflict in &package.conflicts {
            if self.db.find(conflict).is_some() {
                return Err(ErrorKind::Conflict(conflict.clone()).into());
            }
        }

        // Resolve (and reject cycles in) the dependency graph before any
        // side effect, per §7: Cycle must be "reported before any side
        // effect," not merely before the build phases. Resolving here,
        // ahead of the step-3 state write, means a cyclic catalog leaves
        // the Database untouched rather than gaining a `Failed` row for a
        // package that was never installed to begin with.
        let dep_order = if self.config.skip_dependencies {
            None
        } else {
            Some(resolve(package.name.as_str(), &self.loader())?)
        };

        // Step 3.
        self.record_state(&package, DbState::Downloading)?;

        // Step 4.
        if let Some(order) = dep_order {
            if let Err(e) = self.install_dependencies(&order, force) {
                self.record_state(&package, DbState::Failed)?;
                return Err(e);
            }
        }

        self.check_cancelled().map_err(|e| {
            let _ = self.record_state(&package, DbState::Failed);
            e
        })?;

        // Step 5: build.
        let mut ctx = self.runner.start(package)?;
        self.record_state(&ctx.package, DbState::Building)?;
        if let Err(e) = self.runner.build(&mut ctx, &self.config.sources_dir()) {
            let _ = self.record_state(&ctx.package, DbState::Failed);
            self.runner.finish(&ctx);
            return Err(e);
        }

        // Step 6: install.
        self.record_state(&ctx.package, DbState::Installing)?;
        let file_list = match self.runner.install(&mut ctx) {
            Ok(list) => list,
            Err(e) => {
                let _ = self.record_state(&ctx.package, DbState::Failed);
                self.runner.finish(&ctx);
                return Err(e);
            }
        };

        // Step 7.
        let installed_size = file_list
            .iter()
            .filter_map(|p| fs::metadata(p).ok())
            .map(|m| m.len())
            .sum();
        self.db.add(InstalledEntry {
            name: ctx.package.name.as_str().to_owned(),
            version: ctx.package.version.to_string(),
            description: ctx.package.description.clone().unwrap_or_default(),
            installed_at: now(),
            installed_size,
            state: DbState::Installed,
            file_list,
        })?;

        // Step 8.
        if let Some(cmd) = ctx.package.post_install_cmd.clone() {
            let argv: Vec<String> = cmd.split_whitespace().map(str::to_owned).collect();
            let timeout = ::std::time::Duration::from_secs(self.config.build_timeout);
            if let Err(e) = ::util::process::run_checked(&argv, &ctx.source_dir, timeout) {
                warn!(self.log, "post_install_cmd failed, continuing"; "package" => ctx.package.name.as_str(), "error" => format!("{}", e));
            }
        }

        self.runner.finish(&ctx);
        Ok(())
    }

    fn install_dependencies(&mut self, order: &[String], force: bool) -> Res<()> {
        for dep in order.iter().take(order.len().saturating_sub(1)) {
            self.check_cancelled()?;
            if self.db.find(dep).is_none() {
                self.install(dep, force)?;
            }
        }
        Ok(())
    }

    /// §4.9 `remove(name)`.
    pub fn remove(&mut self, name: &str, force: bool) -> Res<()> {
        let entry = match self.db.find(name) {
            Some(e) => e.clone(),
            None => return Ok(()),
        };

        if !force {
            let dependents = find_dependents(name, &self.db, &self.loader());
            if !dependents.is_empty() {
                return Err(ErrorKind::Dependency(dependents.join(", ")).into());
            }
        }

        for path in entry.file_list.iter().rev() {
            let _ = fs::remove_file(path);
        }

        self.db.remove(name)
    }

    /// §4.9 `update(name)`.
    pub fn update(&mut self, name: &str, force: bool) -> Res<()> {
        let entry = match self.db.find(name) {
            Some(e) => e.clone(),
            None => return self.install(name, force),
        };

        let catalog_def = self.loader().load(name)?;
        let installed_version = parse_version(&entry.version)?;

        if !is_newer(&catalog_def.version, &installed_version) && !force {
            return Ok(());
        }

        // `copy_staged_tree` installs everything under
        // `<root_dir><install_prefix>/...`, so a package's config files
        // land at e.g. `/usr/local/etc/...`, not `/etc/...` — back up
        // against the prefix actually used, not a bare `/etc/` literal.
        let config_prefix = format!("{}/etc/", self.config.install_prefix.trim_end_matches('/'));
        let backups: Vec<(String, Vec<u8>)> = entry
            .file_list
            .iter()
            .filter(|p| p.contains(&config_prefix))
            .filter_map(|p| fs::read(p).ok().map(|c| (p.clone(), c)))
            .collect();

        self.remove(name, true)?;
        let result = self.install(name, force);

        for (path, contents) in backups {
            if let Err(e) = fs::write(&path, &contents) {
                warn!(self.log, "could not restore config backup"; "path" => path, "error" => format!("{}", e));
            }
        }

        result
    }

    /// §4.9 `update_all()`.
    pub fn update_all(&mut self, force: bool) -> Res<UpdateSummary> {
        let names: Vec<String> = self.db.all().iter().map(|e| e.name.clone()).collect();
        let mut succeeded = 0;
        let mut failed = 0;

        for name in &names {
            match self.update(name, force) {
                Ok(_) => succeeded += 1,
                Err(e) => {
                    failed += 1;
                    error!(self.log, "update failed"; "package" => name.as_str(), "error" => format!("{}", e));
                }
            }
        }

        if failed > 0 {
            Err(ErrorKind::Build(format!("{} of {} updates failed", failed, names.len())).into())
        } else {
            Ok(UpdateSummary { succeeded, failed })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs as stdfs;

    fn test_log() -> Logger {
        Logger::root(::slog::Discard, o!())
    }

    fn write_entry(dir: &Path, name: &str, deps: &[&str]) {
        let deps_toml = deps
            .iter()
            .map(|d| format!("\"{}\"", d))
            .collect::<Vec<_>>()
            .join(", ");
        let body = format!(
            "name = \"{}\"\nversion = \"1.0.0\"\nsource_url = \"https://example.com/{}.tar.gz\"\ndependencies = [{}]\n",
            name, name, deps_toml
        );
        stdfs::write(dir.join(format!("{}.toml", name)), body).unwrap();
    }

    fn test_orchestrator(root: &Path, catalog_dir: &Path) -> Orchestrator {
        let log = test_log();
        let repo = ::index::Repository {
            name: "test".into(),
            url: "".into(),
            branch: "master".into(),
            local_path: Some(catalog_dir.display().to_string()),
            priority: 0,
            enabled: true,
            last_sync: 0,
            last_commit: None,
        };
        let catalog = Catalog::new(catalog_dir.to_path_buf(), vec![repo], log.clone());
        let mut config = Config::default();
        config.root_dir = root.display().to_string();
        Orchestrator::new(config, catalog, log).unwrap()
    }

    #[test]
    fn install_of_already_installed_without_force_is_a_noop() {
        let root = ::tempfile::tempdir().unwrap();
        let catalog_dir = ::tempfile::tempdir().unwrap();
        write_entry(catalog_dir.path(), "curl", &[]);

        let mut orch = test_orchestrator(root.path(), catalog_dir.path());
        orch.db
            .add(InstalledEntry {
                name: "curl".into(),
                version: "1.0.0".into(),
                description: "".into(),
                installed_at: 1,
                installed_size: 0,
                state: DbState::Installed,
                file_list: Vec::new(),
            })
            .unwrap();

        assert!(orch.install("curl", false).is_ok());
        // installed_at is untouched: the no-op never re-ran the pipeline.
        assert_eq!(orch.database().find("curl").unwrap().installed_at, 1);
    }

    #[test]
    fn remove_of_uninstalled_package_is_a_noop() {
        let root = ::tempfile::tempdir().unwrap();
        let catalog_dir = ::tempfile::tempdir().unwrap();
        let mut orch = test_orchestrator(root.path(), catalog_dir.path());
        assert!(orch.remove("nonexistent", false).is_ok());
    }

    #[test]
    fn remove_blocked_by_dependent_without_force() {
        let root = ::tempfile::tempdir().unwrap();
        let catalog_dir = ::tempfile::tempdir().unwrap();
        write_entry(catalog_dir.path(), "a", &["b"]);
        write_entry(catalog_dir.path(), "b", &[]);

        let mut orch = test_orchestrator(root.path(), catalog_dir.path());
        for name in &["a", "b"] {
            orch.db
                .add(InstalledEntry {
                    name: (*name).to_owned(),
                    version: "1.0.0".into(),
                    description: "".into(),
                    installed_at: 1,
                    installed_size: 0,
                    state: DbState::Installed,
                    file_list: Vec::new(),
                })
                .unwrap();
        }

        let err = orch.remove("b", false).unwrap_err();
        match err.kind() {
            ErrorKind::Dependency(_) => {}
            other => panic!("expected Dependency, got {:?}", other),
        }
        assert!(orch.remove("b", true).is_ok());
        assert!(orch.database().find("b").is_none());
        assert!(orch.database().find("a").is_some());
    }

    #[test]
    fn update_of_uninstalled_package_falls_through_to_conflict_check() {
        // No catalog entry for "ghost" exists, so update() should surface
        // NotFound via install()'s load step rather than panicking.
        let root = ::tempfile::tempdir().unwrap();
        let catalog_dir = ::tempfile::tempdir().unwrap();
        let mut orch = test_orchestrator(root.path(), catalog_dir.path());
        assert!(orch.update("ghost", false).is_err());
    }

    #[test]
    fn conflicting_package_is_rejected_before_any_state_change() {
        let root = ::tempfile::tempdir().unwrap();
        let catalog_dir = ::tempfile::tempdir().unwrap();
        stdfs::write(
            catalog_dir.path().join("newtool.toml"),
            "name = \"newtool\"\nversion = \"1.0.0\"\nsource_url = \"https://example.com/newtool.tar.gz\"\nconflicts = [\"oldtool\"]\n",
        )
        .unwrap();

        let mut orch = test_orchestrator(root.path(), catalog_dir.path());
        orch.db
            .add(InstalledEntry {
                name: "oldtool".into(),
                version: "1.0.0".into(),
                description: "".into(),
                installed_at: 1,
                installed_size: 0,
                state: DbState::Installed,
                file_list: Vec::new(),
            })
            .unwrap();

        let err = orch.install("newtool", false).unwrap_err();
        match err.kind() {
            ErrorKind::Conflict(_) => {}
            other => panic!("expected Conflict, got {:?}", other),
        }
        assert!(orch.database().find("newtool").is_none());
    }

    #[test]
    fn cyclic_dependency_leaves_database_unchanged() {
        let root = ::tempfile::tempdir().unwrap();
        let catalog_dir = ::tempfile::tempdir().unwrap();
        write_entry(catalog_dir.path(), "x", &["y"]);
        write_entry(catalog_dir.path(), "y", &["x"]);

        let mut orch = test_orchestrator(root.path(), catalog_dir.path());
        let err = orch.install("x", false).unwrap_err();
        match err.kind() {
            ErrorKind::Cycle(_) => {}
            other => panic!("expected Cycle, got {:?}", other),
        }
        // A dependency cycle must be reported before any side effect: no
        // InstalledEntry, not even a `Failed` one, should exist for "x".
        assert!(orch.database().find("x").is_none());
        assert!(orch.database().find("y").is_none());
    }
}
