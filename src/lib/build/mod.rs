//! The Build Runner (§4.6): detects and drives a package's build system
//! through configure/compile, then installs the result into the host root.
//!
//! The teacher never shells out to an external build tool, so the shape of
//! the phase pipeline here is grounded instead on the two closest retrieved
//! examples of driving an external build through a bounded subprocess:
//! `BuildCxt::exec_build_cmd` (yafpm) for the "construct an explicit argv,
//! run it in a scoped cwd" pattern, and `execute_build`/`execute_step`
//! (vrdhn's package-installer) for separating fetch/extract/configure/
//! compile into discrete, individually-timed steps. All process
//! invocations go through `util::process::run_checked`, the single
//! collaborator design note 9 calls for.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use filetime::FileTime;
use slog::Logger;
use walkdir::WalkDir;

use config::Config;
use db::now;
use package::{BuildSystem, SourceType};
use package::manifest::PackageDefinition;
use retrieve::{extract, fetch};
use util::errors::{ErrorKind, Res};
use util::process;
use verify;

const MAX_IN_PROGRESS: usize = 16;

/// §3 BuildContext state machine. Transitions are monotonic forward;
/// `Failed` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum State {
    Init,
    Downloading,
    Extracting,
    Configuring,
    Building,
    Installing,
    Complete,
    Failed,
}

impl State {
    /// The linear order a healthy context walks through; used to reject
    /// any attempt to move backward.
    fn rank(self) -> u8 {
        match self {
            State::Init => 0,
            State::Downloading => 1,
            State::Extracting => 2,
            State::Configuring => 3,
            State::Building => 4,
            State::Installing => 5,
            State::Complete => 6,
            State::Failed => 7,
        }
    }
}

/// §3 BuildContext: the transient workspace and state for one in-progress
/// install.
#[derive(Debug)]
pub struct BuildContext {
    pub package: PackageDefinition,
    pub build_dir: PathBuf,
    pub source_dir: PathBuf,
    pub install_dir: PathBuf,
    pub status: State,
    pub started_at: u64,
    pub ended_at: Option<u64>,
}

impl BuildContext {
    fn new(package: PackageDefinition, build_dir: PathBuf) -> BuildContext {
        let source_dir = build_dir.join("source");
        let install_dir = build_dir.join("install");
        BuildContext {
            package,
            build_dir,
            source_dir,
            install_dir,
            status: State::Init,
            started_at: now(),
            ended_at: None,
        }
    }

    fn advance(&mut self, to: State) {
        debug_assert!(to == State::Failed || to.rank() > self.status.rank());
        self.status = to;
        if to == State::Complete || to == State::Failed {
            self.ended_at = Some(now());
        }
    }
}

/// §4.6 Build Runner. Owns a bounded table of in-progress BuildContexts so
/// `is_running(name)` can be answered without scanning the filesystem, and
/// exceeding `MAX_IN_PROGRESS` is rejected with `Resource`.
pub struct Runner {
    config: Config,
    log: Logger,
    in_progress: HashMap<String, ()>,
}

impl Runner {
    pub fn new(config: Config, log: Logger) -> Runner {
        Runner {
            config,
            log,
            in_progress: HashMap::new(),
        }
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.in_progress.contains_key(name)
    }

    /// Creates a BuildContext for `package` and registers it in the
    /// in-progress table. The caller (the Orchestrator) owns the returned
    /// context exclusively and must call `finish` when done with it.
    pub fn start(&mut self, package: PackageDefinition) -> Res<BuildContext> {
        if self.in_progress.len() >= MAX_IN_PROGRESS && !self.in_progress.contains_key(package.name.as_str()) {
            return Err(ErrorKind::Resource(format!(
                "build table full ({} in progress)",
                MAX_IN_PROGRESS
            ))
            .into());
        }
        let build_dir = self
            .config
            .builds_dir()
            .join(format!("{}-{}", package.name, package.version));
        self.in_progress.insert(package.name.as_str().to_owned(), ());
        Ok(BuildContext::new(package, build_dir))
    }

    /// Releases `name` from the in-progress table and, unless
    /// `keep_build_dir` is set for a failed context, removes its
    /// `build_dir`.
    pub fn finish(&mut self, ctx: &BuildContext) {
        self.in_progress.remove(ctx.package.name.as_str());
        let keep = self.config.keep_build_dir && ctx.status == State::Failed;
        if !keep {
            let _ = fs::remove_dir_all(&ctx.build_dir);
        }
    }

    fn timeout(&self) -> Duration {
        Duration::from_secs(self.config.build_timeout)
    }

    /// §4.6 `build(context)`: fetch, extract, configure, compile.
    pub fn build(&mut self, ctx: &mut BuildContext, sources_dir: &Path) -> Res<()> {
        let result = self.build_phases(ctx, sources_dir);
        if result.is_err() {
            ctx.advance(State::Failed);
        }
        result
    }

    fn build_phases(&mut self, ctx: &mut BuildContext, sources_dir: &Path) -> Res<()> {
        ctx.advance(State::Downloading);
        let archive = self.fetch_phase(ctx, sources_dir)?;

        ctx.advance(State::Extracting);
        fs::create_dir_all(&ctx.source_dir)?;
        extract::extract(&archive, &ctx.source_dir)?;

        ctx.advance(State::Configuring);
        self.pre_build_phase(ctx)?;
        self.configure_phase(ctx)?;

        ctx.advance(State::Building);
        self.compile_phase(ctx)?;

        Ok(())
    }

    /// Runs the package's `pre_build_cmd`, if any, in `source_dir` ahead
    /// of the configure phase.
    fn pre_build_phase(&self, ctx: &BuildContext) -> Res<()> {
        if let Some(cmd) = &ctx.package.pre_build_cmd {
            process::run_checked(&shell_split(cmd), &ctx.source_dir, self.timeout())?;
        }
        Ok(())
    }

    fn fetch_phase(&self, ctx: &BuildContext, sources_dir: &Path) -> Res<PathBuf> {
        if ctx.package.source_type == SourceType::Git {
            return Err(ErrorKind::Build(
                "git-sourced packages are not yet supported by the Build Runner".into(),
            )
            .into());
        }

        let basename = ctx
            .package
            .source_url
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| ErrorKind::Build(format!("cannot derive a filename from {}", ctx.package.source_url)))?;
        let destination = sources_dir.join(basename);

        fetch::fetch(&ctx.package.source_url, &destination, &self.log)?;

        if self.config.verify_checksums {
            verify::verify(&destination, ctx.package.checksum.as_ref().map(String::as_str), &self.log)?;
        }

        Ok(destination)
    }

    fn configure_phase(&self, ctx: &BuildContext) -> Res<()> {
        let build_system = self.detect_build_system(ctx);

        match build_system {
            BuildSystem::Autotools => self.configure_autotools(ctx),
            BuildSystem::Cmake => self.configure_cmake(ctx),
            BuildSystem::Make | BuildSystem::Custom => Ok(()),
        }
    }

    /// §4.6 auto-detection: when the record says `autotools` and
    /// `build_cmd` is empty, probe the source tree.
    fn detect_build_system(&self, ctx: &BuildContext) -> BuildSystem {
        if ctx.package.build_system != BuildSystem::Autotools || ctx.package.build_cmd.is_some() {
            return ctx.package.build_system;
        }
        if ctx.source_dir.join("CMakeLists.txt").is_file() {
            BuildSystem::Cmake
        } else if ctx.source_dir.join("configure").is_file() {
            BuildSystem::Autotools
        } else if ctx.source_dir.join("Makefile").is_file() {
            BuildSystem::Make
        } else {
            BuildSystem::Autotools
        }
    }

    fn configure_autotools(&self, ctx: &BuildContext) -> Res<()> {
        if !ctx.source_dir.join("configure").is_file() {
            self.generate_configure_script(ctx)?;
        }

        let mut argv = vec![
            "./configure".to_string(),
            format!("--prefix={}", self.config.install_prefix),
        ];
        if let Some(args) = &ctx.package.configure_args {
            argv.extend(shell_split(args));
        }
        process::run_checked(&argv, &ctx.source_dir, self.timeout())?;
        Ok(())
    }

    /// Tries, in order, `autogen.sh`, `autoreconf -fiv`, `bootstrap` to
    /// produce a `configure` script, then retries.
    fn generate_configure_script(&self, ctx: &BuildContext) -> Res<()> {
        let candidates: &[&[&str]] = &[&["./autogen.sh"], &["autoreconf", "-fiv"], &["./bootstrap"]];

        for argv in candidates {
            if !ctx.source_dir.join(argv[0].trim_start_matches("./")).is_file() && argv[0].starts_with("./") {
                continue;
            }
            let owned: Vec<String> = argv.iter().map(|s| s.to_string()).collect();
            if process::run(&owned, &ctx.source_dir, self.timeout()).map(|(c, _)| c == 0).unwrap_or(false) {
                if ctx.source_dir.join("configure").is_file() {
                    return Ok(());
                }
            }
        }

        if ctx.source_dir.join("configure").is_file() {
            Ok(())
        } else {
            Err(ErrorKind::Build("could not generate a configure script".into()).into())
        }
    }

    fn configure_cmake(&self, ctx: &BuildContext) -> Res<()> {
        let build_type = if self.config.debug_symbols { "Debug" } else { "Release" };
        let mut argv = vec![
            "cmake".to_string(),
            format!("-DCMAKE_BUILD_TYPE={}", build_type),
            format!("-DCMAKE_INSTALL_PREFIX={}", self.config.install_prefix),
        ];
        if let Some(args) = &ctx.package.configure_args {
            argv.extend(shell_split(args));
        }
        argv.push(".".to_string());
        process::run_checked(&argv, &ctx.source_dir, self.timeout())?;
        Ok(())
    }

    fn compile_phase(&self, ctx: &BuildContext) -> Res<()> {
        let argv = if let Some(cmd) = &ctx.package.build_cmd {
            shell_split(cmd)
        } else {
            vec!["make".to_string(), format!("-j{}", self.config.parallel_jobs)]
        };
        process::run_checked(&argv, &ctx.source_dir, self.timeout())?;
        Ok(())
    }

    /// §4.6 `install(context)`: stages into `install_dir`, records the
    /// authoritative file list by walking it (the Open Question this
    /// resolves: the file list otherwise would only be partially known),
    /// then copies everything to the host root, preserving permissions and
    /// timestamps.
    pub fn install(&mut self, ctx: &mut BuildContext) -> Res<Vec<String>> {
        let result = self.install_phase(ctx);
        match &result {
            Ok(_) => ctx.advance(State::Complete),
            Err(_) => ctx.advance(State::Failed),
        }
        result
    }

    fn install_phase(&self, ctx: &mut BuildContext) -> Res<Vec<String>> {
        ctx.advance(State::Installing);
        fs::create_dir_all(&ctx.install_dir)?;

        let argv = if let Some(cmd) = &ctx.package.install_cmd {
            shell_split(cmd)
        } else {
            vec![
                "make".to_string(),
                "install".to_string(),
                format!("DESTDIR={}", ctx.install_dir.display()),
                format!("PREFIX={}", self.config.install_prefix),
            ]
        };
        process::run_checked(&argv, &ctx.source_dir, self.timeout())?;

        let root = Path::new(&self.config.root_dir);
        copy_staged_tree(&ctx.install_dir, root, &self.log)
    }
}

/// Copies every regular file and directory under `staged` to the
/// corresponding path under `root`, preserving permissions and mtimes, and
/// returns the absolute destination paths it wrote (the authoritative file
/// list persisted alongside the InstalledEntry).
fn copy_staged_tree(staged: &Path, root: &Path, log: &Logger) -> Res<Vec<String>> {
    let mut file_list = Vec::new();

    for entry in WalkDir::new(staged) {
        let entry = entry.map_err(|e| ErrorKind::Io(format!("walking staged install tree: {}", e)))?;
        let relative = entry
            .path()
            .strip_prefix(staged)
            .expect("WalkDir yields paths under its root");
        if relative.as_os_str().is_empty() {
            continue;
        }
        let dest = root.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::copy(entry.path(), &dest)?;
            copy_metadata(entry.path(), &dest)?;
            file_list.push(dest.display().to_string());
        }
    }

    debug!(log, "copied staged install tree"; "files" => file_list.len());
    Ok(file_list)
}

fn copy_metadata(src: &Path, dest: &Path) -> Res<()> {
    let meta = fs::metadata(src)?;
    fs::set_permissions(dest, meta.permissions())?;
    let mtime = FileTime::from_last_modification_time(&meta);
    filetime::set_file_times(dest, mtime, mtime)
        .map_err(|e| ErrorKind::Io(format!("setting mtime on {}: {}", dest.display(), e)))?;
    Ok(())
}

/// Minimal whitespace-delimited argv split for `configure_args`/
/// `build_cmd`/`install_cmd`. These flow from catalog entries, which is why
/// design note 9 calls for argument-vector execution rather than handing
/// the raw string to a shell: this never invokes `/bin/sh -c`.
fn shell_split(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_owned).collect()
}
