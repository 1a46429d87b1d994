//! `pkgctl`: a source-based package manager for Unix-like hosts.
//!
//! Given a symbolic package name, resolves its declarative catalog entry,
//! walks the transitive dependency closure, fetches and verifies source
//! archives, builds them through a detected build system, installs the
//! result into the host filesystem, and maintains a persistent record of
//! what is installed.

#![recursion_limit = "128"]

#[macro_use]
extern crate slog;
extern crate bzip2;
extern crate ctrlc;
extern crate digest;
#[macro_use]
extern crate failure;
extern crate filetime;
extern crate flate2;
extern crate git2;
extern crate md5;
extern crate reqwest;
extern crate semver;
extern crate serde;
#[macro_use]
extern crate serde_derive;
extern crate sha1;
extern crate sha2;
extern crate slog_async;
extern crate slog_term;
extern crate tar;
extern crate toml;
extern crate wait_timeout;
extern crate walkdir;
extern crate xz2;
extern crate zip;

#[cfg(test)]
extern crate tempfile;

pub mod build;
pub mod config;
pub mod db;
pub mod index;
pub mod orchestrate;
pub mod package;
pub mod resolve;
pub mod retrieve;
pub mod util;
pub mod verify;

pub use config::Config;
pub use orchestrate::Orchestrator;

/// Builds the crate's default structured logger: async term output at
/// `info` and above, matching the teacher's own `Cache::from_disk` setup
/// (`slog_term::FullFormat` fused with `slog_async::Async`).
pub fn default_logger() -> slog::Logger {
    use slog::Drain;

    let decorator = slog_term::TermDecorator::new().build();
    let drain = slog_term::FullFormat::new(decorator).build().fuse();
    let drain = slog_async::Async::new(drain).build().fuse();
    slog::Logger::root(drain, o!())
}
