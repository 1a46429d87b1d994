//! Version parsing for catalog entries.
//!
//! `PackageDefinition::version` is a semantic version string
//! (`major.minor.patch[-prerelease][+build]`); we reuse the teacher's
//! `semver` dependency directly rather than hand-rolling a parser, exactly
//! as the teacher's own `Manifest::version` does for its package versions.

use semver::Version;

use util::errors::{ErrorKind, Res};

pub fn parse_version(raw: &str) -> Res<Version> {
    Version::parse(raw).map_err(|e| ErrorKind::Parse(format!("invalid version `{}`: {}", raw, e)).into())
}

/// True iff `catalog` is newer than `installed` (used by
/// `Orchestrator::update` to decide whether an update is a no-op).
pub fn is_newer(catalog: &Version, installed: &Version) -> bool {
    catalog > installed
}
