//! The Package Definition Loader (§4.2): reads one catalog entry and
//! returns a validated `PackageDefinition`.
//!
//! The wire format is TOML, following the teacher's own
//! `Manifest`/`toml::from_str`/`FromStr` idiom (see the teacher's
//! `Manifest` type, which this module directly generalizes from a
//! per-project Idris manifest to a per-package catalog record).

use std::str::FromStr;

use semver::Version;
use serde_derive::{Deserialize, Serialize};
use slog::Logger;

use index::Catalog;
use package::{BuildSystem, ChecksumKind, Name, SourceType};
use util::errors::{ErrorKind, Res, ResultExt};

/// §3 `PackageDefinition`. Every field maps one-to-one onto the record
/// format described in spec §6.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PackageDefinition {
    pub name: Name,
    pub version: Version,

    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub maintainer: Option<String>,
    #[serde(default)]
    pub homepage: Option<String>,
    #[serde(default)]
    pub license: Option<String>,
    #[serde(default)]
    pub category: Option<String>,

    pub source_url: String,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub build_system: BuildSystem,
    #[serde(default)]
    pub build_cmd: Option<String>,
    #[serde(default)]
    pub install_cmd: Option<String>,
    #[serde(default)]
    pub configure_args: Option<String>,
    #[serde(default)]
    pub pre_build_cmd: Option<String>,
    #[serde(default)]
    pub post_install_cmd: Option<String>,

    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub build_dependencies: Vec<String>,
    #[serde(default)]
    pub conflicts: Vec<String>,
    #[serde(default)]
    pub provides: Vec<String>,

    #[serde(default)]
    pub size_estimate: Option<u64>,
    #[serde(default)]
    pub build_time_estimate: Option<u64>,
}

/// Raw, permissive form used only during deserialization: `build_system`
/// is read as a bare string here so the loader can coerce an unrecognized
/// value to `autotools` and log a warning, rather than failing the parse
/// (spec §4.2).
#[derive(Deserialize)]
struct RawDefinition {
    name: Name,
    version: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    maintainer: Option<String>,
    #[serde(default)]
    homepage: Option<String>,
    #[serde(default)]
    license: Option<String>,
    #[serde(default)]
    category: Option<String>,
    source_url: String,
    #[serde(default)]
    source_type: SourceType,
    #[serde(default)]
    checksum: Option<String>,
    #[serde(default)]
    build_system: Option<String>,
    #[serde(default)]
    build_cmd: Option<String>,
    #[serde(default)]
    install_cmd: Option<String>,
    #[serde(default)]
    configure_args: Option<String>,
    #[serde(default)]
    pre_build_cmd: Option<String>,
    #[serde(default)]
    post_install_cmd: Option<String>,
    #[serde(default)]
    dependencies: Vec<String>,
    #[serde(default)]
    build_dependencies: Vec<String>,
    #[serde(default)]
    conflicts: Vec<String>,
    #[serde(default)]
    provides: Vec<String>,
    #[serde(default)]
    size_estimate: Option<u64>,
    #[serde(default)]
    build_time_estimate: Option<u64>,
}

impl PackageDefinition {
    /// Parses a catalog entry and validates the invariants of spec §3:
    /// non-empty name/version/source_url, only non-empty string array
    /// elements, an `autotools` fallback for unrecognized `build_system`
    /// values (logged as a warning via `log`, when provided).
    pub fn from_str(raw: &str, log: Option<&Logger>) -> Res<PackageDefinition> {
        let parsed: RawDefinition =
            ::toml::from_str(raw).ctx(ErrorKind::Parse("malformed catalog entry".into()))?;

        let version = Version::parse(&parsed.version)
            .map_err(|e| ErrorKind::Parse(format!("invalid version: {}", e)))?;

        let build_system = match parsed.build_system.as_ref() {
            None => BuildSystem::default(),
            Some(raw) => BuildSystem::from_str(raw).unwrap_or_else(|_| {
                if let Some(log) = log {
                    warn!(
                        log,
                        "unknown build_system `{}` for package `{}`, assuming autotools",
                        raw,
                        parsed.name
                    );
                }
                BuildSystem::default()
            }),
        };

        let def = PackageDefinition {
            name: parsed.name,
            version,
            description: parsed.description,
            maintainer: parsed.maintainer,
            homepage: parsed.homepage,
            license: parsed.license,
            category: parsed.category,
            source_url: parsed.source_url,
            source_type: parsed.source_type,
            checksum: parsed.checksum,
            build_system,
            build_cmd: parsed.build_cmd,
            install_cmd: parsed.install_cmd,
            configure_args: parsed.configure_args,
            pre_build_cmd: parsed.pre_build_cmd,
            post_install_cmd: parsed.post_install_cmd,
            dependencies: parsed.dependencies,
            build_dependencies: parsed.build_dependencies,
            conflicts: parsed.conflicts,
            provides: parsed.provides,
            size_estimate: parsed.size_estimate,
            build_time_estimate: parsed.build_time_estimate,
        };

        def.validate()?;
        Ok(def)
    }

    fn validate(&self) -> Res<()> {
        if self.name.as_str().is_empty() {
            return Err(ErrorKind::Parse("package name must not be empty".into()).into());
        }
        if self.source_url.is_empty() {
            return Err(ErrorKind::Parse(format!(
                "package `{}` has an empty source_url",
                self.name
            ))
            .into());
        }
        let scheme_ok = self.source_url.starts_with("http://")
            || self.source_url.starts_with("https://")
            || self.source_url.starts_with("ftp://");
        if !scheme_ok {
            return Err(ErrorKind::Parse(format!(
                "package `{}` has an unsupported source_url scheme: {}",
                self.name, self.source_url
            ))
            .into());
        }
        for (field, values) in &[
            ("dependencies", &self.dependencies),
            ("build_dependencies", &self.build_dependencies),
            ("conflicts", &self.conflicts),
            ("provides", &self.provides),
        ] {
            if values.iter().any(|v| v.is_empty()) {
                return Err(ErrorKind::Parse(format!(
                    "package `{}` has an empty string in `{}`",
                    self.name, field
                ))
                .into());
            }
        }
        if let Some(cksum) = &self.checksum {
            ChecksumKind::from_digest_len(cksum)
                .ctx(ErrorKind::Parse(format!(
                    "package `{}` has a malformed checksum",
                    self.name
                )))?;
        }
        Ok(())
    }
}

/// §4.2 `load(name) -> PackageDefinition | NotFoundError | ParseError`.
pub struct Loader<'a> {
    catalog: &'a Catalog,
    log: Logger,
}

impl<'a> Loader<'a> {
    pub fn new(catalog: &'a Catalog, log: Logger) -> Self {
        Loader { catalog, log }
    }

    pub fn load(&self, name: &str) -> Res<PackageDefinition> {
        let path = self
            .catalog
            .locate(name)
            .ok_or_else(|| ErrorKind::NotFound(name.to_owned()))?;

        let raw = ::std::fs::read_to_string(&path)
            .ctx(ErrorKind::Io(format!("reading catalog entry at {}", path.display())))?;

        PackageDefinition::from_str(&raw, Some(&self.log))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_entry() -> &'static str {
        r#"
name = "curl"
version = "8.4.0"
description = "A command-line tool for transferring data"
source_url = "https://curl.se/download/curl-8.4.0.tar.gz"
checksum = "d1fcb5032c439027ba2f1e4408d5f2d7"
build_system = "autotools"
dependencies = ["openssl", "zlib"]
"#
    }

    #[test]
    fn parses_a_valid_entry() {
        let def = PackageDefinition::from_str(valid_entry(), None).unwrap();
        assert_eq!(def.name.as_str(), "curl");
        assert_eq!(def.dependencies, vec!["openssl".to_string(), "zlib".to_string()]);
        assert_eq!(def.build_system, BuildSystem::Autotools);
    }

    #[test]
    fn defaults_source_type_to_tarball() {
        let def = PackageDefinition::from_str(valid_entry(), None).unwrap();
        assert_eq!(def.source_type, SourceType::Tarball);
    }

    #[test]
    fn unknown_build_system_coerces_to_autotools() {
        let raw = r#"
name = "weird"
version = "1.0.0"
source_url = "https://example.com/weird.tar.gz"
build_system = "ninja"
"#;
        let def = PackageDefinition::from_str(raw, None).unwrap();
        assert_eq!(def.build_system, BuildSystem::Autotools);
    }

    #[test]
    fn rejects_empty_source_url() {
        let raw = r#"
name = "broken"
version = "1.0.0"
source_url = ""
"#;
        assert!(PackageDefinition::from_str(raw, None).is_err());
    }

    #[test]
    fn rejects_unsupported_source_url_scheme() {
        let raw = r#"
name = "broken"
version = "1.0.0"
source_url = "git://example.com/broken.git"
"#;
        assert!(PackageDefinition::from_str(raw, None).is_err());
    }

    #[test]
    fn rejects_empty_array_elements() {
        let raw = r#"
name = "broken"
version = "1.0.0"
source_url = "https://example.com/broken.tar.gz"
dependencies = ["ok", ""]
"#;
        assert!(PackageDefinition::from_str(raw, None).is_err());
    }

    #[test]
    fn rejects_non_string_array_elements() {
        let raw = r#"
name = "broken"
version = "1.0.0"
source_url = "https://example.com/broken.tar.gz"
dependencies = [1, 2]
"#;
        assert!(PackageDefinition::from_str(raw, None).is_err());
    }

    #[test]
    fn rejects_malformed_checksum_length() {
        let raw = r#"
name = "broken"
version = "1.0.0"
source_url = "https://example.com/broken.tar.gz"
checksum = "deadbeef"
"#;
        assert!(PackageDefinition::from_str(raw, None).is_err());
    }
}
