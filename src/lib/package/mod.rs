//! Module `package` deals with the declarative package definition read from
//! one catalog entry (§3 `PackageDefinition`) and the small value types it
//! is built from.

pub mod manifest;
pub mod version;

use std::fmt;
use std::str::FromStr;

use serde_derive::{Deserialize, Serialize};

use util::errors::{ErrorKind, Res};

/// A package name: non-empty, matching `[a-zA-Z0-9._+-]+`.
///
/// Grounded on the teacher's `package::Name`, generalized from a
/// group/name pair (Idris packages are namespaced) to the spec's flat
/// identifier namespace.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Name(String);

impl Name {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Name {
    type Err = ::failure::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty()
            || !s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || "._+-".contains(c))
        {
            return Err(ErrorKind::Parse(format!("invalid package name `{}`", s)).into());
        }
        Ok(Name(s.to_owned()))
    }
}

impl<'de> ::serde::Deserialize<'de> for Name {
    fn deserialize<D: ::serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        FromStr::from_str(&s).map_err(::serde::de::Error::custom)
    }
}

impl AsRef<str> for Name {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How the package's source is fetched; defaults to `Tarball`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    Tarball,
    Git,
}

impl Default for SourceType {
    fn default() -> Self {
        SourceType::Tarball
    }
}

/// The detected/declared build system driving the Build Runner's configure
/// phase. Unknown strings in a catalog entry coerce to `Autotools` with a
/// warning (handled by the Loader, not here, since coercion needs a
/// logger).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildSystem {
    Autotools,
    Cmake,
    Make,
    Custom,
}

impl Default for BuildSystem {
    fn default() -> Self {
        BuildSystem::Autotools
    }
}

impl FromStr for BuildSystem {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "autotools" => Ok(BuildSystem::Autotools),
            "cmake" => Ok(BuildSystem::Cmake),
            "make" => Ok(BuildSystem::Make),
            "custom" => Ok(BuildSystem::Custom),
            _ => Err(()),
        }
    }
}

/// The checksum algorithm, inferred by the Integrity Verifier from the hex
/// digest's length (32 = MD5, 40 = SHA1, 64 = SHA256).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChecksumKind {
    Md5,
    Sha1,
    Sha256,
}

impl ChecksumKind {
    pub fn from_digest_len(digest: &str) -> Res<ChecksumKind> {
        match digest.len() {
            32 => Ok(ChecksumKind::Md5),
            40 => Ok(ChecksumKind::Sha1),
            64 => Ok(ChecksumKind::Sha256),
            n => Err(ErrorKind::Parse(format!(
                "checksum has unrecognized length {} (expected 32, 40, or 64 hex chars)",
                n
            ))
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_accepts_valid_chars() {
        assert!(Name::from_str("gcc").is_ok());
        assert!(Name::from_str("lib-ssl_2.0+x").is_ok());
    }

    #[test]
    fn name_rejects_empty_and_illegal_chars() {
        assert!(Name::from_str("").is_err());
        assert!(Name::from_str("lib ssl").is_err());
        assert!(Name::from_str("lib/ssl").is_err());
    }

    #[test]
    fn checksum_kind_by_length() {
        assert_eq!(
            ChecksumKind::from_digest_len(&"a".repeat(32)).unwrap(),
            ChecksumKind::Md5
        );
        assert_eq!(
            ChecksumKind::from_digest_len(&"a".repeat(40)).unwrap(),
            ChecksumKind::Sha1
        );
        assert_eq!(
            ChecksumKind::from_digest_len(&"a".repeat(64)).unwrap(),
            ChecksumKind::Sha256
        );
        assert!(ChecksumKind::from_digest_len("abc").is_err());
    }

    #[test]
    fn build_system_defaults_to_autotools() {
        assert_eq!(BuildSystem::default(), BuildSystem::Autotools);
    }
}
