//! The Integrity Verifier (§4.3): computes a digest over a downloaded
//! artifact and compares it to the declared value, inferring the algorithm
//! from the digest's hex length.
//!
//! Grounded on the teacher's `sha2::Sha256` usage in
//! `retrieve::cache::Cache::get_src_dir`, generalized to the full
//! MD5/SHA1/SHA256 family via the sibling RustCrypto crates `md-5` and
//! `sha1` (same `Digest` trait `sha2` already pulls in, so no new
//! ecosystem is introduced).

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use digest::Digest;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;
use slog::Logger;

use package::ChecksumKind;
use util::errors::{ErrorKind, Res};

/// §4.3 `verify(path, expected_digest)`. Skips (with a warning) if
/// `expected` is `None`; comparison is case-insensitive; a mismatch is
/// fatal.
pub fn verify(path: &Path, expected: Option<&str>, log: &Logger) -> Res<()> {
    let expected = match expected {
        Some(e) => e,
        None => {
            warn!(log, "no checksum declared, skipping integrity check"; "path" => path.display().to_string());
            return Ok(());
        }
    };

    let kind = ChecksumKind::from_digest_len(expected)?;
    let actual = digest_file(path, kind)?;

    if actual.eq_ignore_ascii_case(expected) {
        Ok(())
    } else {
        Err(ErrorKind::IntegrityMismatch(path.display().to_string()).into())
    }
}

fn digest_file(path: &Path, kind: ChecksumKind) -> Res<String> {
    let mut file = File::open(path)?;
    let hex = match kind {
        ChecksumKind::Md5 => hash_with::<Md5>(&mut file)?,
        ChecksumKind::Sha1 => hash_with::<Sha1>(&mut file)?,
        ChecksumKind::Sha256 => hash_with::<Sha256>(&mut file)?,
    };
    Ok(hex)
}

fn hash_with<D: Digest>(file: &mut File) -> Res<String> {
    let mut hasher = D::new();
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf).map_err(io::Error::from)?;
        if n == 0 {
            break;
        }
        hasher.input(&buf[..n]);
    }
    Ok(::util::hash::hexify_hash(hasher.result().as_slice()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_log() -> Logger {
        Logger::root(::slog::Discard, o!())
    }

    fn write_temp(contents: &[u8]) -> ::tempfile::NamedTempFile {
        let mut f = ::tempfile::NamedTempFile::new().unwrap();
        f.write_all(contents).unwrap();
        f
    }

    #[test]
    fn verify_succeeds_on_matching_sha256() {
        let f = write_temp(b"hello world");
        let digest = digest_file(f.path(), ChecksumKind::Sha256).unwrap();
        assert!(verify(f.path(), Some(&digest), &test_log()).is_ok());
    }

    #[test]
    fn verify_is_case_insensitive() {
        let f = write_temp(b"hello world");
        let digest = digest_file(f.path(), ChecksumKind::Sha256).unwrap();
        assert!(verify(f.path(), Some(&digest.to_uppercase()), &test_log()).is_ok());
    }

    #[test]
    fn verify_fails_on_flipped_nibble() {
        let f = write_temp(b"hello world");
        let mut digest = digest_file(f.path(), ChecksumKind::Sha256).unwrap();
        let last = digest.pop().unwrap();
        let flipped = if last == '0' { '1' } else { '0' };
        digest.push(flipped);
        assert!(verify(f.path(), Some(&digest), &test_log()).is_err());
    }

    #[test]
    fn verify_skips_when_no_checksum_declared() {
        let f = write_temp(b"hello world");
        assert!(verify(f.path(), None, &test_log()).is_ok());
    }

    #[test]
    fn verify_md5_and_sha1_also_work() {
        let f = write_temp(b"some bytes");
        let md5 = digest_file(f.path(), ChecksumKind::Md5).unwrap();
        assert_eq!(md5.len(), 32);
        assert!(verify(f.path(), Some(&md5), &test_log()).is_ok());

        let sha1 = digest_file(f.path(), ChecksumKind::Sha1).unwrap();
        assert_eq!(sha1.len(), 40);
        assert!(verify(f.path(), Some(&sha1), &test_log()).is_ok());
    }
}
