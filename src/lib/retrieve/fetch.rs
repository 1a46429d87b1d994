//! The Archive Fetcher (§4.4): downloads a source artifact to the cache,
//! idempotently.
//!
//! Grounded on the teacher's `reqwest::Client` usage in
//! `retrieve::cache::Cache::load`, generalized from "resolved through an
//! Index/DirectRes" to a free function over a bare URL and destination
//! path. `ftp://` URLs are handed to the same process-exec collaborator
//! the Build Runner uses (`util::process::run_checked`), invoking the
//! system `curl` binary, since `reqwest` itself only speaks HTTP(S).

use std::fs;
use std::path::Path;
use std::time::Duration;

use reqwest::Client;
use slog::Logger;

use util::errors::{ErrorKind, Res};
use util::process;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const OVERALL_DEADLINE: Duration = Duration::from_secs(600);

/// §4.4 `fetch(url, destination)`. Idempotent: an existing regular file at
/// `destination` short-circuits with `Ok` (the Integrity Verifier still
/// runs afterward, by the caller). On failure, any partial file is
/// removed. No retry/backoff is implemented here; that belongs to the
/// transport layer per spec.
pub fn fetch(url: &str, destination: &Path, log: &Logger) -> Res<()> {
    if destination.is_file() {
        debug!(log, "already downloaded, skipping fetch"; "destination" => destination.display().to_string());
        return Ok(());
    }

    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)?;
    }

    info!(log, "fetching"; "url" => url, "destination" => destination.display().to_string());

    let result = if url.starts_with("ftp://") {
        fetch_ftp(url, destination)
    } else {
        fetch_http(url, destination)
    };

    if result.is_err() {
        let _ = fs::remove_file(destination);
    }

    result
}

fn fetch_http(url: &str, destination: &Path) -> Res<()> {
    let client = Client::builder()
        .timeout(OVERALL_DEADLINE)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| ErrorKind::Network(format!("could not build HTTP client: {}", e)))?;

    let mut resp = client
        .get(url)
        .send()
        .map_err(|e| ErrorKind::Network(format!("GET {} failed: {}", url, e)))?;

    if !resp.status().is_success() {
        return Err(ErrorKind::Network(format!("GET {} returned {}", url, resp.status())).into());
    }

    let mut file = fs::File::create(destination)?;
    resp.copy_to(&mut file)
        .map_err(|e| ErrorKind::Network(format!("reading response body for {}: {}", url, e)))?;
    Ok(())
}

fn fetch_ftp(url: &str, destination: &Path) -> Res<()> {
    let argv = vec![
        "curl".to_string(),
        "--fail".to_string(),
        "--silent".to_string(),
        "--show-error".to_string(),
        "--output".to_string(),
        destination.display().to_string(),
        url.to_string(),
    ];
    process::run_checked(&argv, destination.parent().unwrap_or_else(|| Path::new(".")), OVERALL_DEADLINE)
        .map_err(|e| ErrorKind::Network(format!("ftp fetch of {} failed: {}", url, e)).into())
        .map(|_| ())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn test_log() -> Logger {
        Logger::root(::slog::Discard, o!())
    }

    #[test]
    fn skips_download_when_destination_already_exists() {
        let dir = ::tempfile::tempdir().unwrap();
        let dest = dir.path().join("archive.tar.gz");
        let mut f = fs::File::create(&dest).unwrap();
        f.write_all(b"already here").unwrap();

        // A bogus URL would fail if actually requested; since the file
        // already exists, fetch() must not attempt any network activity.
        fetch("http://example.invalid/archive.tar.gz", &dest, &test_log()).unwrap();
        assert_eq!(fs::read_to_string(&dest).unwrap(), "already here");
    }

    #[test]
    fn creates_parent_directories() {
        let dir = ::tempfile::tempdir().unwrap();
        let dest = dir.path().join("nested/deep/archive.tar.gz");
        let mut f_parent_check = dest.parent().unwrap().to_path_buf();
        fs::create_dir_all(&f_parent_check).unwrap();
        fs::write(&dest, b"x").unwrap();
        fetch("http://example.invalid/archive.tar.gz", &dest, &test_log()).unwrap();
        assert!(dest.exists());
    }
}
