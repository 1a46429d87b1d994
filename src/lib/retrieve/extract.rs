//! The Extractor (§4.5): unpacks a source archive into a build workspace,
//! stripping the outer directory component.
//!
//! Grounded on the teacher's `tar` + `flate2` dependency pair (used
//! conceptually by `retrieve::cache::Source::unpack`), generalized to the
//! full suffix table of spec §4.5. `.tar.bz2` and `.tar.xz` use the
//! sibling `bzip2`/`xz2` crates (same "decoder implementing `Read`, fed
//! into `tar::Archive`" shape `flate2` already provides); `.zip` uses the
//! `zip` crate. This is the same combination the retrieved `cargo`
//! (registry source) and `typst-kit` (package fetch) examples use for an
//! equivalent strip-outer-directory unpack.

use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};

use flate2::read::GzDecoder;
use tar::Archive;

use util::errors::{ErrorKind, Res};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

fn detect(archive: &Path) -> Res<Format> {
    let name = archive
        .file_name()
        .map(|n| n.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(Format::TarGz)
    } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
        Ok(Format::TarBz2)
    } else if name.ends_with(".tar.xz") {
        Ok(Format::TarXz)
    } else if name.ends_with(".zip") {
        Ok(Format::Zip)
    } else {
        Err(ErrorKind::UnsupportedFormat(name).into())
    }
}

/// §4.5 `extract(archive, target_dir)`. All tar variants strip the
/// outermost path component so `target_dir` directly contains the project
/// tree; unknown suffixes are rejected.
pub fn extract(archive: &Path, target_dir: &Path) -> Res<()> {
    fs::create_dir_all(target_dir)?;

    match detect(archive)? {
        Format::TarGz => {
            let file = fs::File::open(archive)?;
            let decoder = GzDecoder::new(file);
            unpack_tar_stripped(decoder, target_dir)
        }
        Format::TarBz2 => {
            let file = fs::File::open(archive)?;
            let decoder = ::bzip2::read::BzDecoder::new(file);
            unpack_tar_stripped(decoder, target_dir)
        }
        Format::TarXz => {
            let file = fs::File::open(archive)?;
            let decoder = ::xz2::read::XzDecoder::new(file);
            unpack_tar_stripped(decoder, target_dir)
        }
        Format::Zip => unpack_zip_stripped(archive, target_dir),
    }
}

fn unpack_tar_stripped<R: Read>(reader: R, target_dir: &Path) -> Res<()> {
    let mut archive = Archive::new(reader);
    let entries = archive
        .entries()
        .map_err(|e| ErrorKind::Extract(format!("could not read archive entries: {}", e)))?;

    for entry in entries {
        let mut entry = entry.map_err(|e| ErrorKind::Extract(format!("malformed entry: {}", e)))?;
        let path = entry
            .path()
            .map_err(|e| ErrorKind::Extract(format!("malformed entry path: {}", e)))?
            .into_owned();

        let stripped: PathBuf = match strip_first_component(&path) {
            Some(p) => p,
            None => continue, // the outer directory entry itself
        };
        if stripped.as_os_str().is_empty() {
            continue;
        }

        let dest = target_dir.join(&stripped);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        entry
            .unpack(&dest)
            .map_err(|e| ErrorKind::Extract(format!("could not unpack {}: {}", dest.display(), e)))?;
    }
    Ok(())
}

fn unpack_zip_stripped(archive: &Path, target_dir: &Path) -> Res<()> {
    let file = fs::File::open(archive)?;
    let mut zip = ::zip::ZipArchive::new(file)
        .map_err(|e| ErrorKind::Extract(format!("could not read zip archive: {}", e)))?;

    for i in 0..zip.len() {
        let mut entry = zip
            .by_index(i)
            .map_err(|e| ErrorKind::Extract(format!("malformed zip entry: {}", e)))?;
        let name = PathBuf::from(entry.name());
        let stripped = match strip_first_component(&name) {
            Some(p) => p,
            None => continue,
        };
        if stripped.as_os_str().is_empty() {
            continue;
        }

        let dest = target_dir.join(&stripped);
        if entry.is_dir() {
            fs::create_dir_all(&dest)?;
            continue;
        }
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut out = fs::File::create(&dest)?;
        ::std::io::copy(&mut entry, &mut out)
            .map_err(|e| ErrorKind::Extract(format!("could not write {}: {}", dest.display(), e)))?;
    }
    Ok(())
}

/// Strips the leading path component of `path` (the outer directory every
/// well-formed source archive wraps its tree in). Returns `None` when
/// `path` has no further components (i.e. it *is* the outer directory).
fn strip_first_component(path: &Path) -> Option<PathBuf> {
    let mut components = path.components();
    components.next()?;
    let rest: PathBuf = components.collect();
    Some(rest)
}
