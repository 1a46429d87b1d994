//! Drives the Catalog Store's `sync()` (§4.1) for a single `Repository`
//! using `git2`, exactly the way the teacher drives git checkouts for
//! `DirectRes::Git` dependencies, but aimed at a whole catalog directory
//! rather than one package tree.

use std::fs;
use std::path::{Path, PathBuf};

use git2::build::RepoBuilder;
use git2::{FetchOptions, Repository as GitRepository};
use slog::Logger;

use index::config::Repository;
use util::errors::{ErrorKind, Res};

/// Result of syncing one repository: the local path and the catalog
/// revision now checked out.
pub struct SyncResult {
    pub local_path: PathBuf,
    pub commit: String,
}

pub fn sync_one(repo: &Repository, catalog_root: &Path, log: &Logger) -> Res<SyncResult> {
    let dest = match &repo.local_path {
        Some(p) => PathBuf::from(p),
        None => catalog_root.join(&repo.name),
    };

    if dest.exists() {
        if GitRepository::open(&dest).is_ok() {
            info!(log, "fast-forwarding repository"; "name" => &repo.name);
            return fast_forward(&dest, repo, log);
        } else {
            warn!(
                log,
                "existing local_path has no git metadata, erasing and recloning";
                "name" => &repo.name, "path" => dest.display().to_string()
            );
            fs::remove_dir_all(&dest).map_err(|e| {
                ErrorKind::Network(format!(
                    "could not erase invalid repository checkout at {}: {}",
                    dest.display(),
                    e
                ))
            })?;
        }
    }

    clone_shallow(&dest, repo, log)
}

fn clone_shallow(dest: &Path, repo: &Repository, log: &Logger) -> Res<SyncResult> {
    info!(log, "cloning repository"; "name" => &repo.name, "url" => &repo.url);

    let mut fetch_opts = FetchOptions::new();
    fetch_opts.depth(1);

    let git_repo = RepoBuilder::new()
        .branch(&repo.branch)
        .fetch_options(fetch_opts)
        .clone(&repo.url, dest)
        .map_err(|e| ErrorKind::Network(format!("clone of {} failed: {}", repo.url, e)))?;

    let commit = head_commit(&git_repo)?;
    Ok(SyncResult {
        local_path: dest.to_path_buf(),
        commit,
    })
}

fn fast_forward(dest: &Path, repo: &Repository, log: &Logger) -> Res<SyncResult> {
    let git_repo = GitRepository::open(dest)
        .map_err(|e| ErrorKind::Network(format!("could not reopen {}: {}", dest.display(), e)))?;

    let mut remote = git_repo
        .find_remote("origin")
        .map_err(|e| ErrorKind::Network(format!("no `origin` remote for {}: {}", repo.name, e)))?;

    remote
        .fetch(&[&repo.branch], None, None)
        .map_err(|e| ErrorKind::Network(format!("fetch failed for {}: {}", repo.name, e)))?;

    let fetch_head = git_repo
        .find_reference("FETCH_HEAD")
        .map_err(|e| ErrorKind::Network(format!("missing FETCH_HEAD for {}: {}", repo.name, e)))?;
    let fetch_commit = git_repo
        .reference_to_annotated_commit(&fetch_head)
        .map_err(|e| ErrorKind::Network(format!("could not read FETCH_HEAD: {}", e)))?;
    let target_obj = git_repo
        .find_object(fetch_commit.id(), Some(git2::ObjectType::Commit))
        .map_err(|e| ErrorKind::Network(format!("could not resolve fetched commit: {}", e)))?;

    git_repo
        .reset(&target_obj, git2::ResetType::Hard, None)
        .map_err(|e| ErrorKind::Network(format!("fast-forward reset failed: {}", e)))?;

    let commit = head_commit(&git_repo)?;
    info!(log, "synced"; "name" => &repo.name, "commit" => &commit);

    Ok(SyncResult {
        local_path: dest.to_path_buf(),
        commit,
    })
}

fn head_commit(repo: &GitRepository) -> Res<String> {
    let head = repo
        .head()
        .map_err(|e| ErrorKind::Network(format!("could not read HEAD: {}", e)))?;
    let commit = head
        .peel_to_commit()
        .map_err(|e| ErrorKind::Network(format!("could not resolve HEAD commit: {}", e)))?;
    Ok(commit.id().to_string())
}
