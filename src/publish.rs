//! Atomic publication of built output into the served tree.
//!
//! The builder writes its output next to the sources; the publisher moves
//! that output under the served root one top-level entry at a time. Each
//! entry is first copied into a staging directory on the same filesystem and
//! then swapped into place with renames, so concurrent HTTP readers observe
//! either the previous generation or the new one, never a half-copied
//! subtree. Pre-existing unrelated entries of the served root are left
//! untouched.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::WalkDir;

/// Errors from publish operations. All are fatal to the process.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("built output {path} is not readable: {source}")]
    MissingOutput {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to stage {path}: {source}")]
    Stage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to replace {path}: {source}")]
    Replace {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Remove and recreate the served root. Runs once at startup, before the
/// first publish.
pub fn reset_served_root(served_root: &Path) -> io::Result<()> {
    if served_root.exists() {
        fs::remove_dir_all(served_root)?;
    }
    fs::create_dir_all(served_root)
}

/// Merge the built output into the served root.
///
/// Performs a one-level subtree copy: every top-level entry of
/// `built_output` replaces the entry of the same name under `served_root`
/// wholesale. Safe to invoke repeatedly.
pub fn publish(built_output: &Path, served_root: &Path) -> Result<(), PublishError> {
    let entries = fs::read_dir(built_output).map_err(|source| PublishError::MissingOutput {
        path: built_output.to_path_buf(),
        source,
    })?;

    for entry in entries {
        let entry = entry.map_err(|source| PublishError::MissingOutput {
            path: built_output.to_path_buf(),
            source,
        })?;
        let target = served_root.join(entry.file_name());

        // Stage inside the served root so the renames below stay on one
        // filesystem.
        let stage = tempfile::tempdir_in(served_root).map_err(|source| PublishError::Stage {
            path: target.clone(),
            source,
        })?;
        let staged = stage.path().join(entry.file_name());
        copy_entry(&entry.path(), &staged).map_err(|source| PublishError::Stage {
            path: target.clone(),
            source,
        })?;

        // Swap: park the previous generation in the staging directory, move
        // the new one into place, then drop both with the stage.
        if target.exists() {
            fs::rename(&target, stage.path().join("previous")).map_err(|source| {
                PublishError::Replace {
                    path: target.clone(),
                    source,
                }
            })?;
        }
        fs::rename(&staged, &target).map_err(|source| PublishError::Replace {
            path: target.clone(),
            source,
        })?;

        stage.close().map_err(|source| PublishError::Replace {
            path: target.clone(),
            source,
        })?;
    }

    Ok(())
}

/// Recursively copy a file or directory tree.
fn copy_entry(src: &Path, dst: &Path) -> io::Result<()> {
    let meta = fs::symlink_metadata(src)?;
    if !meta.is_dir() {
        fs::copy(src, dst)?;
        return Ok(());
    }

    for entry in WalkDir::new(src).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let rel = entry.path().strip_prefix(src).map_err(io::Error::other)?;
        let dest = dst.join(rel);
        if entry.file_type().is_dir() {
            fs::create_dir_all(&dest)?;
        } else {
            fs::copy(entry.path(), &dest)?;
        }
    }
    Ok(())
}
