//! Moving class files from a staging directory to their real output root.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Where a class file ended up.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Relocation {
    /// Staging and real root are the same directory.
    Unchanged(PathBuf),
    Moved(PathBuf),
    /// Rename failed, the file was copied and the original removed.
    Copied(PathBuf),
    Failed,
}

impl Relocation {
    /// Final location, unless relocation failed.
    pub fn target(&self) -> Option<&Path> {
        match self {
            Relocation::Unchanged(path) | Relocation::Moved(path) | Relocation::Copied(path) => {
                Some(path)
            }
            Relocation::Failed => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, Relocation::Failed)
    }
}

/// Move `class_file` from under `staging_root` to the same relative
/// location under `real_root`.
///
/// Tries a plain rename, then creates the parent directories and renames
/// again, then falls back to copy and delete. Never returns an error; a
/// failure leaves the source file where it was.
pub fn relocate(class_file: &Path, staging_root: &Path, real_root: &Path) -> Relocation {
    relocate_with(class_file, staging_root, real_root, |from, to| fs::rename(from, to))
}

fn relocate_with(
    class_file: &Path,
    staging_root: &Path,
    real_root: &Path,
    rename: impl Fn(&Path, &Path) -> io::Result<()>,
) -> Relocation {
    if staging_root == real_root {
        return Relocation::Unchanged(class_file.to_path_buf());
    }
    let Ok(relative) = class_file.strip_prefix(staging_root) else {
        tracing::warn!(
            path = %class_file.display(),
            staging = %staging_root.display(),
            "class file outside staging directory"
        );
        return Relocation::Failed;
    };
    let target = real_root.join(relative);

    if rename(class_file, &target).is_ok() {
        return Relocation::Moved(target);
    }
    if let Some(parent) = target.parent() {
        if let Err(e) = fs::create_dir_all(parent) {
            tracing::debug!(dir = %parent.display(), error = %e, "cannot create output directory");
        }
    }
    if rename(class_file, &target).is_ok() {
        return Relocation::Moved(target);
    }
    match fs::copy(class_file, &target) {
        Ok(_) => {
            if let Err(e) = fs::remove_file(class_file) {
                tracing::debug!(path = %class_file.display(), error = %e, "cannot remove staged class file");
            }
            Relocation::Copied(target)
        }
        Err(e) => {
            tracing::warn!(
                from = %class_file.display(),
                to = %target.display(),
                error = %e,
                "failed to relocate class file"
            );
            Relocation::Failed
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
