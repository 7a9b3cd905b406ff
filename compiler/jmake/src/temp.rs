//! Temporary directories owned by one orchestrator call.

use std::io;
use std::path::{Path, PathBuf};
use std::thread;

use jmake_ir::ModuleId;
use rustc_hash::FxHashMap;
use tempfile::TempDir;

/// Create a fresh directory under `root` named `jmake-<label>-XXXX`.
pub fn create(root: &Path, label: &str) -> io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix(&format!("jmake-{label}-"))
        .tempdir_in(root)
}

/// Delete `dirs`, on a background thread when `background` is set.
pub fn delete_later(dirs: Vec<TempDir>, background: bool) {
    if dirs.is_empty() {
        return;
    }
    if background {
        let spawned = thread::Builder::new()
            .name("jmake-cleanup".into())
            .spawn(move || remove_all(dirs));
        if let Err(e) = spawned {
            tracing::warn!(error = %e, "cannot spawn cleanup thread, temp dirs are left behind");
        }
    } else {
        remove_all(dirs);
    }
}

fn remove_all(dirs: Vec<TempDir>) {
    for dir in dirs {
        let path = dir.path().to_path_buf();
        if let Err(e) = dir.close() {
            tracing::warn!(path = %path.display(), error = %e, "failed to delete temp dir");
        }
    }
}

/// Per-module directories for transformer output, created on first use.
pub struct ModuleTempDirs {
    root: PathBuf,
    dirs: FxHashMap<ModuleId, TempDir>,
}

impl ModuleTempDirs {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ModuleTempDirs {
            root: root.into(),
            dirs: FxHashMap::default(),
        }
    }

    /// Directory of `module`, creating it on first request.
    pub fn dir_for(&mut self, module: ModuleId, module_name: &str) -> io::Result<&Path> {
        if !self.dirs.contains_key(&module) {
            let dir = create(&self.root, &sanitize(module_name))?;
            tracing::debug!(module = module_name, path = %dir.path().display(), "created transform dir");
            self.dirs.insert(module, dir);
        }
        match self.dirs.get(&module) {
            Some(dir) => Ok(dir.path()),
            None => Err(io::Error::other("transform dir vanished")),
        }
    }

    pub fn len(&self) -> usize {
        self.dirs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dirs.is_empty()
    }

    /// Hand over all directories, leaving this set empty.
    pub fn drain(&mut self) -> Vec<TempDir> {
        self.dirs.drain().map(|(_, dir)| dir).collect()
    }
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect()
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests {
    use super::*;

    #[test]
    fn test_dir_for_is_lazy_and_stable() {
        let root = tempfile::tempdir().unwrap();
        let mut dirs = ModuleTempDirs::new(root.path());
        assert!(dirs.is_empty());

        let first = dirs.dir_for(ModuleId::new(0), "core").unwrap().to_path_buf();
        let again = dirs.dir_for(ModuleId::new(0), "core").unwrap().to_path_buf();
        let other = dirs.dir_for(ModuleId::new(1), "my app").unwrap().to_path_buf();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert_eq!(dirs.len(), 2);
        assert!(other
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("jmake-my_app-")));
    }

    #[test]
    fn test_delete_later_sync_removes_dirs() {
        let root = tempfile::tempdir().unwrap();
        let mut dirs = ModuleTempDirs::new(root.path());
        let path = dirs.dir_for(ModuleId::new(0), "m").unwrap().to_path_buf();
        std::fs::write(path.join("x.java"), "class X {}").unwrap();

        delete_later(dirs.drain(), false);
        assert!(!path.exists());
        assert!(dirs.is_empty());
    }
}
