//! The class-file dependency store.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use jmake_ir::ClassId;
use parking_lot::Mutex;

use crate::error::CacheError;

/// Cache shared between the orchestrator and the class-parser thread.
///
/// Only the class-parser thread touches it while a pass runs.
pub type SharedCache = Arc<Mutex<Box<dyn DependencyCache>>>;

/// Records the classes a compile produced and answers "who depends on this".
pub trait DependencyCache: Send {
    /// Read a freshly written class file and register it as a new class.
    fn reparse_class_file(&mut self, class_file: &Path) -> Result<ClassId, CacheError>;

    /// Fully qualified name (`com.acme.Foo$Inner`) of a new class.
    fn resolve(&self, id: ClassId) -> Option<String>;

    /// Source file attribute (`Foo.java`) of a new class.
    fn source_file_name(&self, id: ClassId) -> Option<String>;

    /// Class file a new class was read from.
    fn class_path(&self, id: ClassId) -> Option<PathBuf>;

    /// Source files that depend on any of `compiled`, transitively.
    fn find_dependent_files(&mut self, compiled: &[PathBuf]) -> Result<Vec<PathBuf>, CacheError>;

    /// Persist everything registered since the last update.
    fn update(&mut self) -> Result<(), CacheError>;

    fn request_rebuild_next_time(&mut self, reason: &str);
}

/// Wrap a cache for sharing.
pub fn shared(cache: impl DependencyCache + 'static) -> SharedCache {
    Arc::new(Mutex::new(Box::new(cache)))
}

/// Package-prefixed source path of a class: `/com/acme/Foo.java` for
/// `com.acme.Foo$Inner` compiled from `Foo.java`.
pub fn relative_source_path(qualified_name: &str, source_file_name: &str) -> String {
    match qualified_name.rfind('.') {
        Some(dot) => {
            let package = &qualified_name[..dot];
            format!("/{}/{source_file_name}", package.replace('.', "/"))
        }
        None => format!("/{source_file_name}"),
    }
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
    fn test_relative_source_path() {
        assert_eq!(
            relative_source_path("com.acme.Foo$Inner", "Foo.java"),
            "/com/acme/Foo.java"
        );
        assert_eq!(relative_source_path("Foo", "Foo.java"), "/Foo.java");
        assert_eq!(
            relative_source_path("a.Helper", "Other.java"),
            "/a/Other.java"
        );
    }
}
