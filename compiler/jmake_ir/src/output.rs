//! Compile results.

use std::path::{Path, PathBuf};

use crate::{ClassId, SourcesFilter};

/// File name of package annotations; compiles to no bytecode of its own.
pub const PACKAGE_INFO_FILE_NAME: &str = "package-info.java";

/// A durable compile result: where the artifact of `source` ended up.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutputItem {
    /// Real output root of the owning module.
    pub output_root: PathBuf,
    /// Artifact path relative to `output_root`, "/"-separated.
    ///
    /// `None` for sources without bytecode (`package-info.java`).
    pub output_path: Option<String>,
    pub source: PathBuf,
}

impl OutputItem {
    /// An item for a relocated class file.
    pub fn new(output_root: PathBuf, output_path: String, source: PathBuf) -> Self {
        OutputItem {
            output_root,
            output_path: Some(output_path),
            source,
        }
    }

    /// An item for a source that produces no class file.
    pub fn without_output(output_root: PathBuf, source: PathBuf) -> Self {
        OutputItem {
            output_root,
            output_path: None,
            source,
        }
    }

    /// Absolute path of the artifact, if there is one.
    pub fn output_file(&self) -> Option<PathBuf> {
        self.output_path
            .as_deref()
            .map(|rel| self.output_root.join(rel.trim_start_matches('/')))
    }
}

/// One class produced by the compiler, as reparsed by the dependency cache.
#[derive(Clone, Debug, Eq, PartialEq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CompiledClass {
    pub id: ClassId,
    /// Package-prefixed, "/"-rooted path of the declaring source file.
    pub relative_path: String,
    /// Where the compiler wrote the class file.
    pub class_file: PathBuf,
}

impl CompiledClass {
    /// Create a compiled class record.
    pub fn new(id: ClassId, relative_path: impl Into<String>, class_file: impl Into<PathBuf>) -> Self {
        CompiledClass {
            id,
            relative_path: relative_path.into(),
            class_file: class_file.into(),
        }
    }

    /// Bare source file name (`Foo.java`) the class was compiled from.
    pub fn source_file_name(&self) -> &str {
        self.relative_path
            .rsplit('/')
            .next()
            .unwrap_or(&self.relative_path)
    }
}

/// One compile pass: where classes go and which sources are compiled.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct OutputDirPair {
    pub output_dir: PathBuf,
    pub filter: SourcesFilter,
}

impl OutputDirPair {
    /// Create a pass description.
    pub fn new(output_dir: impl Into<PathBuf>, filter: SourcesFilter) -> Self {
        OutputDirPair {
            output_dir: output_dir.into(),
            filter,
        }
    }

    /// Output directory of the pass.
    #[inline]
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
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
    use pretty_assertions::assert_eq;

    #[test]
    fn output_file_joins_relative_path() {
        let item = OutputItem::new(
            PathBuf::from("/out"),
            "/com/acme/Foo.class".to_string(),
            PathBuf::from("/src/com/acme/Foo.java"),
        );
        assert_eq!(item.output_file(), Some(PathBuf::from("/out/com/acme/Foo.class")));
    }

    #[test]
    fn package_info_item_has_no_output_file() {
        let item = OutputItem::without_output(
            PathBuf::from("/out"),
            PathBuf::from("/src/com/acme/package-info.java"),
        );
        assert_eq!(item.output_file(), None);
    }

    #[test]
    fn source_file_name_is_last_segment() {
        let class = CompiledClass::new(ClassId::new(3), "/com/acme/Foo.java", "/tmp/Foo$Inner.class");
        assert_eq!(class.source_file_name(), "Foo.java");
    }
}
