//! Source transformation before compilation.
//!
//! Transformers may replace some input files with generated copies. The
//! copies live in per-module temp directories shared by all transformers of
//! a call; the original path stays the identity of the file everywhere else.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::chunk::ModuleChunk;
use crate::temp::ModuleTempDirs;

/// Rewrites source files before they reach the compiler.
pub trait SourceTransformer: Send + Sync {
    fn id(&self) -> &str;

    fn is_applicable(&self, file: &Path) -> bool;

    /// Write a transformed copy of `file` into `temp_dir`.
    ///
    /// `Ok(None)` means the file needs no change.
    fn transform(&self, file: &Path, temp_dir: &Path) -> io::Result<Option<PathBuf>>;
}

/// Apply every transformer to the chunk's files, recording substitutions.
///
/// A failing file keeps compiling from its previous version. Returns the
/// number of substitutions made.
pub fn run_transformers(
    chunk: &mut ModuleChunk,
    transformers: &[Arc<dyn SourceTransformer>],
    dirs: &mut ModuleTempDirs,
) -> usize {
    if transformers.is_empty() {
        return 0;
    }
    let files: Vec<_> = chunk
        .all_files()
        .map(|(module, file)| (module, file.to_path_buf()))
        .collect();
    let names: Vec<_> = {
        let project = chunk.project().read();
        files
            .iter()
            .map(|(module, _)| project.module(*module).map(|m| m.name.clone()).unwrap_or_default())
            .collect()
    };

    let mut substituted = 0;
    for transformer in transformers {
        for ((module, original), name) in files.iter().zip(&names) {
            let current = chunk.effective_file(original).to_path_buf();
            if !transformer.is_applicable(&current) {
                continue;
            }
            let result = dirs
                .dir_for(*module, name)
                .and_then(|dir| transformer.transform(&current, dir));
            match result {
                Ok(Some(generated)) => {
                    tracing::debug!(
                        transformer = transformer.id(),
                        file = %original.display(),
                        generated = %generated.display(),
                        "source transformed"
                    );
                    chunk.substitute(original.clone(), generated);
                    substituted += 1;
                }
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(
                        transformer = transformer.id(),
                        file = %original.display(),
                        error = %e,
                        "source transformation failed, compiling the untransformed file"
                    );
                }
            }
        }
    }
    substituted
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
