//! Output bookkeeping: matching compiled classes back to sources, moving
//! them to their real output directories and computing what is left to do.

use std::path::{Path, PathBuf};

use indexmap::IndexSet;
use jmake_ir::{CompiledClass, OutputItem, PACKAGE_INFO_FILE_NAME};

use super::Orchestrator;
use crate::chunk::ModuleChunk;
use crate::class_parser::CompiledClasses;
use crate::pass::PassState;
use crate::relocate::{relocate, Relocation};

/// Where one source's classes belong.
struct Destination {
    relative_path: String,
    output_root: PathBuf,
}

impl Orchestrator {
    /// Record the classes of one pass and move them out of `staging`.
    ///
    /// A source counts as successfully compiled when it has no error
    /// message, at least one class whose relative path matches the source's
    /// real location, and every such class reached its output root.
    pub(super) fn update_outputs(
        &mut self,
        chunk: &ModuleChunk,
        staging: &Path,
        compiled: &CompiledClasses,
        pass: &PassState,
    ) {
        let files_with_errors = pass.counters().files_with_errors;
        for source in chunk.source_files() {
            if files_with_errors.contains(&jmake_ir::path_to_url(&source)) {
                continue;
            }
            let Some(classes) = source
                .file_name()
                .and_then(|name| name.to_str())
                .and_then(|name| compiled.get(name))
            else {
                continue;
            };
            let Some(destination) = self.destination(&source) else {
                tracing::debug!(source = %source.display(), "owning module no longer resolvable");
                self.stats.relocation_failures += 1;
                continue;
            };
            let matching: Vec<&CompiledClass> = classes
                .iter()
                .filter(|class| class.relative_path == destination.relative_path)
                .collect();
            if matching.is_empty() {
                continue;
            }

            let mut all_relocated = true;
            for class in matching {
                let relocation = relocate(&class.class_file, staging, &destination.output_root);
                match &relocation {
                    Relocation::Unchanged(path) => self.state.files_to_refresh.push(path.clone()),
                    Relocation::Moved(_) | Relocation::Copied(_) => self.stats.files_relocated += 1,
                    Relocation::Failed => {
                        self.stats.relocation_failures += 1;
                        all_relocated = false;
                    }
                }
                if let Some(target) = relocation.target() {
                    let output_path = target
                        .strip_prefix(&destination.output_root)
                        .map(slash_path)
                        .unwrap_or_else(|_| slash_path(target));
                    self.state.output_items.push(OutputItem::new(
                        destination.output_root.clone(),
                        output_path,
                        source.clone(),
                    ));
                }
            }
            if all_relocated {
                self.state.successfully_compiled.insert(source);
            }
        }
    }

    fn destination(&self, source: &Path) -> Option<Destination> {
        let project = self.project.read();
        let (module, root) = project.source_root_for(source)?;
        let relative_path = root.relative_source_path(source)?;
        let output_root = project.module(module)?.output_dir_for(root.is_test)?.to_path_buf();
        Some(Destination {
            relative_path,
            output_root,
        })
    }

    /// `(initial ∪ dependents) − successfully compiled`.
    pub(super) fn recompile_set(&self) -> IndexSet<PathBuf> {
        self.initial_and_dependents()
            .into_iter()
            .filter(|file| !self.state.successfully_compiled.contains(file))
            .collect()
    }

    /// `package-info.java` files usually produce no class file. Those left
    /// in the recompile set without an error count as compiled.
    pub(super) fn package_info_fixup(&mut self, items: &mut Vec<OutputItem>) {
        let fixed: Vec<PathBuf> = self
            .files_to_recompile
            .iter()
            .filter(|file| file.file_name().is_some_and(|name| name == PACKAGE_INFO_FILE_NAME))
            .filter(|file| !self.state.files_with_errors.contains(*file))
            .cloned()
            .collect();
        for file in fixed {
            let output_root = self.destination(&file).map(|d| d.output_root).unwrap_or_default();
            tracing::debug!(file = %file.display(), "package-info without class file");
            self.files_to_recompile.shift_remove(&file);
            items.push(OutputItem::without_output(output_root, file));
        }
    }
}

fn slash_path(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}
