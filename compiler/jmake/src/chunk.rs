//! Module chunks: the unit handed to one external compiler invocation.
//!
//! A chunk is one strongly connected component of the module graph together
//! with the input files of its members. Project-model reads go through the
//! shared project's read lock, so a chunk stays cheap to build and query
//! while another thread edits the model between calls.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexMap;
use jmake_ir::{Jdk, LanguageLevel, Module, ModuleId, OrderEntry, Project, SourcesFilter};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

/// Project model shared between the orchestrator and its callers.
pub type SharedProject = Arc<RwLock<Project>>;

/// Members of one chunk. Almost always a single module.
pub type ChunkModules = SmallVec<[ModuleId; 2]>;

/// A group of modules compiled together.
pub struct ModuleChunk {
    project: SharedProject,
    modules: ChunkModules,
    /// Input files per member, in the order they were added.
    files: FxHashMap<ModuleId, Vec<PathBuf>>,
    /// Original file to transformer-generated replacement.
    substitutions: FxHashMap<PathBuf, PathBuf>,
    filter: SourcesFilter,
}

impl ModuleChunk {
    /// Create an empty chunk over `modules`.
    pub fn new(project: SharedProject, modules: ChunkModules) -> Self {
        ModuleChunk {
            project,
            modules,
            files: FxHashMap::default(),
            substitutions: FxHashMap::default(),
            filter: SourcesFilter::ALL,
        }
    }

    /// Add input files of `module`. Ignored for non-members.
    pub fn add_files(&mut self, module: ModuleId, files: impl IntoIterator<Item = PathBuf>) {
        if self.modules.contains(&module) {
            self.files.entry(module).or_default().extend(files);
        }
    }

    /// Builder form of [`ModuleChunk::add_files`].
    #[must_use]
    pub fn with_files(mut self, module: ModuleId, files: impl IntoIterator<Item = PathBuf>) -> Self {
        self.add_files(module, files);
        self
    }

    pub fn project(&self) -> &SharedProject {
        &self.project
    }

    pub fn modules(&self) -> &[ModuleId] {
        &self.modules
    }

    pub fn is_single_module(&self) -> bool {
        self.modules.len() == 1
    }

    /// Whether any member has input files.
    pub fn has_files(&self) -> bool {
        self.files.values().any(|files| !files.is_empty())
    }

    /// Comma-separated member names, for progress text and logs.
    pub fn display_name(&self) -> String {
        let project = self.project.read();
        self.modules
            .iter()
            .filter_map(|id| project.module(*id))
            .map(|m| m.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn filter(&self) -> SourcesFilter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: SourcesFilter) {
        self.filter = filter;
    }

    /// Replace `original` by `generated` in [`ModuleChunk::files_to_compile`].
    pub fn substitute(&mut self, original: PathBuf, generated: PathBuf) {
        self.substitutions.insert(original, generated);
    }

    /// The file currently compiled in place of `original`.
    pub fn effective_file<'a>(&'a self, original: &'a Path) -> &'a Path {
        self.substitutions
            .get(original)
            .map_or(original, PathBuf::as_path)
    }

    /// All input files of all members, ignoring the filter.
    pub fn all_files(&self) -> impl Iterator<Item = (ModuleId, &Path)> + '_ {
        self.modules.iter().flat_map(move |id| {
            self.files
                .get(id)
                .into_iter()
                .flatten()
                .map(move |file| (*id, file.as_path()))
        })
    }

    /// Original input files accepted by the current filter.
    pub fn source_files(&self) -> Vec<PathBuf> {
        let project = self.project.read();
        self.all_files()
            .filter(|(_, file)| self.filter.accepts(project.is_test_source(file)))
            .map(|(_, file)| file.to_path_buf())
            .collect()
    }

    /// Files to pass to the compiler: filtered, with substitutions applied.
    pub fn files_to_compile(&self) -> Vec<PathBuf> {
        let project = self.project.read();
        self.all_files()
            .filter(|(_, file)| self.filter.accepts(project.is_test_source(file)))
            .map(|(_, file)| self.effective_file(file).to_path_buf())
            .collect()
    }

    /// Source roots of all members accepted by the filter and not excluded.
    pub fn source_roots(&self) -> Vec<PathBuf> {
        let project = self.project.read();
        self.members(&project)
            .flat_map(|module| {
                module
                    .source_roots
                    .iter()
                    .filter(|root| self.filter.accepts(root.is_test))
                    .filter(|root| !project.is_excluded(module, &root.path))
                    .map(|root| root.path.clone())
            })
            .collect()
    }

    /// Classpath entries after each member's JDK entry.
    pub fn compilation_classpath(&self) -> Vec<PathBuf> {
        self.classpath(ClasspathPart::Compilation)
    }

    /// Classpath entries up to and including each member's JDK entry.
    pub fn boot_classpath(&self) -> Vec<PathBuf> {
        self.classpath(ClasspathPart::Boot)
    }

    /// JDK of the first member that sets one, else the project default.
    pub fn jdk(&self) -> Option<Jdk> {
        let project = self.project.read();
        let jdk = self
            .members(&project)
            .find_map(|m| m.jdk.clone())
            .or_else(|| project.default_jdk.clone());
        jdk
    }

    /// Language level of the first member that sets one, else the project default.
    pub fn language_level(&self) -> LanguageLevel {
        let project = self.project.read();
        let level = self
            .members(&project)
            .find_map(|m| m.language_level)
            .unwrap_or(project.default_language_level);
        level
    }

    fn members<'p>(&'p self, project: &'p Project) -> impl Iterator<Item = &'p Module> + 'p {
        self.modules.iter().filter_map(|id| project.module(*id))
    }

    fn classpath(&self, part: ClasspathPart) -> Vec<PathBuf> {
        let project = self.project.read();
        // Canonical path -> first spelling seen.
        let mut entries: IndexMap<PathBuf, PathBuf> = IndexMap::new();
        for module in self.members(&project) {
            let split = module
                .dependencies
                .iter()
                .position(|e| *e == OrderEntry::Jdk)
                .map_or(0, |pos| pos + 1);
            let (boot, compilation) = module.dependencies.split_at(split);
            let selected = match part {
                ClasspathPart::Boot => boot,
                ClasspathPart::Compilation => compilation,
            };
            for entry in selected {
                for root in self.entry_roots(&project, module, entry) {
                    let key = fs::canonicalize(&root).unwrap_or_else(|_| root.clone());
                    entries.entry(key).or_insert(root);
                }
            }
        }
        entries.into_values().collect()
    }

    fn entry_roots(&self, project: &Project, module: &Module, entry: &OrderEntry) -> Vec<PathBuf> {
        let with_tests = self.filter.contains(SourcesFilter::TEST);
        match entry {
            OrderEntry::Jdk => project
                .jdk_for(module)
                .map(|jdk| jdk.roots.clone())
                .unwrap_or_default(),
            OrderEntry::ModuleSource => output_roots(module, with_tests),
            OrderEntry::Module(id) => project
                .module(*id)
                .map(|dep| output_roots(dep, with_tests))
                .unwrap_or_default(),
            OrderEntry::Library { roots, .. } => roots.clone(),
        }
    }
}

#[derive(Clone, Copy)]
enum ClasspathPart {
    Boot,
    Compilation,
}

fn output_roots(module: &Module, with_tests: bool) -> Vec<PathBuf> {
    let mut roots: Vec<PathBuf> = module.output_dir.iter().cloned().collect();
    if with_tests && module.test_output_differs() {
        roots.extend(module.test_output_dir.iter().cloned());
    }
    roots
}

impl std::fmt::Debug for ModuleChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleChunk")
            .field("modules", &self.modules)
            .field("filter", &self.filter)
            .field("files", &self.files)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
