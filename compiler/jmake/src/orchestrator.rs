//! The compile orchestrator.
//!
//! One [`Orchestrator`] runs one incremental compile call:
//!
//! 1. group the input files into module chunks, dependencies first
//! 2. per chunk: run source transformers, then one or two compile passes
//! 3. per pass: launch the compiler, parse its stdout/stderr on worker
//!    threads, feed generated class files to the dependency cache, wait,
//!    then move class files to their real output directories
//! 4. ask the cache which other files depend on what was compiled and
//!    compile those once more
//! 5. persist the cache and compute the files that still need compiling
//!
//! Diagnostics, malformed class files, cache corruption and relocation
//! failures never abort the call. Only a failure to launch the compiler is
//! returned as an error.

mod outputs;

use std::mem;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use indexmap::IndexSet;
use jmake_ir::{
    path_to_url, CompilerMessage, ModuleId, OutputDirPair, OutputItem, RebuildRequest, SourcesFilter,
};
use rustc_hash::{FxHashMap, FxHashSet};
use tempfile::TempDir;

use crate::backend::BackendCompiler;
use crate::cache::SharedCache;
use crate::chunk::{ModuleChunk, SharedProject};
use crate::chunk_graph::module_chunks;
use crate::class_parser::{ClassParsingThread, CompiledClasses};
use crate::config::OrchestratorConfig;
use crate::context::CompileContext;
use crate::error::{LaunchError, OrchestratorError, WorkerError};
use crate::line_reader::LineReader;
use crate::pass::PassState;
use crate::process::ProcessHandle;
use crate::stats::CompileStats;
use crate::stream_parser::{drain, StreamKind, StreamParserThread};
use crate::temp::{self, ModuleTempDirs};
use crate::transform::{self, SourceTransformer};

/// Runs one incremental compile call.
pub struct Orchestrator {
    files: Vec<PathBuf>,
    context: Arc<dyn CompileContext>,
    backend: Arc<dyn BackendCompiler>,
    cache: SharedCache,
    project: SharedProject,
    transformers: Vec<Arc<dyn SourceTransformer>>,
    config: OrchestratorConfig,
    state: CallState,
    transform_dirs: ModuleTempDirs,
    files_to_recompile: IndexSet<PathBuf>,
    rebuild: RebuildRequest,
    stats: CompileStats,
}

/// Bookkeeping of the running call.
#[derive(Default)]
struct CallState {
    successfully_compiled: FxHashSet<PathBuf>,
    files_with_errors: FxHashSet<PathBuf>,
    output_items: Vec<OutputItem>,
    dependents: IndexSet<PathBuf>,
    files_to_refresh: Vec<PathBuf>,
    /// An error message was reported; no further passes are started.
    error_reported: bool,
}

impl Orchestrator {
    pub fn new(
        files: impl IntoIterator<Item = PathBuf>,
        context: Arc<dyn CompileContext>,
        backend: Arc<dyn BackendCompiler>,
        cache: SharedCache,
        project: SharedProject,
    ) -> Self {
        let config = OrchestratorConfig::default();
        Orchestrator {
            files: files.into_iter().collect(),
            context,
            backend,
            cache,
            project,
            transformers: Vec::new(),
            transform_dirs: ModuleTempDirs::new(config.temp_root.clone()),
            config,
            state: CallState::default(),
            files_to_recompile: IndexSet::new(),
            rebuild: RebuildRequest::new(),
            stats: CompileStats::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: OrchestratorConfig) -> Self {
        self.transform_dirs = ModuleTempDirs::new(config.temp_root.clone());
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_transformer(mut self, transformer: Arc<dyn SourceTransformer>) -> Self {
        self.transformers.push(transformer);
        self
    }

    /// Files that still need compiling. Valid after [`Orchestrator::compile`].
    pub fn files_to_recompile(&self) -> &IndexSet<PathBuf> {
        &self.files_to_recompile
    }

    /// Class files written in place, which the host should rescan.
    pub fn files_to_refresh(&self) -> &[PathBuf] {
        &self.state.files_to_refresh
    }

    pub fn rebuild_request(&self) -> &RebuildRequest {
        &self.rebuild
    }

    pub fn stats(&self) -> CompileStats {
        self.stats
    }

    /// The dependency cache, handed back for the caller's next call.
    pub fn cache(&self) -> &SharedCache {
        &self.cache
    }

    /// Compile the input files and their dependents.
    ///
    /// Returns one output item per class file produced, plus a no-output
    /// item for each cleanly compiled `package-info.java`. A cancelled call
    /// returns no items and keeps every input in the recompile set.
    pub fn compile(&mut self) -> Result<Vec<OutputItem>, OrchestratorError> {
        let context = Arc::clone(&self.context);
        let progress = context.progress();
        progress.push_state();
        self.state = CallState::default();
        self.stats = CompileStats::default();
        tracing::info!(
            files = self.files.len(),
            backend = self.backend.id(),
            "compile started"
        );

        let result = self.compile_rounds();
        let cancelled = progress.is_cancelled();
        self.finish(cancelled);
        progress.pop_state();

        if cancelled || result.is_err() {
            self.files_to_recompile = self.initial_and_dependents();
            result?;
            tracing::info!("compile cancelled");
            return Ok(Vec::new());
        }

        self.files_to_recompile = self.recompile_set();
        let mut items = mem::take(&mut self.state.output_items);
        self.package_info_fixup(&mut items);
        tracing::info!(
            items = items.len(),
            recompile = self.files_to_recompile.len(),
            stats = %self.stats,
            "compile finished"
        );
        Ok(items)
    }

    fn is_cancelled(&self) -> bool {
        self.context.progress().is_cancelled()
    }

    fn compile_rounds(&mut self) -> Result<(), OrchestratorError> {
        let initial = self.files.clone();
        let chunks = self.make_chunks(&initial);
        if !self.backend.check_compiler(&chunks) {
            tracing::info!(backend = self.backend.id(), "compiler not available");
            return Ok(());
        }
        self.compile_chunks(chunks)?;
        if self.is_cancelled() {
            return Ok(());
        }

        let dependents = self.find_dependents();
        if dependents.is_empty() || self.state.error_reported {
            return Ok(());
        }
        tracing::info!(count = dependents.len(), "compiling dependent files");
        let chunks = self.make_chunks(&dependents);
        self.compile_chunks(chunks)
    }

    /// Group `files` by owning module into chunks in dependency order.
    fn make_chunks(&self, files: &[PathBuf]) -> Vec<ModuleChunk> {
        let (components, by_module) = {
            let project = self.project.read();
            let mut by_module: FxHashMap<ModuleId, Vec<PathBuf>> = FxHashMap::default();
            for file in files {
                match project.module_for_file(file) {
                    Some(module) => by_module.entry(module).or_default().push(file.clone()),
                    None => tracing::debug!(file = %file.display(), "no owning module, skipped"),
                }
            }
            (module_chunks(&project), by_module)
        };

        components
            .into_iter()
            .filter(|members| members.iter().any(|m| by_module.contains_key(m)))
            .map(|members| {
                let mut chunk = ModuleChunk::new(Arc::clone(&self.project), members.clone());
                for module in &members {
                    if let Some(files) = by_module.get(module) {
                        chunk.add_files(*module, files.iter().cloned());
                    }
                }
                chunk
            })
            .collect()
    }

    fn compile_chunks(&mut self, chunks: Vec<ModuleChunk>) -> Result<(), OrchestratorError> {
        for mut chunk in chunks {
            if self.state.error_reported || self.is_cancelled() {
                break;
            }
            self.compile_chunk(&mut chunk)?;
        }
        Ok(())
    }

    fn compile_chunk(&mut self, chunk: &mut ModuleChunk) -> Result<(), OrchestratorError> {
        let name = chunk.display_name();
        tracing::info!(chunk = %name, "compiling chunk");
        transform::run_transformers(chunk, &self.transformers, &mut self.transform_dirs);

        let Some((passes, staging)) = self.plan_passes(chunk)? else {
            return Ok(());
        };
        self.stats.chunks += 1;

        let mut result = Ok(());
        for pass in &passes {
            if self.is_cancelled() {
                break;
            }
            chunk.set_filter(pass.filter);
            match self.compile_pass(chunk, pass.output_dir()) {
                Ok(true) => {
                    self.state.error_reported = true;
                    break;
                }
                Ok(false) => {}
                Err(e) => {
                    self.state.error_reported = true;
                    result = Err(e);
                    break;
                }
            }
        }
        if let Some(staging) = staging {
            temp::delete_later(vec![staging], self.config.async_cleanup);
        }
        result
    }

    /// Decide the passes of a chunk. `None` skips the chunk.
    fn plan_passes(
        &self,
        chunk: &ModuleChunk,
    ) -> Result<Option<(Vec<OutputDirPair>, Option<TempDir>)>, OrchestratorError> {
        let (missing, single) = {
            let project = self.project.read();
            let missing: Vec<String> = chunk
                .modules()
                .iter()
                .filter_map(|id| project.module(*id))
                .filter(|m| m.output_dir.is_none())
                .map(|m| m.name.clone())
                .collect();
            let single = match chunk.modules() {
                [id] => project.module(*id).and_then(|m| {
                    let prod = m.output_dir.clone()?;
                    let test = m.test_output_differs().then(|| m.test_output_dir.clone()).flatten();
                    Some((prod, test))
                }),
                _ => None,
            };
            (missing, single)
        };

        if !missing.is_empty() {
            for name in missing {
                self.context.add_message(CompilerMessage::error(format!(
                    "output path is not specified for module '{name}'"
                )));
            }
            return Ok(None);
        }

        if chunk.is_single_module() {
            let Some((prod, test)) = single else {
                return Ok(None);
            };
            let passes = match test {
                Some(test) => vec![
                    OutputDirPair::new(prod, SourcesFilter::PRODUCTION),
                    OutputDirPair::new(test, SourcesFilter::TEST),
                ],
                None => vec![OutputDirPair::new(prod, SourcesFilter::ALL)],
            };
            return Ok(Some((passes, None)));
        }

        let staging = temp::create(&self.config.temp_root, "chunk").map_err(OrchestratorError::Staging)?;
        let pass = OutputDirPair::new(staging.path(), SourcesFilter::ALL);
        Ok(Some((vec![pass], Some(staging))))
    }

    /// Run one compiler invocation. Returns whether it reported an error.
    fn compile_pass(&mut self, chunk: &ModuleChunk, output_dir: &Path) -> Result<bool, OrchestratorError> {
        if chunk.files_to_compile().is_empty() {
            tracing::debug!(filter = ?chunk.filter(), "no files for pass");
            return Ok(false);
        }
        self.stats.passes += 1;
        let pass = Arc::new(PassState::new(Arc::clone(&self.context)));
        pass.set_chunk_label(&format!("Compiling {}...", chunk.display_name()));

        let result = self.run_compiler(chunk, output_dir, &pass).map(|compiled| {
            self.update_outputs(chunk, output_dir, &compiled, &pass);
        });
        pass.clear_chunk_label();

        let counters = pass.counters();
        for file in chunk.source_files() {
            if counters.files_with_errors.contains(&path_to_url(&file)) {
                self.state.files_with_errors.insert(file);
            }
        }
        tracing::debug!(
            errors = counters.errors,
            warnings = counters.warnings,
            classes = counters.classes_generated,
            "pass finished"
        );
        result.map(|()| counters.errors > 0)
    }

    /// Launch the compiler and wire the worker threads around it.
    fn run_compiler(
        &mut self,
        chunk: &ModuleChunk,
        output_dir: &Path,
        pass: &Arc<PassState>,
    ) -> Result<CompiledClasses, OrchestratorError> {
        let process = match self.backend.launch_process(chunk, output_dir, &*self.context) {
            Ok(process) => process,
            Err(source) => {
                pass.report(CompilerMessage::error(source.to_string()));
                return Err(self.launch_error(source));
            }
        };
        self.stats.processes_launched += 1;
        let handle = ProcessHandle::new(process);

        let class_parser = match ClassParsingThread::spawn(
            Arc::clone(&self.cache),
            self.config.class_queue_capacity,
            Arc::clone(pass),
        ) {
            Ok(thread) => thread,
            Err(e) => {
                handle.destroy();
                handle.wait_for(|| true);
                return Err(self.launch_error(LaunchError::Io(e)));
            }
        };

        let mut parsers = Vec::with_capacity(2);
        let streams = [
            (
                StreamKind::Stderr,
                self.backend.create_error_parser(output_dir),
                handle.take_stderr(),
            ),
            (
                StreamKind::Stdout,
                self.backend.create_output_parser(output_dir),
                handle.take_stdout(),
            ),
        ];
        for (kind, parser, stream) in streams {
            let Some(stream) = stream else {
                continue;
            };
            let Some(parser) = parser else {
                if let Err(e) = drain(kind, stream) {
                    tracing::warn!(stream = ?kind, error = %e, "cannot start output drain");
                }
                continue;
            };
            let spawned = LineReader::spawn(
                kind.thread_name(),
                stream,
                handle.termination_signal(),
                self.config.termination_grace,
            )
            .and_then(|reader| {
                StreamParserThread::spawn(
                    kind,
                    parser,
                    reader,
                    Arc::clone(&handle),
                    class_parser.sink(),
                    Arc::clone(pass),
                )
            });
            match spawned {
                Ok(thread) => parsers.push(thread),
                Err(e) => tracing::warn!(stream = ?kind, error = %e, "cannot start output parser"),
            }
        }

        let exit_code = handle.wait_for(|| pass.is_cancelled());
        tracing::debug!(exit_code, "compiler exited");

        let mut failures: Vec<WorkerError> = parsers.into_iter().filter_map(StreamParserThread::join).collect();
        class_parser.stop();
        let outcome = class_parser.join();
        self.stats.classes_parsed += outcome.classes_parsed;
        failures.extend(outcome.error);
        for failure in failures {
            self.translate_failure(&failure, pass);
        }

        if exit_code != 0 && !pass.is_cancelled() && pass.error_count() == 0 {
            pass.report(CompilerMessage::error(format!(
                "internal compiler error, exit code {exit_code}"
            )));
        }
        Ok(outcome.compiled)
    }

    fn launch_error(&self, source: LaunchError) -> OrchestratorError {
        OrchestratorError::Launch {
            backend: self.backend.id().to_string(),
            source,
        }
    }

    fn translate_failure(&mut self, failure: &WorkerError, pass: &PassState) {
        if failure.is_corruption() {
            self.request_rebuild(&failure.to_string());
        } else {
            pass.report(CompilerMessage::error(failure.to_string()));
        }
    }

    fn request_rebuild(&mut self, reason: &str) {
        if self.rebuild.request(reason) {
            tracing::warn!(reason, "dependency cache needs a full rebuild");
            self.context.request_rebuild(reason);
            self.cache.lock().request_rebuild_next_time(reason);
        }
    }

    /// Files depending on what this call compiled, in scope and not yet
    /// compiled. Also recorded for the recompile set.
    fn find_dependents(&mut self) -> Vec<PathBuf> {
        if self.state.successfully_compiled.is_empty() {
            return Vec::new();
        }
        let mut compiled: Vec<PathBuf> = self.state.successfully_compiled.iter().cloned().collect();
        compiled.sort();
        let found = self.cache.lock().find_dependent_files(&compiled);
        let found = match found {
            Ok(found) => found,
            Err(e) if e.is_corruption() => {
                self.request_rebuild(&e.to_string());
                return Vec::new();
            }
            Err(e) => {
                self.context.add_message(CompilerMessage::error(e.to_string()));
                return Vec::new();
            }
        };

        let dependents: Vec<PathBuf> = found
            .into_iter()
            .filter(|f| !self.state.successfully_compiled.contains(f))
            .filter(|f| self.context.is_in_scope(&path_to_url(f)))
            .filter(|f| self.state.dependents.insert(f.clone()))
            .collect();
        self.stats.dependents_found += dependents.len();
        dependents
    }

    /// Release temp dirs, persist the cache and notify the backend.
    fn finish(&mut self, cancelled: bool) {
        temp::delete_later(self.transform_dirs.drain(), self.config.async_cleanup);
        if !cancelled
            && (!self.state.successfully_compiled.is_empty() || !self.state.dependents.is_empty())
        {
            let updated = self.cache.lock().update();
            if let Err(e) = updated {
                if e.is_corruption() {
                    self.request_rebuild(&e.to_string());
                } else {
                    tracing::warn!(error = %e, "failed to persist dependency cache");
                    self.context.add_message(CompilerMessage::error(e.to_string()));
                }
            }
        }
        self.backend.process_terminated();
    }

    fn initial_and_dependents(&self) -> IndexSet<PathBuf> {
        self.files
            .iter()
            .chain(&self.state.dependents)
            .cloned()
            .collect()
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
