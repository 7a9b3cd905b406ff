use std::fs;
use std::io::{self, Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicIsize, AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam::channel::{self, Receiver, Sender};
use jmake_ir::{path_to_url, ClassId, CompilerMessage, MessageCategory, ModuleId, SourcesFilter};
use parking_lot::Mutex;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::backend::{BackendCompiler, OutputParser, ParserCallback};
use crate::cache::DependencyCache;
use crate::chunk::ModuleChunk;
use crate::context::{CompileContext, ProgressIndicator};
use crate::error::{CacheError, LaunchError};
use crate::process::CompilerProcess;

/// Exit code a [`ScriptedProcess`] reports after being killed.
const KILLED: i32 = 137;

/// A process with canned output.
///
/// An exited process keeps its exit code even when killed later. A hanging
/// process keeps its pipes open until it is killed, then reports
/// [`KILLED`].
#[derive(Debug)]
pub struct ScriptedProcess {
    stdout: Option<Vec<u8>>,
    stderr: Option<Vec<u8>>,
    exit_code: i32,
    hanging: bool,
    killed: Arc<AtomicBool>,
    /// Dropped on kill, which closes the pipes of a hanging process.
    alive: Option<Sender<()>>,
    pipes_closed: Receiver<()>,
}

impl ScriptedProcess {
    /// A process that has already exited with `exit_code`.
    pub fn exited(exit_code: i32) -> Self {
        let (alive, pipes_closed) = channel::bounded(0);
        ScriptedProcess {
            stdout: Some(Vec::new()),
            stderr: Some(Vec::new()),
            exit_code,
            hanging: false,
            killed: Arc::default(),
            alive: Some(alive),
            pipes_closed,
        }
    }

    /// A process that runs until killed.
    pub fn hanging() -> Self {
        ScriptedProcess {
            hanging: true,
            ..ScriptedProcess::exited(0)
        }
    }

    #[must_use]
    pub fn with_stdout_lines<S: AsRef<str>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.stdout = Some(join_lines(lines));
        self
    }

    #[must_use]
    pub fn with_stderr_lines<S: AsRef<str>>(mut self, lines: impl IntoIterator<Item = S>) -> Self {
        self.stderr = Some(join_lines(lines));
        self
    }

    /// Flag set once the process is killed.
    pub fn killed_flag(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.killed)
    }

    fn pipe(&self, bytes: Vec<u8>) -> Box<dyn Read + Send> {
        if self.hanging {
            Box::new(OpenPipe {
                data: Cursor::new(bytes),
                closed: self.pipes_closed.clone(),
            })
        } else {
            Box::new(Cursor::new(bytes))
        }
    }
}

fn join_lines<S: AsRef<str>>(lines: impl IntoIterator<Item = S>) -> Vec<u8> {
    let mut out = String::new();
    for line in lines {
        out.push_str(line.as_ref());
        out.push('\n');
    }
    out.into_bytes()
}

/// Pipe of a running process: canned bytes, then blocks until the process
/// is killed.
struct OpenPipe {
    data: Cursor<Vec<u8>>,
    closed: Receiver<()>,
}

impl Read for OpenPipe {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.data.read(buf)?;
        if n == 0 && !buf.is_empty() {
            // Nothing is ever sent; this returns once the sender is dropped.
            self.closed.recv().ok();
        }
        Ok(n)
    }
}

impl CompilerProcess for ScriptedProcess {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        let bytes = self.stdout.take()?;
        Some(self.pipe(bytes))
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        let bytes = self.stderr.take()?;
        Some(self.pipe(bytes))
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        if !self.hanging {
            Ok(Some(self.exit_code))
        } else if self.killed.load(Ordering::SeqCst) {
            Ok(Some(KILLED))
        } else {
            Ok(None)
        }
    }

    fn kill(&mut self) -> io::Result<()> {
        self.killed.store(true, Ordering::SeqCst);
        self.alive.take();
        Ok(())
    }
}

/// Parser for the scripted line protocol.
///
/// | line                             | callback                      |
/// |----------------------------------|-------------------------------|
/// | `[wrote <path>]`                 | `file_generated`              |
/// | `[processed <path>]`             | `file_processed`              |
/// | `[progress <text>]`              | `set_progress_text`           |
/// | `<file>:<line>: error: <text>`   | error message at file/line    |
/// | `<file>:<line>: warning: <text>` | warning message at file/line  |
/// | anything else, non-empty         | information message           |
#[derive(Clone, Copy, Debug, Default)]
pub struct LineProtocolParser;

impl OutputParser for LineProtocolParser {
    fn process_message_line(&mut self, callback: &mut dyn ParserCallback) -> bool {
        let Some(line) = callback.next_line() else {
            return false;
        };
        if let Some(path) = bracketed(&line, "wrote") {
            callback.file_generated(PathBuf::from(path));
        } else if let Some(path) = bracketed(&line, "processed") {
            callback.file_processed(Path::new(path));
        } else if let Some(text) = bracketed(&line, "progress") {
            callback.set_progress_text(text);
        } else if let Some(message) = parse_diagnostic(&line) {
            callback.message(message);
        } else if !line.is_empty() {
            callback.message(CompilerMessage::new(MessageCategory::Information, line));
        }
        true
    }
}

fn bracketed<'a>(line: &'a str, tag: &str) -> Option<&'a str> {
    line.strip_prefix('[')?
        .strip_prefix(tag)?
        .strip_prefix(' ')?
        .strip_suffix(']')
}

fn parse_diagnostic(line: &str) -> Option<CompilerMessage> {
    let (location, category, text) = [
        (": error: ", MessageCategory::Error),
        (": warning: ", MessageCategory::Warning),
    ]
    .into_iter()
    .find_map(|(marker, category)| {
        line.split_once(marker)
            .map(|(location, text)| (location, category, text))
    })?;
    let (file, line_no) = location.rsplit_once(':')?;
    let line_no = line_no.parse().ok()?;
    Some(CompilerMessage::new(category, text).at(path_to_url(Path::new(file)), Some(line_no), None))
}

/// One recorded launch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Launch {
    pub modules: Vec<ModuleId>,
    pub files: Vec<PathBuf>,
    pub output_dir: PathBuf,
    pub filter: SourcesFilter,
}

/// What a [`ScriptedBackend`] saw.
#[derive(Debug, Default)]
pub struct BackendLog {
    launches: Mutex<Vec<Launch>>,
    terminated: AtomicUsize,
}

impl BackendLog {
    pub fn launches(&self) -> Vec<Launch> {
        self.launches.lock().clone()
    }

    /// Number of `process_terminated` calls.
    pub fn terminated(&self) -> usize {
        self.terminated.load(Ordering::SeqCst)
    }
}

type LaunchFn = dyn Fn(&ModuleChunk, &Path) -> Result<ScriptedProcess, LaunchError> + Send + Sync;

/// Backend that records launches and runs a closure instead of a compiler.
pub struct ScriptedBackend {
    launch: Box<LaunchFn>,
    available: bool,
    parsers: bool,
    log: Arc<BackendLog>,
}

impl ScriptedBackend {
    pub fn new(
        launch: impl Fn(&ModuleChunk, &Path) -> Result<ScriptedProcess, LaunchError> + Send + Sync + 'static,
    ) -> Self {
        ScriptedBackend {
            launch: Box::new(launch),
            available: true,
            parsers: true,
            log: Arc::new(BackendLog::default()),
        }
    }

    /// Backend driven by [`crate::testing::simulate_compile`].
    pub fn simulated() -> Self {
        Self::new(|chunk, output_dir| Ok(super::simulate_compile(chunk, output_dir)?))
    }

    /// Make `check_compiler` fail.
    #[must_use]
    pub fn unavailable(mut self) -> Self {
        self.available = false;
        self
    }

    /// Supply no output parsers.
    #[must_use]
    pub fn without_parsers(mut self) -> Self {
        self.parsers = false;
        self
    }

    pub fn log(&self) -> Arc<BackendLog> {
        Arc::clone(&self.log)
    }

    fn parser(&self) -> Option<Box<dyn OutputParser>> {
        self.parsers
            .then(|| Box::new(LineProtocolParser) as Box<dyn OutputParser>)
    }
}

impl BackendCompiler for ScriptedBackend {
    fn id(&self) -> &str {
        "scripted"
    }

    fn check_compiler(&self, _chunks: &[ModuleChunk]) -> bool {
        self.available
    }

    fn create_error_parser(&self, _output_dir: &Path) -> Option<Box<dyn OutputParser>> {
        self.parser()
    }

    fn create_output_parser(&self, _output_dir: &Path) -> Option<Box<dyn OutputParser>> {
        self.parser()
    }

    fn launch_process(
        &self,
        chunk: &ModuleChunk,
        output_dir: &Path,
        _context: &dyn CompileContext,
    ) -> Result<Box<dyn CompilerProcess>, LaunchError> {
        self.log.launches.lock().push(Launch {
            modules: chunk.modules().to_vec(),
            files: chunk.files_to_compile(),
            output_dir: output_dir.to_path_buf(),
            filter: chunk.filter(),
        });
        let process = (self.launch)(chunk, output_dir)?;
        Ok(Box::new(process))
    }

    fn process_terminated(&self) {
        self.log.terminated.fetch_add(1, Ordering::SeqCst);
    }
}

/// Write a fake class file understood by [`MemoryCache`].
pub fn write_class_file(path: &Path, qualified_name: &str, source_file_name: &str) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, format!("class {qualified_name}\nsource {source_file_name}\n"))
}

/// What a [`MemoryCache`] saw.
#[derive(Debug, Default)]
pub struct CacheLog {
    parsed: Mutex<Vec<PathBuf>>,
    queries: Mutex<Vec<Vec<PathBuf>>>,
    updates: AtomicUsize,
    rebuild_reasons: Mutex<Vec<String>>,
}

impl CacheLog {
    /// Class files passed to `reparse_class_file`, in order.
    pub fn parsed(&self) -> Vec<PathBuf> {
        self.parsed.lock().clone()
    }

    /// Arguments of every `find_dependent_files` call.
    pub fn dependency_queries(&self) -> Vec<Vec<PathBuf>> {
        self.queries.lock().clone()
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn rebuild_reasons(&self) -> Vec<String> {
        self.rebuild_reasons.lock().clone()
    }
}

#[derive(Debug)]
struct ClassRecord {
    qualified_name: String,
    source_file_name: Option<String>,
    class_file: PathBuf,
}

/// In-memory dependency cache over files written by [`write_class_file`].
#[derive(Debug, Default)]
pub struct MemoryCache {
    classes: Vec<ClassRecord>,
    dependents: FxHashMap<PathBuf, Vec<PathBuf>>,
    corrupt_on: FxHashSet<String>,
    corrupt_queries: bool,
    log: Arc<CacheLog>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare that `dependents` use classes compiled from `source`.
    #[must_use]
    pub fn with_dependents(mut self, source: PathBuf, dependents: impl IntoIterator<Item = PathBuf>) -> Self {
        self.dependents.entry(source).or_default().extend(dependents);
        self
    }

    /// Report corruption when reparsing a class file with this file name.
    #[must_use]
    pub fn corrupt_on(mut self, class_file_name: &str) -> Self {
        self.corrupt_on.insert(class_file_name.to_string());
        self
    }

    /// Report corruption from `find_dependent_files`.
    #[must_use]
    pub fn with_corrupt_queries(mut self) -> Self {
        self.corrupt_queries = true;
        self
    }

    pub fn log(&self) -> Arc<CacheLog> {
        Arc::clone(&self.log)
    }

    fn record(&self, id: ClassId) -> Option<&ClassRecord> {
        self.classes.get(id.raw() as usize)
    }
}

impl DependencyCache for MemoryCache {
    #[expect(
        clippy::cast_possible_truncation,
        reason = "tests never register u32::MAX classes"
    )]
    fn reparse_class_file(&mut self, class_file: &Path) -> Result<ClassId, CacheError> {
        self.log.parsed.lock().push(class_file.to_path_buf());
        let file_name = class_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if self.corrupt_on.contains(&file_name) {
            return Err(CacheError::Corrupted(format!("index broken while reading {file_name}")));
        }
        let malformed = |reason: String| CacheError::Malformed {
            path: class_file.to_path_buf(),
            reason,
        };
        let text = fs::read_to_string(class_file).map_err(|e| malformed(e.to_string()))?;
        let mut qualified_name = None;
        let mut source_file_name = None;
        for line in text.lines() {
            if let Some(name) = line.strip_prefix("class ") {
                qualified_name = Some(name.trim().to_string());
            } else if let Some(name) = line.strip_prefix("source ") {
                source_file_name = Some(name.trim().to_string());
            }
        }
        let qualified_name = qualified_name.ok_or_else(|| malformed("bad magic number".into()))?;
        self.classes.push(ClassRecord {
            qualified_name,
            source_file_name,
            class_file: class_file.to_path_buf(),
        });
        Ok(ClassId::new((self.classes.len() - 1) as u32))
    }

    fn resolve(&self, id: ClassId) -> Option<String> {
        self.record(id).map(|r| r.qualified_name.clone())
    }

    fn source_file_name(&self, id: ClassId) -> Option<String> {
        self.record(id).and_then(|r| r.source_file_name.clone())
    }

    fn class_path(&self, id: ClassId) -> Option<PathBuf> {
        self.record(id).map(|r| r.class_file.clone())
    }

    fn find_dependent_files(&mut self, compiled: &[PathBuf]) -> Result<Vec<PathBuf>, CacheError> {
        self.log.queries.lock().push(compiled.to_vec());
        if self.corrupt_queries {
            return Err(CacheError::Corrupted("dependency index unreadable".into()));
        }
        let mut seen = FxHashSet::default();
        Ok(compiled
            .iter()
            .filter_map(|source| self.dependents.get(source))
            .flatten()
            .filter(|dependent| seen.insert((*dependent).clone()))
            .cloned()
            .collect())
    }

    fn update(&mut self) -> Result<(), CacheError> {
        self.log.updates.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn request_rebuild_next_time(&mut self, reason: &str) {
        self.log.rebuild_reasons.lock().push(reason.to_string());
    }
}

/// Progress indicator that records labels and can be cancelled.
#[derive(Debug, Default)]
pub struct RecordingProgress {
    cancelled: AtomicBool,
    depth: AtomicIsize,
    texts: Mutex<Vec<String>>,
    texts2: Mutex<Vec<String>>,
}

impl RecordingProgress {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Current push/pop nesting.
    pub fn depth(&self) -> isize {
        self.depth.load(Ordering::SeqCst)
    }

    /// Every value `set_text` received.
    pub fn texts(&self) -> Vec<String> {
        self.texts.lock().clone()
    }

    /// Every value `set_text2` received.
    pub fn texts2(&self) -> Vec<String> {
        self.texts2.lock().clone()
    }
}

impl ProgressIndicator for RecordingProgress {
    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    fn push_state(&self) {
        self.depth.fetch_add(1, Ordering::SeqCst);
    }

    fn pop_state(&self) {
        self.depth.fetch_sub(1, Ordering::SeqCst);
    }

    fn set_text(&self, text: &str) {
        self.texts.lock().push(text.to_string());
    }

    fn set_text2(&self, text: &str) {
        self.texts2.lock().push(text.to_string());
    }
}

/// Compile context that keeps every message.
#[derive(Debug, Default)]
pub struct RecordingContext {
    messages: Mutex<Vec<CompilerMessage>>,
    progress: RecordingProgress,
    /// `None` puts every file in scope.
    scope: Option<FxHashSet<String>>,
    rebuild_reasons: Mutex<Vec<String>>,
}

impl RecordingContext {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Restrict the compile scope to `files`.
    pub fn with_scope<'a>(files: impl IntoIterator<Item = &'a Path>) -> Arc<Self> {
        Arc::new(RecordingContext {
            scope: Some(files.into_iter().map(path_to_url).collect()),
            ..Self::default()
        })
    }

    pub fn progress_log(&self) -> &RecordingProgress {
        &self.progress
    }

    pub fn cancel(&self) {
        self.progress.cancel();
    }

    pub fn messages(&self) -> Vec<CompilerMessage> {
        self.messages.lock().clone()
    }

    pub fn errors(&self) -> Vec<CompilerMessage> {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.is_error())
            .cloned()
            .collect()
    }

    pub fn rebuild_reasons(&self) -> Vec<String> {
        self.rebuild_reasons.lock().clone()
    }
}

impl CompileContext for RecordingContext {
    fn add_message(&self, message: CompilerMessage) {
        self.messages.lock().push(message);
    }

    fn message_count(&self, category: MessageCategory) -> usize {
        self.messages
            .lock()
            .iter()
            .filter(|m| m.category == category)
            .count()
    }

    fn progress(&self) -> &dyn ProgressIndicator {
        &self.progress
    }

    fn is_in_scope(&self, url: &str) -> bool {
        self.scope.as_ref().map_or(true, |scope| scope.contains(url))
    }

    fn request_rebuild(&self, reason: &str) {
        self.rebuild_reasons.lock().push(reason.to_string());
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

    struct Lines(Vec<String>, Vec<CompilerMessage>, Vec<PathBuf>, usize);

    impl ParserCallback for Lines {
        fn next_line(&mut self) -> Option<String> {
            let line = self.0.get(self.3).cloned();
            self.3 += 1;
            line
        }

        fn current_line(&self) -> Option<&str> {
            self.3.checked_sub(1).and_then(|i| self.0.get(i)).map(String::as_str)
        }

        fn file_generated(&mut self, class_file: PathBuf) {
            self.2.push(class_file);
        }

        fn file_processed(&mut self, _source: &Path) {}

        fn message(&mut self, message: CompilerMessage) {
            self.1.push(message);
        }

        fn set_progress_text(&mut self, _text: &str) {}
    }

    #[test]
    fn test_line_protocol() {
        let mut callback = Lines(
            vec![
                "[wrote /out/A.class]".into(),
                "/src/A.java:12: error: cannot find symbol".into(),
                "/src/B.java:3: warning: unchecked".into(),
                "1 error".into(),
            ],
            Vec::new(),
            Vec::new(),
            0,
        );
        let mut parser = LineProtocolParser;
        while parser.process_message_line(&mut callback) {}

        assert_eq!(callback.2, vec![PathBuf::from("/out/A.class")]);
        let messages = callback.1;
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0].category, MessageCategory::Error);
        assert_eq!(messages[0].url.as_deref(), Some("file:///src/A.java"));
        assert_eq!(messages[0].line, Some(12));
        assert_eq!(messages[0].text, "cannot find symbol");
        assert_eq!(messages[1].category, MessageCategory::Warning);
        assert_eq!(messages[2].category, MessageCategory::Information);
    }

    #[test]
    fn test_exited_process_keeps_status_after_kill() {
        let mut process = ScriptedProcess::exited(0);
        process.kill().unwrap();
        assert_eq!(process.try_wait().unwrap(), Some(0));
        assert!(process.killed_flag().load(Ordering::SeqCst));
    }

    #[test]
    fn test_hanging_process_pipes_close_on_kill() {
        let mut process = ScriptedProcess::hanging().with_stdout_lines(["hello"]);
        let mut stdout = process.take_stdout().unwrap();
        let reader = std::thread::spawn(move || {
            let mut text = String::new();
            stdout.read_to_string(&mut text).map(|_| text)
        });
        std::thread::sleep(std::time::Duration::from_millis(30));
        assert!(!reader.is_finished(), "pipe stays open while the process runs");
        assert_eq!(process.try_wait().unwrap(), None);

        process.kill().unwrap();
        assert_eq!(reader.join().unwrap().unwrap(), "hello\n");
        assert_eq!(process.try_wait().unwrap(), Some(KILLED));
    }

    #[test]
    fn test_memory_cache_reads_fake_class_files() {
        let dir = tempfile::tempdir().unwrap();
        let class = dir.path().join("com/acme/Foo$Inner.class");
        write_class_file(&class, "com.acme.Foo$Inner", "Foo.java").unwrap();

        let mut cache = MemoryCache::new();
        let id = cache.reparse_class_file(&class).unwrap();
        assert_eq!(cache.resolve(id).as_deref(), Some("com.acme.Foo$Inner"));
        assert_eq!(cache.source_file_name(id).as_deref(), Some("Foo.java"));
        assert_eq!(cache.class_path(id), Some(class));

        let junk = dir.path().join("Junk.class");
        fs::write(&junk, "\u{0}\u{1}").unwrap();
        assert!(matches!(
            cache.reparse_class_file(&junk),
            Err(CacheError::Malformed { .. })
        ));
    }
}
