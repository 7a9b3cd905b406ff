//! The class-parser thread.
//!
//! Stream parsers learn about generated class files long before the
//! orchestrator gets to them. They hand the paths to this thread through a
//! bounded queue; it registers each class with the dependency cache and
//! builds the per-pass map of compiled classes keyed by source file name.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{self, Receiver, Sender};
use jmake_ir::{path_to_url, CompiledClass, CompilerMessage};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::cache::{self, SharedCache};
use crate::error::{CacheError, WorkerError};
use crate::pass::PassState;

/// Compiled classes of one pass, keyed by bare source file name (`Foo.java`).
pub type CompiledClasses = FxHashMap<String, Vec<CompiledClass>>;

/// Queue element.
#[derive(Debug)]
pub enum ClassQueueItem {
    Work(PathBuf),
    Stop,
}

/// Producer side of the class queue. Cheap to clone.
#[derive(Clone)]
pub struct ClassSink {
    tx: Sender<ClassQueueItem>,
    failure: Arc<Mutex<Option<CacheError>>>,
}

impl ClassSink {
    /// Queue a class file, blocking while the queue is full.
    ///
    /// Fails with the recorded error once the consumer has failed, and
    /// whenever the consumer is gone.
    pub fn add_path(&self, class_file: PathBuf) -> Result<(), CacheError> {
        if let Some(error) = self.failure.lock().clone() {
            return Err(error);
        }
        if self.tx.send(ClassQueueItem::Work(class_file)).is_err() {
            let error = self.failure.lock().clone();
            return Err(error.unwrap_or_else(|| CacheError::Io("class parser has stopped".into())));
        }
        Ok(())
    }
}

/// What the class-parser thread produced.
#[derive(Debug, Default)]
pub struct ClassParseOutcome {
    pub compiled: CompiledClasses,
    pub classes_parsed: usize,
    pub error: Option<WorkerError>,
}

pub struct ClassParsingThread {
    sink: ClassSink,
    handle: JoinHandle<ClassParseOutcome>,
}

impl ClassParsingThread {
    pub fn spawn(cache: SharedCache, capacity: usize, pass: Arc<PassState>) -> io::Result<Self> {
        let (tx, rx) = channel::bounded(capacity.max(1));
        let failure = Arc::new(Mutex::new(None));
        let handle = {
            let failure = Arc::clone(&failure);
            thread::Builder::new()
                .name("jmake-class-parser".into())
                .spawn(move || run(&rx, &cache, &pass, &failure))?
        };
        Ok(ClassParsingThread {
            sink: ClassSink { tx, failure },
            handle,
        })
    }

    pub fn sink(&self) -> ClassSink {
        self.sink.clone()
    }

    pub fn add_path(&self, class_file: PathBuf) -> Result<(), CacheError> {
        self.sink.add_path(class_file)
    }

    /// Ask the thread to finish after the queued work.
    pub fn stop(&self) {
        // Fails only when the thread already exited.
        let _ = self.sink.tx.send(ClassQueueItem::Stop);
    }

    /// Wait for the thread. Call [`ClassParsingThread::stop`] first.
    pub fn join(self) -> ClassParseOutcome {
        match self.handle.join() {
            Ok(outcome) => outcome,
            Err(_) => ClassParseOutcome {
                error: Some(WorkerError::Panicked("class parser".into())),
                ..ClassParseOutcome::default()
            },
        }
    }
}

fn run(
    rx: &Receiver<ClassQueueItem>,
    cache: &SharedCache,
    pass: &PassState,
    failure: &Mutex<Option<CacheError>>,
) -> ClassParseOutcome {
    let mut outcome = ClassParseOutcome::default();
    for item in rx {
        let class_file = match item {
            ClassQueueItem::Stop => break,
            ClassQueueItem::Work(path) => path,
        };
        match parse_class(cache, &class_file) {
            Ok(class) => {
                outcome
                    .compiled
                    .entry(class.source_file_name().to_string())
                    .or_default()
                    .push(class);
                outcome.classes_parsed += 1;
            }
            Err(error @ CacheError::Malformed { .. }) => {
                tracing::debug!(path = %class_file.display(), %error, "skipping class file");
                pass.report(CompilerMessage::error(error.to_string()).at(path_to_url(&class_file), None, None));
            }
            Err(error) => {
                tracing::warn!(path = %class_file.display(), %error, "class parser aborted");
                *failure.lock() = Some(error.clone());
                outcome.error = Some(error.into());
                break;
            }
        }
    }
    tracing::debug!(classes = outcome.classes_parsed, "class parser finished");
    outcome
}

fn parse_class(cache: &SharedCache, class_file: &Path) -> Result<CompiledClass, CacheError> {
    let mut cache = cache.lock();
    let id = cache.reparse_class_file(class_file)?;
    let malformed = |reason: &str| CacheError::Malformed {
        path: class_file.to_path_buf(),
        reason: reason.to_string(),
    };
    let qualified = cache.resolve(id).ok_or_else(|| malformed("class name not resolvable"))?;
    let source = cache
        .source_file_name(id)
        .ok_or_else(|| malformed("no source file attribute"))?;
    let path = cache.class_path(id).unwrap_or_else(|| class_file.to_path_buf());
    Ok(CompiledClass::new(
        id,
        cache::relative_source_path(&qualified, &source),
        path,
    ))
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
