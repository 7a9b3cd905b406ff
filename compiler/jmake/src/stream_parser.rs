//! Stream-parser threads: one per compiler output stream.

use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use jmake_ir::CompilerMessage;

use crate::backend::{OutputParser, ParserCallback};
use crate::class_parser::ClassSink;
use crate::error::{CacheError, WorkerError};
use crate::line_reader::LineReader;
use crate::pass::PassState;
use crate::process::{DestroyOnDrop, ProcessHandle};

/// Which compiler stream a thread reads.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StreamKind {
    Stdout,
    Stderr,
}

impl StreamKind {
    pub fn thread_name(self) -> &'static str {
        match self {
            StreamKind::Stdout => "jmake-stdout",
            StreamKind::Stderr => "jmake-stderr",
        }
    }
}

/// Read a stream nobody parses to its end and discard it, so the compiler
/// neither blocks on a full pipe nor sees it closed early.
pub fn drain(kind: StreamKind, stream: Box<dyn Read + Send>) -> io::Result<JoinHandle<u64>> {
    thread::Builder::new()
        .name(format!("{}-drain", kind.thread_name()))
        .spawn(move || {
            let mut stream = stream;
            match io::copy(&mut stream, &mut io::sink()) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::debug!(stream = ?kind, error = %e, "draining compiler output failed");
                    0
                }
            }
        })
}

/// A one-element buffer in front of the class parser.
///
/// Compilers announce a class file before they finish writing it, so a path
/// is only handed on once the next one arrives or the stream ends.
#[derive(Debug)]
pub struct PendingSlot<T> {
    slot: Option<T>,
}

impl<T> Default for PendingSlot<T> {
    fn default() -> Self {
        PendingSlot { slot: None }
    }
}

impl<T> PendingSlot<T> {
    /// Store `value`, returning the previously pending one.
    pub fn replace(&mut self, value: T) -> Option<T> {
        self.slot.replace(value)
    }

    /// Take the pending value.
    pub fn flush(&mut self) -> Option<T> {
        self.slot.take()
    }

    pub fn is_empty(&self) -> bool {
        self.slot.is_none()
    }
}

pub struct StreamParserThread {
    kind: StreamKind,
    handle: JoinHandle<Option<CacheError>>,
}

impl StreamParserThread {
    /// Start parsing `reader` with `parser` on a named thread.
    pub fn spawn(
        kind: StreamKind,
        parser: Box<dyn OutputParser>,
        reader: LineReader,
        process: Arc<ProcessHandle>,
        classes: ClassSink,
        pass: Arc<PassState>,
    ) -> io::Result<Self> {
        let handle = thread::Builder::new()
            .name(kind.thread_name().into())
            .spawn(move || {
                let _destroy = DestroyOnDrop(process);
                parse_stream(parser, reader, &classes, &pass)
            })?;
        Ok(StreamParserThread { kind, handle })
    }

    /// Wait for the thread and return the error it recorded, if any.
    pub fn join(self) -> Option<WorkerError> {
        match self.handle.join() {
            Ok(error) => error.map(WorkerError::from),
            Err(_) => Some(WorkerError::Panicked(self.kind.thread_name().into())),
        }
    }
}

/// Drive `parser` until it is done, the pass is cancelled or forwarding
/// a class file fails.
pub fn parse_stream(
    mut parser: Box<dyn OutputParser>,
    reader: LineReader,
    classes: &ClassSink,
    pass: &PassState,
) -> Option<CacheError> {
    let mut callback = StreamCallback {
        reader,
        current: None,
        pending: PendingSlot::default(),
        classes,
        pass,
        error: None,
    };
    while parser.process_message_line(&mut callback) {
        if callback.error.is_some() || pass.is_cancelled() {
            break;
        }
    }
    if let Some(last) = callback.pending.flush() {
        callback.forward(last);
    }
    callback.error
}

struct StreamCallback<'a> {
    reader: LineReader,
    current: Option<String>,
    pending: PendingSlot<PathBuf>,
    classes: &'a ClassSink,
    pass: &'a PassState,
    error: Option<CacheError>,
}

impl StreamCallback<'_> {
    fn forward(&mut self, class_file: PathBuf) {
        if self.error.is_some() {
            return;
        }
        self.pass.class_generated(&class_file);
        if let Err(error) = self.classes.add_path(class_file) {
            self.error = Some(error);
        }
    }
}

impl ParserCallback for StreamCallback<'_> {
    fn next_line(&mut self) -> Option<String> {
        self.current = self.reader.next_line().map(|line| line.trim().to_string());
        self.current.clone()
    }

    fn current_line(&self) -> Option<&str> {
        self.current.as_deref()
    }

    fn file_generated(&mut self, class_file: PathBuf) {
        if let Some(previous) = self.pending.replace(class_file) {
            self.forward(previous);
        }
    }

    fn file_processed(&mut self, source: &Path) {
        self.pass.file_processed(source);
    }

    fn message(&mut self, message: CompilerMessage) {
        self.pass.report(message);
    }

    fn set_progress_text(&mut self, text: &str) {
        self.pass.set_progress_text(text);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
