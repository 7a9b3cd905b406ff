//! Shared state of one compile pass.
//!
//! The stderr and stdout parser threads, the class-parser thread and the
//! orchestrator all report into the same compile context. Every mutation of
//! the context during a pass goes through [`PassState`], under one lock, so
//! the host never sees interleaved updates and the counters stay exact.

use std::path::Path;
use std::sync::Arc;

use jmake_ir::{CompilerMessage, MessageCategory};
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::context::CompileContext;

/// Counters of one pass.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PassCounters {
    pub errors: usize,
    pub warnings: usize,
    pub classes_generated: usize,
    pub files_processed: usize,
    /// URLs of files that got at least one error message.
    pub files_with_errors: FxHashSet<String>,
}

pub struct PassState {
    context: Arc<dyn CompileContext>,
    counters: Mutex<PassCounters>,
}

impl PassState {
    pub fn new(context: Arc<dyn CompileContext>) -> Self {
        PassState {
            context,
            counters: Mutex::new(PassCounters::default()),
        }
    }

    pub fn context(&self) -> &dyn CompileContext {
        &*self.context
    }

    /// Route a message to the context.
    pub fn report(&self, message: CompilerMessage) {
        let mut counters = self.counters.lock();
        match message.category {
            MessageCategory::Error => {
                counters.errors += 1;
                if let Some(url) = &message.url {
                    counters.files_with_errors.insert(url.clone());
                }
            }
            MessageCategory::Warning => counters.warnings += 1,
            MessageCategory::Information | MessageCategory::Statistics => {}
        }
        self.context.add_message(message);
    }

    /// A class file was handed to the class parser.
    pub fn class_generated(&self, class_file: &Path) {
        let mut counters = self.counters.lock();
        counters.classes_generated += 1;
        tracing::trace!(path = %class_file.display(), "class generated");
        self.context
            .progress()
            .set_text2(&format!("Parsing classes... ({})", counters.classes_generated));
    }

    pub fn file_processed(&self, source: &Path) {
        let mut counters = self.counters.lock();
        counters.files_processed += 1;
        tracing::trace!(path = %source.display(), "source processed");
    }

    pub fn set_progress_text(&self, text: &str) {
        let _guard = self.counters.lock();
        self.context.progress().set_text2(text);
    }

    pub fn set_chunk_label(&self, label: &str) {
        let _guard = self.counters.lock();
        self.context.progress().set_text(label);
    }

    pub fn clear_chunk_label(&self) {
        let _guard = self.counters.lock();
        self.context.progress().set_text("");
        self.context.progress().set_text2("");
    }

    pub fn is_cancelled(&self) -> bool {
        self.context.progress().is_cancelled()
    }

    pub fn error_count(&self) -> usize {
        self.counters.lock().errors
    }

    pub fn counters(&self) -> PassCounters {
        self.counters.lock().clone()
    }
}
