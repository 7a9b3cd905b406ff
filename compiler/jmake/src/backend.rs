//! Pluggable compiler backends and their output parsers.

use std::path::{Path, PathBuf};

use jmake_ir::CompilerMessage;

use crate::chunk::ModuleChunk;
use crate::context::CompileContext;
use crate::error::LaunchError;
use crate::process::CompilerProcess;

/// Services a parser can use while consuming one output stream.
pub trait ParserCallback {
    /// Next output line, trimmed, or `None` at end of stream.
    fn next_line(&mut self) -> Option<String>;

    /// The line most recently returned by [`ParserCallback::next_line`].
    fn current_line(&self) -> Option<&str>;

    /// The compiler wrote a class file.
    fn file_generated(&mut self, class_file: PathBuf);

    /// The compiler finished with a source file.
    fn file_processed(&mut self, source: &Path);

    fn message(&mut self, message: CompilerMessage);

    fn set_progress_text(&mut self, text: &str);
}

/// Interprets a compiler's line protocol.
pub trait OutputParser: Send {
    /// Consume one logical message, pulling as many lines as it needs.
    ///
    /// Returns `false` once there is nothing more to parse.
    fn process_message_line(&mut self, callback: &mut dyn ParserCallback) -> bool;
}

/// An external compiler.
pub trait BackendCompiler: Send + Sync {
    /// Short backend name used in messages and logs.
    fn id(&self) -> &str;

    /// Whether the compiler can run at all for these chunks. Called once per
    /// call, before anything is compiled.
    fn check_compiler(&self, _chunks: &[ModuleChunk]) -> bool {
        true
    }

    /// Parser for stderr. `None` leaves stderr unread.
    fn create_error_parser(&self, output_dir: &Path) -> Option<Box<dyn OutputParser>>;

    /// Parser for stdout. `None` leaves stdout unread.
    fn create_output_parser(&self, output_dir: &Path) -> Option<Box<dyn OutputParser>>;

    /// Start compiling `chunk.files_to_compile()` into `output_dir`.
    fn launch_process(
        &self,
        chunk: &ModuleChunk,
        output_dir: &Path,
        context: &dyn CompileContext,
    ) -> Result<Box<dyn CompilerProcess>, LaunchError>;

    /// Called once at the end of every call, whatever the outcome.
    fn process_terminated(&self) {}
}
