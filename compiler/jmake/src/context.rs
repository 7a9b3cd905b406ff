//! The host side of a compile call: message sink, progress and scope.

use jmake_ir::{CompilerMessage, MessageCategory};

/// Progress reporting and cancellation.
pub trait ProgressIndicator: Send + Sync {
    /// Whether the user asked to stop. Checked cooperatively.
    fn is_cancelled(&self) -> bool;

    fn push_state(&self);

    fn pop_state(&self);

    /// Main progress label.
    fn set_text(&self, text: &str);

    /// Secondary progress label.
    fn set_text2(&self, text: &str);
}

/// Everything the orchestrator reports to or asks of its host.
///
/// Shared by several worker threads; the orchestrator serializes all calls
/// that happen while a compile pass runs.
pub trait CompileContext: Send + Sync {
    fn add_message(&self, message: CompilerMessage);

    fn message_count(&self, category: MessageCategory) -> usize;

    fn progress(&self) -> &dyn ProgressIndicator;

    /// Whether the file at `url` belongs to the current compile scope.
    fn is_in_scope(&self, url: &str) -> bool;

    /// Ask the host to run a full rebuild next time.
    fn request_rebuild(&self, reason: &str);
}
