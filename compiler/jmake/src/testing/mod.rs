//! Test doubles for driving the orchestrator without a real compiler.
//!
//! - [`ScriptedProcess`] / [`ScriptedBackend`]: a "compiler" whose output
//!   and exit code are decided up front, usually by [`simulate_compile`]
//! - [`LineProtocolParser`]: parses the tiny line protocol those processes
//!   print (`[wrote <path>]`, `<file>:<line>: error: <text>`, ...)
//! - [`MemoryCache`]: an in-memory dependency cache over fake class files
//! - [`RecordingContext`]: a compile context that records everything
//! - [`ProjectBuilder`]: a real on-disk project under a temp directory

mod harness;
mod mocks;

pub use harness::{simulate_compile, ProjectBuilder, ERROR_MARKER};
pub use mocks::{
    write_class_file, BackendLog, CacheLog, Launch, LineProtocolParser, MemoryCache,
    RecordingContext, RecordingProgress, ScriptedBackend, ScriptedProcess,
};
