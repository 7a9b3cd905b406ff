//! jmake - incremental external-compiler orchestration
//!
//! Drives an external Java compiler across interdependent modules: groups
//! changed sources into module chunks, runs the compiler per chunk, parses
//! its output concurrently, registers generated classes with a dependency
//! cache, moves class files to their output directories and reports which
//! sources still need compiling.
//!
//! The host plugs in through [`BackendCompiler`], [`DependencyCache`],
//! [`CompileContext`] and optionally [`SourceTransformer`]; [`Orchestrator`]
//! runs one call.
//!
//! # Debug Environment Variables
//!
//! - `RUST_LOG=jmake=debug`: per-pass and per-file tracing. Needs
//!   [`init_tracing`] (or the host's own subscriber).
//! - `JMAKE_CLASS_QUEUE_CAPACITY`, `JMAKE_TERMINATION_GRACE_MS`,
//!   `JMAKE_TEMP_DIR`: see [`OrchestratorConfig::from_env`].

pub mod backend;
pub mod cache;
pub mod chunk;
pub mod chunk_graph;
pub mod class_parser;
mod config;
pub mod context;
mod error;
pub mod line_reader;
mod orchestrator;
pub mod pass;
pub mod process;
pub mod relocate;
mod stats;
pub mod stream_parser;
pub mod temp;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod transform;

use std::sync::Once;

pub use backend::{BackendCompiler, OutputParser, ParserCallback};
pub use cache::{DependencyCache, SharedCache};
pub use chunk::{ModuleChunk, SharedProject};
pub use config::{OrchestratorConfig, DEFAULT_CLASS_QUEUE_CAPACITY, DEFAULT_TERMINATION_GRACE};
pub use context::{CompileContext, ProgressIndicator};
pub use error::{CacheError, LaunchError, OrchestratorError, WorkerError};
pub use orchestrator::Orchestrator;
pub use process::{ChildProcess, CompilerProcess, ProcessHandle};
pub use relocate::Relocation;
pub use stats::CompileStats;
pub use transform::SourceTransformer;

pub use jmake_ir as ir;

static TRACING_INIT: Once = Once::new();

/// Install a `tracing` subscriber when `RUST_LOG` is set.
///
/// Safe to call more than once. Library code never calls this itself.
pub fn init_tracing() {
    TRACING_INIT.call_once(|| {
        use tracing_subscriber::{fmt, prelude::*, EnvFilter};

        // Only initialize if RUST_LOG is set
        if std::env::var("RUST_LOG").is_ok() {
            let filter = EnvFilter::from_default_env();
            tracing_subscriber::registry()
                .with(fmt::layer().with_target(true).with_level(true))
                .with(filter)
                .init();
        }
    });
}
