//! jmake IR - value types shared by the compile orchestrator.
//!
//! This crate holds the plain data the orchestrator works on:
//! - `Project`, `Module`, `SourceRoot`, `OrderEntry` for the project model
//! - `SourcesFilter` for selecting production/test sources of a pass
//! - `OutputItem`, `CompiledClass`, `OutputDirPair` for compile results
//! - `CompilerMessage` for diagnostics routed to the compile context
//! - `RebuildRequest` for the session-scoped "rebuild next time" state
//!
//! Nothing in here spawns threads or touches the filesystem.

mod filter;
mod ids;
mod message;
mod output;
mod project;
mod rebuild;

pub use filter::SourcesFilter;
pub use ids::{ClassId, ModuleId};
pub use message::{path_to_url, CompilerMessage, MessageCategory};
pub use output::{CompiledClass, OutputDirPair, OutputItem, PACKAGE_INFO_FILE_NAME};
pub use project::{Jdk, LanguageLevel, Module, OrderEntry, Project, SourceRoot};
pub use rebuild::RebuildRequest;
