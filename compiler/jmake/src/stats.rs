//! Counters for one orchestrator call.

use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CompileStats {
    pub chunks: usize,
    pub passes: usize,
    pub processes_launched: usize,
    pub classes_parsed: usize,
    pub files_relocated: usize,
    pub relocation_failures: usize,
    pub dependents_found: usize,
}

impl fmt::Display for CompileStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} chunk(s), {} pass(es), {} process(es), {} class(es) parsed, {} relocated, {} relocation failure(s), {} dependent(s)",
            self.chunks,
            self.passes,
            self.processes_launched,
            self.classes_parsed,
            self.files_relocated,
            self.relocation_failures,
            self.dependents_found,
        )
    }
}
