//! Module graph condensation.
//!
//! Modules that depend on each other cyclically must be compiled by one
//! compiler invocation, so the module graph is condensed into its strongly
//! connected components and those are ordered dependencies-first.

use jmake_ir::{ModuleId, Project};
use smallvec::SmallVec;

use crate::chunk::ChunkModules;

const UNVISITED: usize = usize::MAX;

/// Strongly connected components of the project's module graph, with every
/// component placed after all components it depends on.
///
/// Edges follow `OrderEntry::Module` entries; dangling module ids are
/// ignored. Members of a component are sorted by id, and components without
/// a dependency relation keep project insertion order as far as Tarjan's
/// algorithm allows.
pub fn module_chunks(project: &Project) -> Vec<ChunkModules> {
    let n = project.len();
    let edges: Vec<SmallVec<[usize; 4]>> = project
        .modules()
        .map(|(_, module)| {
            module
                .module_dependencies()
                .map(ModuleId::index)
                .filter(|&dep| dep < n)
                .collect()
        })
        .collect();
    Tarjan::new(&edges).run()
}

/// Iterative Tarjan, so deep module chains cannot overflow the stack.
struct Tarjan<'a> {
    edges: &'a [SmallVec<[usize; 4]>],
    index: Vec<usize>,
    lowlink: Vec<usize>,
    on_stack: Vec<bool>,
    stack: Vec<usize>,
    next_index: usize,
    components: Vec<ChunkModules>,
}

impl<'a> Tarjan<'a> {
    fn new(edges: &'a [SmallVec<[usize; 4]>]) -> Self {
        let n = edges.len();
        Tarjan {
            edges,
            index: vec![UNVISITED; n],
            lowlink: vec![0; n],
            on_stack: vec![false; n],
            stack: Vec::new(),
            next_index: 0,
            components: Vec::new(),
        }
    }

    fn run(mut self) -> Vec<ChunkModules> {
        for root in 0..self.edges.len() {
            if self.index[root] == UNVISITED {
                self.visit(root);
            }
        }
        // Tarjan emits a component only after everything reachable from it,
        // and edges point at dependencies, so this is already the right order.
        self.components
    }

    fn visit(&mut self, root: usize) {
        // (node, position of the next edge to follow)
        let edges = self.edges;
        let mut frames: Vec<(usize, usize)> = vec![(root, 0)];
        self.open(root);

        while let Some(frame) = frames.last_mut() {
            let node = frame.0;
            if let Some(&next) = edges[node].get(frame.1) {
                frame.1 += 1;
                if self.index[next] == UNVISITED {
                    self.open(next);
                    frames.push((next, 0));
                } else if self.on_stack[next] {
                    self.lowlink[node] = self.lowlink[node].min(self.index[next]);
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                self.lowlink[parent] = self.lowlink[parent].min(self.lowlink[node]);
            }
            if self.lowlink[node] == self.index[node] {
                self.close(node);
            }
        }
    }

    fn open(&mut self, node: usize) {
        self.index[node] = self.next_index;
        self.lowlink[node] = self.next_index;
        self.next_index += 1;
        self.stack.push(node);
        self.on_stack[node] = true;
    }

    #[expect(
        clippy::cast_possible_truncation,
        reason = "module indices come from u32 ids"
    )]
    fn close(&mut self, root: usize) {
        let mut members = ChunkModules::new();
        while let Some(member) = self.stack.pop() {
            self.on_stack[member] = false;
            members.push(ModuleId::new(member as u32));
            if member == root {
                break;
            }
        }
        members.sort_unstable();
        self.components.push(members);
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
