use super::*;
use jmake_ir::{Module, OrderEntry};
use pretty_assertions::assert_eq;

fn ids(raw: &[u32]) -> ChunkModules {
    raw.iter().copied().map(ModuleId::new).collect()
}

fn project_with(deps: &[&[u32]]) -> Project {
    let mut project = Project::new();
    for (i, module_deps) in deps.iter().enumerate() {
        let mut module = Module::new(format!("m{i}"));
        for dep in *module_deps {
            module = module.with_dependency(OrderEntry::Module(ModuleId::new(*dep)));
        }
        project.add_module(module);
    }
    project
}

#[test]
fn test_independent_modules_each_get_a_chunk() {
    let project = project_with(&[&[], &[]]);
    assert_eq!(module_chunks(&project), vec![ids(&[0]), ids(&[1])]);
}

#[test]
fn test_dependencies_come_first() {
    // m0 -> m1 -> m2
    let project = project_with(&[&[1], &[2], &[]]);
    assert_eq!(
        module_chunks(&project),
        vec![ids(&[2]), ids(&[1]), ids(&[0])]
    );
}

#[test]
fn test_cycle_collapses_into_one_chunk() {
    // m0 <-> m1, m2 -> m0
    let project = project_with(&[&[1], &[0], &[0]]);
    assert_eq!(module_chunks(&project), vec![ids(&[0, 1]), ids(&[2])]);
}

#[test]
fn test_cycle_after_its_dependency() {
    // m0 <-> m1, both -> m2
    let project = project_with(&[&[1, 2], &[0, 2], &[]]);
    assert_eq!(module_chunks(&project), vec![ids(&[2]), ids(&[0, 1])]);
}

#[test]
fn test_self_dependency_and_dangling_ids() {
    let project = project_with(&[&[0, 7]]);
    assert_eq!(module_chunks(&project), vec![ids(&[0])]);
}

#[test]
fn test_long_chain_does_not_overflow() {
    let n: u32 = 20_000;
    let mut project = Project::new();
    for i in 0..n {
        let mut module = Module::new(format!("m{i}"));
        if i + 1 < n {
            module = module.with_dependency(OrderEntry::Module(ModuleId::new(i + 1)));
        }
        project.add_module(module);
    }
    let chunks = module_chunks(&project);
    assert_eq!(chunks.len(), n as usize);
    assert_eq!(chunks[0], ids(&[n - 1]));
    assert_eq!(chunks[chunks.len() - 1], ids(&[0]));
}

#[test]
fn test_empty_project() {
    assert!(module_chunks(&Project::new()).is_empty());
}
