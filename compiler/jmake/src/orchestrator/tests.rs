use super::*;
use crate::cache;
use crate::testing::{MemoryCache, ProjectBuilder, RecordingContext, ScriptedBackend};
use pretty_assertions::assert_eq;

fn orchestrator(builder: &ProjectBuilder, files: Vec<PathBuf>) -> Orchestrator {
    let config = OrchestratorConfig::new()
        .with_temp_root(builder.temp_root().unwrap())
        .with_async_cleanup(false);
    Orchestrator::new(
        files,
        RecordingContext::new(),
        Arc::new(ScriptedBackend::simulated()),
        cache::shared(MemoryCache::new()),
        builder.project(),
    )
    .with_config(config)
}

#[test]
fn test_make_chunks_orders_dependencies_first() {
    let builder = ProjectBuilder::new().unwrap();
    let app = builder.module("app").unwrap();
    let lib = builder.module("lib").unwrap();
    builder.depends_on(app, lib);
    let main = builder.source(app, "Main.java", "class Main {}").unwrap();
    let util = builder.source(lib, "Util.java", "class Util {}").unwrap();
    let stray = builder.root().join("elsewhere/Stray.java");

    let orchestrator = orchestrator(&builder, vec![]);
    let chunks = orchestrator.make_chunks(&[main.clone(), stray, util.clone()]);

    let modules: Vec<Vec<ModuleId>> = chunks.iter().map(|c| c.modules().to_vec()).collect();
    assert_eq!(modules, vec![vec![lib], vec![app]]);
    assert_eq!(chunks[0].files_to_compile(), vec![util]);
    assert_eq!(chunks[1].files_to_compile(), vec![main]);
}

#[test]
fn test_make_chunks_skips_modules_without_files() {
    let builder = ProjectBuilder::new().unwrap();
    let a = builder.module("a").unwrap();
    let _b = builder.module("b").unwrap();
    let file = builder.source(a, "A.java", "class A {}").unwrap();

    let chunks = orchestrator(&builder, vec![]).make_chunks(&[file]);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].modules(), &[a]);
}

#[test]
fn test_cycle_members_share_a_chunk() {
    let builder = ProjectBuilder::new().unwrap();
    let a = builder.module("a").unwrap();
    let b = builder.module("b").unwrap();
    builder.depends_on(a, b);
    builder.depends_on(b, a);
    let file = builder.source(a, "A.java", "class A {}").unwrap();

    let chunks = orchestrator(&builder, vec![]).make_chunks(&[file]);
    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].modules(), &[a, b]);
}

#[test]
fn test_plan_single_pass_when_test_output_shared() {
    let builder = ProjectBuilder::new().unwrap();
    let m = builder.module("m").unwrap();
    let file = builder.source(m, "A.java", "class A {}").unwrap();
    let orchestrator = orchestrator(&builder, vec![]);
    let chunks = orchestrator.make_chunks(&[file]);

    let (passes, staging) = orchestrator.plan_passes(&chunks[0]).unwrap().unwrap();
    assert!(staging.is_none());
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].filter, SourcesFilter::ALL);
    assert_eq!(Some(passes[0].output_dir.clone()), builder.output_dir(m));
}

#[test]
fn test_plan_two_passes_when_test_output_differs() {
    let builder = ProjectBuilder::new().unwrap();
    let m = builder.module_with_test_output("m").unwrap();
    let file = builder.source(m, "A.java", "class A {}").unwrap();
    let orchestrator = orchestrator(&builder, vec![]);
    let chunks = orchestrator.make_chunks(&[file]);

    let (passes, _) = orchestrator.plan_passes(&chunks[0]).unwrap().unwrap();
    assert_eq!(
        passes,
        vec![
            OutputDirPair::new(builder.output_dir(m).unwrap(), SourcesFilter::PRODUCTION),
            OutputDirPair::new(builder.test_output_dir(m).unwrap(), SourcesFilter::TEST),
        ]
    );
}

#[test]
fn test_plan_multi_module_chunk_uses_staging_dir() {
    let builder = ProjectBuilder::new().unwrap();
    let a = builder.module_with_test_output("a").unwrap();
    let b = builder.module("b").unwrap();
    builder.depends_on(a, b);
    builder.depends_on(b, a);
    let file = builder.source(a, "A.java", "class A {}").unwrap();
    let orchestrator = orchestrator(&builder, vec![]);
    let chunks = orchestrator.make_chunks(&[file]);

    let (passes, staging) = orchestrator.plan_passes(&chunks[0]).unwrap().unwrap();
    let staging = staging.unwrap();
    assert_eq!(passes.len(), 1);
    assert_eq!(passes[0].filter, SourcesFilter::ALL);
    assert_eq!(passes[0].output_dir, staging.path());
    assert!(staging.path().starts_with(builder.temp_root().unwrap()));
}

#[test]
fn test_plan_missing_output_path_reports_error() {
    let builder = ProjectBuilder::new().unwrap();
    let m = builder.module("broken").unwrap();
    builder.clear_output_dir(m);
    let file = builder.source(m, "A.java", "class A {}").unwrap();

    let context = RecordingContext::new();
    let orchestrator = Orchestrator::new(
        vec![file.clone()],
        context.clone(),
        Arc::new(ScriptedBackend::simulated()),
        cache::shared(MemoryCache::new()),
        builder.project(),
    );
    let chunks = orchestrator.make_chunks(&[file]);
    assert!(orchestrator.plan_passes(&chunks[0]).unwrap().is_none());
    assert_eq!(
        context.errors()[0].text,
        "output path is not specified for module 'broken'"
    );
}

#[test]
fn test_slash_path_of_relocated_class() {
    let builder = ProjectBuilder::new().unwrap();
    let m = builder.module("m").unwrap();
    let foo = builder.source(m, "com/acme/Foo.java", "package com.acme;\nclass Foo {}").unwrap();
    let mut orchestrator = orchestrator(&builder, vec![foo.clone()]);

    let items = orchestrator.compile().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].output_path.as_deref(), Some("com/acme/Foo.class"));
    assert_eq!(items[0].source, foo);
    // Compiled in place: nothing moved, the host should rescan instead.
    assert_eq!(orchestrator.files_to_refresh().len(), 1);
}
