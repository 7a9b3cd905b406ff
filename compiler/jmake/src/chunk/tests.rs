use super::*;
use jmake_ir::SourceRoot;
use pretty_assertions::assert_eq;
use smallvec::smallvec;

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

fn shared(project: Project) -> SharedProject {
    Arc::new(RwLock::new(project))
}

/// `lib` (with a test root and separate test output) and `app` depending on it.
fn sample() -> (SharedProject, ModuleId, ModuleId) {
    let mut project = Project::new();
    project.default_jdk = Some(Jdk::new("17", "/jdk").with_roots([p("/jdk/lib/rt.jar")]));
    let lib = project.add_module(
        Module::new("lib")
            .with_source_root(SourceRoot::production("/w/lib/src"))
            .with_source_root(SourceRoot::test("/w/lib/test"))
            .with_output_dir("/w/out/lib")
            .with_test_output_dir("/w/out/lib-test"),
    );
    let app = project.add_module(
        Module {
            dependencies: vec![
                OrderEntry::Library {
                    name: "annotations".into(),
                    roots: vec![p("/libs/annotations.jar")],
                },
                OrderEntry::Jdk,
                OrderEntry::ModuleSource,
                OrderEntry::Module(lib),
                OrderEntry::Library {
                    name: "guava".into(),
                    roots: vec![p("/libs/guava.jar")],
                },
            ],
            ..Module::new("app")
        }
        .with_source_root(SourceRoot::production("/w/app/src"))
        .with_output_dir("/w/out/app")
        .with_language_level(LanguageLevel::JDK_11),
    );
    (shared(project), lib, app)
}

#[test]
fn test_files_to_compile_respects_filter() {
    let (project, lib, _) = sample();
    let mut chunk = ModuleChunk::new(project, smallvec![lib])
        .with_files(lib, [p("/w/lib/src/A.java"), p("/w/lib/test/ATest.java")]);

    assert_eq!(chunk.files_to_compile().len(), 2);

    chunk.set_filter(SourcesFilter::PRODUCTION);
    assert_eq!(chunk.files_to_compile(), vec![p("/w/lib/src/A.java")]);

    chunk.set_filter(SourcesFilter::TEST);
    assert_eq!(chunk.files_to_compile(), vec![p("/w/lib/test/ATest.java")]);
}

#[test]
fn test_substitution_replaces_compiled_file_only() {
    let (project, lib, _) = sample();
    let mut chunk =
        ModuleChunk::new(project, smallvec![lib]).with_files(lib, [p("/w/lib/src/A.java")]);
    chunk.substitute(p("/w/lib/src/A.java"), p("/tmp/gen/A.java"));

    assert_eq!(chunk.files_to_compile(), vec![p("/tmp/gen/A.java")]);
    assert_eq!(chunk.source_files(), vec![p("/w/lib/src/A.java")]);
}

#[test]
fn test_files_of_non_members_are_ignored() {
    let (project, lib, app) = sample();
    let chunk = ModuleChunk::new(project, smallvec![lib]).with_files(app, [p("/w/app/src/M.java")]);
    assert!(!chunk.has_files());
    assert!(chunk.files_to_compile().is_empty());
}

#[test]
fn test_source_roots_filtered() {
    let (project, lib, _) = sample();
    let mut chunk = ModuleChunk::new(project, smallvec![lib]);
    assert_eq!(chunk.source_roots(), vec![p("/w/lib/src"), p("/w/lib/test")]);
    chunk.set_filter(SourcesFilter::PRODUCTION);
    assert_eq!(chunk.source_roots(), vec![p("/w/lib/src")]);
}

#[test]
fn test_classpath_split_at_jdk() {
    let (project, _, app) = sample();
    let chunk = ModuleChunk::new(project, smallvec![app]);

    assert_eq!(
        chunk.boot_classpath(),
        vec![p("/libs/annotations.jar"), p("/jdk/lib/rt.jar")]
    );
    assert_eq!(
        chunk.compilation_classpath(),
        vec![
            p("/w/out/app"),
            p("/w/out/lib"),
            p("/w/out/lib-test"),
            p("/libs/guava.jar"),
        ]
    );
}

#[test]
fn test_classpath_production_pass_skips_test_outputs() {
    let (project, _, app) = sample();
    let mut chunk = ModuleChunk::new(project, smallvec![app]);
    chunk.set_filter(SourcesFilter::PRODUCTION);
    assert_eq!(
        chunk.compilation_classpath(),
        vec![p("/w/out/app"), p("/w/out/lib"), p("/libs/guava.jar")]
    );
}

#[test]
fn test_classpath_dedup_across_members() {
    let (project, lib, app) = sample();
    let chunk = ModuleChunk::new(project, smallvec![app, lib]);
    let classpath = chunk.compilation_classpath();
    let lib_out = classpath.iter().filter(|e| **e == p("/w/out/lib")).count();
    assert_eq!(lib_out, 1);
    // Boot entries of both members, JDK roots only once.
    assert_eq!(
        chunk.boot_classpath(),
        vec![p("/libs/annotations.jar"), p("/jdk/lib/rt.jar")]
    );
}

#[test]
fn test_classpath_dedup_by_canonical_path() {
    let dir = tempfile::tempdir().unwrap();
    let jar = dir.path().join("a.jar");
    std::fs::write(&jar, b"").unwrap();
    let alias = dir.path().join(".").join("a.jar");

    let mut project = Project::new();
    let m = project.add_module(
        Module::new("m")
            .with_dependency(OrderEntry::Library {
                name: "a".into(),
                roots: vec![jar.clone()],
            })
            .with_dependency(OrderEntry::Library {
                name: "a-again".into(),
                roots: vec![alias],
            }),
    );
    let chunk = ModuleChunk::new(shared(project), smallvec![m]);
    assert_eq!(chunk.compilation_classpath(), vec![jar]);
}

#[test]
fn test_no_jdk_entry_puts_everything_on_compilation_classpath() {
    let mut project = Project::new();
    let m = project.add_module(Module {
        dependencies: vec![OrderEntry::Library {
            name: "x".into(),
            roots: vec![p("/x.jar")],
        }],
        ..Module::new("m")
    });
    let chunk = ModuleChunk::new(shared(project), smallvec![m]);
    assert!(chunk.boot_classpath().is_empty());
    assert_eq!(chunk.compilation_classpath(), vec![p("/x.jar")]);
}

#[test]
fn test_jdk_and_language_level_fallbacks() {
    let (project, lib, app) = sample();
    let chunk = ModuleChunk::new(Arc::clone(&project), smallvec![lib, app]);
    assert_eq!(chunk.language_level(), LanguageLevel::JDK_11);
    assert_eq!(chunk.jdk().map(|j| j.name), Some("17".to_string()));

    let lib_only = ModuleChunk::new(project, smallvec![lib]);
    assert_eq!(lib_only.language_level(), LanguageLevel::default());
}

#[test]
fn test_empty_chunk_queries_do_not_fail() {
    let chunk = ModuleChunk::new(shared(Project::new()), smallvec![]);
    assert!(chunk.files_to_compile().is_empty());
    assert!(chunk.source_roots().is_empty());
    assert!(chunk.boot_classpath().is_empty());
    assert!(chunk.compilation_classpath().is_empty());
    assert!(chunk.jdk().is_none());
    assert_eq!(chunk.display_name(), "");
}

#[test]
fn test_display_name_lists_members() {
    let (project, lib, app) = sample();
    let chunk = ModuleChunk::new(project, smallvec![lib, app]);
    assert_eq!(chunk.display_name(), "lib, app");
}
