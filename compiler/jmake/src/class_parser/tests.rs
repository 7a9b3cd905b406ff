use super::*;
use crate::cache;
use crate::testing::{write_class_file, MemoryCache, RecordingContext};
use pretty_assertions::assert_eq;
use std::fs;

fn pass_state() -> (Arc<RecordingContext>, Arc<PassState>) {
    let context = RecordingContext::new();
    let pass = Arc::new(PassState::new(context.clone()));
    (context, pass)
}

#[test]
fn test_classes_grouped_by_source_file_name() {
    let dir = tempfile::tempdir().unwrap();
    let foo = dir.path().join("com/acme/Foo.class");
    let inner = dir.path().join("com/acme/Foo$Inner.class");
    let bar = dir.path().join("Bar.class");
    write_class_file(&foo, "com.acme.Foo", "Foo.java").unwrap();
    write_class_file(&inner, "com.acme.Foo$Inner", "Foo.java").unwrap();
    write_class_file(&bar, "Bar", "Bar.java").unwrap();

    let (_context, pass) = pass_state();
    let parser = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 2, pass).unwrap();
    for path in [&foo, &inner, &bar] {
        parser.add_path(path.clone()).unwrap();
    }
    parser.stop();
    let outcome = parser.join();

    assert!(outcome.error.is_none());
    assert_eq!(outcome.classes_parsed, 3);
    let foo_classes: Vec<_> = outcome.compiled["Foo.java"]
        .iter()
        .map(|c| (c.relative_path.as_str(), c.class_file.clone()))
        .collect();
    assert_eq!(
        foo_classes,
        vec![
            ("/com/acme/Foo.java", foo),
            ("/com/acme/Foo.java", inner),
        ]
    );
    assert_eq!(outcome.compiled["Bar.java"][0].relative_path, "/Bar.java");
}

#[test]
fn test_malformed_class_reports_and_continues() {
    let dir = tempfile::tempdir().unwrap();
    let junk = dir.path().join("Junk.class");
    let good = dir.path().join("Good.class");
    fs::write(&junk, "garbage").unwrap();
    write_class_file(&good, "Good", "Good.java").unwrap();

    let (context, pass) = pass_state();
    let parser = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 8, Arc::clone(&pass)).unwrap();
    parser.add_path(junk.clone()).unwrap();
    parser.add_path(good).unwrap();
    parser.stop();
    let outcome = parser.join();

    assert!(outcome.error.is_none());
    assert_eq!(outcome.classes_parsed, 1);
    let errors = context.errors();
    assert_eq!(errors.len(), 1);
    assert!(errors[0]
        .text
        .starts_with(&format!("malformed class file {}", junk.display())));
    assert_eq!(pass.error_count(), 1);
}

#[test]
fn test_missing_source_attribute_is_malformed() {
    let dir = tempfile::tempdir().unwrap();
    let anon = dir.path().join("Anon.class");
    fs::write(&anon, "class Anon\n").unwrap();

    let (context, pass) = pass_state();
    let parser = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 8, pass).unwrap();
    parser.add_path(anon).unwrap();
    parser.stop();
    let outcome = parser.join();

    assert!(outcome.compiled.is_empty());
    assert!(context.errors()[0].text.ends_with("no source file attribute"));
}

#[test]
fn test_corruption_aborts_and_is_returned_to_producers() {
    let dir = tempfile::tempdir().unwrap();
    let bad = dir.path().join("Bad.class");
    write_class_file(&bad, "Bad", "Bad.java").unwrap();

    let (context, pass) = pass_state();
    let cache = cache::shared(MemoryCache::new().corrupt_on("Bad.class"));
    let parser = ClassParsingThread::spawn(cache, 8, pass).unwrap();
    let sink = parser.sink();
    parser.add_path(bad).unwrap();
    parser.stop();
    let outcome = parser.join();

    assert!(outcome.error.as_ref().is_some_and(WorkerError::is_corruption));
    assert!(context.errors().is_empty());
    let later = sink.add_path(dir.path().join("Later.class"));
    assert!(later.is_err_and(|e| e.is_corruption()));
}

#[test]
fn test_add_path_after_join_fails_without_blocking() {
    let (_context, pass) = pass_state();
    let parser = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 1, pass).unwrap();
    let sink = parser.sink();
    parser.stop();
    let outcome = parser.join();

    assert_eq!(outcome.classes_parsed, 0);
    assert!(sink.add_path(PathBuf::from("/late/A.class")).is_err());
    assert!(sink.add_path(PathBuf::from("/late/B.class")).is_err());
}

#[test]
fn test_work_queued_before_stop_is_processed() {
    let dir = tempfile::tempdir().unwrap();
    let cache = MemoryCache::new();
    let log = cache.log();
    let (_context, pass) = pass_state();
    let parser = ClassParsingThread::spawn(cache::shared(cache), 4, pass).unwrap();

    let mut paths = Vec::new();
    for i in 0..20 {
        let path = dir.path().join(format!("C{i}.class"));
        write_class_file(&path, &format!("C{i}"), &format!("C{i}.java")).unwrap();
        parser.add_path(path.clone()).unwrap();
        paths.push(path);
    }
    parser.stop();
    let outcome = parser.join();

    assert_eq!(outcome.classes_parsed, 20);
    assert_eq!(log.parsed(), paths);
}
