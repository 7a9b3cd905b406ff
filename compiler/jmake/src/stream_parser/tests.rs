use super::*;
use crate::cache;
use crate::class_parser::ClassParsingThread;
use crate::testing::{write_class_file, LineProtocolParser, MemoryCache, RecordingContext, ScriptedProcess};
use crossbeam::channel;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn reader(lines: &[String]) -> LineReader {
    let (tx, rx) = channel::unbounded();
    for line in lines {
        tx.send(line.clone()).unwrap();
    }
    let (_term_tx, term_rx) = channel::bounded::<()>(0);
    drop(tx);
    LineReader::from_channel(rx, term_rx, Duration::from_millis(20))
}

fn class_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
    names
        .iter()
        .map(|name| {
            let path = dir.join(format!("{name}.class"));
            write_class_file(&path, name, &format!("{name}.java")).unwrap();
            path
        })
        .collect()
}

#[test]
fn test_pending_slot_hands_back_previous() {
    let mut slot = PendingSlot::default();
    assert_eq!(slot.replace(1), None);
    assert_eq!(slot.replace(2), Some(1));
    assert_eq!(slot.flush(), Some(2));
    assert!(slot.is_empty());
    assert_eq!(slot.flush(), None);
}

#[test]
fn test_every_generated_file_forwarded_exactly_once() {
    let dir = tempfile::tempdir().unwrap();
    let files = class_files(dir.path(), &["A", "B", "C"]);
    let lines: Vec<String> = files.iter().map(|f| format!("  [wrote {}]  ", f.display())).collect();

    let context = RecordingContext::new();
    let pass = Arc::new(PassState::new(context.clone()));
    let cache = MemoryCache::new();
    let log = cache.log();
    let classes = ClassParsingThread::spawn(cache::shared(cache), 8, Arc::clone(&pass)).unwrap();

    let error = parse_stream(Box::new(LineProtocolParser), reader(&lines), &classes.sink(), &pass);
    classes.stop();
    let outcome = classes.join();

    assert!(error.is_none());
    assert_eq!(log.parsed(), files);
    assert_eq!(outcome.classes_parsed, 3);
    assert_eq!(pass.counters().classes_generated, 3);
    assert_eq!(
        context.progress_log().texts2().last().map(String::as_str),
        Some("Parsing classes... (3)")
    );
}

#[test]
fn test_messages_reach_context() {
    let lines = vec![
        "/src/A.java:4: error: ';' expected".to_string(),
        "[progress compiling A]".to_string(),
        "1 error".to_string(),
    ];
    let context = RecordingContext::new();
    let pass = Arc::new(PassState::new(context.clone()));
    let classes = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 8, Arc::clone(&pass)).unwrap();

    let error = parse_stream(Box::new(LineProtocolParser), reader(&lines), &classes.sink(), &pass);
    classes.stop();
    classes.join();

    assert!(error.is_none());
    assert_eq!(context.messages().len(), 2);
    assert_eq!(pass.error_count(), 1);
    assert!(pass.counters().files_with_errors.contains("file:///src/A.java"));
    assert!(context.progress_log().texts2().contains(&"compiling A".to_string()));
}

#[test]
fn test_cancellation_stops_after_current_line() {
    let lines: Vec<String> = (0..5).map(|i| format!("note {i}")).collect();
    let context = RecordingContext::new();
    context.cancel();
    let pass = Arc::new(PassState::new(context.clone()));
    let classes = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 8, Arc::clone(&pass)).unwrap();

    parse_stream(Box::new(LineProtocolParser), reader(&lines), &classes.sink(), &pass);
    classes.stop();
    classes.join();

    assert_eq!(context.messages().len(), 1);
}

#[test]
fn test_forwarding_failure_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let files = class_files(dir.path(), &["Bad", "Next", "Last"]);
    let lines: Vec<String> = files.iter().map(|f| format!("[wrote {}]", f.display())).collect();

    let context = RecordingContext::new();
    let pass = Arc::new(PassState::new(context.clone()));
    let cache = cache::shared(MemoryCache::new().corrupt_on("Bad.class"));
    let classes = ClassParsingThread::spawn(cache, 1, Arc::clone(&pass)).unwrap();
    let sink = classes.sink();
    // Let the consumer fail before the stream is parsed.
    sink.add_path(files[0].clone()).unwrap();
    classes.stop();
    let outcome = classes.join();
    assert!(outcome.error.is_some());

    let error = parse_stream(Box::new(LineProtocolParser), reader(&lines), &sink, &pass);
    assert!(error.is_some_and(|e| e.is_corruption()));
}

#[test]
fn test_thread_destroys_process_on_exit() {
    let process = ScriptedProcess::exited(0).with_stdout_lines(["hello"]);
    let killed = process.killed_flag();
    let handle = ProcessHandle::new(Box::new(process));
    let stdout = handle.take_stdout().unwrap();
    let reader = LineReader::spawn("jmake-test", stdout, handle.termination_signal(), Duration::from_millis(20)).unwrap();

    let context = RecordingContext::new();
    let pass = Arc::new(PassState::new(context.clone()));
    let classes = ClassParsingThread::spawn(cache::shared(MemoryCache::new()), 8, Arc::clone(&pass)).unwrap();
    let thread = StreamParserThread::spawn(
        StreamKind::Stdout,
        Box::new(LineProtocolParser),
        reader,
        Arc::clone(&handle),
        classes.sink(),
        Arc::clone(&pass),
    )
    .unwrap();

    assert!(thread.join().is_none());
    classes.stop();
    classes.join();
    assert!(handle.is_destroyed());
    assert!(killed.load(std::sync::atomic::Ordering::SeqCst));
    // An exited compiler keeps its real status after the destroy.
    assert_eq!(handle.wait_for(|| false), 0);
    assert_eq!(context.messages()[0].text, "hello");
}

#[test]
fn test_drain_reads_stream_to_end() {
    let output = "noise\n".repeat(50_000).into_bytes();
    let len = output.len() as u64;
    let thread = drain(StreamKind::Stderr, Box::new(std::io::Cursor::new(output))).unwrap();
    assert_eq!(thread.join().unwrap(), len);
}

#[cfg(unix)]
#[test]
fn test_drained_child_exits_cleanly() {
    use crate::process::ChildProcess;
    use std::process::Command;

    // Far more than a pipe buffer holds; a closed pipe would kill the writer.
    let mut command = Command::new("sh");
    command.args(["-c", "i=0; while [ $i -lt 20000 ]; do echo line $i; i=$((i+1)); done; exit 0"]);
    let handle = ProcessHandle::new(Box::new(ChildProcess::spawn(&mut command).unwrap()));
    let stdout = handle.take_stdout().unwrap();

    let thread = drain(StreamKind::Stdout, stdout).unwrap();
    assert_eq!(handle.wait_for(|| false), 0);
    assert!(thread.join().unwrap() > 64 * 1024);
}
