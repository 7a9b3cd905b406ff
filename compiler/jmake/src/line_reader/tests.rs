use super::*;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use std::io::Cursor;
use std::time::Instant;

fn split(input: &[u8]) -> Vec<String> {
    let mut splitter = LineSplitter::new(Cursor::new(input.to_vec()));
    let mut lines = Vec::new();
    while let Some(line) = splitter.next_line().unwrap() {
        lines.push(line);
    }
    lines
}

/// A reader that returns one byte per read, to exercise buffer boundaries.
struct Trickle(Vec<u8>, usize);

impl Read for Trickle {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.1 >= self.0.len() || buf.is_empty() {
            return Ok(0);
        }
        buf[0] = self.0[self.1];
        self.1 += 1;
        Ok(1)
    }
}

#[test]
fn test_split_line_endings() {
    assert_eq!(split(b"a\nb\r\nc\rd"), vec!["a", "b", "c", "d"]);
}

#[test]
fn test_split_empty_lines() {
    assert_eq!(split(b"a\n\nb\r\r\n"), vec!["a", "", "b", ""]);
}

#[test]
fn test_split_empty_input() {
    assert!(split(b"").is_empty());
}

#[test]
fn test_split_crlf_across_reads() {
    let mut splitter = LineSplitter::new(BufReader::with_capacity(1, Trickle(b"x\r\ny".to_vec(), 0)));
    assert_eq!(splitter.next_line().unwrap().as_deref(), Some("x"));
    assert_eq!(splitter.next_line().unwrap().as_deref(), Some("y"));
    assert_eq!(splitter.next_line().unwrap(), None);
}

proptest! {
    #[test]
    fn prop_any_line_ending_yields_same_lines(
        lines in prop::collection::vec("[a-z][a-z ]{0,7}", 1..8),
        endings in prop::collection::vec(0usize..3, 8),
    ) {
        let mut input = String::new();
        for (i, line) in lines.iter().enumerate() {
            input.push_str(line);
            input.push_str(["\n", "\r\n", "\r"][endings[i]]);
        }
        prop_assert_eq!(split(input.as_bytes()), lines);
    }
}

#[test]
fn test_reader_drains_until_disconnect() {
    let (tx, rx) = channel::unbounded();
    let (_term_tx, term_rx) = channel::bounded::<()>(0);
    tx.send("one".to_string()).unwrap();
    tx.send("two".to_string()).unwrap();
    drop(tx);

    let mut reader = LineReader::from_channel(rx, term_rx, Duration::from_millis(50));
    assert_eq!(reader.next_line().as_deref(), Some("one"));
    assert_eq!(reader.next_line().as_deref(), Some("two"));
    assert_eq!(reader.next_line(), None);
    assert_eq!(reader.next_line(), None);
}

#[test]
fn test_reader_stops_at_termination_line() {
    let (tx, rx) = channel::unbounded();
    let (_term_tx, term_rx) = channel::bounded::<()>(0);
    tx.send("before".to_string()).unwrap();
    tx.send(TERMINATION_LINE.to_string()).unwrap();
    tx.send("after".to_string()).unwrap();

    let mut reader = LineReader::from_channel(rx, term_rx, Duration::from_millis(50));
    assert_eq!(reader.next_line().as_deref(), Some("before"));
    assert_eq!(reader.next_line(), None);
    assert_eq!(reader.next_line(), None);
}

#[test]
fn test_reader_gives_up_after_grace_once_terminated() {
    // The line sender stays alive, as if a grandchild still held the pipe.
    let (_tx, rx) = channel::unbounded::<String>();
    let (term_tx, term_rx) = channel::bounded::<()>(0);
    drop(term_tx);

    let mut reader = LineReader::from_channel(rx, term_rx, Duration::from_millis(30));
    let started = Instant::now();
    assert_eq!(reader.next_line(), None);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn test_reader_keeps_lines_sent_before_termination() {
    let (tx, rx) = channel::unbounded();
    let (term_tx, term_rx) = channel::bounded::<()>(0);
    tx.send("late".to_string()).unwrap();
    drop(term_tx);

    let mut reader = LineReader::from_channel(rx, term_rx, Duration::from_millis(30));
    assert_eq!(reader.next_line().as_deref(), Some("late"));
    assert_eq!(reader.next_line(), None);
}

#[test]
fn test_spawned_pump_reads_stream() {
    let (_term_tx, term_rx) = channel::bounded::<()>(0);
    let stream: Box<dyn Read + Send> = Box::new(Cursor::new(b"x\r\ny\rz\n".to_vec()));
    let mut reader = LineReader::spawn("jmake-test", stream, term_rx, Duration::from_millis(30)).unwrap();
    let mut lines = Vec::new();
    while let Some(line) = reader.next_line() {
        lines.push(line);
    }
    assert_eq!(lines, vec!["x", "y", "z"]);
}
