//! Line reading for compiler output streams.
//!
//! A pump thread does the blocking reads and pushes normalized lines into a
//! channel. The parser side selects between that channel and the process
//! termination signal; after termination it drains for at most a grace
//! period and then reports end-of-stream, even if the pipe is still held
//! open by an orphaned grandchild.

use std::io::{self, BufRead, BufReader, Read};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, Receiver};
use crossbeam::select;

/// Line that backends may print to end reading early.
pub const TERMINATION_LINE: &str = "__jmake_terminate_read__";

/// Lines buffered between the pump thread and the parser.
const PUMP_CAPACITY: usize = 1024;

/// Splits a byte stream at `\n`, `\r\n` and bare `\r`.
pub struct LineSplitter<R> {
    reader: R,
    /// The previous line ended in `\r`; a following `\n` belongs to it.
    skip_lf: bool,
}

impl<R: BufRead> LineSplitter<R> {
    pub fn new(reader: R) -> Self {
        LineSplitter {
            reader,
            skip_lf: false,
        }
    }

    /// Next line without its terminator, or `None` at end of input.
    pub fn next_line(&mut self) -> io::Result<Option<String>> {
        if self.skip_lf {
            self.skip_lf = false;
            if self.fill()?.first() == Some(&b'\n') {
                self.reader.consume(1);
            }
        }

        let mut bytes = Vec::new();
        let mut saw_any = false;
        loop {
            let available = self.fill()?;
            if available.is_empty() {
                return Ok(saw_any.then(|| decode(&bytes)));
            }
            saw_any = true;
            if let Some(pos) = available.iter().position(|&b| b == b'\n' || b == b'\r') {
                let ends_in_cr = available[pos] == b'\r';
                bytes.extend_from_slice(&available[..pos]);
                self.reader.consume(pos + 1);
                self.skip_lf = ends_in_cr;
                return Ok(Some(decode(&bytes)));
            }
            let len = available.len();
            bytes.extend_from_slice(available);
            self.reader.consume(len);
        }
    }

    fn fill(&mut self) -> io::Result<&[u8]> {
        loop {
            match self.reader.fill_buf() {
                Ok(_) => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        self.reader.fill_buf()
    }
}

fn decode(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

/// Parser-side view of one output stream.
pub struct LineReader {
    lines: Receiver<String>,
    terminated: Receiver<()>,
    grace: Duration,
    finished: bool,
}

impl LineReader {
    /// Start a pump thread named `name` over `stream`.
    ///
    /// `terminated` must become ready (typically by disconnection) once the
    /// process has exited.
    pub fn spawn(
        name: &str,
        stream: Box<dyn Read + Send>,
        terminated: Receiver<()>,
        grace: Duration,
    ) -> io::Result<Self> {
        let (tx, rx) = channel::bounded(PUMP_CAPACITY);
        let pump_name = format!("{name}-pump");
        thread::Builder::new().name(pump_name).spawn(move || {
            let mut splitter = LineSplitter::new(BufReader::new(stream));
            loop {
                match splitter.next_line() {
                    Ok(Some(line)) => {
                        if tx.send(line).is_err() {
                            break;
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::debug!(error = %e, "compiler stream read failed");
                        break;
                    }
                }
            }
        })?;
        Ok(Self::from_channel(rx, terminated, grace))
    }

    /// Reader over an existing line channel.
    pub fn from_channel(lines: Receiver<String>, terminated: Receiver<()>, grace: Duration) -> Self {
        LineReader {
            lines,
            terminated,
            grace,
            finished: false,
        }
    }

    /// Next line, or `None` once the stream has ended.
    pub fn next_line(&mut self) -> Option<String> {
        if self.finished {
            return None;
        }
        let line = select! {
            recv(self.lines) -> line => line.ok(),
            recv(self.terminated) -> _ => self.lines.recv_timeout(self.grace).ok(),
        };
        match line {
            Some(line) if line != TERMINATION_LINE => Some(line),
            _ => {
                self.finished = true;
                None
            }
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests;
