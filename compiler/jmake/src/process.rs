//! External compiler process handle.
//!
//! [`ProcessHandle`] is shared by the orchestrator (which waits for exit) and
//! the stream-parser threads (which destroy the process when they stop
//! reading). Destroying is idempotent, and exit is published as a
//! termination signal that stream readers `select!` on.

use std::io::{self, Read};
use std::process::{Child, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, Sender};
use parking_lot::Mutex;

/// Exit code reported when the real one cannot be read.
pub const UNKNOWN_EXIT_CODE: i32 = -1;

/// Interval between exit checks while waiting.
const WAIT_POLL: Duration = Duration::from_millis(10);

/// Attempts at reading the exit code after a kill.
const KILL_REAP_ATTEMPTS: usize = 50;

/// A running compiler with piped stdout/stderr.
pub trait CompilerProcess: Send {
    /// Take the stdout pipe. Returns `None` on the second call.
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Take the stderr pipe. Returns `None` on the second call.
    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>>;

    /// Exit code if the process has exited.
    fn try_wait(&mut self) -> io::Result<Option<i32>>;

    /// Forcefully stop the process.
    fn kill(&mut self) -> io::Result<()>;
}

/// [`CompilerProcess`] over `std::process::Child`.
pub struct ChildProcess {
    child: Child,
}

impl ChildProcess {
    /// Spawn `command` with piped stdout/stderr and a null stdin.
    pub fn spawn(command: &mut Command) -> io::Result<Self> {
        let child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;
        Ok(ChildProcess { child })
    }
}

impl CompilerProcess for ChildProcess {
    fn take_stdout(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stdout
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn take_stderr(&mut self) -> Option<Box<dyn Read + Send>> {
        self.child
            .stderr
            .take()
            .map(|s| Box::new(s) as Box<dyn Read + Send>)
    }

    fn try_wait(&mut self) -> io::Result<Option<i32>> {
        Ok(self
            .child
            .try_wait()?
            .map(|status| status.code().unwrap_or(UNKNOWN_EXIT_CODE)))
    }

    fn kill(&mut self) -> io::Result<()> {
        self.child.kill()
    }
}

/// Shared handle to one compiler process.
pub struct ProcessHandle {
    process: Mutex<Box<dyn CompilerProcess>>,
    destroyed: AtomicBool,
    /// Dropped once the process has exited; receivers then see disconnection.
    terminated_tx: Mutex<Option<Sender<()>>>,
    terminated_rx: Receiver<()>,
    /// Wakes a waiting orchestrator when a parser thread destroys the process.
    destroy_tx: Sender<()>,
    destroy_rx: Receiver<()>,
}

impl ProcessHandle {
    /// Wrap a launched process.
    pub fn new(process: Box<dyn CompilerProcess>) -> Arc<Self> {
        let (terminated_tx, terminated_rx) = channel::bounded(0);
        let (destroy_tx, destroy_rx) = channel::bounded(1);
        Arc::new(ProcessHandle {
            process: Mutex::new(process),
            destroyed: AtomicBool::new(false),
            terminated_tx: Mutex::new(Some(terminated_tx)),
            terminated_rx,
            destroy_tx,
            destroy_rx,
        })
    }

    /// Take the stdout pipe.
    pub fn take_stdout(&self) -> Option<Box<dyn Read + Send>> {
        self.process.lock().take_stdout()
    }

    /// Take the stderr pipe.
    pub fn take_stderr(&self) -> Option<Box<dyn Read + Send>> {
        self.process.lock().take_stderr()
    }

    /// Receiver that becomes ready (disconnected) once the process exited.
    pub fn termination_signal(&self) -> Receiver<()> {
        self.terminated_rx.clone()
    }

    /// Whether exit has been observed.
    pub fn is_terminated(&self) -> bool {
        self.terminated_tx.lock().is_none()
    }

    /// Whether the process was destroyed.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed.load(Ordering::Acquire)
    }

    /// Kill the process. Only the first call has an effect.
    pub fn destroy(&self) {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Some(mut process) = self.process.try_lock() {
            if let Err(e) = process.kill() {
                tracing::debug!(error = %e, "kill after exit");
            }
        }
        // A waiter holding the lock kills on wake-up instead.
        let _ = self.destroy_tx.try_send(());
    }

    /// Block until the process exits and return its exit code.
    ///
    /// When `cancelled` returns true, or the process gets destroyed while
    /// waiting, the process is killed and whatever exit code is available
    /// afterwards is returned. Publishes the termination signal on return.
    pub fn wait_for(&self, cancelled: impl Fn() -> bool) -> i32 {
        let code = loop {
            match self.process.lock().try_wait() {
                Ok(Some(code)) => break code,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(error = %e, "cannot query compiler process state");
                    break UNKNOWN_EXIT_CODE;
                }
            }
            if cancelled() || self.is_destroyed() {
                break self.kill_and_reap();
            }
            let _ = self.destroy_rx.recv_timeout(WAIT_POLL);
        };
        self.mark_terminated();
        code
    }

    fn kill_and_reap(&self) -> i32 {
        self.destroyed.store(true, Ordering::Release);
        let mut process = self.process.lock();
        if let Err(e) = process.kill() {
            tracing::debug!(error = %e, "kill failed");
        }
        for _ in 0..KILL_REAP_ATTEMPTS {
            match process.try_wait() {
                Ok(Some(code)) => return code,
                Ok(None) => std::thread::sleep(WAIT_POLL),
                Err(_) => break,
            }
        }
        UNKNOWN_EXIT_CODE
    }

    fn mark_terminated(&self) {
        self.terminated_tx.lock().take();
    }
}

/// Destroys the process when dropped, on normal and panicking exits alike.
pub(crate) struct DestroyOnDrop(pub Arc<ProcessHandle>);

impl Drop for DestroyOnDrop {
    fn drop(&mut self) {
        self.0.destroy();
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
