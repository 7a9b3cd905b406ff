//! Orchestrator configuration.
//!
//! # Environment Variables
//!
//! - `JMAKE_CLASS_QUEUE_CAPACITY`: capacity of the generated-class queue.
//! - `JMAKE_TERMINATION_GRACE_MS`: how long stream readers wait for trailing
//!   output once the compiler process has exited.
//! - `JMAKE_TEMP_DIR`: parent directory for staging and transform temp dirs.

use std::path::PathBuf;
use std::time::Duration;

/// Default capacity of the class-parser queue.
pub const DEFAULT_CLASS_QUEUE_CAPACITY: usize = 10_000;

/// Default grace period for trailing compiler output after process exit.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_millis(250);

/// Configuration for one orchestration call.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Capacity of the bounded generated-class queue.
    ///
    /// Producers block when it is full; paths are never dropped.
    pub class_queue_capacity: usize,
    /// How long a stream reader keeps waiting for lines once the process is
    /// known to have exited, before it reports end of stream.
    pub termination_grace: Duration,
    /// Parent directory for staging and transform temp directories.
    pub temp_root: PathBuf,
    /// Delete temp directories on a background thread.
    pub async_cleanup: bool,
}

impl OrchestratorConfig {
    /// Create a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            class_queue_capacity: DEFAULT_CLASS_QUEUE_CAPACITY,
            termination_grace: DEFAULT_TERMINATION_GRACE,
            temp_root: std::env::temp_dir(),
            async_cleanup: true,
        }
    }

    /// Defaults overridden by `JMAKE_*` environment variables.
    ///
    /// Unparsable values are ignored with a warning.
    #[must_use]
    pub fn from_env() -> Self {
        let mut config = Self::new();
        if let Some(capacity) = env_parse::<usize>("JMAKE_CLASS_QUEUE_CAPACITY") {
            config = config.with_class_queue_capacity(capacity);
        }
        if let Some(ms) = env_parse::<u64>("JMAKE_TERMINATION_GRACE_MS") {
            config.termination_grace = Duration::from_millis(ms);
        }
        if let Some(dir) = std::env::var_os("JMAKE_TEMP_DIR") {
            config.temp_root = PathBuf::from(dir);
        }
        config
    }

    /// Set the class queue capacity (at least 1).
    #[must_use]
    pub fn with_class_queue_capacity(mut self, capacity: usize) -> Self {
        self.class_queue_capacity = capacity.max(1);
        self
    }

    /// Set the termination grace period.
    #[must_use]
    pub fn with_termination_grace(mut self, grace: Duration) -> Self {
        self.termination_grace = grace;
        self
    }

    /// Set the temp root.
    #[must_use]
    pub fn with_temp_root(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_root = dir.into();
        self
    }

    /// Choose between background and inline temp-dir deletion.
    #[must_use]
    pub fn with_async_cleanup(mut self, async_cleanup: bool) -> Self {
        self.async_cleanup = async_cleanup;
        self
    }
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(variable = name, value = %raw, "ignoring unparsable setting");
            None
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test assertions use unwrap/expect for clarity"
)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = OrchestratorConfig::default();
        assert_eq!(config.class_queue_capacity, DEFAULT_CLASS_QUEUE_CAPACITY);
        assert_eq!(config.termination_grace, DEFAULT_TERMINATION_GRACE);
        assert!(config.async_cleanup);
    }

    #[test]
    fn queue_capacity_is_never_zero() {
        let config = OrchestratorConfig::new().with_class_queue_capacity(0);
        assert_eq!(config.class_queue_capacity, 1);
    }

    #[test]
    fn builder_sets_fields() {
        let config = OrchestratorConfig::new()
            .with_termination_grace(Duration::from_secs(2))
            .with_temp_root("/scratch")
            .with_async_cleanup(false);
        assert_eq!(config.termination_grace, Duration::from_secs(2));
        assert_eq!(config.temp_root, PathBuf::from("/scratch"));
        assert!(!config.async_cleanup);
    }
}
