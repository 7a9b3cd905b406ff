//! Compiler messages routed to the compile context.

use std::fmt;
use std::path::Path;

/// Category of a compiler message.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum MessageCategory {
    Error,
    Warning,
    Information,
    Statistics,
}

impl fmt::Display for MessageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageCategory::Error => write!(f, "error"),
            MessageCategory::Warning => write!(f, "warning"),
            MessageCategory::Information => write!(f, "info"),
            MessageCategory::Statistics => write!(f, "statistics"),
        }
    }
}

/// A single diagnostic, optionally attributed to a source location.
///
/// `line` and `column` are 1-based; `None` when the compiler did not report
/// a position.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct CompilerMessage {
    pub category: MessageCategory,
    pub text: String,
    pub url: Option<String>,
    pub line: Option<u32>,
    pub column: Option<u32>,
}

impl CompilerMessage {
    /// Create a message with no source location.
    pub fn new(category: MessageCategory, text: impl Into<String>) -> Self {
        CompilerMessage {
            category,
            text: text.into(),
            url: None,
            line: None,
            column: None,
        }
    }

    /// Create an error message with no source location.
    pub fn error(text: impl Into<String>) -> Self {
        Self::new(MessageCategory::Error, text)
    }

    /// Attach a source location.
    #[must_use]
    pub fn at(mut self, url: impl Into<String>, line: Option<u32>, column: Option<u32>) -> Self {
        self.url = Some(url.into());
        self.line = line;
        self.column = column;
        self
    }

    /// Whether this message is an error.
    #[inline]
    pub fn is_error(&self) -> bool {
        self.category == MessageCategory::Error
    }
}

impl fmt::Display for CompilerMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(url) = &self.url {
            write!(f, "{url}")?;
            if let Some(line) = self.line {
                write!(f, ":{line}")?;
                if let Some(column) = self.column {
                    write!(f, ":{column}")?;
                }
            }
            write!(f, ": ")?;
        }
        write!(f, "{}: {}", self.category, self.text)
    }
}

/// URL used to attribute messages to a source file.
pub fn path_to_url(path: &Path) -> String {
    let path = path.to_string_lossy().replace('\\', "/");
    if path.starts_with('/') {
        format!("file://{path}")
    } else {
        format!("file:///{path}")
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
    use std::path::PathBuf;

    #[test]
    fn url_for_absolute_unix_path() {
        assert_eq!(
            path_to_url(&PathBuf::from("/src/com/acme/Foo.java")),
            "file:///src/com/acme/Foo.java"
        );
    }

    #[test]
    fn display_with_location() {
        let msg = CompilerMessage::error("cannot find symbol").at(
            "file:///src/Foo.java",
            Some(3),
            Some(7),
        );
        assert_eq!(
            msg.to_string(),
            "file:///src/Foo.java:3:7: error: cannot find symbol"
        );
    }

    #[test]
    fn display_without_location() {
        let msg = CompilerMessage::new(MessageCategory::Warning, "deprecated API");
        assert_eq!(msg.to_string(), "warning: deprecated API");
        assert!(!msg.is_error());
    }
}
