//! Session-scoped "rebuild everything next time" state.

/// Records that the next build must be a full rebuild.
///
/// The first reason wins; later requests are ignored until the state is
/// consumed with [`RebuildRequest::take`].
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct RebuildRequest {
    reason: Option<String>,
}

impl RebuildRequest {
    /// Create an empty request.
    pub fn new() -> Self {
        Self::default()
    }

    /// Ask for a full rebuild. Returns `true` if this call set the state.
    pub fn request(&mut self, reason: impl Into<String>) -> bool {
        if self.reason.is_some() {
            return false;
        }
        self.reason = Some(reason.into());
        true
    }

    /// Whether a rebuild was requested.
    #[inline]
    pub fn is_requested(&self) -> bool {
        self.reason.is_some()
    }

    /// The recorded reason, if any.
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Consume the request, resetting the state.
    pub fn take(&mut self) -> Option<String> {
        self.reason.take()
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
    fn first_reason_wins() {
        let mut req = RebuildRequest::new();
        assert!(req.request("cache corrupted"));
        assert!(!req.request("second"));
        assert_eq!(req.reason(), Some("cache corrupted"));
    }

    #[test]
    fn take_consumes() {
        let mut req = RebuildRequest::new();
        req.request("x");
        assert_eq!(req.take(), Some("x".to_string()));
        assert!(!req.is_requested());
        assert_eq!(req.take(), None);
    }
}
