//! Sources filter for one compile pass.

use bitflags::bitflags;

bitflags! {
    /// Selects which kind of sources a compile pass sees.
    ///
    /// A chunk carries one of these and may swap it between passes when
    /// production and test outputs live in different directories.
    #[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
    #[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
    pub struct SourcesFilter: u8 {
        /// Production sources.
        const PRODUCTION = 0b01;
        /// Test sources.
        const TEST = 0b10;
        /// Production and test sources.
        const ALL = Self::PRODUCTION.bits() | Self::TEST.bits();
    }
}

impl SourcesFilter {
    /// Whether a file from a source root with the given test flag passes.
    #[inline]
    pub fn accepts(self, is_test: bool) -> bool {
        if is_test {
            self.contains(SourcesFilter::TEST)
        } else {
            self.contains(SourcesFilter::PRODUCTION)
        }
    }
}

impl Default for SourcesFilter {
    fn default() -> Self {
        SourcesFilter::ALL
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
    fn all_accepts_both_kinds() {
        assert!(SourcesFilter::ALL.accepts(true));
        assert!(SourcesFilter::ALL.accepts(false));
    }

    #[test]
    fn production_rejects_tests() {
        assert!(SourcesFilter::PRODUCTION.accepts(false));
        assert!(!SourcesFilter::PRODUCTION.accepts(true));
    }

    #[test]
    fn test_rejects_production() {
        assert!(SourcesFilter::TEST.accepts(true));
        assert!(!SourcesFilter::TEST.accepts(false));
    }

    #[test]
    fn default_is_all() {
        assert_eq!(SourcesFilter::default(), SourcesFilter::ALL);
    }
}
