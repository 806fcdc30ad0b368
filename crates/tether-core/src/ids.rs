//! Continuation identifiers.

use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

static NEXT_ID: AtomicU64 = AtomicU64::new(1);

/// Identifier of one unit of asynchronous work (task, callback, scope).
///
/// Identifiers drawn with [`ContinuationId::next`] are unique for the life of
/// the process and strictly increasing. They are never handed out twice, so
/// a stale completion signal can never evict a newer continuation's entry.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContinuationId(u64);

impl ContinuationId {
    /// Allocate the next process-unique identifier.
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Wrap an identifier supplied by a foreign host.
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw numeric value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContinuationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ContinuationId {
    type Err = std::num::ParseIntError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        let a = ContinuationId::next();
        let b = ContinuationId::next();
        assert_ne!(a, b);
    }

    #[test]
    fn monotonic_ordering() {
        let ids: Vec<ContinuationId> = (0..100).map(|_| ContinuationId::next()).collect();
        for w in ids.windows(2) {
            assert!(w[0] < w[1], "not monotonic: {} >= {}", w[0], w[1]);
        }
    }

    #[test]
    fn ids_are_unique_across_threads() {
        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| (0..250).map(|_| ContinuationId::next()).collect::<Vec<_>>()))
            .collect();
        let mut all: Vec<ContinuationId> = handles.into_iter().flat_map(|h| h.join().unwrap()).collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn from_raw_preserves_value() {
        let id = ContinuationId::from_raw(42);
        assert_eq!(id.as_u64(), 42);
        assert_eq!(id.to_string(), "42");
    }

    #[test]
    fn display_and_from_str_roundtrip() {
        let id = ContinuationId::next();
        let parsed: ContinuationId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_is_transparent() {
        let json = serde_json::to_string(&ContinuationId::from_raw(7)).unwrap();
        assert_eq!(json, "7");
        let parsed: ContinuationId = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, ContinuationId::from_raw(7));
    }
}
