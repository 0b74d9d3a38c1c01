use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Correlation identifier linking an outgoing request to its reply.
///
/// Ids are process-local and allocated from a monotonically increasing
/// counter owned by a single connection. The first id handed out is `1`;
/// `0` is reserved as the "no correlation" sentinel and never allocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    // ---

    /// Wrap a raw wire value.
    ///
    /// Returns `None` for the `0` sentinel.
    pub fn new(raw: u64) -> Option<Self> {
        // ---
        (raw != 0).then_some(Self(raw))
    }

    /// The raw integer carried on the wire.
    pub fn get(self) -> u64 {
        // ---
        self.0
    }
}

impl fmt::Display for RequestId {
    // ---

    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // ---
        write!(f, "{}", self.0)
    }
}

/// Allocator for [`RequestId`]s.
///
/// Safe to share between tasks; every call to [`next`](Self::next) yields a
/// distinct id for the lifetime of the generator.
#[derive(Debug)]
pub(crate) struct RequestIdGenerator {
    next: AtomicU64,
}

impl RequestIdGenerator {
    // ---

    pub fn new() -> Self {
        // ---
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next(&self) -> RequestId {
        // ---
        RequestId(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for RequestIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
