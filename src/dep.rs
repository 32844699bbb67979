//! Per-property dependency sets.
//!
//! Every reactive slot owns exactly one `Dep` for its whole lifetime. A
//! `Dep` is a notification list of watcher handles, never an owner: watchers
//! live in the runtime arena and dependency sets only hold their ids.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Process-unique sequential handle identifying a watcher.
///
/// Handles are allocated by the runtime in creation order and double as the
/// dependency-set key, so fan-out order is creation order. No ordering
/// guarantee between subscribers is part of the contract; callbacks must be
/// independent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatcherId(pub(crate) u64);

impl WatcherId {
    /// Returns the raw handle value.
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WatcherId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

/// Subscriber registry owned by a single reactive property.
#[derive(Debug, Clone, Default)]
pub struct Dep {
    subs: BTreeSet<WatcherId>,
}

impl Dep {
    /// Creates an empty dependency set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a subscriber. Idempotent: re-registering is a no-op.
    ///
    /// Returns true if the subscriber was not already present.
    pub fn add(&mut self, id: WatcherId) -> bool {
        self.subs.insert(id)
    }

    /// Removes a subscriber (watcher teardown). Unknown ids are a no-op.
    pub fn remove(&mut self, id: WatcherId) -> bool {
        self.subs.remove(&id)
    }

    /// Returns true if `id` is subscribed.
    #[must_use]
    pub fn contains(&self, id: WatcherId) -> bool {
        self.subs.contains(&id)
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.subs.len()
    }

    /// True if no watcher is subscribed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.subs.is_empty()
    }

    /// Snapshot of the current subscribers, in handle order.
    ///
    /// Notification iterates this snapshot, so subscribers added while the
    /// fan-out runs do not receive the current round.
    #[must_use]
    pub fn subscribers(&self) -> Vec<WatcherId> {
        self.subs.iter().copied().collect()
    }
}
