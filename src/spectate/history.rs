//! Rolling snapshot history for delayed spectator views
//!
//! Each room keeps a chronological sequence of opaque state snapshots. The
//! sequence is trimmed from the front on every insert so that nothing older
//! than [`RETENTION_WINDOW`] relative to the newest snapshot survives.
//! Lookups answer "what did the room look like `delay` ago": the newest
//! snapshot captured strictly before `now - delay`.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// How much history is kept per room, independent of the configured delay
pub const RETENTION_WINDOW: Duration = Duration::from_secs(5 * 60);

/// One timestamped capture of room state
#[derive(Debug)]
pub struct Snapshot<S> {
    pub state: Arc<S>,
    pub captured_at: Instant,
}

impl<S> Clone for Snapshot<S> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            captured_at: self.captured_at,
        }
    }
}

/// Result of recording a snapshot
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordOutcome {
    /// Snapshots dropped from the front by retention
    pub evicted: usize,
    /// The snapshot was older than the current tail and was sorted into place
    pub reordered: bool,
}

/// Chronological snapshot sequence for one room
#[derive(Debug)]
pub struct DelayedStateBuffer<S> {
    snapshots: VecDeque<Snapshot<S>>,
}

impl<S> DelayedStateBuffer<S> {
    pub fn new() -> Self {
        Self {
            snapshots: VecDeque::new(),
        }
    }

    /// Append a snapshot captured at `captured_at`, then trim expired history.
    ///
    /// A timestamp earlier than the current tail is inserted at its sorted
    /// position (after any equal timestamps) so the sequence stays ascending.
    pub fn record(&mut self, state: Arc<S>, captured_at: Instant) -> RecordOutcome {
        let snapshot = Snapshot { state, captured_at };
        let mut outcome = RecordOutcome::default();

        match self.snapshots.back() {
            Some(last) if captured_at < last.captured_at => {
                let idx = self
                    .snapshots
                    .partition_point(|s| s.captured_at <= captured_at);
                self.snapshots.insert(idx, snapshot);
                outcome.reordered = true;
            }
            _ => self.snapshots.push_back(snapshot),
        }

        outcome.evicted = self.evict_expired();
        outcome
    }

    /// Drop every snapshot older than the retention window measured from the newest one
    fn evict_expired(&mut self) -> usize {
        let newest = match self.snapshots.back() {
            Some(s) => s.captured_at,
            None => return 0,
        };
        let Some(cutoff) = newest.checked_sub(RETENTION_WINDOW) else {
            return 0;
        };

        let mut evicted = 0;
        while self
            .snapshots
            .front()
            .is_some_and(|s| s.captured_at < cutoff)
        {
            self.snapshots.pop_front();
            evicted += 1;
        }
        evicted
    }

    /// Newest snapshot captured strictly before `cutoff`
    pub fn latest_before(&self, cutoff: Instant) -> Option<&Snapshot<S>> {
        let idx = self.snapshots.partition_point(|s| s.captured_at < cutoff);
        if idx == 0 {
            None
        } else {
            self.snapshots.get(idx - 1)
        }
    }

    /// Snapshot visible at `now` to a viewer lagging by `delay`
    pub fn delayed_view(&self, now: Instant, delay: Duration) -> Option<&Snapshot<S>> {
        let cutoff = now.checked_sub(delay)?;
        self.latest_before(cutoff)
    }

    /// Most recent snapshot regardless of delay
    pub fn latest(&self) -> Option<&Snapshot<S>> {
        self.snapshots.back()
    }

    /// Oldest retained snapshot
    pub fn oldest(&self) -> Option<&Snapshot<S>> {
        self.snapshots.front()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn clear(&mut self) {
        self.snapshots.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &Snapshot<S>> {
        self.snapshots.iter()
    }
}

impl<S> Default for DelayedStateBuffer<S> {
    fn default() -> Self {
        Self::new()
    }
}
