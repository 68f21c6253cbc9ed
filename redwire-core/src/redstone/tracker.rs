//! The set of coordinates the automaton re-examines every tick.

use parking_lot::Mutex;
use redwire_utils::BlockPos;
use rustc_hash::FxHashSet;

/// Coordinates the automaton watches.
///
/// Grows through [`Tracker::feed`]. It only shrinks when a tick finds a
/// coordinate no longer holds a circuit block, or when a removal hook
/// reports the block gone.
#[derive(Debug, Default)]
pub struct Tracker {
    tracked: Mutex<FxHashSet<BlockPos>>,
}

impl Tracker {
    /// Creates an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts watching `pos`. Returns `false` if it was already watched.
    pub fn feed(&self, pos: BlockPos) -> bool {
        self.tracked.lock().insert(pos)
    }

    /// Stops watching `pos`. Returns `false` if it was not watched.
    pub fn untrack(&self, pos: BlockPos) -> bool {
        self.tracked.lock().remove(&pos)
    }

    /// Stops watching every position in `positions`.
    pub fn untrack_all(&self, positions: &[BlockPos]) {
        if positions.is_empty() {
            return;
        }
        let mut tracked = self.tracked.lock();
        for pos in positions {
            tracked.remove(pos);
        }
    }

    /// Copies the tracked set, sorted so passes visit it in a stable order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<BlockPos> {
        let mut positions: Vec<_> = self.tracked.lock().iter().copied().collect();
        positions.sort_unstable();
        positions
    }

    /// Whether `pos` is watched.
    #[must_use]
    pub fn contains(&self, pos: BlockPos) -> bool {
        self.tracked.lock().contains(&pos)
    }

    /// Number of watched positions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.tracked.lock().len()
    }

    /// Whether nothing is watched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tracked.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feed_is_idempotent() {
        let tracker = Tracker::new();
        let pos = BlockPos::new(1, 2, 3);

        assert!(tracker.feed(pos));
        assert!(!tracker.feed(pos));
        assert_eq!(tracker.len(), 1);
    }

    #[test]
    fn test_untrack_all() {
        let tracker = Tracker::new();
        for x in 0..4 {
            tracker.feed(BlockPos::new(x, 0, 0));
        }

        tracker.untrack_all(&[BlockPos::new(0, 0, 0), BlockPos::new(2, 0, 0)]);

        assert_eq!(
            tracker.snapshot(),
            vec![BlockPos::new(1, 0, 0), BlockPos::new(3, 0, 0)]
        );
    }

    #[test]
    fn test_snapshot_is_detached() {
        let tracker = Tracker::new();
        tracker.feed(BlockPos::new(0, 0, 0));
        let snapshot = tracker.snapshot();

        tracker.feed(BlockPos::new(5, 0, 0));
        assert!(tracker.untrack(BlockPos::new(0, 0, 0)));

        assert_eq!(snapshot, vec![BlockPos::new(0, 0, 0)]);
        assert!(!tracker.is_empty());
    }
}
