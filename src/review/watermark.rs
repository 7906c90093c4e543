//! Watermark tracker — the boundary between rows already surfaced to a
//! moderator and rows nobody has seen yet.

use std::sync::atomic::{AtomicU64, Ordering};

/// Highest row index already surfaced to any moderator.
///
/// Process-lifetime state, seeded from the configured baseline at startup
/// and never persisted. Monotonically non-decreasing: concurrent retrieval
/// passes resolve through an atomic fetch-max, so overlapping advances can
/// never move the watermark backwards regardless of completion order.
#[derive(Debug)]
pub struct WatermarkTracker {
    last_seen: AtomicU64,
}

impl WatermarkTracker {
    /// Create a tracker starting at `baseline` (the highest row considered
    /// already surfaced when the process starts).
    pub fn new(baseline: u64) -> Self {
        Self {
            last_seen: AtomicU64::new(baseline),
        }
    }

    /// The current watermark.
    pub fn current(&self) -> u64 {
        self.last_seen.load(Ordering::Acquire)
    }

    /// Record that a retrieval pass scanned `rows_scanned` rows starting at
    /// `start_row`, and return the resulting watermark.
    ///
    /// The new value is `max(current, start_row + rows_scanned)` applied
    /// atomically. Idempotent for repeated identical input.
    pub fn advance(&self, start_row: u64, rows_scanned: u64) -> u64 {
        let candidate = start_row.saturating_add(rows_scanned);
        let previous = self.last_seen.fetch_max(candidate, Ordering::AcqRel);
        previous.max(candidate)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_baseline() {
        let tracker = WatermarkTracker::new(21_900);
        assert_eq!(tracker.current(), 21_900);
    }

    #[test]
    fn advance_moves_forward() {
        let tracker = WatermarkTracker::new(10);
        assert_eq!(tracker.advance(10, 5), 15);
        assert_eq!(tracker.current(), 15);
    }

    #[test]
    fn advance_is_idempotent() {
        let tracker = WatermarkTracker::new(0);
        assert_eq!(tracker.advance(10, 5), 15);
        assert_eq!(tracker.advance(10, 5), 15);
        assert_eq!(tracker.current(), 15);
    }

    #[test]
    fn advance_never_decreases() {
        let tracker = WatermarkTracker::new(100);
        assert_eq!(tracker.advance(10, 5), 100);
        assert_eq!(tracker.current(), 100);
    }

    #[test]
    fn overlapping_passes_resolve_to_max() {
        // Two passes over rows 10..15 and 15..20; either completion order
        // must leave the watermark at 20.
        let tracker = WatermarkTracker::new(1);
        tracker.advance(15, 5);
        tracker.advance(10, 5);
        assert_eq!(tracker.current(), 20);
    }

    #[test]
    fn concurrent_advances_resolve_to_max() {
        let tracker = WatermarkTracker::new(1);
        std::thread::scope(|scope| {
            scope.spawn(|| tracker.advance(10, 5));
            scope.spawn(|| tracker.advance(15, 5));
        });
        assert_eq!(tracker.current(), 20);
    }

    #[test]
    fn zero_rows_scanned_still_applies_max() {
        let tracker = WatermarkTracker::new(5);
        assert_eq!(tracker.advance(30, 0), 30);
        assert_eq!(tracker.current(), 30);
    }
}
