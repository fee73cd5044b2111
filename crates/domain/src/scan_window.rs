/// Inclusive range of timestamps in millis that one scan considers due.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScanWindow {
    pub start_ts: i64,
    pub end_ts: i64,
}

impl ScanWindow {
    /// Window of half-width `tolerance_millis` centered on `target_ts`
    pub fn around(target_ts: i64, tolerance_millis: i64) -> Self {
        let tolerance_millis = tolerance_millis.abs();
        Self {
            start_ts: target_ts - tolerance_millis,
            end_ts: target_ts + tolerance_millis,
        }
    }

    pub fn contains(&self, ts: i64) -> bool {
        self.start_ts <= ts && ts <= self.end_ts
    }

    /// True if `next` leaves no uncovered timestamp between itself and `self`
    pub fn tiles_with(&self, next: &ScanWindow) -> bool {
        next.start_ts <= self.end_ts + 1 && next.end_ts >= self.end_ts
    }
}

/// Smallest tolerance for which the windows of two scans `interval_millis` apart tile
/// the timeline without gaps.
pub fn min_tolerance_millis(interval_millis: i64) -> i64 {
    let interval_millis = interval_millis.abs();
    interval_millis / 2 + interval_millis % 2
}
