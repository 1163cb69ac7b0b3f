use chrono::{DateTime, TimeZone, Utc};

/// Seconds elapsed since 2000-01-01T00:00:00Z. All stored timestamps use this epoch.
pub fn now_secs() -> i64 {
    secs_since_epoch(Utc::now())
}

pub fn secs_since_epoch(t: DateTime<Utc>) -> i64 {
    (t - epoch()).num_seconds()
}

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2000, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_default()
}

/// Half-open interval `[from, to)` of epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub from: i64,
    pub to: i64,
}

impl TimeRange {
    pub fn new(from: i64, len: i64) -> Self {
        Self { from, to: from + len }
    }

    pub fn contains(&self, t: i64) -> bool {
        self.from <= t && t < self.to
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.from < other.to && other.from < self.to
    }
}
