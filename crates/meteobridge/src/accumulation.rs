//! Rolling rain accumulation over calendar periods.
//!
//! The device reports the rain that fell since its previous report. Each
//! bucket sums those deltas and starts over from zero when its calendar
//! boundary is crossed.

use chrono::{Datelike, NaiveDateTime, Timelike};

use crate::error::{Error, Result};

/// Accumulation periods, in driver order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

/// Identifies one calendar period; a change means the boundary was crossed.
///
/// Keys carry the enclosing year so a reading exactly one day (or week)
/// later still resets the bucket.
type BoundaryKey = (i32, u32, u32);

impl Period {
    pub const ALL: [Period; 5] = [
        Period::Hourly,
        Period::Daily,
        Period::Weekly,
        Period::Monthly,
        Period::Yearly,
    ];

    /// Precipitation channel fed by this period.
    pub fn channel(self) -> &'static str {
        match self {
            Period::Hourly => "hourly",
            Period::Daily => "daily",
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
            Period::Yearly => "yearly",
        }
    }

    fn key(self, now: NaiveDateTime) -> BoundaryKey {
        match self {
            Period::Hourly => (now.year(), now.ordinal(), now.hour()),
            Period::Daily => (now.year(), now.ordinal(), 0),
            Period::Weekly => {
                let week = now.iso_week();
                (week.year(), week.week(), 0)
            }
            Period::Monthly => (now.year(), now.month(), 0),
            Period::Yearly => (now.year(), 0, 0),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Bucket {
    total: f64,
    key: Option<BoundaryKey>,
}

/// Hourly, daily, weekly, monthly and yearly rain totals in millimeters.
#[derive(Debug, Clone, Default)]
pub struct AccumulationTracker {
    buckets: [Bucket; 5],
}

impl AccumulationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one rain delta observed at `now`.
    ///
    /// Every bucket whose boundary key changed is reset before the delta is
    /// added. Negative or non-finite deltas are rejected and leave the state
    /// untouched.
    pub fn add(&mut self, delta_mm: f64, now: NaiveDateTime) -> Result<()> {
        if !delta_mm.is_finite() || delta_mm < 0.0 {
            return Err(Error::InvalidInput(format!(
                "rain delta must be a non-negative number, got {delta_mm}"
            )));
        }
        for (bucket, period) in self.buckets.iter_mut().zip(Period::ALL) {
            let key = period.key(now);
            if bucket.key != Some(key) {
                bucket.key = Some(key);
                bucket.total = 0.0;
            }
            bucket.total += delta_mm;
        }
        Ok(())
    }

    pub fn total(&self, period: Period) -> f64 {
        self.buckets[period as usize].total
    }

    /// `(period, total)` for every bucket.
    pub fn totals(&self) -> impl Iterator<Item = (Period, f64)> + '_ {
        Period::ALL.into_iter().map(|p| (p, self.total(p)))
    }
}
