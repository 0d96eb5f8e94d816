//! Retention windows and calendar expiry cutoffs

use chrono::{Datelike, Duration, NaiveDate};
use serde::Deserialize;

/// Maximum age before an item is considered expired
///
/// Applied as `reference - window`. Years and months are calendar units:
/// subtracting one month from 2021-03-31 lands on 2021-02-28, not 31 days
/// earlier.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetentionWindow {
    /// Whole years to retain
    pub years: u32,
    /// Whole months to retain
    pub months: u32,
    /// Whole days to retain
    pub days: u32,
}

impl RetentionWindow {
    /// Window spanning years, months and days
    pub const fn new(years: u32, months: u32, days: u32) -> Self {
        Self {
            years,
            months,
            days,
        }
    }

    /// Day-only window
    pub const fn days(days: u32) -> Self {
        Self::new(0, 0, days)
    }

    /// Month-only window
    pub const fn months(months: u32) -> Self {
        Self::new(0, months, 0)
    }

    /// Compute the cutoff date for a reference date
    ///
    /// Years and months are subtracted first (clamping to the last valid
    /// day of the target month), then days as an exact duration.
    pub fn cutoff(&self, reference: NaiveDate) -> NaiveDate {
        let shifted = minus_months(reference, self.years * 12 + self.months);
        shifted - Duration::days(i64::from(self.days))
    }
}

/// An item is expired iff its date is strictly earlier than the cutoff
///
/// Equal-to-cutoff is not yet expired. Comparison is date-granular;
/// time of day never participates.
pub fn is_expired(candidate: NaiveDate, cutoff: NaiveDate) -> bool {
    candidate < cutoff
}

fn minus_months(date: NaiveDate, months: u32) -> NaiveDate {
    let total = i64::from(date.year()) * 12 + i64::from(date.month0()) - i64::from(months);
    let year = total.div_euclid(12) as i32;
    let month = total.rem_euclid(12) as u32 + 1;
    let day = date.day().min(days_in_month(year, month));
    NaiveDate::from_ymd_opt(year, month, day).expect("day clamped to target month length")
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|first| first.pred_opt())
        .map(|last| last.day())
        .expect("first of month has a predecessor")
}
