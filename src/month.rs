use anyhow::bail;
use chrono::{Datelike, NaiveDate, NaiveDateTime};

use std::fmt::Display;

/// A calendar month of a specific year, ignoring day and time of day.
///
/// Months order chronologically.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Month {
    year: i32,
    month: u32,
}

impl Month {
    /// Creates the bucket for `month` (1-12) of `year`.
    ///
    /// # Errors
    ///
    /// Returns an error if `month` is out of range, or if `year` is beyond
    /// the range of dates `chrono` can represent.
    pub fn new(year: i32, month: u32) -> anyhow::Result<Self> {
        if !(1..=12).contains(&month) {
            bail!("month out of range: {month}");
        }
        if NaiveDate::from_ymd_opt(year, month, 1).is_none() {
            bail!("year out of range: {year}");
        }
        Ok(Self { year, month })
    }

    /// Returns the month `timestamp` falls in.
    #[must_use]
    pub fn of(timestamp: &NaiveDateTime) -> Self {
        Self {
            year: timestamp.year(),
            month: timestamp.month(),
        }
    }

    /// Returns the first instant of the month: midnight on day 1.
    ///
    /// [`Self::new`] and [`Self::of`] only create months whose first day
    /// `chrono` can represent, so this cannot fail.
    #[must_use]
    pub fn start(self) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(self.year, self.month, 1)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .expect("first day of a valid month")
    }
}

impl Display for Month {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
