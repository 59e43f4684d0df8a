//! Resolves the reference instant of a run and the month keys used to query the API.

use std::fmt;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use chrono_tz::Tz;

/// The bakery is in San Rafael, every date is interpreted in this timezone.
pub static TIMEZONE: Tz = chrono_tz::America::Los_Angeles;

/// The reference instant of a single invocation.
///
/// "Now" is read once and passed down, so every filter of a run agrees on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    reference: DateTime<Tz>,
}

impl TimeWindow {
    /// Read the wall clock in the given timezone.
    pub fn now(tz: Tz) -> Self {
        Self::at(Utc::now().with_timezone(&tz))
    }

    pub fn at(reference: DateTime<Tz>) -> Self {
        Self { reference }
    }

    pub fn reference(&self) -> DateTime<Tz> {
        self.reference
    }

    pub fn timezone(&self) -> Tz {
        self.reference.timezone()
    }

    /// The month containing the reference instant, in its local timezone.
    pub fn query_window(&self) -> QueryWindow {
        QueryWindow::containing(self.reference.date_naive())
    }
}

/// A (month, year) pair, the key of one `GetItemsByMonth` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct QueryWindow {
    year: i32,
    month: u32,
}

impl QueryWindow {
    /// Returns `None` unless `month` is within `1..=12`.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        (1..=12).contains(&month).then_some(Self { year, month })
    }

    pub fn containing(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn year(&self) -> i32 {
        self.year
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    /// The following calendar month, rolling over into the next year after December.
    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn first_day(&self) -> NaiveDate {
        NaiveDate::from_ymd_opt(self.year, self.month, 1).unwrap_or(NaiveDate::MAX)
    }

    /// The `MM-YYYY` form expected by the API.
    pub fn to_query(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for QueryWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:04}", self.month, self.year)
    }
}
