/*!
 # Calendar interval model

 Month-day values and the overlap rule for annual date ranges.

 A range whose start is numerically after its end wraps through the year
 boundary. For overlap purposes such a range is treated as running from its
 start to December 31 only; the part after January 1 is ignored. Two ranges
 that both cover early January can therefore be reported as disjoint.
*/

use std::fmt;

use chrono::{Datelike, NaiveDate};

use crate::{Error, Result};

/// Reference leap year used to validate month-day pairs (accepts Feb 29)
const REFERENCE_YEAR: i32 = 2024;

/// Key used for the end of a wrap-around range
const YEAR_END_KEY: u32 = 1231;

/// Largest field value that still fits the two-digit key layout
const MAX_FIELD: u32 = 99;

/// A month/day pair within the annual cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MonthDay {
    month: u32,
    day: u32,
}

impl MonthDay {
    /// Value that unreadable text decodes to; its key is 0
    pub const UNKNOWN: MonthDay = MonthDay { month: 0, day: 0 };

    /// Parses `MM-DD`, checking the day against the calendar
    ///
    /// One- or two-digit fields are accepted; February 29 is valid.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let date = NaiveDate::parse_from_str(&format!("{REFERENCE_YEAR}-{text}"), "%Y-%m-%d")
            .map_err(|_| Error::InvalidFormat(format!("'{text}' is not a valid MM-DD date")))?;

        Ok(Self::from_date(date))
    }

    /// Reads `M-D` without calendar validation, falling back to [`MonthDay::UNKNOWN`]
    ///
    /// Fields above 99 also fall back, so [`MonthDay::key`] cannot overflow.
    pub fn lenient(text: &str) -> Self {
        let mut parts = text.split('-');
        match (parts.next(), parts.next(), parts.next()) {
            (Some(m), Some(d), None) => match (m.trim().parse(), d.trim().parse()) {
                (Ok(month), Ok(day)) if month <= MAX_FIELD && day <= MAX_FIELD => {
                    MonthDay { month, day }
                }
                _ => Self::UNKNOWN,
            },
            _ => Self::UNKNOWN,
        }
    }

    fn from_date(date: NaiveDate) -> Self {
        MonthDay {
            month: date.month(),
            day: date.day(),
        }
    }

    pub fn month(&self) -> u32 {
        self.month
    }

    pub fn day(&self) -> u32 {
        self.day
    }

    /// Comparable integer encoding: `month * 100 + day`
    pub fn key(&self) -> u32 {
        self.month * 100 + self.day
    }
}

impl fmt::Display for MonthDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}-{:02}", self.month, self.day)
    }
}

/// Closed key interval of a range, with the wrap-around end coerced to 12-31
fn effective_keys(start: MonthDay, end: MonthDay) -> (u32, u32) {
    let (s, e) = (start.key(), end.key());
    if s > e {
        (s, YEAR_END_KEY)
    } else {
        (s, e)
    }
}

/// Whether two annual ranges overlap (closed intervals over month-day keys)
pub fn date_ranges_overlap(a: (MonthDay, MonthDay), b: (MonthDay, MonthDay)) -> bool {
    let (s1, e1) = effective_keys(a.0, a.1);
    let (s2, e2) = effective_keys(b.0, b.1);
    !(e1 < s2 || s1 > e2)
}
