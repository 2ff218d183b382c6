use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, Days, Local, LocalResult, NaiveDate, NaiveTime, TimeZone, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::CoreError;

/// A calendar day in the local timezone, rendered as `YYYY-MM-DD`.
///
/// Ordering is chronological, which for four-digit years is also the
/// lexicographic order of the rendered keys.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn from_date(date: NaiveDate) -> Self {
        Self(date)
    }

    /// Key for the calendar day `dt` falls on in its own timezone. For a
    /// `DateTime<Local>` this reads the local calendar fields, never UTC.
    pub fn from_datetime<Tz: TimeZone>(dt: &DateTime<Tz>) -> Self {
        Self(dt.date_naive())
    }

    pub fn today() -> Self {
        Self::from_datetime(&Local::now())
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The first instant of this day in the local timezone.
    ///
    /// Zones that skip midnight on a DST transition resolve to the first
    /// valid instant after it.
    pub fn local_midnight(&self) -> DateTime<Local> {
        start_of_day(&Local, self.0)
    }

    pub fn succ(&self) -> Option<Self> {
        self.0.succ_opt().map(Self)
    }

    pub fn pred(&self) -> Option<Self> {
        self.0.pred_opt().map(Self)
    }

    pub fn minus_days(&self, days: u64) -> Option<Self> {
        self.0.checked_sub_days(Days::new(days)).map(Self)
    }

    pub fn plus_days(&self, days: u64) -> Option<Self> {
        self.0.checked_add_days(Days::new(days)).map(Self)
    }

    /// Inclusive ascending range of days. Empty when `start > end`.
    pub fn range(start: DateKey, end: DateKey) -> DateRange {
        DateRange {
            next: Some(start),
            end,
        }
    }
}

/// First valid instant of `date` in `tz`.
pub fn start_of_day<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> DateTime<Tz> {
    let mut time = NaiveTime::MIN;
    for _ in 0..24 {
        match tz.from_local_datetime(&date.and_time(time)) {
            LocalResult::Single(dt) => return dt,
            LocalResult::Ambiguous(earliest, _) => return earliest,
            LocalResult::None => {
                time = time + chrono::Duration::minutes(30);
            }
        }
    }
    tz.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:04}-{:02}-{:02}",
            self.0.year(),
            self.0.month(),
            self.0.day()
        )
    }
}

impl fmt::Debug for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DateKey({self})")
    }
}

impl FromStr for DateKey {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = s.as_bytes();
        let well_formed = bytes.len() == 10
            && bytes[4] == b'-'
            && bytes[7] == b'-'
            && bytes
                .iter()
                .enumerate()
                .all(|(i, b)| i == 4 || i == 7 || b.is_ascii_digit());
        if !well_formed {
            return Err(CoreError::InvalidDateKey(s.to_string()));
        }
        NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map(Self)
            .map_err(|_| CoreError::InvalidDateKey(s.to_string()))
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Iterator over consecutive days, see [`DateKey::range`].
#[derive(Debug, Clone)]
pub struct DateRange {
    next: Option<DateKey>,
    end: DateKey,
}

impl Iterator for DateRange {
    type Item = DateKey;

    fn next(&mut self) -> Option<DateKey> {
        let current = self.next.filter(|k| *k <= self.end)?;
        self.next = current.succ();
        Some(current)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.next.filter(|k| *k <= self.end) {
            Some(k) => {
                let n = (self.end.0 - k.0).num_days() as usize + 1;
                (n, Some(n))
            }
            None => (0, Some(0)),
        }
    }
}

impl ExactSizeIterator for DateRange {}

/// Inclusive `(start, end)` of a trailing window of `days` days ending at `end`.
/// A zero-length window is treated as one day.
pub fn window_ending(end: DateKey, days: u32) -> (DateKey, DateKey) {
    let back = u64::from(days.max(1) - 1);
    let start = end.minus_days(back).unwrap_or(DateKey(NaiveDate::MIN));
    (start, end)
}

pub fn start_of_week(date: DateKey, week_start: Weekday) -> DateKey {
    let offset = (7 + date.0.weekday().num_days_from_monday()
        - week_start.num_days_from_monday())
        % 7;
    date.minus_days(u64::from(offset)).unwrap_or(date)
}

/// Columns of seven days for a week-per-column grid, oldest first. The last
/// column is the week containing `end`, running from `week_start` onwards.
pub fn week_columns(end: DateKey, weeks: usize, week_start: Weekday) -> Vec<[DateKey; 7]> {
    let mut columns = Vec::with_capacity(weeks);
    let mut col_start = start_of_week(end, week_start);
    for _ in 0..weeks {
        let mut column = [col_start; 7];
        for (i, slot) in column.iter_mut().enumerate() {
            *slot = col_start.plus_days(i as u64).unwrap_or(col_start);
        }
        columns.push(column);
        match col_start.minus_days(7) {
            Some(prev) => col_start = prev,
            None => break,
        }
    }
    columns.reverse();
    columns
}

/// Short month name when the column contains the first of a month.
pub fn month_label(column: &[DateKey]) -> Option<String> {
    column
        .iter()
        .find(|k| k.0.day() == 1)
        .map(|k| k.0.format("%b").to_string())
}
