use crate::error::{ProcessingError, Result};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Inclusive label range on a numeric coordinate axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoordRange {
    pub start: f64,
    pub stop: f64,
}

impl CoordRange {
    pub fn new(start: f64, stop: f64) -> Self {
        Self { start, stop }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.start <= value && value <= self.stop
    }
}

impl fmt::Display for CoordRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.start, self.stop)
    }
}

/// Closed calendar range, `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    start: NaiveDate,
    end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(ProcessingError::InvalidFormat(format!(
                "Date range start {} is after end {}",
                start, end
            )));
        }
        Ok(Self { start, end })
    }

    /// Range covering a single day.
    pub fn day(date: NaiveDate) -> Self {
        Self {
            start: date,
            end: date,
        }
    }

    /// Range from the first to the last calendar day of the month containing `date`.
    pub fn month_of(date: NaiveDate) -> Self {
        let start = first_of_month(date);
        Self {
            start,
            end: last_of_month(date),
        }
    }

    pub fn start(&self) -> NaiveDate {
        self.start
    }

    pub fn end(&self) -> NaiveDate {
        self.end
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// First-of-month dates falling inside the range.
    pub fn month_starts(&self) -> Vec<NaiveDate> {
        let mut months = Vec::new();
        let mut current = first_of_month(self.start);
        if current < self.start {
            current = next_month(current);
        }
        while current <= self.end {
            months.push(current);
            let next = next_month(current);
            if next <= current {
                break;
            }
            current = next;
        }
        months
    }

    /// The range cut at month boundaries, in order. The first and last
    /// windows are clipped to the range.
    pub fn month_windows(&self) -> Vec<DateRange> {
        let mut windows = Vec::new();
        let mut start = self.start;
        loop {
            let end = last_of_month(start).min(self.end);
            windows.push(DateRange { start, end });
            let next = next_month(first_of_month(start));
            if end >= self.end || next <= start {
                break;
            }
            start = next;
        }
        windows
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// A calendar point or closed range; each data source decides what a single
/// point expands to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeSelector {
    Date(NaiveDate),
    Range(DateRange),
}

impl TimeSelector {
    /// The selector as a range, treating a single date as `[d, d]`.
    pub fn as_range(&self) -> DateRange {
        match self {
            TimeSelector::Date(date) => DateRange::day(*date),
            TimeSelector::Range(range) => *range,
        }
    }
}

impl From<NaiveDate> for TimeSelector {
    fn from(date: NaiveDate) -> Self {
        TimeSelector::Date(date)
    }
}

impl From<DateRange> for TimeSelector {
    fn from(range: DateRange) -> Self {
        TimeSelector::Range(range)
    }
}

impl FromStr for TimeSelector {
    type Err = ProcessingError;

    /// Accepts `YYYY-MM-DD` or `YYYY-MM-DD..YYYY-MM-DD`.
    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        match s.split_once("..") {
            Some((start, end)) => {
                let start = NaiveDate::parse_from_str(start.trim(), "%Y-%m-%d")?;
                let end = NaiveDate::parse_from_str(end.trim(), "%Y-%m-%d")?;
                Ok(TimeSelector::Range(DateRange::new(start, end)?))
            }
            None => Ok(TimeSelector::Date(NaiveDate::parse_from_str(
                s, "%Y-%m-%d",
            )?)),
        }
    }
}

impl fmt::Display for TimeSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeSelector::Date(date) => write!(f, "{}", date),
            TimeSelector::Range(range) => write!(f, "{}", range),
        }
    }
}

/// Selection applied to a single coordinate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Indexer {
    Coord(CoordRange),
    Time(DateRange),
}

impl From<CoordRange> for Indexer {
    fn from(range: CoordRange) -> Self {
        Indexer::Coord(range)
    }
}

impl From<DateRange> for Indexer {
    fn from(range: DateRange) -> Self {
        Indexer::Time(range)
    }
}

/// Coordinate name to selection, holding only the filters that were set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Indexers(BTreeMap<String, Indexer>);

impl Indexers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build indexers from optional filters, dropping every unset entry so it
    /// is never forwarded to a selection.
    pub fn compress<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, Option<Indexer>)>,
        K: Into<String>,
    {
        Self(
            entries
                .into_iter()
                .filter_map(|(name, value)| value.map(|v| (name.into(), v)))
                .collect(),
        )
    }

    pub fn get(&self, name: &str) -> Option<&Indexer> {
        self.0.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Indexer)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }
}

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

pub fn last_of_month(date: NaiveDate) -> NaiveDate {
    next_month(first_of_month(date))
        .pred_opt()
        .unwrap_or(date)
}

fn next_month(first: NaiveDate) -> NaiveDate {
    let (year, month) = if first.month() == 12 {
        (first.year() + 1, 1)
    } else {
        (first.year(), first.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(first)
}
