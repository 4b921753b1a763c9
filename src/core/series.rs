//! Date-indexed series: ranges, gap detection, merging and as-of alignment.
//!
//! Everything here is pure so the cache and join behaviour can be tested
//! without touching disk or the network.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use std::fmt::Display;

/// A value that belongs to one calendar day.
pub trait Dated {
    fn date(&self) -> NaiveDate;
}

impl Dated for NaiveDate {
    fn date(&self) -> NaiveDate {
        *self
    }
}

/// Inclusive calendar range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    /// Builds a range, swapping the bounds if they arrive reversed.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        if start <= end {
            DateRange { start, end }
        } else {
            DateRange {
                start: end,
                end: start,
            }
        }
    }

    pub fn single(day: NaiveDate) -> Self {
        DateRange { start: day, end: day }
    }

    /// Shifts both bounds off weekends, since nothing is published on them.
    pub fn to_weekdays(self) -> Self {
        DateRange::new(previous_weekday(self.start), previous_weekday(self.end))
    }

    pub fn contains(&self, day: NaiveDate) -> bool {
        self.start <= day && day <= self.end
    }
}

impl Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..={}", self.start, self.end)
    }
}

/// Saturday and Sunday map back to the preceding Friday.
pub fn previous_weekday(day: NaiveDate) -> NaiveDate {
    match day.weekday() {
        Weekday::Sat => day - Duration::days(1),
        Weekday::Sun => day - Duration::days(2),
        _ => day,
    }
}

/// The most recent weekday strictly before `today`: the last session whose
/// close is final.
pub fn last_completed_session(today: NaiveDate) -> NaiveDate {
    previous_weekday(today - Duration::days(1))
}

/// Sub-ranges of `wanted` that a sorted cached series does not reach.
///
/// Coverage is judged by the first and last cached dates: a request that
/// starts earlier needs `[wanted.start, first - 1]`, one that ends later
/// needs `[last + 1, wanted.end]`. Gaps inside the cached span are trading
/// holidays, not missing data.
pub fn missing_ranges<T: Dated>(cached: &[T], wanted: DateRange) -> Vec<DateRange> {
    let (Some(first), Some(last)) = (cached.first(), cached.last()) else {
        return vec![wanted];
    };
    let (first, last) = (first.date(), last.date());

    let mut missing = Vec::new();
    if wanted.start < first {
        missing.push(DateRange::new(wanted.start, first - Duration::days(1)));
    }
    if wanted.end > last {
        missing.push(DateRange::new(last + Duration::days(1), wanted.end));
    }
    missing
}

/// Concatenates two series, sorts by date and keeps one entry per date.
///
/// When both sides carry the same date the `incoming` value wins, matching
/// "last value of the day" semantics for refreshed data.
pub fn merge_series<T: Dated>(existing: Vec<T>, incoming: Vec<T>) -> Vec<T> {
    let mut merged: Vec<(usize, T)> = existing
        .into_iter()
        .map(|item| (0, item))
        .chain(incoming.into_iter().map(|item| (1, item)))
        .collect();
    // Stable sort keeps within-side order, so the later duplicate stays last
    merged.sort_by_key(|(side, item)| (item.date(), *side));

    let mut out: Vec<T> = Vec::with_capacity(merged.len());
    for (_, item) in merged {
        match out.last_mut() {
            Some(prev) if prev.date() == item.date() => *prev = item,
            _ => out.push(item),
        }
    }
    out
}

/// Entries of a sorted series that fall inside `range`.
pub fn slice_range<T: Dated + Clone>(series: &[T], range: DateRange) -> Vec<T> {
    series
        .iter()
        .filter(|item| range.contains(item.date()))
        .cloned()
        .collect()
}

/// Backward as-of join of sorted `dates` against a sorted `series`.
///
/// For each date yields the latest entry dated on or before it, or `None`
/// when the series has nothing that early. Single pass over both inputs.
pub fn asof_backward<'a, T: Dated>(dates: &[NaiveDate], series: &'a [T]) -> Vec<Option<&'a T>> {
    let mut aligned = Vec::with_capacity(dates.len());
    let mut cursor = 0;
    let mut current: Option<&T> = None;

    for day in dates {
        while cursor < series.len() && series[cursor].date() <= *day {
            current = Some(&series[cursor]);
            cursor += 1;
        }
        aligned.push(current);
    }
    aligned
}
