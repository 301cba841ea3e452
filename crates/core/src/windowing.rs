//! Date-range partitioning under the bulk-query quota.
//!
//! The production endpoint allows 20 requests per sliding hour. A long
//! query range is split into windows of at most three calendar months minus
//! one day, and the fetcher pauses between windows long enough that the
//! next window's first request cannot exceed the quota. The pause is
//! derived from the quota constant, not hard-coded, so a quota change only
//! touches [`REQUESTS_PER_HOUR`].

use std::time::Duration;

use chrono::{Days, Months, NaiveDate};
use ksef_domain::DateWindow;

/// Documented production quota on the bulk query endpoint.
pub const REQUESTS_PER_HOUR: u64 = 20;

/// Safety margin added on top of the per-request quota spacing.
const WINDOW_SLEEP_MARGIN_SECS: u64 = 5;

/// Maximum window span in calendar months (the window ends one day short
/// of this to keep windows non-overlapping).
const WINDOW_MONTHS: u32 = 3;

/// Pause between consecutive windows: 3600 s / 20 req = 180 s, plus margin.
#[must_use]
pub fn window_sleep() -> Duration {
    Duration::from_secs(3600 / REQUESTS_PER_HOUR + WINDOW_SLEEP_MARGIN_SECS)
}

/// Split `[from, to]` into contiguous, non-overlapping windows covering the
/// range exactly. Greedy: every window is as large as allowed, with the
/// last one capped at `to`. Returns an empty sequence when `from > to`.
#[must_use]
pub fn partition(from: NaiveDate, to: NaiveDate) -> Vec<DateWindow> {
    let mut windows = Vec::new();
    let mut start = from;
    while start <= to {
        let end = max_window_end(start).min(to);
        windows.push(DateWindow { start, end });
        match end.checked_add_days(Days::new(1)) {
            Some(next) => start = next,
            None => break,
        }
    }
    windows
}

/// Largest legal end date for a window opening at `start`.
fn max_window_end(start: NaiveDate) -> NaiveDate {
    start
        .checked_add_months(Months::new(WINDOW_MONTHS))
        .and_then(|d| d.checked_sub_days(Days::new(1)))
        .unwrap_or(NaiveDate::MAX)
}

/// `YYYY-MM-DDT00:00:00.000Z` — the query format for range starts.
#[must_use]
pub fn start_of_day_iso(date: NaiveDate) -> String {
    format!("{}T00:00:00.000Z", date.format("%Y-%m-%d"))
}

/// `YYYY-MM-DDT23:59:59.000Z` — the query format for range ends.
#[must_use]
pub fn end_of_day_iso(date: NaiveDate) -> String {
    format!("{}T23:59:59.000Z", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn single_window_for_short_range() {
        let windows = partition(date(2025, 1, 1), date(2025, 2, 15));
        assert_eq!(windows, vec![DateWindow { start: date(2025, 1, 1), end: date(2025, 2, 15) }]);
    }

    #[test]
    fn full_year_splits_into_four_quarters() {
        let windows = partition(date(2025, 1, 1), date(2025, 12, 31));
        assert_eq!(windows.len(), 4);
        assert_eq!(windows[0], DateWindow { start: date(2025, 1, 1), end: date(2025, 3, 31) });
        assert_eq!(windows[3], DateWindow { start: date(2025, 10, 1), end: date(2025, 12, 31) });
    }

    #[test]
    fn windows_are_contiguous_and_cover_the_range_exactly() {
        let from = date(2023, 2, 17);
        let to = date(2026, 6, 3);
        let windows = partition(from, to);
        assert_eq!(windows.first().map(|w| w.start), Some(from));
        assert_eq!(windows.last().map(|w| w.end), Some(to));
        for pair in windows.windows(2) {
            assert_eq!(pair[0].end.checked_add_days(Days::new(1)), Some(pair[1].start));
        }
    }

    #[test]
    fn no_window_exceeds_three_months_minus_one_day() {
        let windows = partition(date(2020, 1, 31), date(2025, 12, 31));
        for w in windows {
            assert!(w.start <= w.end);
            assert!(w.end <= max_window_end(w.start));
        }
    }

    #[test]
    fn month_arithmetic_clamps_short_months() {
        // Nov 30 + 3 months clamps to Feb 28/29, then steps back one day.
        assert_eq!(max_window_end(date(2024, 11, 30)), date(2025, 2, 27));
    }

    #[test]
    fn single_day_range() {
        let windows = partition(date(2025, 6, 1), date(2025, 6, 1));
        assert_eq!(windows, vec![DateWindow { start: date(2025, 6, 1), end: date(2025, 6, 1) }]);
    }

    #[test]
    fn inverted_range_yields_no_windows() {
        assert!(partition(date(2025, 6, 2), date(2025, 6, 1)).is_empty());
    }

    #[test]
    fn window_sleep_is_derived_from_the_quota() {
        assert_eq!(window_sleep(), Duration::from_secs(185));
    }

    #[test]
    fn iso_boundaries() {
        assert_eq!(start_of_day_iso(date(2025, 1, 1)), "2025-01-01T00:00:00.000Z");
        assert_eq!(end_of_day_iso(date(2025, 12, 31)), "2025-12-31T23:59:59.000Z");
    }
}
