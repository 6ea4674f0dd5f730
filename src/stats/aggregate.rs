//! Calendar-range bucketing of completion timestamps.
//!
//! Aggregation is a two-stage filter: a coarse absolute-time window wide
//! enough that no true member of the calendar range can fall outside it, and
//! an exact timezone-aware membership test that discards the false positives
//! the widening lets through. The row store can only filter on absolute
//! instants, so the coarse window is what goes into the storage query.

use chrono::{DateTime, Datelike, Days, NaiveDate, NaiveTime, TimeZone, Utc};

use crate::models::{StatsBar, StatsRange, StatsSummary};
use crate::stats::zoned::{zoned_parts, ZonedParts};

const WEEKDAY_LABELS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
const MONTH_LABELS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// Days added on each side of the coarse window. Worst-case zone offsets are
/// under 15 hours, so two days absorbs any offset or DST discrepancy between
/// local calendar boundaries and absolute time.
const WINDOW_PAD_DAYS: u64 = 2;

/// Number of days in the given local month, leap years included.
pub fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1);
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1)
    };
    match (first, next) {
        (Some(first), Some(next)) => (next - first).num_days() as u32,
        // month is 1..=12 when the parts come from chrono
        _ => 31,
    }
}

/// Zero-filled bucket sequence for `range`, labeled and ordered as the
/// stats view renders them. Month length follows the anchor's local month.
pub fn initialize_buckets(range: StatsRange, anchor: &ZonedParts) -> Vec<StatsBar> {
    match range {
        StatsRange::Day => (0..24)
            .map(|hour| StatsBar { label: format!("{hour:02}"), value: 0 })
            .collect(),
        StatsRange::Week => WEEKDAY_LABELS
            .iter()
            .map(|label| StatsBar { label: (*label).into(), value: 0 })
            .collect(),
        StatsRange::Month => (1..=days_in_month(anchor.year, anchor.month))
            .map(|day| StatsBar { label: day.to_string(), value: 0 })
            .collect(),
        StatsRange::Year => MONTH_LABELS
            .iter()
            .map(|label| StatsBar { label: (*label).into(), value: 0 })
            .collect(),
    }
}

/// Inclusive absolute-time window sent to the row store: the local calendar
/// boundaries of `range` around the anchor, widened by [`WINDOW_PAD_DAYS`]
/// on each side. The end lands on the midnight after the padded last day so
/// that day is covered in full.
pub fn coarse_window(range: StatsRange, anchor: &ZonedParts) -> (DateTime<Utc>, DateTime<Utc>) {
    let anchor_date = anchor.date().unwrap_or_default();

    let (start_date, end_date) = match range {
        StatsRange::Day => (anchor_date, anchor_date),
        StatsRange::Week => {
            let monday = anchor.week_monday().unwrap_or(anchor_date);
            let sunday = monday.checked_add_days(Days::new(6)).unwrap_or(monday);
            (monday, sunday)
        }
        StatsRange::Month => {
            let first = anchor_date.with_day(1).unwrap_or(anchor_date);
            let length = u64::from(days_in_month(anchor.year, anchor.month));
            let last = first
                .checked_add_days(Days::new(length.saturating_sub(1)))
                .unwrap_or(first);
            (first, last)
        }
        StatsRange::Year => (
            NaiveDate::from_ymd_opt(anchor.year, 1, 1).unwrap_or(anchor_date),
            NaiveDate::from_ymd_opt(anchor.year, 12, 31).unwrap_or(anchor_date),
        ),
    };

    let padded_start = start_date
        .checked_sub_days(Days::new(WINDOW_PAD_DAYS))
        .unwrap_or(start_date)
        .and_time(NaiveTime::MIN)
        .and_utc();
    let padded_end = end_date
        .checked_add_days(Days::new(WINDOW_PAD_DAYS + 1))
        .unwrap_or(end_date)
        .and_time(NaiveTime::MIN)
        .and_utc();

    (padded_start, padded_end)
}

/// Exact membership test applied after the coarse window.
pub fn is_in_range(range: StatsRange, anchor: &ZonedParts, item: &ZonedParts) -> bool {
    match range {
        StatsRange::Day => {
            (anchor.year, anchor.month, anchor.day) == (item.year, item.month, item.day)
        }
        StatsRange::Week => match (anchor.week_monday(), item.week_monday()) {
            (Some(anchor_monday), Some(item_monday)) => anchor_monday == item_monday,
            _ => false,
        },
        StatsRange::Month => (anchor.year, anchor.month) == (item.year, item.month),
        StatsRange::Year => anchor.year == item.year,
    }
}

/// Bucket position for an item already known to be in range.
pub fn bucket_index(range: StatsRange, item: &ZonedParts) -> usize {
    match range {
        // chrono reports 0..=23; the modulo folds a stray 24th-hour reading
        // onto midnight.
        StatsRange::Day => (item.hour % 24) as usize,
        StatsRange::Week => item
            .date()
            .map(|date| date.weekday().num_days_from_monday() as usize)
            .unwrap_or(0),
        StatsRange::Month => item.day.saturating_sub(1) as usize,
        StatsRange::Year => item.month.saturating_sub(1) as usize,
    }
}

/// Classify `completions` into the bucket sequence for `range` anchored at
/// `anchor`, observing every instant in `tz`. Items that fail the exact
/// membership test are skipped, so this accepts the over-wide result of a
/// coarse-window query as-is.
pub fn aggregate<Z: TimeZone>(
    range: StatsRange,
    anchor: DateTime<Utc>,
    tz: &Z,
    completions: &[DateTime<Utc>],
) -> StatsSummary {
    let anchor_parts = zoned_parts(anchor, tz);
    let mut buckets = initialize_buckets(range, &anchor_parts);
    let mut total = 0u64;

    for completed_at in completions {
        let item = zoned_parts(*completed_at, tz);
        if !is_in_range(range, &anchor_parts, &item) {
            continue;
        }
        if let Some(bucket) = buckets.get_mut(bucket_index(range, &item)) {
            bucket.value += 1;
            total += 1;
        }
    }

    StatsSummary { buckets, total }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).single().unwrap()
    }

    #[test]
    fn week_buckets_are_monday_through_sunday() {
        // 2026-01-05 is a Monday, 2026-01-11 the following Sunday; the
        // anchor falls mid-week.
        let completions = [utc(2026, 1, 5, 12, 0), utc(2026, 1, 11, 12, 0)];
        let summary = aggregate(StatsRange::Week, utc(2026, 1, 7, 12, 0), &Utc, &completions);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.buckets.len(), 7);
        let labels: Vec<&str> = summary.buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"]);
        assert_eq!(summary.buckets[0], StatsBar { label: "Mon".into(), value: 1 });
        assert_eq!(summary.buckets[6], StatsBar { label: "Sun".into(), value: 1 });
    }

    #[test]
    fn week_shape_is_fixed_regardless_of_anchor_weekday() {
        for day in 5..=11 {
            let summary = aggregate(StatsRange::Week, utc(2026, 1, day, 12, 0), &Utc, &[]);
            assert_eq!(summary.buckets.len(), 7);
            assert_eq!(summary.buckets[0].label, "Mon");
            assert_eq!(summary.buckets[6].label, "Sun");
        }
    }

    #[test]
    fn timezone_shifts_the_day_bucket_relative_to_utc() {
        // 2026-01-06 07:30Z is 23:30 on Jan 5 in Los Angeles; under a naive
        // UTC read it would land in hour 7 of the next day.
        let completions = [utc(2026, 1, 6, 7, 30)];
        let anchor = utc(2026, 1, 5, 20, 0); // local noon, Jan 5
        let summary = aggregate(StatsRange::Day, anchor, &Los_Angeles, &completions);

        assert_eq!(summary.total, 1);
        assert_eq!(summary.buckets[23], StatsBar { label: "23".into(), value: 1 });
    }

    #[test]
    fn leap_february_gets_29_buckets() {
        let summary = aggregate(StatsRange::Month, utc(2024, 2, 15, 12, 0), &Utc, &[]);
        assert_eq!(summary.buckets.len(), 29);
        assert_eq!(summary.buckets[0].label, "1");
        assert_eq!(summary.buckets[28].label, "29");

        let plain = aggregate(StatsRange::Month, utc(2026, 2, 15, 12, 0), &Utc, &[]);
        assert_eq!(plain.buckets.len(), 28);
    }

    #[test]
    fn month_items_land_on_their_day_of_month() {
        let completions = [
            utc(2026, 3, 1, 9, 0),
            utc(2026, 3, 1, 21, 0),
            utc(2026, 3, 31, 12, 0),
        ];
        let summary = aggregate(StatsRange::Month, utc(2026, 3, 10, 12, 0), &Utc, &completions);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.buckets[0].value, 2);
        assert_eq!(summary.buckets[30].value, 1);
    }

    #[test]
    fn year_items_land_on_their_month() {
        let completions = [utc(2026, 1, 2, 0, 0), utc(2026, 3, 15, 12, 0), utc(2026, 12, 31, 23, 0)];
        let summary = aggregate(StatsRange::Year, utc(2026, 6, 1, 0, 0), &Utc, &completions);

        assert_eq!(summary.total, 3);
        assert_eq!(summary.buckets.len(), 12);
        assert_eq!(summary.buckets[0], StatsBar { label: "Jan".into(), value: 1 });
        assert_eq!(summary.buckets[2], StatsBar { label: "Mar".into(), value: 1 });
        assert_eq!(summary.buckets[11], StatsBar { label: "Dec".into(), value: 1 });
    }

    #[test]
    fn zero_completions_yield_all_zero_buckets() {
        for range in [StatsRange::Day, StatsRange::Week, StatsRange::Month, StatsRange::Year] {
            let summary = aggregate(range, utc(2026, 1, 7, 12, 0), &Utc, &[]);
            assert_eq!(summary.total, 0);
            assert!(summary.buckets.iter().all(|b| b.value == 0));
        }
    }

    #[test]
    fn items_outside_the_exact_range_are_discarded() {
        // Both instants sit inside the padded coarse window for Jan 5 but
        // outside the exact local day.
        let anchor = utc(2026, 1, 5, 12, 0);
        let (start, end) = coarse_window(StatsRange::Day, &zoned_parts(anchor, &Utc));
        let strays = [utc(2026, 1, 4, 23, 0), utc(2026, 1, 6, 1, 0)];
        for stray in &strays {
            assert!(*stray >= start && *stray <= end);
        }

        let summary = aggregate(StatsRange::Day, anchor, &Utc, &strays);
        assert_eq!(summary.total, 0);
    }

    #[test]
    fn total_always_equals_bucket_sum() {
        let completions = [
            utc(2026, 1, 5, 8, 0),
            utc(2026, 1, 7, 13, 0),
            utc(2026, 1, 11, 22, 0),
            utc(2026, 2, 1, 0, 0), // outside the anchor week
        ];
        let summary = aggregate(StatsRange::Week, utc(2026, 1, 7, 12, 0), &Utc, &completions);
        let sum: u64 = summary.buckets.iter().map(|b| b.value).sum();
        assert_eq!(summary.total, sum);
        assert_eq!(summary.total, 3);
    }

    #[test]
    fn coarse_window_pads_two_days_each_side() {
        let anchor = zoned_parts(utc(2026, 1, 5, 12, 0), &Utc);
        let (start, end) = coarse_window(StatsRange::Day, &anchor);
        assert_eq!(start, utc(2026, 1, 3, 0, 0));
        assert_eq!(end, utc(2026, 1, 8, 0, 0));

        let (year_start, year_end) = coarse_window(StatsRange::Year, &anchor);
        assert_eq!(year_start, utc(2025, 12, 30, 0, 0));
        assert_eq!(year_end, utc(2027, 1, 3, 0, 0));
    }

    #[test]
    fn coarse_window_covers_members_shifted_across_utc_midnight() {
        // Local Jan 5 in Los Angeles; the latest member is 07:59Z on Jan 6.
        let anchor = utc(2026, 1, 5, 20, 0);
        let (start, end) = coarse_window(StatsRange::Day, &zoned_parts(anchor, &Los_Angeles));
        let late_member = utc(2026, 1, 6, 7, 30);
        assert!(late_member >= start && late_member <= end);
    }

    #[test]
    fn dst_spring_forward_week_keeps_its_members() {
        // US DST begins 2026-03-08. Both instants are 01:30 local on that
        // Sunday's morning and a post-jump 03:30; both belong to the week of
        // Monday 2026-03-02.
        let completions = [utc(2026, 3, 8, 9, 30), utc(2026, 3, 8, 10, 30)];
        let anchor = utc(2026, 3, 4, 12, 0);
        let summary = aggregate(StatsRange::Week, anchor, &Los_Angeles, &completions);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.buckets[6].value, 2); // Sunday
    }

    #[test]
    fn dst_fall_back_counts_both_occurrences_of_the_repeated_hour() {
        // US DST ends 2026-11-01 in Los Angeles; 01:30 local occurs twice
        // (08:30Z as PDT, 09:30Z as PST). Each is one distinct completion in
        // hour bucket 1 of a 25-hour local day.
        let completions = [utc(2026, 11, 1, 8, 30), utc(2026, 11, 1, 9, 30)];
        let anchor = utc(2026, 11, 1, 20, 0); // local noon
        let summary = aggregate(StatsRange::Day, anchor, &Los_Angeles, &completions);

        assert_eq!(summary.total, 2);
        assert_eq!(summary.buckets[1].value, 2);
    }
}
