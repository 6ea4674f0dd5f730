//! Wall-clock decomposition of absolute instants in a target timezone.

use chrono::{DateTime, Datelike, Days, NaiveDate, TimeZone, Timelike, Utc};

/// Wall-clock components of an instant as observed in a specific timezone.
/// Ephemeral; computed on demand, never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ZonedParts {
    pub year: i32,
    pub month: u32,
    pub day: u32,
    pub hour: u32,
}

impl ZonedParts {
    /// The local calendar date these parts describe.
    pub fn date(&self) -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(self.year, self.month, self.day)
    }

    /// The Monday that starts this date's week, used both for week
    /// membership and for the Monday-relative weekday index.
    pub fn week_monday(&self) -> Option<NaiveDate> {
        let date = self.date()?;
        date.checked_sub_days(Days::new(u64::from(date.weekday().num_days_from_monday())))
    }
}

/// Decompose `instant` into its wall-clock parts under `tz`.
///
/// Generic over `TimeZone` so the same path serves an explicit IANA zone
/// (`chrono_tz::Tz`) and the system-resolved local zone (`chrono::Local`).
pub fn zoned_parts<Z: TimeZone>(instant: DateTime<Utc>, tz: &Z) -> ZonedParts {
    let local = instant.with_timezone(tz);
    ZonedParts {
        year: local.year(),
        month: local.month(),
        day: local.day(),
        hour: local.hour(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::America::Los_Angeles;

    #[test]
    fn utc_parts_match_the_instant() {
        let instant = Utc.with_ymd_and_hms(2026, 1, 6, 7, 30, 0).single().unwrap();
        let parts = zoned_parts(instant, &Utc);
        assert_eq!(
            parts,
            ZonedParts { year: 2026, month: 1, day: 6, hour: 7 }
        );
    }

    #[test]
    fn offset_zone_shifts_the_calendar_day() {
        // 2026-01-06 07:30Z is 2026-01-05 23:30 in Los Angeles (PST, UTC-8).
        let instant = Utc.with_ymd_and_hms(2026, 1, 6, 7, 30, 0).single().unwrap();
        let parts = zoned_parts(instant, &Los_Angeles);
        assert_eq!(
            parts,
            ZonedParts { year: 2026, month: 1, day: 5, hour: 23 }
        );
    }

    #[test]
    fn week_monday_steps_back_to_the_preceding_monday() {
        // 2026-01-11 is a Sunday; its week starts on Monday 2026-01-05.
        let sunday = ZonedParts { year: 2026, month: 1, day: 11, hour: 12 };
        assert_eq!(
            sunday.week_monday(),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );

        // A Monday is its own week key.
        let monday = ZonedParts { year: 2026, month: 1, day: 5, hour: 0 };
        assert_eq!(
            monday.week_monday(),
            NaiveDate::from_ymd_opt(2026, 1, 5)
        );
    }
}
