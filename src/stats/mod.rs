//! Completed-session statistics: timezone-aware calendar bucketing over the
//! row store's completion timestamps.

mod aggregate;
mod zoned;

pub use aggregate::{
    aggregate, bucket_index, coarse_window, days_in_month, initialize_buckets, is_in_range,
};
pub use zoned::{zoned_parts, ZonedParts};

use anyhow::{anyhow, Result};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::Tz;

use crate::db::Database;
use crate::models::{StatsRange, StatsSummary};

/// Histogram of completed sessions for `range` anchored at `anchor`.
///
/// `timezone` is an IANA zone name; `None` observes the instants in the
/// system's local zone. Unknown zone names are an error — without a valid
/// zone no bucket placement can be determined.
pub async fn completed_session_stats(
    db: &Database,
    range: StatsRange,
    anchor: DateTime<Utc>,
    timezone: Option<&str>,
) -> Result<StatsSummary> {
    match timezone {
        Some(name) => {
            let tz: Tz = name
                .parse()
                .map_err(|_| anyhow!("unknown timezone '{name}'"))?;
            fetch_and_aggregate(db, range, anchor, &tz).await
        }
        None => fetch_and_aggregate(db, range, anchor, &chrono::Local).await,
    }
}

async fn fetch_and_aggregate<Z: TimeZone>(
    db: &Database,
    range: StatsRange,
    anchor: DateTime<Utc>,
    tz: &Z,
) -> Result<StatsSummary> {
    let anchor_parts = zoned_parts(anchor, tz);
    let (window_start, window_end) = coarse_window(range, &anchor_parts);
    let completions = db
        .completed_timestamps_between(window_start, window_end)
        .await?;

    Ok(aggregate(range, anchor, tz, &completions))
}
