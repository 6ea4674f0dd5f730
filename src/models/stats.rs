use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum StatsRange {
    Day,
    Week,
    Month,
    Year,
}

/// One labeled slot in a calendar-range histogram.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct StatsBar {
    pub label: String,
    pub value: u64,
}

/// Histogram of completed sessions over one calendar range.
/// `total` always equals the sum of the bucket values.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSummary {
    pub buckets: Vec<StatsBar>,
    pub total: u64,
}
