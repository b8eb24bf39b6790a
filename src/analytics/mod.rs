//! Read-only views over stored sessions for the trend dashboard.

use std::{fmt, str::FromStr};

use anyhow::Result;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::{db::Database, models::SessionRecord};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TimeRange {
    Week,
    Month,
    Year,
    All,
}

impl TimeRange {
    /// Inclusive `[start, end]` ending at `now`.
    pub fn bounds(&self, now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        let start = match self {
            TimeRange::Week => now - Duration::days(7),
            TimeRange::Month => now - Duration::days(30),
            TimeRange::Year => now - Duration::days(365),
            TimeRange::All => DateTime::<Utc>::MIN_UTC,
        };
        (start, now)
    }
}

impl FromStr for TimeRange {
    type Err = String;

    fn from_str(value: &str) -> std::result::Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            "all" => Ok(TimeRange::All),
            other => Err(format!(
                "unknown time range '{other}' (expected week, month, year or all)"
            )),
        }
    }
}

impl fmt::Display for TimeRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            TimeRange::Week => "week",
            TimeRange::Month => "month",
            TimeRange::Year => "year",
            TimeRange::All => "all",
        };
        f.write_str(label)
    }
}

pub async fn history_for_range(
    db: &Database,
    owner_id: &str,
    range: TimeRange,
    now: DateTime<Utc>,
) -> Result<Vec<SessionRecord>> {
    let (start, end) = range.bounds(now);
    db.query_sessions(owner_id, start, end).await
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub created_at: DateTime<Utc>,
    pub intensity: u8,
    pub avg_vibration: f64,
}

/// Chart series, oldest first.
pub fn trend_series(records: &[SessionRecord]) -> Vec<TrendPoint> {
    let mut points: Vec<TrendPoint> = records
        .iter()
        .map(|record| TrendPoint {
            date: record.created_at.date_naive(),
            created_at: record.created_at,
            intensity: record.intensity,
            avg_vibration: record.sensor_summary.avg_vibration,
        })
        .collect();
    points.sort_by_key(|point| point.created_at);
    points
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistorySummary {
    pub session_count: usize,
    pub average_intensity: f64,
    pub average_vibration: f64,
    pub total_actual_seconds: u64,
}

pub fn summarize(records: &[SessionRecord]) -> HistorySummary {
    if records.is_empty() {
        return HistorySummary::default();
    }
    let count = records.len() as f64;
    HistorySummary {
        session_count: records.len(),
        average_intensity: records.iter().map(|r| f64::from(r.intensity)).sum::<f64>() / count,
        average_vibration: records
            .iter()
            .map(|r| r.sensor_summary.avg_vibration)
            .sum::<f64>()
            / count,
        total_actual_seconds: records.iter().map(|r| r.actual_duration_seconds).sum(),
    }
}
