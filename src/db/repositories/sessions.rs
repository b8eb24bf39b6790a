use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::{
    db::{
        helpers::{parse_datetime, to_i64, to_u64, to_u8},
        Database,
    },
    models::{SensorSummary, SessionRecord},
};

const SESSION_COLUMNS: &str = "id, owner_id, planned_duration_minutes, intensity, notes, created_at,
     actual_duration_seconds, last_pressure, last_temperature, last_vibration,
     vibration_history, max_vibration, avg_vibration";

// Seconds plus subsecond nanos keep range bounds exact at full precision.
const NEWEST_FIRST: &str = "created_at_secs DESC, created_at_nanos DESC, id DESC";

fn row_to_record(row: &Row) -> Result<SessionRecord> {
    let created_at: String = row.get("created_at")?;
    let planned: i64 = row.get("planned_duration_minutes")?;
    let intensity: i64 = row.get("intensity")?;
    let actual: i64 = row.get("actual_duration_seconds")?;
    let last_vibration: i64 = row.get("last_vibration")?;
    let max_vibration: i64 = row.get("max_vibration")?;
    let history: String = row.get("vibration_history")?;

    Ok(SessionRecord {
        id: row.get("id")?,
        owner_id: row.get("owner_id")?,
        planned_duration_minutes: u32::try_from(to_u64(planned, "planned_duration_minutes")?)
            .context("planned_duration_minutes exceeds u32")?,
        intensity: to_u8(intensity, "intensity")?,
        notes: row.get("notes")?,
        created_at: parse_datetime(&created_at, "created_at")?,
        actual_duration_seconds: to_u64(actual, "actual_duration_seconds")?,
        sensor_summary: SensorSummary {
            last_pressure: row.get("last_pressure")?,
            last_temperature: row.get("last_temperature")?,
            last_vibration: to_u8(last_vibration, "last_vibration")?,
            vibration_history: serde_json::from_str(&history)
                .context("failed to decode vibration_history")?,
            max_vibration: to_u8(max_vibration, "max_vibration")?,
            avg_vibration: row.get("avg_vibration")?,
        },
    })
}

impl Database {
    pub async fn insert_session_record(&self, record: &SessionRecord) -> Result<()> {
        let record = record.clone();
        self.execute(move |conn| {
            let history = serde_json::to_string(&record.sensor_summary.vibration_history)
                .context("failed to encode vibration_history")?;
            conn.execute(
                "INSERT INTO sessions (id, owner_id, planned_duration_minutes, intensity, notes,
                     created_at, created_at_secs, created_at_nanos, actual_duration_seconds,
                     last_pressure, last_temperature, last_vibration, vibration_history,
                     max_vibration, avg_vibration)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    record.id,
                    record.owner_id,
                    i64::from(record.planned_duration_minutes),
                    i64::from(record.intensity),
                    record.notes,
                    record.created_at.to_rfc3339(),
                    record.created_at.timestamp(),
                    i64::from(record.created_at.timestamp_subsec_nanos()),
                    to_i64(record.actual_duration_seconds)?,
                    record.sensor_summary.last_pressure,
                    record.sensor_summary.last_temperature,
                    i64::from(record.sensor_summary.last_vibration),
                    history,
                    i64::from(record.sensor_summary.max_vibration),
                    record.sensor_summary.avg_vibration,
                ],
            )
            .context("failed to insert session record")?;
            Ok(())
        })
        .await
    }

    /// Sessions for `owner_id` created within `[start, end]`, newest first.
    pub async fn query_sessions(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<SessionRecord>> {
        let owner_id = owner_id.to_string();
        let sql = format!(
            "SELECT {SESSION_COLUMNS}
             FROM sessions
             WHERE owner_id = ?1
               AND (created_at_secs > ?2 OR (created_at_secs = ?2 AND created_at_nanos >= ?3))
               AND (created_at_secs < ?4 OR (created_at_secs = ?4 AND created_at_nanos <= ?5))
             ORDER BY {NEWEST_FIRST}"
        );
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![
                owner_id,
                start.timestamp(),
                i64::from(start.timestamp_subsec_nanos()),
                end.timestamp(),
                i64::from(end.timestamp_subsec_nanos()),
            ])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    /// Every session for `owner_id`, newest first.
    pub async fn list_sessions_for_owner(&self, owner_id: &str) -> Result<Vec<SessionRecord>> {
        let owner_id = owner_id.to_string();
        let sql = format!(
            "SELECT {SESSION_COLUMNS}
             FROM sessions
             WHERE owner_id = ?1
             ORDER BY {NEWEST_FIRST}"
        );
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&sql)?;
            let mut rows = stmt.query(params![owner_id])?;
            let mut records = Vec::new();
            while let Some(row) = rows.next()? {
                records.push(row_to_record(row)?);
            }
            Ok(records)
        })
        .await
    }

    pub async fn count_sessions_for_owner(&self, owner_id: &str) -> Result<u64> {
        let owner_id = owner_id.to_string();
        self.execute(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT COUNT(*) FROM sessions WHERE owner_id = ?1",
                params![owner_id],
                |row| row.get(0),
            )?;
            to_u64(count, "count")
        })
        .await
    }
}
