use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sensor snapshot and vibration statistics captured when a session is saved.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SensorSummary {
    pub last_pressure: f64,
    pub last_temperature: f64,
    pub last_vibration: u8,
    pub vibration_history: Vec<u8>,
    pub max_vibration: u8,
    /// 0 when the history is empty.
    pub avg_vibration: f64,
}

/// One completed session. Written once on save and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    pub owner_id: String,
    pub planned_duration_minutes: u32,
    pub intensity: u8,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub actual_duration_seconds: u64,
    pub sensor_summary: SensorSummary,
}

/// Lifecycle of the session held by the controller.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionPhase {
    #[default]
    Idle,
    Running,
    /// Halted with unsaved data.
    Stopped,
    /// A write is in flight; further saves wait on the result.
    Saving,
    Saved,
}
