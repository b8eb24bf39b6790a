use serde::{Deserialize, Serialize};

/// One complete set of sensor readings from the wearable.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetrySample {
    /// kPa
    pub pressure: f64,
    /// °C
    pub temperature: f64,
    pub battery_level: u8,
}

impl Default for TelemetrySample {
    fn default() -> Self {
        Self {
            pressure: 0.0,
            temperature: 0.0,
            battery_level: 100,
        }
    }
}

/// Inbound wire shape. The device may omit any field; the omitted ones
/// keep their last known value when merged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pressure: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_level: Option<f64>,
}

impl TelemetryPatch {
    pub fn parse(line: &str) -> serde_json::Result<Self> {
        serde_json::from_str(line)
    }

    pub fn merge_into(&self, last: &TelemetrySample) -> TelemetrySample {
        TelemetrySample {
            pressure: self.pressure.unwrap_or(last.pressure).max(0.0),
            temperature: self.temperature.unwrap_or(last.temperature),
            battery_level: self
                .battery_level
                .map(|level| level.round().clamp(0.0, 100.0) as u8)
                .unwrap_or(last.battery_level),
        }
    }
}

impl From<TelemetrySample> for TelemetryPatch {
    fn from(sample: TelemetrySample) -> Self {
        Self {
            pressure: Some(sample.pressure),
            temperature: Some(sample.temperature),
            battery_level: Some(f64::from(sample.battery_level)),
        }
    }
}
