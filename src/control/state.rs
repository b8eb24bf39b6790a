use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    error::{SessionError, SessionResult},
    models::{
        DeviceCommand, SensorSummary, SessionPhase, SessionRecord, TelemetryPatch,
        TelemetrySample, VibrationMode,
    },
};

use super::{
    smoothing::{self, MAX_INTENSITY},
    window::RollingWindow,
};

/// Everything the session view tracks, in one place. Each event type has
/// exactly one update method; methods that produce a device command return
/// it so the caller can publish it while still holding the state lock.
#[derive(Debug, Clone)]
pub struct SessionLoopState {
    pub phase: SessionPhase,
    pub active: bool,
    pub auto_mode: bool,
    pub last_sample: TelemetrySample,
    pub vibration: u8,
    pub window: RollingWindow,
    pub elapsed_seconds: u64,
    pub started_at: Option<DateTime<Utc>>,
    pub saved: Option<SessionRecord>,
}

impl Default for SessionLoopState {
    fn default() -> Self {
        Self::new(true)
    }
}

impl SessionLoopState {
    pub fn new(auto_mode: bool) -> Self {
        Self {
            phase: SessionPhase::Idle,
            active: false,
            auto_mode,
            last_sample: TelemetrySample::default(),
            vibration: 0,
            window: RollingWindow::default(),
            elapsed_seconds: 0,
            started_at: None,
            saved: None,
        }
    }

    /// Begin a fresh session. Returns `None` when one is already running.
    pub fn activate(&mut self, now: DateTime<Utc>) -> Option<DeviceCommand> {
        if self.phase == SessionPhase::Running {
            return None;
        }
        self.phase = SessionPhase::Running;
        self.active = true;
        self.vibration = 0;
        self.window.clear();
        self.elapsed_seconds = 0;
        self.started_at = Some(now);
        self.saved = None;
        Some(DeviceCommand::StartVibration {
            mode: VibrationMode::from_auto(self.auto_mode),
        })
    }

    /// Halt the loop, zeroing the vibration. Only a running session has
    /// anything to halt.
    pub fn deactivate(&mut self, emergency: bool) -> Option<DeviceCommand> {
        if self.phase != SessionPhase::Running {
            self.active = false;
            return None;
        }
        self.phase = SessionPhase::Stopped;
        self.active = false;
        self.vibration = 0;
        Some(if emergency {
            DeviceCommand::EmergencyStop
        } else {
            DeviceCommand::SetVibration { level: 0 }
        })
    }

    pub fn on_telemetry(
        &mut self,
        patch: &TelemetryPatch,
        now: DateTime<Utc>,
    ) -> Option<DeviceCommand> {
        self.last_sample = patch.merge_into(&self.last_sample);

        if !(self.active && self.auto_mode) {
            return None;
        }

        let level = smoothing::next_intensity(
            self.last_sample.pressure,
            self.last_sample.temperature,
            self.vibration,
            now,
        );
        self.vibration = level;
        self.window.push(level, now);
        Some(DeviceCommand::SetVibration { level })
    }

    pub fn on_tick(&mut self) {
        if self.phase == SessionPhase::Running {
            self.elapsed_seconds = self.elapsed_seconds.saturating_add(1);
        }
    }

    pub fn set_auto_mode(&mut self, auto_mode: bool) {
        self.auto_mode = auto_mode;
    }

    pub fn set_manual_intensity(
        &mut self,
        level: u8,
        now: DateTime<Utc>,
    ) -> SessionResult<DeviceCommand> {
        if self.auto_mode {
            return Err(SessionError::validation(
                "manual intensity is only accepted in manual mode",
            ));
        }
        if !self.active {
            return Err(SessionError::validation("no running session"));
        }
        if level > MAX_INTENSITY {
            return Err(SessionError::validation(format!(
                "intensity must be between 0 and {MAX_INTENSITY}, got {level}"
            )));
        }
        self.vibration = level;
        self.window.push(level, now);
        Ok(DeviceCommand::SetVibration { level })
    }

    /// Whether there is session data that `save` may finalize.
    pub fn has_unsaved_session(&self) -> bool {
        matches!(self.phase, SessionPhase::Running | SessionPhase::Stopped)
    }

    pub fn summary(&self) -> SensorSummary {
        SensorSummary {
            last_pressure: self.last_sample.pressure,
            last_temperature: self.last_sample.temperature,
            last_vibration: self.vibration,
            vibration_history: self.window.values(),
            max_vibration: self.window.max(),
            avg_vibration: self.window.mean(),
        }
    }

    /// Clear the window and timer after a successful write.
    pub fn finish_saved(&mut self, record: SessionRecord) {
        self.window.clear();
        self.elapsed_seconds = 0;
        self.started_at = None;
        self.phase = SessionPhase::Saved;
        self.saved = Some(record);
    }

    pub fn snapshot(&self) -> LoopSnapshot {
        LoopSnapshot {
            phase: self.phase,
            active: self.active,
            auto_mode: self.auto_mode,
            vibration: self.vibration,
            pressure: self.last_sample.pressure,
            temperature: self.last_sample.temperature,
            battery_level: self.last_sample.battery_level,
            elapsed_seconds: self.elapsed_seconds,
            history: self.window.values(),
        }
    }
}

/// Read-only view for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopSnapshot {
    pub phase: SessionPhase,
    pub active: bool,
    pub auto_mode: bool,
    pub vibration: u8,
    pub pressure: f64,
    pub temperature: f64,
    pub battery_level: u8,
    pub elapsed_seconds: u64,
    pub history: Vec<u8>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    fn patch(pressure: f64, temperature: f64) -> TelemetryPatch {
        TelemetryPatch {
            pressure: Some(pressure),
            temperature: Some(temperature),
            battery_level: None,
        }
    }

    #[test]
    fn idle_loop_tracks_sensors_without_emitting() {
        let mut state = SessionLoopState::new(true);
        assert_eq!(state.on_telemetry(&patch(80.0, 37.0), epoch()), None);
        assert_eq!(state.last_sample.pressure, 80.0);
        assert!(state.window.is_empty());
    }

    #[test]
    fn first_sample_smooths_against_zero() {
        let mut state = SessionLoopState::new(true);
        state.activate(epoch());
        // target 8 from (100, 40) at t=0, averaged with 0 -> 4
        let cmd = state.on_telemetry(&patch(100.0, 40.0), epoch());
        assert_eq!(cmd, Some(DeviceCommand::SetVibration { level: 4 }));
        let cmd = state.on_telemetry(&patch(100.0, 40.0), epoch());
        assert_eq!(cmd, Some(DeviceCommand::SetVibration { level: 6 }));
        assert_eq!(state.window.values(), vec![4, 6]);
    }

    #[test]
    fn manual_mode_bypasses_smoothing() {
        let mut state = SessionLoopState::new(false);
        assert!(state.set_manual_intensity(3, epoch()).is_err());

        state.activate(epoch());
        assert_eq!(state.on_telemetry(&patch(100.0, 40.0), epoch()), None);
        let cmd = state.set_manual_intensity(9, epoch()).unwrap();
        assert_eq!(cmd, DeviceCommand::SetVibration { level: 9 });
        assert!(matches!(
            state.set_manual_intensity(11, epoch()),
            Err(SessionError::Validation(_))
        ));
    }

    #[test]
    fn activate_is_idempotent_while_running() {
        let mut state = SessionLoopState::new(true);
        assert!(state.activate(epoch()).is_some());
        state.on_tick();
        assert!(state.activate(epoch()).is_none());
        assert_eq!(state.elapsed_seconds, 1);
    }

    #[test]
    fn deactivate_zeroes_vibration_and_stops_ticks() {
        let mut state = SessionLoopState::new(true);
        state.activate(epoch());
        state.on_telemetry(&patch(100.0, 40.0), epoch());
        assert_eq!(
            state.deactivate(false),
            Some(DeviceCommand::SetVibration { level: 0 })
        );
        assert_eq!(state.vibration, 0);
        state.on_tick();
        assert_eq!(state.elapsed_seconds, 0);
        assert_eq!(state.on_telemetry(&patch(100.0, 40.0), epoch()), None);
        assert!(state.has_unsaved_session());
    }
}
