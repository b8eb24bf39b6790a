use std::{sync::Arc, time::Duration};

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, watch, Mutex},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{
    auth::AuthContext,
    channel::{ChannelClient, CommandSender, ConnectionState, Transport, DEFAULT_RECONNECT_DELAY},
    control::{
        loop_worker::{absorb_backlog, control_loop, tick_loop},
        system_clock, Clock, LoopSnapshot, SessionLoopState,
    },
    db::Database,
    error::{SessionError, SessionResult},
    models::{DeviceCommand, SensorSummary, SessionPhase, SessionRecord},
};

const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

const MIN_PLANNED_MINUTES: u32 = 1;
const MIN_SESSION_INTENSITY: u8 = 1;
const MAX_SESSION_INTENSITY: u8 = 10;

#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub device_id: String,
    pub reconnect_delay: Duration,
    pub tick_interval: Duration,
    pub auto_mode: bool,
    pub clock: Clock,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            device_id: "crampwave-device".into(),
            reconnect_delay: DEFAULT_RECONNECT_DELAY,
            tick_interval: Duration::from_secs(1),
            auto_mode: true,
            clock: system_clock,
        }
    }
}

/// Tasks that only exist while a session is running.
struct SessionWorkers {
    cancel_token: CancellationToken,
    control: JoinHandle<mpsc::Receiver<String>>,
    ticker: JoinHandle<()>,
}

/// Owns one session view: the device channel, the loop state, the
/// per-session workers and the write path.
#[derive(Clone)]
pub struct SessionController {
    state: Arc<Mutex<SessionLoopState>>,
    db: Database,
    auth: AuthContext,
    channel: Arc<Mutex<ChannelClient>>,
    commands: CommandSender,
    connection: watch::Receiver<ConnectionState>,
    inbound: Arc<Mutex<Option<mpsc::Receiver<String>>>>,
    workers: Arc<Mutex<Option<SessionWorkers>>>,
    save_gate: Arc<Mutex<()>>,
    config: ControllerConfig,
}

impl SessionController {
    /// Opens the device channel immediately; must be called inside a Tokio
    /// runtime.
    pub fn new(
        db: Database,
        auth: AuthContext,
        transport: Arc<dyn Transport>,
        config: ControllerConfig,
    ) -> Self {
        let (channel, inbound) =
            ChannelClient::spawn(transport, config.device_id.clone(), config.reconnect_delay);
        let commands = channel.commands();
        let connection = channel.watch_state();

        Self {
            state: Arc::new(Mutex::new(SessionLoopState::new(config.auto_mode))),
            db,
            auth,
            channel: Arc::new(Mutex::new(channel)),
            commands,
            connection,
            inbound: Arc::new(Mutex::new(Some(inbound))),
            workers: Arc::new(Mutex::new(None)),
            save_gate: Arc::new(Mutex::new(())),
            config,
        }
    }

    pub async fn snapshot(&self) -> LoopSnapshot {
        self.state.lock().await.snapshot()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.lock().await.phase
    }

    pub fn connection_state(&self) -> ConnectionState {
        *self.connection.borrow()
    }

    pub fn watch_connection(&self) -> watch::Receiver<ConnectionState> {
        self.connection.clone()
    }

    /// Start a fresh session. Calling it while a session is running is a
    /// no-op.
    pub async fn start_session(&self) -> SessionResult<LoopSnapshot> {
        let mut workers = self.workers.lock().await;
        if workers.is_some() {
            return Ok(self.snapshot().await);
        }

        let mut inbound = self.inbound.lock().await.take().ok_or_else(|| {
            SessionError::Channel("telemetry subscription is unavailable".into())
        })?;

        let snapshot = {
            let mut state = self.state.lock().await;
            absorb_backlog(&mut state, &mut inbound, (self.config.clock)());
            if let Some(command) = state.activate((self.config.clock)()) {
                self.commands.send(command);
            }
            state.snapshot()
        };

        let cancel_token = CancellationToken::new();
        let control = tokio::spawn(control_loop(
            self.state.clone(),
            self.commands.clone(),
            inbound,
            self.config.clock,
            cancel_token.clone(),
        ));
        let ticker = tokio::spawn(tick_loop(
            self.state.clone(),
            self.config.tick_interval,
            cancel_token.clone(),
        ));

        *workers = Some(SessionWorkers {
            cancel_token,
            control,
            ticker,
        });

        log_info!(
            "session started (auto_mode={})",
            snapshot.auto_mode
        );
        Ok(snapshot)
    }

    /// Halt the loop and timer and drive the device to zero.
    pub async fn stop(&self) -> SessionResult<LoopSnapshot> {
        self.halt(false).await.map(|(snapshot, _)| snapshot)
    }

    /// Like [`stop`](Self::stop) but sends `emergencyStop` to the device.
    pub async fn emergency_stop(&self) -> SessionResult<LoopSnapshot> {
        self.halt(true).await.map(|(snapshot, _)| snapshot)
    }

    /// Returns the summary as it stood just before the device was zeroed.
    async fn halt(&self, emergency: bool) -> SessionResult<(LoopSnapshot, SensorSummary)> {
        let mut workers = self.workers.lock().await;

        let live_summary = {
            let mut state = self.state.lock().await;
            let live_summary = state.summary();
            if let Some(command) = state.deactivate(emergency) {
                self.commands.send(command);
            } else if emergency {
                self.commands.send(DeviceCommand::EmergencyStop);
            }
            live_summary
        };

        if let Some(session) = workers.take() {
            session.cancel_token.cancel();

            match session.control.await {
                Ok(inbound) => *self.inbound.lock().await = Some(inbound),
                Err(err) => {
                    log_error!("control loop task failed to join: {err}");
                    return Err(SessionError::Channel(format!(
                        "control loop terminated abnormally: {err}"
                    )));
                }
            }
            if let Err(err) = session.ticker.await {
                log_warn!("session ticker failed to join: {err}");
            }
            log_info!("session stopped (emergency={emergency})");
        }

        Ok((self.snapshot().await, live_summary))
    }

    pub async fn set_auto_mode(&self, auto_mode: bool) {
        self.state.lock().await.set_auto_mode(auto_mode);
    }

    pub async fn set_manual_intensity(&self, level: u8) -> SessionResult<()> {
        let mut state = self.state.lock().await;
        let command = state.set_manual_intensity(level, (self.config.clock)())?;
        self.commands.send(command);
        Ok(())
    }

    /// Finalize the current session into one stored record.
    ///
    /// Single-shot: once a session is saved, further calls return the
    /// stored record without writing again. A failed write leaves the
    /// session data in place.
    pub async fn save(
        &self,
        planned_duration_minutes: u32,
        intensity: u8,
        notes: Option<String>,
    ) -> SessionResult<SessionRecord> {
        if planned_duration_minutes < MIN_PLANNED_MINUTES {
            return Err(SessionError::validation(
                "planned duration must be at least 1 minute",
            ));
        }
        if !(MIN_SESSION_INTENSITY..=MAX_SESSION_INTENSITY).contains(&intensity) {
            return Err(SessionError::validation(format!(
                "intensity must be between {MIN_SESSION_INTENSITY} and {MAX_SESSION_INTENSITY}, got {intensity}"
            )));
        }
        let owner_id = self.auth.require_owner()?;

        // Owned so the write below can finish even if this future is dropped.
        let gate = self.save_gate.clone().lock_owned().await;

        let running = {
            let state = self.state.lock().await;
            if let (SessionPhase::Saved, Some(saved)) = (state.phase, state.saved.as_ref()) {
                log_info!("session {} already saved; skipping write", saved.id);
                return Ok(saved.clone());
            }
            if !state.has_unsaved_session() {
                return Err(SessionError::validation("there is no session to save"));
            }
            state.phase == SessionPhase::Running
        };

        // A running session is recorded as it was at the moment it halted,
        // not after the device was zeroed.
        let live_summary = if running {
            Some(self.halt(false).await?.1)
        } else {
            None
        };

        let record = {
            let mut state = self.state.lock().await;
            state.phase = SessionPhase::Saving;
            SessionRecord {
                id: Uuid::new_v4().to_string(),
                owner_id,
                planned_duration_minutes,
                intensity,
                notes: notes
                    .map(|n| n.trim().to_string())
                    .filter(|n| !n.is_empty()),
                created_at: (self.config.clock)(),
                actual_duration_seconds: state.elapsed_seconds,
                sensor_summary: live_summary.unwrap_or_else(|| state.summary()),
            }
        };

        let controller = self.clone();
        let write = tokio::spawn(async move {
            let _gate = gate;
            controller.commit_record(record).await
        });
        write.await.map_err(|err| {
            SessionError::Persistence(anyhow!("session write task failed: {err}"))
        })?
    }

    /// Single write for a finalized record. Runs detached from the caller
    /// so the phase never stays at `Saving`.
    async fn commit_record(&self, record: SessionRecord) -> SessionResult<SessionRecord> {
        if let Err(err) = self.db.insert_session_record(&record).await {
            log_error!("failed to save session {}: {err:#}", record.id);
            self.state.lock().await.phase = SessionPhase::Stopped;
            return Err(SessionError::Persistence(err));
        }

        self.state.lock().await.finish_saved(record.clone());
        log_info!(
            "saved session {} ({}s, {} readings)",
            record.id,
            record.actual_duration_seconds,
            record.sensor_summary.vibration_history.len()
        );
        Ok(record)
    }

    /// Stored sessions for `owner_id` created in `[start, end]`, newest first.
    pub async fn query_history(
        &self,
        owner_id: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> SessionResult<Vec<SessionRecord>> {
        if start > end {
            return Err(SessionError::validation("range start is after range end"));
        }
        self.db
            .query_sessions(owner_id, start, end)
            .await
            .map_err(SessionError::Persistence)
    }

    /// Stop any running session and close the device channel.
    pub async fn shutdown(&self) -> SessionResult<()> {
        self.stop().await?;
        self.channel
            .lock()
            .await
            .shutdown()
            .await
            .map_err(|err| SessionError::Channel(format!("{err:#}")))
    }
}
