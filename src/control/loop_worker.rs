use std::{sync::Arc, time::Duration};

use chrono::{DateTime, Utc};
use tokio::{
    sync::{mpsc, Mutex},
    time::MissedTickBehavior,
};
use tokio_util::sync::CancellationToken;

use crate::{channel::CommandSender, error::SessionError, models::TelemetryPatch};

use super::state::SessionLoopState;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

/// Wall-clock source for the wave term and reading timestamps.
pub type Clock = fn() -> DateTime<Utc>;

pub fn system_clock() -> DateTime<Utc> {
    Utc::now()
}

/// Consume inbound telemetry until cancelled, then hand the receiver back
/// so the next session can subscribe again.
pub async fn control_loop(
    state: Arc<Mutex<SessionLoopState>>,
    commands: CommandSender,
    mut inbound: mpsc::Receiver<String>,
    clock: Clock,
    cancel_token: CancellationToken,
) -> mpsc::Receiver<String> {
    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("control loop shutting down");
                break;
            }
            line = inbound.recv() => {
                let Some(line) = line else {
                    log_warn!("telemetry stream closed; control loop exiting");
                    break;
                };
                if let Err(err) = handle_line(&state, &commands, &line, clock).await {
                    log_warn!("{err}");
                }
            }
        }
    }
    inbound
}

async fn handle_line(
    state: &Mutex<SessionLoopState>,
    commands: &CommandSender,
    line: &str,
    clock: Clock,
) -> Result<(), SessionError> {
    let patch = TelemetryPatch::parse(line)
        .map_err(|err| SessionError::Channel(format!("malformed telemetry {line:?}: {err}")))?;

    // Emit under the lock so a concurrent stop() cannot interleave.
    let mut guard = state.lock().await;
    if let Some(command) = guard.on_telemetry(&patch, clock()) {
        log_debug!("auto intensity -> {command:?}");
        commands.send(command);
    }
    Ok(())
}

/// Fold messages that arrived between sessions into the last known sample
/// without driving the device.
pub fn absorb_backlog(
    state: &mut SessionLoopState,
    inbound: &mut mpsc::Receiver<String>,
    now: DateTime<Utc>,
) {
    while let Ok(line) = inbound.try_recv() {
        match TelemetryPatch::parse(&line) {
            Ok(patch) => {
                let was_active = state.active;
                state.active = false;
                state.on_telemetry(&patch, now);
                state.active = was_active;
            }
            Err(err) => log_debug!("skipping malformed backlog line: {err}"),
        }
    }
}

/// Elapsed-time counter for a running session.
pub async fn tick_loop(
    state: Arc<Mutex<SessionLoopState>>,
    tick_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                state.lock().await.on_tick();
            }
            _ = cancel_token.cancelled() => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{ChannelClient, ConnectionState, MemoryTransport};
    use chrono::TimeZone;

    fn epoch() -> DateTime<Utc> {
        Utc.timestamp_opt(0, 0).unwrap()
    }

    #[tokio::test]
    async fn malformed_lines_do_not_stop_the_loop() {
        let (transport, mut endpoint) = MemoryTransport::pair();
        let (mut client, inbound) = ChannelClient::spawn(
            Arc::new(transport),
            "dev".into(),
            Duration::from_millis(50),
        );
        let mut peer = endpoint.accept().await.unwrap();
        peer.commands.recv().await; // init
        let mut states = client.watch_state();
        states
            .wait_for(|s| *s == ConnectionState::Connected)
            .await
            .unwrap();

        let state = Arc::new(Mutex::new(SessionLoopState::new(true)));
        state.lock().await.activate(epoch());
        let cancel = CancellationToken::new();
        let worker = tokio::spawn(control_loop(
            state.clone(),
            client.commands(),
            inbound,
            epoch,
            cancel.clone(),
        ));

        peer.push("garbage").await.unwrap();
        peer.push(r#"{"pressure": 100, "temperature": 40}"#).await.unwrap();
        assert_eq!(
            peer.commands.recv().await.as_deref(),
            Some(r#"{"command":"setVibration","level":4}"#)
        );

        cancel.cancel();
        worker.await.unwrap();
        assert_eq!(state.lock().await.window.values(), vec![4]);
        client.shutdown().await.unwrap();
    }

    #[test]
    fn backlog_updates_readings_without_history() {
        let (tx, mut rx) = mpsc::channel(4);
        tx.try_send(r#"{"pressure": 55, "batteryLevel": 61}"#.to_string()).unwrap();
        tx.try_send("nope".to_string()).unwrap();

        let mut state = SessionLoopState::new(true);
        state.activate(epoch());
        absorb_backlog(&mut state, &mut rx, epoch());

        assert_eq!(state.last_sample.pressure, 55.0);
        assert_eq!(state.last_sample.battery_level, 61);
        assert!(state.window.is_empty());
        assert!(state.active);
    }
}
