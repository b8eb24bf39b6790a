//! Stand-in for the wearable: pushes drifting sensor readings over a
//! [`MemoryTransport`](crate::channel::MemoryTransport) peer and records the
//! commands it is sent.

use std::{collections::VecDeque, sync::Arc, time::Duration};

use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::{sync::Mutex, task::JoinHandle, time::MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::{
    channel::{DeviceEndpoint, MemoryPeer},
    models::{DeviceCommand, TelemetryPatch, TelemetrySample},
};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const PRESSURE_RANGE: (f64, f64) = (0.0, 120.0);
const TEMPERATURE_RANGE: (f64, f64) = (30.0, 42.0);
const SAMPLES_PER_BATTERY_PERCENT: u32 = 30;
/// Oldest commands are dropped past this many.
const RECEIVED_LIMIT: usize = 256;

/// Random-walk sensor model.
pub struct SensorModel {
    rng: StdRng,
    sample: TelemetrySample,
    emitted: u32,
}

impl SensorModel {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            sample: TelemetrySample {
                pressure: 40.0,
                temperature: 36.5,
                battery_level: 100,
            },
            emitted: 0,
        }
    }

    pub fn next_sample(&mut self) -> TelemetrySample {
        let pressure_step: f64 = self.rng.gen_range(-8.0..=8.0);
        let temperature_step: f64 = self.rng.gen_range(-0.3..=0.3);

        self.sample.pressure =
            (self.sample.pressure + pressure_step).clamp(PRESSURE_RANGE.0, PRESSURE_RANGE.1);
        self.sample.temperature = (self.sample.temperature + temperature_step)
            .clamp(TEMPERATURE_RANGE.0, TEMPERATURE_RANGE.1);

        self.emitted = self.emitted.wrapping_add(1);
        if self.emitted % SAMPLES_PER_BATTERY_PERCENT == 0 {
            self.sample.battery_level = self.sample.battery_level.saturating_sub(1);
        }
        self.sample
    }
}

pub struct DeviceSimulator {
    received: Arc<Mutex<VecDeque<DeviceCommand>>>,
    cancel_token: CancellationToken,
    handle: Option<JoinHandle<()>>,
}

impl DeviceSimulator {
    /// Serve every connection made through the paired transport until
    /// shut down.
    pub fn spawn(endpoint: DeviceEndpoint, interval: Duration, seed: u64) -> Self {
        let received = Arc::new(Mutex::new(VecDeque::with_capacity(RECEIVED_LIMIT)));
        let cancel_token = CancellationToken::new();
        let handle = tokio::spawn(serve(
            endpoint,
            interval,
            SensorModel::new(seed),
            received.clone(),
            cancel_token.clone(),
        ));

        Self {
            received,
            cancel_token,
            handle: Some(handle),
        }
    }

    /// Most recent commands, oldest first.
    pub async fn received(&self) -> Vec<DeviceCommand> {
        self.received.lock().await.iter().cloned().collect()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.handle.take() {
            handle.await.context("device simulator task failed to join")?;
        }
        Ok(())
    }
}

impl Drop for DeviceSimulator {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn serve(
    mut endpoint: DeviceEndpoint,
    interval: Duration,
    mut model: SensorModel,
    received: Arc<Mutex<VecDeque<DeviceCommand>>>,
    cancel_token: CancellationToken,
) {
    loop {
        let peer = tokio::select! {
            peer = endpoint.accept() => peer,
            _ = cancel_token.cancelled() => break,
        };
        let Some(peer) = peer else {
            break;
        };
        log_info!("simulated device accepted a connection");
        serve_peer(peer, interval, &mut model, &received, &cancel_token).await;
    }
    log_info!("simulated device shutting down");
}

async fn serve_peer(
    mut peer: MemoryPeer,
    interval: Duration,
    model: &mut SensorModel,
    received: &Mutex<VecDeque<DeviceCommand>>,
    cancel_token: &CancellationToken,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let patch = TelemetryPatch::from(model.next_sample());
                let line = match serde_json::to_string(&patch) {
                    Ok(line) => line,
                    Err(err) => {
                        log_warn!("failed to encode simulated sample: {err}");
                        continue;
                    }
                };
                if peer.push(line).await.is_err() {
                    break;
                }
            }
            command = peer.commands.recv() => {
                let Some(line) = command else { break };
                match DeviceCommand::from_line(&line) {
                    Ok(command) => {
                        log_debug!("simulated device received {command:?}");
                        record_command(received, command).await;
                    }
                    Err(err) => log_warn!("simulated device got unreadable command {line:?}: {err}"),
                }
            }
            _ = cancel_token.cancelled() => break,
        }
    }
}

async fn record_command(received: &Mutex<VecDeque<DeviceCommand>>, command: DeviceCommand) {
    let mut received = received.lock().await;
    if received.len() == RECEIVED_LIMIT {
        received.pop_front();
    }
    received.push_back(command);
}
