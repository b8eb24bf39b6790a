use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use serde::Serialize;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;

use crate::models::DeviceCommand;

use super::transport::{Connection, Transport};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

const INBOUND_BUFFER: usize = 256;
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_secs(3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ConnectionState {
    Disconnected,
    Reconnecting,
    Connected,
}

/// Why a live connection ended.
enum SessionEnd {
    Cancelled,
    Lost,
}

/// Cloneable handle for publishing commands on a [`ChannelClient`].
#[derive(Clone)]
pub struct CommandSender {
    tx: mpsc::UnboundedSender<DeviceCommand>,
}

impl CommandSender {
    pub fn send(&self, command: DeviceCommand) {
        if self.tx.send(command).is_err() {
            log_warn!("channel supervisor has exited; dropping command");
        }
    }
}

/// One long-lived channel to the device. A supervisor task owns the
/// transport and reconnects with a fixed delay, forever, until shutdown.
///
/// `send` never fails: while the channel is down the most recent command
/// is parked and written right after the next `init`.
pub struct ChannelClient {
    outbound: CommandSender,
    state_rx: watch::Receiver<ConnectionState>,
    cancel_token: CancellationToken,
    supervisor: Option<JoinHandle<()>>,
}

impl ChannelClient {
    /// Spawn the supervisor. Returns the client and the receiver of raw
    /// inbound lines.
    pub fn spawn(
        transport: Arc<dyn Transport>,
        device_id: String,
        reconnect_delay: Duration,
    ) -> (Self, mpsc::Receiver<String>) {
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let (inbound_tx, inbound_rx) = mpsc::channel(INBOUND_BUFFER);
        let (state_tx, state_rx) = watch::channel(ConnectionState::Disconnected);
        let cancel_token = CancellationToken::new();

        let supervisor = tokio::spawn(supervise(
            transport,
            device_id,
            reconnect_delay,
            outbound_rx,
            inbound_tx,
            state_tx,
            cancel_token.clone(),
        ));

        (
            Self {
                outbound: CommandSender { tx: outbound_tx },
                state_rx,
                cancel_token,
                supervisor: Some(supervisor),
            },
            inbound_rx,
        )
    }

    pub fn send(&self, command: DeviceCommand) {
        self.outbound.send(command);
    }

    pub fn commands(&self) -> CommandSender {
        self.outbound.clone()
    }

    pub fn state(&self) -> ConnectionState {
        *self.state_rx.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state_rx.clone()
    }

    pub async fn shutdown(&mut self) -> Result<()> {
        self.cancel_token.cancel();
        if let Some(handle) = self.supervisor.take() {
            handle
                .await
                .context("channel supervisor task failed to join")?;
        }
        Ok(())
    }
}

impl Drop for ChannelClient {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

async fn supervise(
    transport: Arc<dyn Transport>,
    device_id: String,
    reconnect_delay: Duration,
    mut outbound: mpsc::UnboundedReceiver<DeviceCommand>,
    inbound: mpsc::Sender<String>,
    state: watch::Sender<ConnectionState>,
    cancel_token: CancellationToken,
) {
    let mut pending: Option<DeviceCommand> = None;

    loop {
        let connected = tokio::select! {
            result = transport.connect() => result,
            _ = cancel_token.cancelled() => break,
        };

        match connected {
            Ok(conn) => {
                let _ = state.send(ConnectionState::Connected);
                log_info!("channel connected via {}", transport.describe());

                let end = run_connection(
                    conn,
                    &device_id,
                    &mut pending,
                    &mut outbound,
                    &inbound,
                    &cancel_token,
                )
                .await;

                let _ = state.send(ConnectionState::Disconnected);
                if let SessionEnd::Cancelled = end {
                    break;
                }
                log_warn!("channel connection lost");
            }
            Err(err) => {
                let _ = state.send(ConnectionState::Disconnected);
                log_warn!("channel connect failed: {err:#}");
            }
        }

        // Park the newest command while waiting out the backoff.
        let backoff = tokio::time::sleep(reconnect_delay);
        tokio::pin!(backoff);
        loop {
            tokio::select! {
                _ = &mut backoff => break,
                Some(command) = outbound.recv() => {
                    log_debug!("channel down; parking {command:?}");
                    pending = Some(command);
                }
                _ = cancel_token.cancelled() => {
                    let _ = state.send(ConnectionState::Disconnected);
                    log_info!("channel supervisor shutting down");
                    return;
                }
            }
        }

        let _ = state.send(ConnectionState::Reconnecting);
    }

    let _ = state.send(ConnectionState::Disconnected);
    log_info!("channel supervisor shutting down");
}

async fn run_connection(
    mut conn: Connection,
    device_id: &str,
    pending: &mut Option<DeviceCommand>,
    outbound: &mut mpsc::UnboundedReceiver<DeviceCommand>,
    inbound: &mpsc::Sender<String>,
    cancel_token: &CancellationToken,
) -> SessionEnd {
    let init = DeviceCommand::Init {
        device_id: device_id.to_string(),
    };
    if write_command(&mut conn, &init).await.is_err() {
        return SessionEnd::Lost;
    }
    if let Some(command) = pending.take() {
        if write_command(&mut conn, &command).await.is_err() {
            *pending = Some(command);
            return SessionEnd::Lost;
        }
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => return SessionEnd::Cancelled,
            command = outbound.recv() => {
                let Some(command) = command else {
                    return SessionEnd::Cancelled;
                };
                if write_command(&mut conn, &command).await.is_err() {
                    *pending = Some(command);
                    return SessionEnd::Lost;
                }
            }
            line = conn.reader.next_line() => match line {
                Ok(Some(line)) => {
                    if inbound.try_send(line).is_err() {
                        log_debug!("inbound buffer full or closed; dropping telemetry line");
                    }
                }
                Ok(None) => return SessionEnd::Lost,
                Err(err) => {
                    log_warn!("channel receive failed: {err:#}");
                    return SessionEnd::Lost;
                }
            },
        }
    }
}

async fn write_command(conn: &mut Connection, command: &DeviceCommand) -> Result<()> {
    let line = command.to_line().context("failed to encode command")?;
    conn.writer.write_line(&line).await.map_err(|err| {
        log_warn!("channel send failed: {err:#}");
        err
    })
}
