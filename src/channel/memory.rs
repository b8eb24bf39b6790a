use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tokio::sync::mpsc;

use super::transport::{Connection, LineReader, LineWriter, Transport};

const LINE_BUFFER: usize = 256;

/// In-process transport. Each `connect` hands the device side a fresh
/// [`MemoryPeer`] through the paired [`DeviceEndpoint`].
#[derive(Clone)]
pub struct MemoryTransport {
    listener: mpsc::Sender<MemoryPeer>,
}

/// Device side of a [`MemoryTransport`]; accepts one peer per connect.
pub struct DeviceEndpoint {
    incoming: mpsc::Receiver<MemoryPeer>,
}

/// Device side of one in-process connection. Dropping it closes the
/// connection as seen by the client.
pub struct MemoryPeer {
    pub commands: mpsc::Receiver<String>,
    pub telemetry: mpsc::Sender<String>,
}

struct ChannelReader {
    rx: mpsc::Receiver<String>,
}

struct ChannelWriter {
    tx: mpsc::Sender<String>,
}

impl MemoryTransport {
    pub fn pair() -> (MemoryTransport, DeviceEndpoint) {
        let (listener, incoming) = mpsc::channel(8);
        (MemoryTransport { listener }, DeviceEndpoint { incoming })
    }
}

impl DeviceEndpoint {
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.incoming.recv().await
    }
}

impl MemoryPeer {
    pub async fn push(&self, line: impl Into<String>) -> Result<()> {
        self.telemetry
            .send(line.into())
            .await
            .map_err(|_| anyhow!("client side of the connection is gone"))
    }
}

#[async_trait]
impl LineReader for ChannelReader {
    async fn next_line(&mut self) -> Result<Option<String>> {
        Ok(self.rx.recv().await)
    }
}

#[async_trait]
impl LineWriter for ChannelWriter {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.tx
            .send(line.to_string())
            .await
            .map_err(|_| anyhow!("device side of the connection is gone"))
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn connect(&self) -> Result<Connection> {
        let (command_tx, command_rx) = mpsc::channel(LINE_BUFFER);
        let (telemetry_tx, telemetry_rx) = mpsc::channel(LINE_BUFFER);

        self.listener
            .send(MemoryPeer {
                commands: command_rx,
                telemetry: telemetry_tx,
            })
            .await
            .map_err(|_| anyhow!("device endpoint is not listening"))?;

        Ok(Connection {
            reader: Box::new(ChannelReader { rx: telemetry_rx }),
            writer: Box::new(ChannelWriter { tx: command_tx }),
        })
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn connect_hands_a_peer_to_the_endpoint() {
        let (transport, mut endpoint) = MemoryTransport::pair();
        let mut conn = transport.connect().await.unwrap();
        let mut peer = endpoint.accept().await.unwrap();

        conn.writer.write_line("hello").await.unwrap();
        assert_eq!(peer.commands.recv().await.as_deref(), Some("hello"));

        peer.push("{}").await.unwrap();
        assert_eq!(conn.reader.next_line().await.unwrap().as_deref(), Some("{}"));

        drop(peer);
        assert_eq!(conn.reader.next_line().await.unwrap(), None);
    }

    #[tokio::test]
    async fn connect_fails_without_endpoint() {
        let (transport, endpoint) = MemoryTransport::pair();
        drop(endpoint);
        assert!(transport.connect().await.is_err());
    }
}
