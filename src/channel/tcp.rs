use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines},
    net::{
        tcp::{OwnedReadHalf, OwnedWriteHalf},
        TcpStream,
    },
};

use super::transport::{Connection, LineReader, LineWriter, Transport};

/// Newline-delimited JSON over a plain TCP socket.
pub struct TcpTransport {
    addr: String,
}

impl TcpTransport {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }
}

struct TcpLineReader {
    lines: Lines<BufReader<OwnedReadHalf>>,
}

struct TcpLineWriter {
    half: OwnedWriteHalf,
}

#[async_trait]
impl LineReader for TcpLineReader {
    async fn next_line(&mut self) -> Result<Option<String>> {
        self.lines
            .next_line()
            .await
            .context("failed to read from telemetry socket")
    }
}

#[async_trait]
impl LineWriter for TcpLineWriter {
    async fn write_line(&mut self, line: &str) -> Result<()> {
        self.half
            .write_all(line.as_bytes())
            .await
            .context("failed to write command")?;
        self.half
            .write_all(b"\n")
            .await
            .context("failed to terminate command line")?;
        self.half.flush().await.context("failed to flush command")
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn connect(&self) -> Result<Connection> {
        let stream = TcpStream::connect(&self.addr)
            .await
            .with_context(|| format!("failed to connect to {}", self.addr))?;
        stream.set_nodelay(true).ok();
        let (read_half, write_half) = stream.into_split();
        Ok(Connection {
            reader: Box::new(TcpLineReader {
                lines: BufReader::new(read_half).lines(),
            }),
            writer: Box::new(TcpLineWriter { half: write_half }),
        })
    }

    fn describe(&self) -> String {
        format!("tcp://{}", self.addr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn exchanges_lines_with_a_peer() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let peer = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let (read_half, mut write_half) = socket.into_split();
            let mut lines = BufReader::new(read_half).lines();
            let received = lines.next_line().await.unwrap();
            write_half
                .write_all(b"{\"pressure\": 12.5}\n")
                .await
                .unwrap();
            received
        });

        let transport = TcpTransport::new(addr.to_string());
        let mut conn = transport.connect().await.unwrap();
        conn.writer.write_line(r#"{"command":"emergencyStop"}"#).await.unwrap();
        let line = conn.reader.next_line().await.unwrap();

        assert_eq!(line.as_deref(), Some(r#"{"pressure": 12.5}"#));
        assert_eq!(
            peer.await.unwrap().as_deref(),
            Some(r#"{"command":"emergencyStop"}"#)
        );
    }

    #[tokio::test]
    async fn refused_connection_is_an_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = TcpTransport::new(addr.to_string());
        assert!(transport.connect().await.is_err());
    }
}
