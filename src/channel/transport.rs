use anyhow::Result;
use async_trait::async_trait;

/// Inbound half of a line-oriented connection.
#[async_trait]
pub trait LineReader: Send {
    /// `Ok(None)` once the peer closed the connection.
    async fn next_line(&mut self) -> Result<Option<String>>;
}

/// Outbound half of a line-oriented connection.
#[async_trait]
pub trait LineWriter: Send {
    async fn write_line(&mut self, line: &str) -> Result<()>;
}

pub struct Connection {
    pub reader: Box<dyn LineReader>,
    pub writer: Box<dyn LineWriter>,
}

/// Something the channel supervisor can (re)connect to.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn connect(&self) -> Result<Connection>;

    fn describe(&self) -> String;
}
