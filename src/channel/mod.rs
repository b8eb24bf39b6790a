pub mod client;
pub mod memory;
pub mod tcp;
pub mod transport;

pub use client::{ChannelClient, CommandSender, ConnectionState, DEFAULT_RECONNECT_DELAY};
pub use memory::{DeviceEndpoint, MemoryPeer, MemoryTransport};
pub use tcp::TcpTransport;
pub use transport::{Connection, LineReader, LineWriter, Transport};
