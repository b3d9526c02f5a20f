//! Transport implementations

pub mod memory;
pub mod websocket;

pub use memory::{MemoryPeer, MemoryTransport};
pub use websocket::WebSocketTransport;
