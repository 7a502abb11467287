//! Transport implementations for the push boundary.

pub mod websocket;

pub use websocket::{WebSocketChannel, WebSocketTransport};
