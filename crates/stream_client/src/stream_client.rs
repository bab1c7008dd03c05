//! Persistent snapshot feed with fixed-delay reconnection.

mod client;
mod codec;
mod error;
mod transport;

pub use client::{ConnectionStatus, StreamClient, StreamConfig, StreamEvent};
pub use codec::{Inbound, REQUEST_DATA, StatusReport, decode, encode_request_data};
pub use error::StreamError;
pub use transport::{
    Connection, Endpoint, Incoming, Transport, WebSocketConnection, WebSocketTransport,
};
