//! Transport abstraction layer for majsoul-link.
//!
//! Provides the [`Connection`] trait (one duplex, message-framed byte
//! stream), the [`Connector`] trait that opens client connections, and the
//! [`Transport`] trait that accepts them on the other end.
//!
//! Two implementations ship with the crate:
//!
//! - [`WebSocketConnector`] / [`WebSocketConnection`] — the game gateway
//!   speaks binary WebSocket frames (`websocket` feature, default).
//! - [`memory`] — an in-process channel pair used by tests and by anything
//!   that wants to drive the protocol stack without a network.
//!
//! # Feature Flags
//!
//! - `websocket` (default) — WebSocket client via `tokio-tungstenite`

use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::watch;

mod error;
pub mod memory;
#[cfg(feature = "websocket")]
mod websocket;

pub use error::TransportError;
pub use memory::{MemoryConnection, MemoryConnector, MemoryTransport};
#[cfg(feature = "websocket")]
pub use websocket::{WebSocketConnection, WebSocketConnector};

/// Opaque identifier for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Creates a new `ConnectionId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the underlying `u64` value.
    pub fn into_inner(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Counter for generating unique connection IDs across all transports.
static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

pub(crate) fn next_connection_id() -> ConnectionId {
    ConnectionId::new(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Resolves once the close flag behind `rx` is raised.
pub(crate) async fn wait_closed(rx: &mut watch::Receiver<bool>) {
    loop {
        let closed = *rx.borrow_and_update();
        if closed || rx.changed().await.is_err() {
            return;
        }
    }
}

/// A single connection that can send and receive whole frames.
///
/// `send` and `recv` take `&self` and must be callable concurrently: the
/// RPC layer keeps one task parked in `recv` for the lifetime of the
/// connection while any number of callers `send`.
///
/// The methods return `impl Future + Send` rather than using `async fn`
/// so generic callers can move the futures into spawned tasks.
pub trait Connection: Send + Sync + 'static {
    /// Sends one frame to the remote peer.
    fn send(
        &self,
        data: &[u8],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Receives the next frame from the remote peer.
    ///
    /// Returns `Ok(None)` when the connection is cleanly closed.
    fn recv(
        &self,
    ) -> impl Future<Output = Result<Option<Vec<u8>>, TransportError>> + Send;

    /// Closes the connection. A task parked in [`recv`](Self::recv)
    /// observes `Ok(None)`.
    fn close(&self) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Returns the unique identifier for this connection.
    fn id(&self) -> ConnectionId;
}

/// Opens outbound connections to an endpoint.
pub trait Connector: Send + Sync + 'static {
    /// The connection type produced by this connector.
    type Connection: Connection;

    /// Connects to `endpoint` (for WebSockets, a `wss://` URL).
    fn connect(
        &self,
        endpoint: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// Accepts new incoming connections.
pub trait Transport: Send + Sync + 'static {
    /// The connection type produced by this transport.
    type Connection: Connection;

    /// Waits for and accepts the next incoming connection.
    fn accept(
        &mut self,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;

    /// Stops accepting new connections.
    fn shutdown(&mut self) -> impl Future<Output = Result<(), TransportError>> + Send;
}
