//! Error types for the RPC layer.

use std::time::Duration;

use majsoul_protocol::ProtocolError;
use majsoul_transport::TransportError;

/// Errors returned by calls on an [`RpcConnection`](crate::RpcConnection).
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// Sending the request failed.
    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    /// The request couldn't be encoded, or its response couldn't be decoded.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// The dispatch loop has exited; no response will ever arrive.
    #[error("connection is broken")]
    ConnectionBroken,

    /// No response within the configured call timeout.
    #[error("{method} timed out after {after:?}")]
    Timeout { method: String, after: Duration },

    /// The server answered with a non-zero `error.code`.
    #[error("{method} failed with error code {code}")]
    Remote { method: String, code: u32 },
}

impl RpcError {
    /// Whether retrying on the same connection is pointless.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::ConnectionBroken | Self::Transport(_))
    }
}
